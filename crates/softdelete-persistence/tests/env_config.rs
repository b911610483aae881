use softdelete::{AttributeValue, MutationOutcome, Record};
use softdelete_persistence::{new_from_env, Table};
use uuid::Uuid;

#[test]
fn item_behavior_is_read_from_environment() {
  let tmp_path = std::env::temp_dir().join(format!("softdelete_env_{}.db", Uuid::new_v4()));
  std::env::set_var("SOFTDELETE_DB_URL", tmp_path.to_str().unwrap());
  std::env::set_var("SOFTDELETE_ITEM_SETTINGS",
                    r#"{"soft_delete_attribute_values": {"is_deleted": true}, "replace_regular_delete": true}"#);
  let store = new_from_env().expect("store from env");

  let mut item = store.insert_item(None, "i1").expect("insert");
  assert_eq!(item.delete().expect("delete"), MutationOutcome::NotPerformed);
  assert_eq!(store.count(Table::Items).expect("count"), 1);
  assert!(item.refresh().expect("refresh"));
  assert_eq!(item.get("is_deleted"), AttributeValue::Bool(true));
  assert_eq!(item.get("deleted_at"), AttributeValue::Null);
}
