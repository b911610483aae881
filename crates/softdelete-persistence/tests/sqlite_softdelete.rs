use softdelete::{AttributeMap, AttributeValue, Condition, DeletionMutator, ErrorKind, MutationOutcome, Record,
                 SoftDeleteExt, SoftDeleteQuery};
use softdelete_persistence::{new_sqlite_for_test, DieselStore, SqlRecord, Table};
use uuid::Uuid;

fn setup_store() -> DieselStore {
  // Temporary file-backed SQLite DB: every pooled connection sees the same data.
  let tmp_path = std::env::temp_dir().join(format!("softdelete_test_{}.db", Uuid::new_v4()));
  new_sqlite_for_test(tmp_path.to_str().unwrap()).expect("store")
}

fn category_behavior(replace: bool) -> DeletionMutator<SqlRecord> {
  DeletionMutator::builder().soft_delete_attribute_values(AttributeMap::new().with("is_deleted", true))
                            .replace_regular_delete(replace)
                            .allow_delete_callback(|r: &SqlRecord| r.get("name") == AttributeValue::from("allow-delete"))
                            .build()
                            .expect("behavior")
}

#[test]
fn soft_deleted_rows_are_filtered() {
  let store = setup_store();
  for name in ["c1", "c2", "c3"] {
    store.insert_category(name).expect("insert");
  }
  let mut second = store.find_one(Table::Categories, 2).expect("find").expect("row");
  assert_eq!(second.soft_delete().expect("soft delete"), MutationOutcome::Affected(1));

  assert_eq!(store.count(Table::Categories).expect("count"), 3);
  let categories = || store.find(Table::Categories);
  assert_eq!(categories().not_deleted().expect("filter").count().expect("count"), 2);
  assert_eq!(categories().deleted().expect("filter").count().expect("count"), 1);
  assert_eq!(categories().filter_deleted("").expect("filter").count().expect("count"), 2);
  assert_eq!(categories().filter_deleted("1").expect("filter").count().expect("count"), 1);
  assert_eq!(categories().filter_deleted("0").expect("filter").count().expect("count"), 3);
  assert_eq!(categories().filter_deleted("all").expect("filter").count().expect("count"), 3);
  let deleted = categories().deleted().expect("filter").one().expect("one").expect("row");
  assert_eq!(deleted.get("name"), AttributeValue::from("c2"));
}

#[test]
fn item_restore_clears_deleted_at_and_bumps_version() {
  let store = setup_store();
  let mut item = store.insert_item(None, "i1").expect("insert");
  assert_eq!(item.get("version"), AttributeValue::Int(0));

  item.soft_delete().expect("soft delete");
  assert!(item.get("deleted_at").as_i64().expect("deleted_at") > 0);
  assert_eq!(item.get("version"), AttributeValue::Int(1));
  assert!(item.refresh().expect("refresh"));
  assert_eq!(item.get("is_deleted"), AttributeValue::Bool(true));

  item.restore().expect("restore");
  assert!(item.refresh().expect("refresh"));
  assert_eq!(item.get("deleted_at"), AttributeValue::Null);
  assert_eq!(item.get("is_deleted"), AttributeValue::Bool(false));
  assert_eq!(item.get("version"), AttributeValue::Int(2));
  assert_eq!(store.find(Table::Items).not_deleted().expect("filter").count().expect("count"), 1);
}

#[test]
fn regular_delete_is_replaced_unless_allowed() {
  let store = setup_store();
  store.set_behavior(Table::Categories, category_behavior(true)).expect("behavior");
  let mut keep = store.insert_category("keep").expect("insert");
  let mut allowed = store.insert_category("allow-delete").expect("insert");

  assert_eq!(keep.delete().expect("delete"), MutationOutcome::NotPerformed);
  assert_eq!(store.count(Table::Categories).expect("count"), 2);

  assert_eq!(allowed.delete().expect("delete"), MutationOutcome::Affected(1));
  assert_eq!(store.count(Table::Categories).expect("count"), 1);
  assert_eq!(store.find(Table::Categories).deleted().expect("filter").count().expect("count"), 1);
}

#[test]
fn foreign_key_violation_is_integrity_and_safe_delete_falls_back() {
  let store = setup_store();
  let mut referenced = store.insert_category("c1").expect("insert");
  store.insert_item(referenced.id(), "i1").expect("insert item");

  let err = referenced.delete().expect_err("fk violation");
  assert_eq!(err.kind(), ErrorKind::Integrity);

  assert_eq!(referenced.safe_delete().expect("safe delete"), MutationOutcome::Affected(1));
  assert_eq!(store.count(Table::Categories).expect("count"), 1);
  assert!(referenced.refresh().expect("refresh"));
  assert_eq!(referenced.get("is_deleted"), AttributeValue::Bool(true));

  let mut free = store.insert_category("c2").expect("insert");
  assert_eq!(free.safe_delete().expect("safe delete"), MutationOutcome::Affected(1));
  assert_eq!(store.count(Table::Categories).expect("count"), 1);
}

#[test]
fn join_queries_qualify_filter_columns() {
  let store = setup_store();
  let cat = store.insert_category("c1").expect("insert");
  store.insert_item(cat.id(), "i1").expect("insert item");
  let mut gone = store.insert_item(cat.id(), "i2").expect("insert item");
  gone.soft_delete().expect("soft delete");

  let q = store.find(Table::Items)
               .alias("t")
               .inner_join(Table::Categories, "c", "\"c\".\"id\" = \"t\".\"category_id\"")
               .not_deleted()
               .expect("filter");
  assert_eq!(q.sql().expect("sql"),
             "SELECT \"t\".* FROM \"items\" AS \"t\" INNER JOIN \"categories\" AS \"c\" ON \"c\".\"id\" = \
              \"t\".\"category_id\" WHERE \"t\".\"is_deleted\" = ? AND \"t\".\"deleted_at\" IS NULL");
  let rows = q.all().expect("all");
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].get("name"), AttributeValue::from("i1"));

  let q = q.and_where_condition(Condition::new().with("c.is_deleted", true));
  assert_eq!(q.count().expect("count"), 0);
}

#[test]
fn explicit_deleted_condition_ignores_computed_timestamp() {
  let store = setup_store();
  let mut item = store.insert_item(None, "i1").expect("insert");
  item.soft_delete().expect("soft delete");

  let mut q = store.find(Table::Items);
  q.filter_mut().set_deleted_condition(Condition::new().with("is_deleted", true));
  assert_eq!(q.deleted().expect("filter").count().expect("count"), 1);
}

#[test]
fn stale_item_cannot_be_soft_deleted() {
  let store = setup_store();
  let id = store.insert_item(None, "i1").expect("insert").id().expect("id");
  let mut first = store.find_one(Table::Items, id).expect("find").expect("row");
  let mut second = store.find_one(Table::Items, id).expect("find").expect("row");

  first.soft_delete().expect("soft delete");
  let err = second.soft_delete().expect_err("stale");
  assert_eq!(err.kind(), ErrorKind::StaleObject);
}

#[test]
fn unknown_columns_are_rejected() {
  let store = setup_store();
  let behavior = DeletionMutator::builder().soft_delete_attribute_values(AttributeMap::new().with("archived", true))
                                           .build()
                                           .expect("behavior");
  store.set_behavior(Table::Categories, behavior).expect("behavior");
  let mut cat = store.insert_category("c1").expect("insert");
  let err = cat.soft_delete().expect_err("unknown column");
  assert_eq!(err.kind(), ErrorKind::InvalidValue);

  let err = store.find(Table::Categories).not_deleted().expect("filter").count().expect_err("unknown column");
  assert_eq!(err.kind(), ErrorKind::InvalidValue);
}
