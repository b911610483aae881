use softdelete::stubs::{InMemoryDatabase, Row, StubRecord};
use softdelete::{AttributeMap, AttributeValue, DeletionMutator, DeletionSettings, ErrorKind, SoftDeleteExt};

#[test]
fn settings_from_json_build_a_mutator() {
  let raw = r#"{
    "soft_delete_attribute_values": {"is_deleted": true, "deleted_at": {"computed": "timestamp"}},
    "replace_regular_delete": true,
    "delete_fallback": "integrity"
  }"#;
  let settings = DeletionSettings::from_json(raw).expect("parse");
  assert!(settings.invoke_delete_events);
  assert!(settings.restore_attribute_values.is_none());

  let mutator = DeletionMutator::<StubRecord>::from_settings(settings).expect("mutator");
  assert!(mutator.replace_regular_delete());
  assert_eq!(mutator.delete_fallback(), Some(ErrorKind::Integrity));
  assert_eq!(mutator.soft_delete_attribute_values().names(), vec!["is_deleted", "deleted_at"]);
  assert!(mutator.soft_delete_attribute_values().get("deleted_at").expect("deleted_at").is_computed());
}

#[test]
fn computed_timestamp_is_written_on_soft_delete() {
  let settings =
    DeletionSettings::from_json(r#"{"soft_delete_attribute_values": {"is_deleted": true, "deleted_at": {"computed": "timestamp"}}}"#)
      .expect("parse");
  let db = InMemoryDatabase::new();
  let mut defaults = Row::new();
  defaults.insert("is_deleted".into(), false.into());
  defaults.insert("deleted_at".into(), AttributeValue::Null);
  db.create_table("items", defaults, DeletionMutator::from_settings(settings).expect("mutator"))
    .expect("table");
  let mut item = db.insert("items", Row::new()).expect("insert");
  item.soft_delete().expect("soft delete");
  assert!(item.get("deleted_at").as_i64().expect("timestamp") > 0);
  item.restore().expect("restore");
  assert!(item.get("deleted_at").is_null());
}

#[test]
fn default_settings_flag_is_deleted() {
  let settings = DeletionSettings::from_json("{}").expect("parse");
  assert_eq!(settings, DeletionSettings::default());
  let mutator = DeletionMutator::<StubRecord>::from_settings(settings).expect("mutator");
  assert_eq!(mutator.soft_delete_attribute_values().names(), vec!["is_deleted"]);
  assert_eq!(mutator.delete_fallback(), None);
}

#[test]
fn explicit_restore_map_is_kept() {
  let raw = r#"{"soft_delete_attribute_values": {"status": 2}, "restore_attribute_values": {"status": 1}}"#;
  let mutator = DeletionMutator::<StubRecord>::from_settings(DeletionSettings::from_json(raw).expect("parse")).expect("mutator");
  let restore = mutator.restore_attribute_values().expect("restore map");
  assert_eq!(restore.names(), vec!["status"]);
}

#[test]
fn empty_attribute_map_is_rejected() {
  let settings = DeletionSettings::from_json(r#"{"soft_delete_attribute_values": {}}"#).expect("parse");
  let err = DeletionMutator::<StubRecord>::from_settings(settings).expect_err("empty map");
  assert_eq!(err.kind(), ErrorKind::Configuration);

  let err = DeletionMutator::<StubRecord>::builder().soft_delete_attribute_values(AttributeMap::new())
                                                    .build()
                                                    .expect_err("empty map");
  assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn malformed_json_is_an_invalid_value() {
  let err = DeletionSettings::from_json("{\"invoke_delete_events\": \"yes\"}").expect_err("bad json");
  assert_eq!(err.kind(), ErrorKind::InvalidValue);
}
