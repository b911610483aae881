use serde_json::json;
use softdelete::stubs::{InMemoryDatabase, Row, StubRecord};
use softdelete::{AttributeMap, AttributeValue, Condition, DeletionMutator, DeletionQueryFilter, SoftDeleteExt,
                 SoftDeleteQuery};
use std::sync::Arc;

fn row(values: &[(&str, AttributeValue)]) -> Row {
  values.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn catalog() -> Arc<InMemoryDatabase> {
  let db = InMemoryDatabase::new();
  let categories = DeletionMutator::builder().soft_delete_attribute_values(AttributeMap::new().with("is_deleted", true))
                                             .build()
                                             .expect("behavior");
  db.create_table("categories",
                  row(&[("name", AttributeValue::Null), ("is_deleted", false.into())]),
                  categories)
    .expect("categories");
  let items = DeletionMutator::builder().soft_delete_attribute_values(AttributeMap::new().with("is_deleted", 1)
                                                                                        .with_computed("deleted_at", |_: &StubRecord| {
                                                                                          AttributeValue::Int(42)
                                                                                        }))
                                        .build()
                                        .expect("behavior");
  db.create_table("items",
                  row(&[("category_id", AttributeValue::Null), ("is_deleted", 0.into()), ("deleted_at", AttributeValue::Null)]),
                  items)
    .expect("items");
  db
}

// three categories, the second one soft-deleted
fn seeded() -> Arc<InMemoryDatabase> {
  let db = catalog();
  for name in ["c1", "c2", "c3"] {
    db.insert("categories", row(&[("name", name.into())])).expect("insert");
  }
  let mut second = db.find_one("categories", 2).expect("find").expect("row");
  second.soft_delete().expect("soft delete");
  db
}

fn count(db: &Arc<InMemoryDatabase>, value: impl Into<softdelete::FilterValue>) -> usize {
  db.find("categories").filter_deleted(value).expect("filter").count().expect("count")
}

#[test]
fn default_conditions_mirror_the_attribute_map() {
  let db = catalog();
  let q = db.find("categories");
  let deleted = q.deletion_filter().deleted_condition(&q).expect("deleted").clone();
  let not_deleted = q.deletion_filter().not_deleted_condition(&q).expect("not deleted").clone();
  assert_eq!(deleted, Condition::new().with("is_deleted", true));
  assert_eq!(not_deleted, Condition::new().with("is_deleted", false));
}

#[test]
fn computed_entries_become_null_in_not_deleted_condition() {
  let db = catalog();
  let q = db.find("items");
  let deleted = q.deletion_filter().deleted_condition(&q).expect("deleted").clone();
  let not_deleted = q.deletion_filter().not_deleted_condition(&q).expect("not deleted").clone();
  assert_eq!(deleted, Condition::new().with("is_deleted", 1).with("deleted_at", 42));
  assert_eq!(not_deleted,
             Condition::new().with("is_deleted", false).with("deleted_at", AttributeValue::Null));
}

#[test]
fn conditions_are_derived_once_per_filter() {
  let db = catalog();
  let q = db.find("categories");
  let first = q.deletion_filter().deleted_condition(&q).expect("deleted").clone();
  let first_alive = q.deletion_filter().not_deleted_condition(&q).expect("not deleted").clone();

  let archived = DeletionMutator::builder().soft_delete_attribute_values(AttributeMap::new().with("archived", true))
                                           .build()
                                           .expect("behavior");
  db.set_behavior("categories", archived).expect("set behavior");

  assert_eq!(q.deletion_filter().deleted_condition(&q).expect("deleted"), &first);
  assert_eq!(q.deletion_filter().not_deleted_condition(&q).expect("not deleted"), &first_alive);
  assert_eq!(first, Condition::new().with("is_deleted", true));

  // a new query sees the new behavior
  let fresh = db.find("categories");
  assert_eq!(fresh.deletion_filter().deleted_condition(&fresh).expect("deleted"),
             &Condition::new().with("archived", true));
}

#[test]
fn deleted_and_not_deleted_partition_rows() {
  let db = seeded();
  let deleted = db.find("categories").deleted().expect("deleted").all().expect("all");
  let alive = db.find("categories").not_deleted().expect("not deleted").all().expect("all");
  assert_eq!(deleted.len(), 1);
  assert_eq!(deleted[0].get("name"), AttributeValue::from("c2"));
  assert_eq!(alive.len(), 2);
  assert_eq!(db.find("categories").count().expect("count"), 3);
}

#[test]
fn filter_deleted_maps_request_values() {
  let db = seeded();
  assert_eq!(count(&db, ""), 2);
  assert_eq!(count(&db, None::<&str>), 2);
  assert_eq!(count(&db, json!(null)), 2);
  assert_eq!(count(&db, Vec::<String>::new()), 2);
  assert_eq!(count(&db, "1"), 1);
  assert_eq!(count(&db, true), 1);
  assert_eq!(count(&db, 5), 1);
  assert_eq!(count(&db, "0"), 3);
  assert_eq!(count(&db, false), 3);
  assert_eq!(count(&db, "all"), 3);
  assert_eq!(count(&db, "no"), 3);
}

#[test]
fn filter_deleted_all_leaves_query_untouched() {
  let db = seeded();
  let q = db.find("categories").filter_deleted("0").expect("filter");
  assert!(q.where_conditions().is_empty());
  assert!(q.on_conditions().is_empty());
}

#[test]
fn standalone_filter_works_on_borrowed_queries() {
  let db = seeded();
  let filter = DeletionQueryFilter::<StubRecord>::new();
  let mut q = db.find("categories");
  filter.filter_deleted(&mut q, "1").expect("filter");
  assert_eq!(q.count().expect("count"), 1);
  assert_eq!(q.where_conditions().len(), 1);
}

#[test]
fn explicit_conditions_override_defaults() {
  let db = seeded();
  let mut q = db.find("categories");
  q.filter_mut().set_deleted_condition(Condition::new().with("name", "c3"));
  let q = q.deleted().expect("deleted");
  assert_eq!(q.where_conditions(), &[Condition::new().with("name", "c3")]);
  assert_eq!(q.count().expect("count"), 1);
}

#[test]
fn join_queries_qualify_columns_with_primary_alias() {
  let db = catalog();
  let q = db.find("items").alias("t").join("categories", "c").not_deleted().expect("not deleted");
  assert_eq!(q.where_conditions(),
             &[Condition::new().with("t.is_deleted", false).with("t.deleted_at", AttributeValue::Null)]);
}

#[test]
fn single_table_queries_are_not_qualified() {
  let db = catalog();
  let q = db.find("items").alias("t").deleted().expect("deleted");
  assert_eq!(q.where_conditions(), &[Condition::new().with("is_deleted", 1).with("deleted_at", 42)]);
}

#[test]
fn already_qualified_columns_are_kept() {
  let db = catalog();
  let mut q = db.find("items").alias("t").join("categories", "c");
  q.filter_mut()
   .set_not_deleted_condition(Condition::new().with("c.is_deleted", false).with("is_deleted", 0));
  let q = q.not_deleted().expect("not deleted");
  assert_eq!(q.where_conditions(),
             &[Condition::new().with("c.is_deleted", false).with("t.is_deleted", 0)]);
}

#[test]
fn relation_queries_receive_on_conditions() {
  let db = seeded();
  let q = db.find("categories").relation().not_deleted().expect("not deleted");
  assert!(q.where_conditions().is_empty());
  assert_eq!(q.on_conditions(), &[Condition::new().with("is_deleted", false)]);
  assert_eq!(q.count().expect("count"), 2);
}

#[test]
fn soft_deleted_items_match_integer_flags() {
  let db = catalog();
  let mut first = db.insert("items", Row::new()).expect("insert");
  db.insert("items", Row::new()).expect("insert");
  first.soft_delete().expect("soft delete");
  assert_eq!(first.get("is_deleted"), AttributeValue::Int(1));
  assert_eq!(db.find("items").deleted().expect("deleted").count().expect("count"), 1);
  assert_eq!(db.find("items").not_deleted().expect("not deleted").count().expect("count"), 1);

  first.restore().expect("restore");
  assert_eq!(first.get("is_deleted"), AttributeValue::Int(0));
  assert_eq!(db.find("items").not_deleted().expect("not deleted").count().expect("count"), 2);
}
