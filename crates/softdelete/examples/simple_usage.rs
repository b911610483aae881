use softdelete::stubs::{InMemoryDatabase, Row};
use softdelete::{AttributeMap, AttributeValue, DeletionMutator, Record, SoftDeleteError, SoftDeleteExt, SoftDeleteQuery};

fn main() -> Result<(), SoftDeleteError> {
    // Tabla con borrado lógico sobre is_deleted y sustitución del borrado regular
    let db = InMemoryDatabase::new();
    let behavior = DeletionMutator::builder().soft_delete_attribute_values(AttributeMap::new().with("is_deleted", true))
                                             .replace_regular_delete(true)
                                             .build()?;
    let mut defaults = Row::new();
    defaults.insert("name".into(), AttributeValue::Null);
    defaults.insert("is_deleted".into(), false.into());
    db.create_table("items", defaults, behavior)?;

    for i in 1..=3 {
        let mut values = Row::new();
        values.insert("name".into(), format!("item-{}", i).into());
        db.insert("items", values)?;
    }

    // delete() no elimina la fila: la marca como borrada
    if let Some(mut first) = db.find_one("items", 1)? {
        let outcome = first.delete()?;
        println!("delete item-1: {:?}", outcome);
    }
    println!("filas físicas: {}", db.count("items")?);
    println!("no borradas: {}", db.find("items").not_deleted()?.count()?);
    println!("borradas: {}", db.find("items").deleted()?.count()?);

    // Restaurar
    for mut item in db.find("items").deleted()?.all()? {
        item.restore()?;
        println!("restaurado {}", item.get("name"));
    }
    println!("todas (filter_deleted=all): {}", db.find("items").filter_deleted("all")?.count()?);
    Ok(())
}
