use std::error::Error;
use std::io::{self, Write};
use std::str::FromStr;

use softdelete::{Condition, MutationOutcome, Record, SoftDeleteExt, SoftDeleteQuery};
use softdelete_persistence::{DieselStore, SqlRecord, Table};

/// Pequeño menú interactivo sobre el catálogo (categorías e items) con
/// borrado lógico, usando el almacén de `softdelete-persistence`.
///
/// Opciones soportadas:
/// 1) Listar filas (filtro: vacío = no borradas, 1 = borradas, all = todas)
/// 2) Crear categoría
/// 3) Crear item
/// 4) Borrado lógico
/// 5) Restaurar
/// 6) Borrado seguro (físico, o lógico si falla)
/// 7) Borrado regular
/// 8) Salir
fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env()
                                                  .unwrap_or_else(|_| "warn".into()))
                             .with_writer(io::stderr)
                             .init();
    // Inicializar almacén (aplica migraciones embebidas y SOFTDELETE_ITEM_SETTINGS)
    let store = softdelete_persistence::new_from_env()?;

    loop {
        println!("\n== Soft delete CLI menu ==");
        println!("1) Listar filas");
        println!("2) Crear categoría");
        println!("3) Crear item");
        println!("4) Borrado lógico");
        println!("5) Restaurar");
        println!("6) Borrado seguro");
        println!("7) Borrado regular");
        println!("8) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        io::stdin().read_line(&mut choice)?;
        match choice.trim() {
            "1" => {
                let Some(table) = prompt_table()? else { continue };
                let filter = prompt("Filtro (enter = no borradas, 1 = borradas, all = todas): ")?;
                match list(&store, table, filter.trim()) {
                    Ok(rows) => {
                        println!("\nID   | BORRADO | DATOS");
                        println!("-----------------------------------------------------------");
                        for r in rows {
                            let id = r.id().map(|i| i.to_string()).unwrap_or_else(|| "-".into());
                            println!("{:<4} | {:<7} | {:?}", id, r.get("is_deleted").is_truthy(), r.attributes());
                        }
                    }
                    Err(e) => eprintln!("Error listando {}: {}", table, e),
                }
            }
            "2" => {
                let name = prompt("Nombre: ")?;
                match store.insert_category(name.trim()) {
                    Ok(r) => println!("Categoría creada: {:?}", r.id()),
                    Err(e) => eprintln!("Error creando categoría: {}", e),
                }
            }
            "3" => {
                let name = prompt("Nombre: ")?;
                let cat_s = prompt("Id de categoría (enter para ninguna): ")?;
                let category_id = if cat_s.trim().is_empty() {
                    None
                } else {
                    match cat_s.trim().parse::<i64>() {
                        Ok(n) => Some(n),
                        Err(_) => { eprintln!("Id inválido"); continue; }
                    }
                };
                match store.insert_item(category_id, name.trim()) {
                    Ok(r) => println!("Item creado: {:?}", r.id()),
                    Err(e) => eprintln!("Error creando item: {}", e),
                }
            }
            "4" | "5" | "6" | "7" => {
                let Some(mut record) = prompt_record(&store)? else { continue };
                let (label, res) = match choice.trim() {
                    "4" => ("borrado lógico", record.soft_delete()),
                    "5" => ("restauración", record.restore()),
                    "6" => ("borrado seguro", record.safe_delete()),
                    _ => ("borrado regular", record.delete()),
                };
                match res.map(MutationOutcome::rows) {
                    Ok(Some(n)) => println!("{}: {} fila(s)", label, n),
                    Ok(None) => println!("{}: no realizado (cancelado o sustituido)", label),
                    Err(e) => eprintln!("Error en {}: {}", label, e),
                }
            }
            "8" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

fn list(store: &DieselStore, table: Table, filter: &str) -> softdelete::Result<Vec<SqlRecord>> {
    let mut query = store.find(table);
    if table == Table::Items {
        // deleted_at es calculado: "borradas" se decide sólo por el flag
        query.filter_mut().set_deleted_condition(Condition::new().with("is_deleted", true));
    }
    query.filter_deleted(filter)?.all()
}

fn prompt_table() -> io::Result<Option<Table>> {
    let s = prompt("Tabla (categories/items): ")?;
    match Table::from_str(s.trim()) {
        Ok(t) => Ok(Some(t)),
        Err(e) => {
            eprintln!("{}", e);
            Ok(None)
        }
    }
}

fn prompt_record(store: &DieselStore) -> io::Result<Option<SqlRecord>> {
    let Some(table) = prompt_table()? else { return Ok(None) };
    let id_s = prompt("Id: ")?;
    let id: i64 = match id_s.trim().parse() {
        Ok(n) => n,
        Err(_) => {
            eprintln!("Id inválido");
            return Ok(None);
        }
    };
    match store.find_one(table, id) {
        Ok(Some(r)) => Ok(Some(r)),
        Ok(None) => {
            eprintln!("No existe {} #{}", table, id);
            Ok(None)
        }
        Err(e) => {
            eprintln!("Error cargando {} #{}: {}", table, id, e);
            Ok(None)
        }
    }
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}
