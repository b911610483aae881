//! Host SQLite (Diesel) para el borrado lógico.
//! Este crate expone el módulo `schema`, el almacén `DieselStore` (pool r2d2
//! con migraciones embebidas), el registro `SqlRecord` y la query
//! `SqlSelect`, que implementan los contratos `Record` y `Query` del crate
//! `softdelete`.

mod record;
pub mod schema;
mod select;
mod store;

pub use record::{Row, SqlRecord};
pub use select::SqlSelect;
pub use store::{new_from_env, new_sqlite_for_test, DieselStore, Table, MIGRATIONS};
