//! Crate `softdelete` — borrado lógico para registros persistentes
//!
//! En lugar de eliminar filas, un registro se marca como borrado
//! actualizando un conjunto de atributos (`is_deleted = true`,
//! `deleted_at = <timestamp>`, ...). El crate ofrece dos piezas:
//!
//! - `DeletionMutator`: comportamiento adjunto a un registro que aplica el
//!   borrado lógico y la restauración, puede sustituir el borrado regular y
//!   ofrece un `safe_delete` que degrada a borrado lógico cuando el borrado
//!   físico falla.
//! - `DeletionQueryFilter`: añade a una query las condiciones "sólo
//!   borrados", "sólo no borrados" o ninguna, derivadas de los mismos mapas
//!   de atributos.
//!
//! El host aporta el registro (`Record`) y el constructor de queries
//! (`Query`). `stubs` incluye una implementación en memoria útil para
//! pruebas.
//!
//! Ejemplo rápido:
//! ```rust
//! use softdelete::stubs::{InMemoryDatabase, Row};
//! use softdelete::{AttributeMap, DeletionMutator, SoftDeleteExt, SoftDeleteQuery};
//! let db = InMemoryDatabase::new();
//! let behavior = DeletionMutator::builder().soft_delete_attribute_values(AttributeMap::new().with("is_deleted", true))
//!                                          .build()
//!                                          .unwrap();
//! let mut defaults = Row::new();
//! defaults.insert("is_deleted".into(), false.into());
//! db.create_table("items", defaults, behavior).unwrap();
//! let mut item = db.insert("items", Row::new()).unwrap();
//! item.soft_delete().unwrap();
//! assert_eq!(db.find("items").not_deleted().unwrap().count().unwrap(), 0);
//! ```
pub mod attributes;
pub mod errors;
pub mod events;
pub mod filter;
pub mod mutator;
pub mod query;
pub mod record;
pub mod settings;
pub mod stubs;

pub use attributes::*;
pub use errors::*;
pub use events::*;
pub use filter::*;
pub use mutator::*;
pub use query::*;
pub use record::*;
pub use settings::*;
