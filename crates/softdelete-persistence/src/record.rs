use crate::store::{prepare, DieselStore, Table};
use indexmap::IndexMap;
use log::debug;
use softdelete::{AttributeValue, DeletionMutator, ModelEvents, Record, Result, SoftDeletable, SoftDeleteError,
                 SoftDeleteExt};
use std::fmt;
use std::sync::Arc;

/// Fila cargada de SQLite: columna -> valor.
pub type Row = IndexMap<String, AttributeValue>;

/// Registro de una tabla del catálogo respaldado por SQLite.
pub struct SqlRecord {
  store: DieselStore,
  table: Table,
  attributes: Row,
  deletion: Arc<DeletionMutator<SqlRecord>>,
  events: ModelEvents<SqlRecord>,
}

impl SqlRecord {
  pub(crate) fn load(store: DieselStore, table: Table, attributes: Row, deletion: Arc<DeletionMutator<SqlRecord>>) -> Self {
    let mut record = SqlRecord { store, table, attributes, deletion, events: ModelEvents::new() };
    record.attach_soft_delete();
    record
  }

  pub fn table(&self) -> Table {
    self.table
  }

  pub fn id(&self) -> Option<i64> {
    self.attributes.get("id").and_then(AttributeValue::as_i64)
  }

  /// Valor del atributo, `Null` si no existe.
  pub fn get(&self, name: &str) -> AttributeValue {
    self.attribute(name).unwrap_or_default()
  }

  pub fn attributes(&self) -> &Row {
    &self.attributes
  }

  /// Recarga los atributos desde la base de datos. Devuelve `false` si la
  /// fila ya no existe.
  pub fn refresh(&mut self) -> Result<bool> {
    let Some(id) = self.id() else {
      return Ok(false);
    };
    match self.store.find_one(self.table, id)? {
      Some(fresh) => {
        self.attributes = fresh.attributes;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  fn require_id(&self) -> Result<i64> {
    self.id().ok_or_else(|| SoftDeleteError::NotFound(format!("registro de {} sin persistir", self.table)))
  }

  /// `WHERE "id" = ? [AND "version" = ?]` y sus parámetros.
  fn locked_predicate(&self, id: i64) -> (String, Vec<AttributeValue>) {
    let mut sql = String::from("\"id\" = ?");
    let mut binds = vec![AttributeValue::Int(id)];
    if let Some(column) = self.table.optimistic_lock() {
      sql.push_str(&format!(" AND \"{}\" = ?", column));
      binds.push(self.get(column));
    }
    (sql, binds)
  }

  fn stale(&self, id: i64) -> SoftDeleteError {
    SoftDeleteError::StaleObject(format!("{} #{}: la fila cambió desde que se leyó", self.table, id))
  }
}

impl Record for SqlRecord {
  fn attribute(&self, name: &str) -> Option<AttributeValue> {
    self.attributes.get(name).cloned()
  }

  fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
    if name == "id" || !self.table.has_column(name) {
      return Err(SoftDeleteError::InvalidValue(format!("{}.{} no es asignable", self.table, name)));
    }
    self.attributes.insert(name.to_string(), value);
    Ok(())
  }

  fn update_attributes(&mut self, names: &[&str]) -> Result<usize> {
    let id = self.require_id()?;
    if names.is_empty() {
      return Ok(0);
    }
    let mut assignments = Vec::with_capacity(names.len() + 1);
    let mut binds = Vec::with_capacity(names.len() + 2);
    for name in names {
      if *name == "id" || !self.table.has_column(name) {
        return Err(SoftDeleteError::InvalidValue(format!("{}.{} no es actualizable", self.table, name)));
      }
      assignments.push(format!("\"{}\" = ?", name));
      binds.push(self.get(name));
    }
    let lock = self.table.optimistic_lock();
    if let Some(column) = lock {
      assignments.push(format!("\"{}\" = \"{}\" + 1", column, column));
    }
    let (predicate, predicate_binds) = self.locked_predicate(id);
    binds.extend(predicate_binds);
    let sql = format!("UPDATE \"{}\" SET {} WHERE {}", self.table, assignments.join(", "), predicate);
    let rows = self.store.execute(prepare(sql, &binds))?;
    if let Some(column) = lock {
      if rows == 0 {
        return Err(self.stale(id));
      }
      let next = self.get(column).as_i64().unwrap_or(0) + 1;
      self.attributes.insert(column.to_string(), AttributeValue::Int(next));
    }
    debug!("{} #{} actualizado: {:?}", self.table, id, names);
    Ok(rows)
  }

  fn delete_row(&mut self) -> Result<usize> {
    let id = self.require_id()?;
    let (predicate, binds) = self.locked_predicate(id);
    let sql = format!("DELETE FROM \"{}\" WHERE {}", self.table, predicate);
    let rows = self.store.execute(prepare(sql, &binds))?;
    if rows == 0 && self.table.optimistic_lock().is_some() {
      return Err(self.stale(id));
    }
    Ok(rows)
  }

  fn events(&self) -> &ModelEvents<Self> {
    &self.events
  }

  fn events_mut(&mut self) -> &mut ModelEvents<Self> {
    &mut self.events
  }
}

impl SoftDeletable for SqlRecord {
  fn deletion(&self) -> &Arc<DeletionMutator<Self>> {
    &self.deletion
  }

  fn deletion_mut(&mut self) -> &mut Arc<DeletionMutator<Self>> {
    &mut self.deletion
  }
}

impl fmt::Debug for SqlRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SqlRecord")
     .field("table", &self.table)
     .field("attributes", &self.attributes)
     .finish()
  }
}
