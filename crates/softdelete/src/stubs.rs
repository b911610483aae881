// Archivo: stubs.rs
// Propósito: host en memoria para pruebas y wiring rápido.
//
// Incluye una base de datos en memoria (`InMemoryDatabase`) con tablas,
// claves foráneas y bloqueo optimista opcional, un registro (`StubRecord`)
// que implementa `Record` y una query (`StubQuery`) que implementa `Query`.
// No son durables; sirven para demos y pruebas locales.
use crate::attributes::AttributeValue;
use crate::errors::{ErrorKind, Result, SoftDeleteError};
use crate::events::{EventHandler, HandlerId, ModelEventKind, ModelEvents};
use crate::filter::{DeletionQueryFilter, SoftDeleteQuery};
use crate::mutator::{DeletionMutator, SoftDeletable, SoftDeleteExt};
use crate::query::{Condition, Query};
use crate::record::{Record, SoftDeleteHooks};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Fila en memoria: columna -> valor. Incluye la columna `id`.
pub type Row = IndexMap<String, AttributeValue>;

/// Clave foránea `table.column -> references.id`. Borrar una fila
/// referenciada falla con `Integrity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
  pub table: String,
  pub column: String,
  pub references: String,
}

struct TableData {
  rows: IndexMap<i64, Row>,
  next_id: i64,
  defaults: Row,
  optimistic_lock: Option<String>,
  behavior: Arc<DeletionMutator<StubRecord>>,
}

/// Base de datos en memoria (no durable).
pub struct InMemoryDatabase {
  /// Tablas indexadas por nombre.
  tables: Mutex<HashMap<String, TableData>>,
  /// Claves foráneas declaradas.
  foreign_keys: Mutex<Vec<ForeignKey>>,
  /// Invocaciones de la primitiva de actualización parcial.
  update_calls: AtomicUsize,
}

impl InMemoryDatabase {
  pub fn new() -> Arc<Self> {
    Arc::new(Self { tables: Mutex::new(HashMap::new()),
                    foreign_keys: Mutex::new(Vec::new()),
                    update_calls: AtomicUsize::new(0) })
  }

  /// Helper para mapear `Mutex::lock()` en un `Result` con
  /// `SoftDeleteError::Storage`.
  fn lock<'a, T>(&'a self, m: &'a Mutex<T>) -> Result<MutexGuard<'a, T>> {
    m.lock().map_err(|e| SoftDeleteError::Storage(format!("mutex poisoned: {:?}", e)))
  }

  /// Crea una tabla con sus columnas (y valores por defecto) y el
  /// comportamiento de borrado lógico que tendrán sus registros.
  pub fn create_table(&self, name: &str, defaults: Row, behavior: DeletionMutator<StubRecord>) -> Result<()> {
    let mut tables = self.lock(&self.tables)?;
    tables.insert(name.to_string(),
                  TableData { rows: IndexMap::new(),
                              next_id: 1,
                              defaults,
                              optimistic_lock: None,
                              behavior: Arc::new(behavior) });
    Ok(())
  }

  /// Activa el bloqueo optimista de `table` sobre `column`.
  pub fn set_optimistic_lock(&self, table: &str, column: &str) -> Result<()> {
    let mut tables = self.lock(&self.tables)?;
    let data = tables.get_mut(table).ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", table)))?;
    data.optimistic_lock = Some(column.to_string());
    data.defaults.entry(column.to_string()).or_insert(AttributeValue::Int(0));
    Ok(())
  }

  /// Reemplaza el comportamiento de borrado de `table` para los registros
  /// que se carguen a partir de ahora.
  pub fn set_behavior(&self, table: &str, behavior: DeletionMutator<StubRecord>) -> Result<()> {
    let mut tables = self.lock(&self.tables)?;
    let data = tables.get_mut(table).ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", table)))?;
    data.behavior = Arc::new(behavior);
    Ok(())
  }

  pub fn add_foreign_key(&self, table: &str, column: &str, references: &str) -> Result<()> {
    self.lock(&self.foreign_keys)?.push(ForeignKey { table: table.to_string(),
                                                      column: column.to_string(),
                                                      references: references.to_string() });
    Ok(())
  }

  /// Inserta una fila (valores por defecto + `values`) y devuelve el
  /// registro cargado.
  pub fn insert(self: &Arc<Self>, table: &str, values: Row) -> Result<StubRecord> {
    let (id, row, behavior) = {
      let mut tables = self.lock(&self.tables)?;
      let data = tables.get_mut(table).ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", table)))?;
      let id = data.next_id;
      data.next_id += 1;
      let mut row = data.defaults.clone();
      row.extend(values);
      row.insert("id".to_string(), AttributeValue::Int(id));
      data.rows.insert(id, row.clone());
      (id, row, Arc::clone(&data.behavior))
    };
    Ok(StubRecord::load(Arc::clone(self), table, Some(id), row, behavior))
  }

  pub fn find_one(self: &Arc<Self>, table: &str, id: i64) -> Result<Option<StubRecord>> {
    let tables = self.lock(&self.tables)?;
    let data = tables.get(table).ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", table)))?;
    Ok(data.rows
           .get(&id)
           .map(|row| StubRecord::load(Arc::clone(self), table, Some(id), row.clone(), Arc::clone(&data.behavior))))
  }

  /// Query sobre `table` con alias igual al nombre de la tabla.
  pub fn find(self: &Arc<Self>, table: &str) -> StubQuery {
    StubQuery::new(Arc::clone(self), table)
  }

  /// Instancia prototipo (sin persistir) de un registro de `table`.
  pub fn instance(self: &Arc<Self>, table: &str) -> Result<StubRecord> {
    let tables = self.lock(&self.tables)?;
    let data = tables.get(table).ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", table)))?;
    Ok(StubRecord::load(Arc::clone(self), table, None, data.defaults.clone(), Arc::clone(&data.behavior)))
  }

  /// Número de filas físicas de `table`.
  pub fn count(&self, table: &str) -> Result<usize> {
    let tables = self.lock(&self.tables)?;
    tables.get(table)
          .map(|d| d.rows.len())
          .ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", table)))
  }

  /// Veces que se ha invocado la actualización parcial.
  pub fn update_calls(&self) -> usize {
    self.update_calls.load(Ordering::SeqCst)
  }

  fn rows(&self, table: &str) -> Result<Vec<Row>> {
    let tables = self.lock(&self.tables)?;
    tables.get(table)
          .map(|d| d.rows.values().cloned().collect())
          .ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", table)))
  }

  fn behavior(&self, table: &str) -> Result<Arc<DeletionMutator<StubRecord>>> {
    let tables = self.lock(&self.tables)?;
    tables.get(table)
          .map(|d| Arc::clone(&d.behavior))
          .ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", table)))
  }
}

/// Registro de hooks de borrado lógico de un `StubRecord`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordHooks {
  /// Hooks invocados, en orden.
  pub calls: Vec<&'static str>,
  pub reject_soft_delete: bool,
  pub reject_restore: bool,
}

/// Registro en memoria.
pub struct StubRecord {
  db: Arc<InMemoryDatabase>,
  table: String,
  id: Option<i64>,
  attributes: Row,
  deletion: Arc<DeletionMutator<StubRecord>>,
  events: ModelEvents<StubRecord>,
  hooks: Option<RecordHooks>,
  fail_on_delete: Option<ErrorKind>,
}

impl StubRecord {
  fn load(db: Arc<InMemoryDatabase>,
          table: &str,
          id: Option<i64>,
          attributes: Row,
          deletion: Arc<DeletionMutator<StubRecord>>)
          -> Self {
    let mut record = StubRecord { db,
                                  table: table.to_string(),
                                  id,
                                  attributes,
                                  deletion,
                                  events: ModelEvents::new(),
                                  hooks: None,
                                  fail_on_delete: None };
    record.attach_soft_delete();
    record
  }

  pub fn id(&self) -> Option<i64> {
    self.id
  }

  pub fn table(&self) -> &str {
    &self.table
  }

  /// Valor del atributo, `Null` si no existe.
  pub fn get(&self, name: &str) -> AttributeValue {
    self.attribute(name).unwrap_or_default()
  }

  /// Asigna un atributo en memoria.
  pub fn set(&mut self, name: &str, value: impl Into<AttributeValue>) {
    self.attributes.insert(name.to_string(), value.into());
  }

  /// Expone hooks de registro que anotan cada llamada.
  pub fn with_hooks(mut self, hooks: RecordHooks) -> Self {
    self.hooks = Some(hooks);
    self
  }

  pub fn hooks(&self) -> Option<&RecordHooks> {
    self.hooks.as_ref()
  }

  /// Hace que `before_delete` falle con un error del tipo indicado.
  pub fn fail_on_delete(&mut self, kind: Option<ErrorKind>) {
    self.fail_on_delete = kind;
  }

  /// Registra un listener.
  pub fn on(&mut self, kind: ModelEventKind, id: HandlerId, handler: EventHandler<StubRecord>) {
    self.events.on(kind, id, handler);
  }

  /// Recarga los atributos desde la tabla. Devuelve `false` si la fila ya
  /// no existe.
  pub fn refresh(&mut self) -> Result<bool> {
    let Some(id) = self.id else {
      return Ok(false);
    };
    let tables = self.db.lock(&self.db.tables)?;
    let data = tables.get(&self.table)
                     .ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", self.table)))?;
    match data.rows.get(&id) {
      Some(row) => {
        self.attributes = row.clone();
        Ok(true)
      }
      None => Ok(false),
    }
  }

  fn require_id(&self) -> Result<i64> {
    self.id
        .ok_or_else(|| SoftDeleteError::NotFound(format!("registro de {} sin persistir", self.table)))
  }
}

impl Record for StubRecord {
  fn attribute(&self, name: &str) -> Option<AttributeValue> {
    self.attributes.get(name).cloned()
  }

  fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
    if name == "id" {
      return Err(SoftDeleteError::InvalidValue("id no es asignable".into()));
    }
    self.attributes.insert(name.to_string(), value);
    Ok(())
  }

  fn update_attributes(&mut self, names: &[&str]) -> Result<usize> {
    self.db.update_calls.fetch_add(1, Ordering::SeqCst);
    let id = self.require_id()?;
    let mut tables = self.db.lock(&self.db.tables)?;
    let data = tables.get_mut(&self.table)
                     .ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", self.table)))?;
    let lock_column = data.optimistic_lock.clone();
    let Some(row) = data.rows.get_mut(&id) else {
      return Ok(0);
    };
    if let Some(column) = &lock_column {
      let expected = self.attributes.get(column).cloned().unwrap_or_default();
      let current = row.get(column).cloned().unwrap_or_default();
      if !expected.sql_eq(&current) {
        return Err(SoftDeleteError::StaleObject(format!("{} #{}: versión {} != {}", self.table, id, expected, current)));
      }
      let next = AttributeValue::Int(current.as_i64().unwrap_or(0) + 1);
      row.insert(column.clone(), next.clone());
      self.attributes.insert(column.clone(), next);
    }
    for name in names {
      let value = self.attributes.get(*name).cloned().unwrap_or_default();
      row.insert(name.to_string(), value);
    }
    Ok(1)
  }

  fn delete_row(&mut self) -> Result<usize> {
    let id = self.require_id()?;
    let foreign_keys = self.db.lock(&self.db.foreign_keys)?.clone();
    let mut tables = self.db.lock(&self.db.tables)?;
    for fk in foreign_keys.iter().filter(|fk| fk.references == self.table) {
      let referenced = tables.get(&fk.table)
                             .map(|child| {
                               child.rows
                                    .values()
                                    .any(|row| row.get(&fk.column).is_some_and(|v| v.sql_eq(&AttributeValue::Int(id))))
                             })
                             .unwrap_or(false);
      if referenced {
        return Err(SoftDeleteError::Integrity(format!("FOREIGN KEY constraint failed: {}.{} -> {} #{}",
                                                      fk.table, fk.column, self.table, id)));
      }
    }
    let data = tables.get_mut(&self.table)
                     .ok_or_else(|| SoftDeleteError::NotFound(format!("tabla {}", self.table)))?;
    if let (Some(column), Some(row)) = (&data.optimistic_lock, data.rows.get(&id)) {
      let expected = self.attributes.get(column).cloned().unwrap_or_default();
      if !expected.sql_eq(&row.get(column).cloned().unwrap_or_default()) {
        return Err(SoftDeleteError::StaleObject(format!("{} #{}: versión desactualizada", self.table, id)));
      }
    }
    Ok(usize::from(data.rows.shift_remove(&id).is_some()))
  }

  fn events(&self) -> &ModelEvents<Self> {
    &self.events
  }

  fn events_mut(&mut self) -> &mut ModelEvents<Self> {
    &mut self.events
  }

  fn soft_delete_hooks(&mut self) -> Option<&mut dyn SoftDeleteHooks> {
    if self.hooks.is_some() {
      Some(self)
    } else {
      None
    }
  }

  fn before_delete(&mut self) -> Result<bool> {
    if let Some(kind) = self.fail_on_delete {
      return Err(SoftDeleteError::of_kind(kind, "Emulation"));
    }
    self.trigger_cancelable(ModelEventKind::BeforeDelete)
  }
}

impl SoftDeleteHooks for StubRecord {
  fn before_soft_delete(&mut self) -> Result<bool> {
    Ok(match self.hooks.as_mut() {
      Some(h) => {
        h.calls.push("before_soft_delete");
        !h.reject_soft_delete
      }
      None => true,
    })
  }

  fn after_soft_delete(&mut self) -> Result<()> {
    if let Some(h) = self.hooks.as_mut() {
      h.calls.push("after_soft_delete");
    }
    Ok(())
  }

  fn before_restore(&mut self) -> Result<bool> {
    Ok(match self.hooks.as_mut() {
      Some(h) => {
        h.calls.push("before_restore");
        !h.reject_restore
      }
      None => true,
    })
  }

  fn after_restore(&mut self) -> Result<()> {
    if let Some(h) = self.hooks.as_mut() {
      h.calls.push("after_restore");
    }
    Ok(())
  }
}

impl SoftDeletable for StubRecord {
  fn deletion(&self) -> &Arc<DeletionMutator<Self>> {
    &self.deletion
  }

  fn deletion_mut(&mut self) -> &mut Arc<DeletionMutator<Self>> {
    &mut self.deletion
  }
}

/// Query en memoria sobre una tabla, con joins declarativos.
///
/// Los joins sólo aportan alias (para calificar columnas); la evaluación
/// de `all`/`count` se hace sobre la tabla principal.
pub struct StubQuery {
  db: Arc<InMemoryDatabase>,
  table: String,
  alias: String,
  joins: Vec<(String, String)>,
  relation: bool,
  where_conditions: Vec<Condition>,
  on_conditions: Vec<Condition>,
  filter: DeletionQueryFilter<StubRecord>,
}

impl StubQuery {
  fn new(db: Arc<InMemoryDatabase>, table: &str) -> Self {
    Self { db,
           table: table.to_string(),
           alias: table.to_string(),
           joins: Vec::new(),
           relation: false,
           where_conditions: Vec::new(),
           on_conditions: Vec::new(),
           filter: DeletionQueryFilter::new() }
  }

  pub fn alias(mut self, alias: &str) -> Self {
    self.alias = alias.to_string();
    self
  }

  /// Declara un join con `table` bajo `alias`.
  pub fn join(mut self, table: &str, alias: &str) -> Self {
    self.joins.push((alias.to_string(), table.to_string()));
    self
  }

  /// Marca la query como query de relación: admite condiciones ON.
  pub fn relation(mut self) -> Self {
    self.relation = true;
    self
  }

  pub fn where_conditions(&self) -> &[Condition] {
    &self.where_conditions
  }

  pub fn on_conditions(&self) -> &[Condition] {
    &self.on_conditions
  }

  pub fn filter_mut(&mut self) -> &mut DeletionQueryFilter<StubRecord> {
    &mut self.filter
  }

  pub fn all(&self) -> Result<Vec<StubRecord>> {
    let behavior = self.db.behavior(&self.table)?;
    let mut out = Vec::new();
    for row in self.db.rows(&self.table)? {
      if self.matches(&row)? {
        let id = row.get("id").and_then(AttributeValue::as_i64);
        out.push(StubRecord::load(Arc::clone(&self.db), &self.table, id, row, Arc::clone(&behavior)));
      }
    }
    Ok(out)
  }

  pub fn one(&self) -> Result<Option<StubRecord>> {
    Ok(self.all()?.into_iter().next())
  }

  pub fn count(&self) -> Result<usize> {
    Ok(self.all()?.len())
  }

  fn matches(&self, row: &Row) -> Result<bool> {
    for condition in self.where_conditions.iter().chain(self.on_conditions.iter()) {
      for (column, expected) in condition.iter() {
        let column = self.resolve_column(column)?;
        let actual = row.get(column).cloned().unwrap_or_default();
        if !actual.sql_eq(expected) {
          return Ok(false);
        }
      }
    }
    Ok(true)
  }

  fn resolve_column<'c>(&self, column: &'c str) -> Result<&'c str> {
    match column.split_once('.') {
      None => Ok(column),
      Some((alias, name)) if alias == self.alias => Ok(name),
      Some((alias, _)) => Err(SoftDeleteError::InvalidValue(format!("alias {} no evaluable en memoria", alias))),
    }
  }
}

impl Query for StubQuery {
  type Model = StubRecord;

  fn model_instance(&self) -> Result<StubRecord> {
    self.db.instance(&self.table)
  }

  fn and_where(&mut self, condition: Condition) {
    self.where_conditions.push(condition);
  }

  fn supports_on_condition(&self) -> bool {
    self.relation
  }

  fn and_on_condition(&mut self, condition: Condition) {
    self.on_conditions.push(condition);
  }

  fn source_tables(&self) -> IndexMap<String, String> {
    let mut tables = IndexMap::new();
    tables.insert(self.alias.clone(), self.table.clone());
    for (alias, table) in &self.joins {
      tables.insert(alias.clone(), table.clone());
    }
    tables
  }
}

impl SoftDeleteQuery for StubQuery {
  fn deletion_filter(&self) -> &DeletionQueryFilter<StubRecord> {
    &self.filter
  }
}
