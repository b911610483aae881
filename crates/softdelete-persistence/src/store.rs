use crate::record::{Row, SqlRecord};
use crate::schema;
use crate::select::SqlSelect;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Bool, Nullable, Text};
use diesel::sqlite::Sqlite;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{debug, info};
use softdelete::{AttributeSetting, AttributeValue, ComputedSetting, DeletionMutator, DeletionSettings, Result,
                 SoftDeleteError};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

diesel::define_sql_function!(fn last_insert_rowid() -> BigInt);

/// Tablas del catálogo que admiten borrado lógico.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
  Categories,
  Items,
}

impl Table {
  pub fn name(self) -> &'static str {
    match self {
      Table::Categories => "categories",
      Table::Items => "items",
    }
  }

  /// Columnas de la tabla, `id` primero.
  pub fn columns(self) -> &'static [&'static str] {
    match self {
      Table::Categories => &["id", "name", "is_deleted"],
      Table::Items => &["id", "category_id", "name", "is_deleted", "deleted_at", "version"],
    }
  }

  pub fn has_column(self, column: &str) -> bool {
    self.columns().contains(&column)
  }

  /// Columna de bloqueo optimista, si la tabla la tiene.
  pub fn optimistic_lock(self) -> Option<&'static str> {
    match self {
      Table::Categories => None,
      Table::Items => Some("version"),
    }
  }

  /// Valores de un registro nuevo (sin `id`).
  pub(crate) fn defaults(self) -> Row {
    let mut row = Row::new();
    match self {
      Table::Categories => {
        row.insert("name".into(), AttributeValue::Text(String::new()));
        row.insert("is_deleted".into(), AttributeValue::Bool(false));
      }
      Table::Items => {
        row.insert("category_id".into(), AttributeValue::Null);
        row.insert("name".into(), AttributeValue::Text(String::new()));
        row.insert("is_deleted".into(), AttributeValue::Bool(false));
        row.insert("deleted_at".into(), AttributeValue::Null);
        row.insert("version".into(), AttributeValue::Int(0));
      }
    }
    row
  }

  /// Comportamiento por defecto: `is_deleted = true`, y en `items` además
  /// `deleted_at` con el timestamp del borrado.
  fn default_behavior(self) -> Result<DeletionMutator<SqlRecord>> {
    match self {
      Table::Categories => DeletionMutator::from_settings(DeletionSettings::default()),
      Table::Items => {
        let mut settings = DeletionSettings::default();
        settings.soft_delete_attribute_values
                .insert("deleted_at".into(), AttributeSetting::Computed { computed: ComputedSetting::Timestamp });
        DeletionMutator::from_settings(settings)
      }
    }
  }
}

impl fmt::Display for Table {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for Table {
  type Err = SoftDeleteError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "categories" => Ok(Table::Categories),
      "items" => Ok(Table::Items),
      other => Err(SoftDeleteError::NotFound(format!("tabla {}", other))),
    }
  }
}

// Filas tipadas que devuelve `sql_query`.
#[derive(Debug, QueryableByName)]
#[diesel(table_name = schema::categories)]
struct CategoryRow {
  id: i64,
  name: String,
  is_deleted: bool,
}

#[derive(Debug, QueryableByName)]
#[diesel(table_name = schema::items)]
struct ItemRow {
  id: i64,
  category_id: Option<i64>,
  name: String,
  is_deleted: bool,
  deleted_at: Option<i64>,
  version: i64,
}

#[derive(Debug, QueryableByName)]
struct CountRow {
  #[diesel(sql_type = BigInt)]
  count: i64,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = schema::categories)]
struct NewCategory<'a> {
  name: &'a str,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = schema::items)]
struct NewItem<'a> {
  category_id: Option<i64>,
  name: &'a str,
}

impl From<CategoryRow> for Row {
  fn from(r: CategoryRow) -> Self {
    let mut row = Row::new();
    row.insert("id".into(), AttributeValue::Int(r.id));
    row.insert("name".into(), AttributeValue::Text(r.name));
    row.insert("is_deleted".into(), AttributeValue::Bool(r.is_deleted));
    row
  }
}

impl From<ItemRow> for Row {
  fn from(r: ItemRow) -> Self {
    let mut row = Row::new();
    row.insert("id".into(), AttributeValue::Int(r.id));
    row.insert("category_id".into(), r.category_id.into());
    row.insert("name".into(), AttributeValue::Text(r.name));
    row.insert("is_deleted".into(), AttributeValue::Bool(r.is_deleted));
    row.insert("deleted_at".into(), r.deleted_at.into());
    row.insert("version".into(), AttributeValue::Int(r.version));
    row
  }
}

/// Activa las claves foráneas (SQLite las trae desactivadas) en cada
/// conexión que entrega el pool.
#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
    diesel::sql_query("PRAGMA foreign_keys = ON;").execute(conn).map_err(diesel::r2d2::Error::QueryError)?;
    let _ = diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(conn);
    Ok(())
  }
}

pub(crate) type BoxedQuery<'f> = BoxedSqlQuery<'f, Sqlite, SqlQuery>;

/// Añade `value` como parámetro tipado de la query.
pub(crate) fn bind_value<'f>(query: BoxedQuery<'f>, value: &AttributeValue) -> BoxedQuery<'f> {
  match value {
    AttributeValue::Null => query.bind::<Nullable<BigInt>, _>(None::<i64>),
    AttributeValue::Bool(b) => query.bind::<Bool, _>(*b),
    AttributeValue::Int(i) => query.bind::<BigInt, _>(*i),
    AttributeValue::Text(s) => query.bind::<Text, _>(s.clone()),
  }
}

/// `sql` con sus parámetros ya enlazados.
pub(crate) fn prepare(sql: String, binds: &[AttributeValue]) -> BoxedQuery<'static> {
  debug!("sql: {} -- {:?}", sql, binds);
  binds.iter().fold(diesel::sql_query(sql).into_boxed::<Sqlite>(), bind_value)
}

/// Traduce errores de Diesel: violaciones de restricciones a `Integrity`,
/// el resto a `Storage`.
pub(crate) fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T> {
  res.map_err(|e| match &e {
       DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)
       | DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
       | DieselError::DatabaseError(DatabaseErrorKind::NotNullViolation, _)
       | DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, _) => SoftDeleteError::Integrity(format!("db: {}", e)),
       DieselError::DatabaseError(_, info) if info.message().contains("FOREIGN KEY constraint failed") => {
         SoftDeleteError::Integrity(format!("db: {}", e))
       }
       _ => SoftDeleteError::Storage(format!("db: {}", e)),
     })
}

/// Almacén SQLite del catálogo con un comportamiento de borrado lógico por
/// tabla.
#[derive(Clone)]
pub struct DieselStore {
  pool: Arc<DbPool>,
  behaviors: Arc<Mutex<HashMap<Table, Arc<DeletionMutator<SqlRecord>>>>>,
}

impl DieselStore {
  /// Abre el pool, aplica migraciones pendientes e instala los
  /// comportamientos por defecto.
  pub fn new(database_url: &str) -> Result<Self> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder().max_size(4)
                              .connection_customizer(Box::new(SqlitePragmas))
                              .build(manager)
                              .map_err(|e| SoftDeleteError::Storage(format!("pool: {}", e)))?;
    let mut behaviors = HashMap::new();
    for table in [Table::Categories, Table::Items] {
      behaviors.insert(table, Arc::new(table.default_behavior()?));
    }
    let store = DieselStore { pool: Arc::new(pool), behaviors: Arc::new(Mutex::new(behaviors)) };
    let mut c = store.conn()?;
    let _ = diesel::sql_query("PRAGMA journal_mode = WAL;").execute(&mut c);
    let applied = c.run_pending_migrations(MIGRATIONS)
                   .map_err(|e| SoftDeleteError::Storage(format!("migrations: {}", e)))?;
    info!("{} migraciones aplicadas en {}", applied.len(), database_url);
    Ok(store)
  }

  fn conn_raw(&self) -> std::result::Result<DbConn, r2d2::Error> {
    self.pool.get()
  }

  pub(crate) fn conn(&self) -> Result<DbConn> {
    self.conn_raw().map_err(|e| SoftDeleteError::Storage(format!("pool: {}", e)))
  }

  fn lock(&self) -> Result<MutexGuard<'_, HashMap<Table, Arc<DeletionMutator<SqlRecord>>>>> {
    self.behaviors.lock().map_err(|e| SoftDeleteError::Storage(format!("mutex poisoned: {:?}", e)))
  }

  /// Reemplaza el comportamiento de `table` para los registros que se
  /// carguen a partir de ahora.
  pub fn set_behavior(&self, table: Table, behavior: DeletionMutator<SqlRecord>) -> Result<()> {
    self.lock()?.insert(table, Arc::new(behavior));
    Ok(())
  }

  pub fn behavior(&self, table: Table) -> Result<Arc<DeletionMutator<SqlRecord>>> {
    self.lock()?
        .get(&table)
        .cloned()
        .ok_or_else(|| SoftDeleteError::Configuration(format!("sin comportamiento para {}", table)))
  }

  pub fn insert_category(&self, name: &str) -> Result<SqlRecord> {
    let mut conn = self.conn()?;
    map_db_err(diesel::insert_into(schema::categories::table).values(&NewCategory { name }).execute(&mut conn))?;
    let id = map_db_err(diesel::select(last_insert_rowid()).get_result::<i64>(&mut conn))?;
    drop(conn);
    self.find_one(Table::Categories, id)?
        .ok_or_else(|| SoftDeleteError::NotFound(format!("categories #{}", id)))
  }

  pub fn insert_item(&self, category_id: Option<i64>, name: &str) -> Result<SqlRecord> {
    let mut conn = self.conn()?;
    map_db_err(diesel::insert_into(schema::items::table).values(&NewItem { category_id, name }).execute(&mut conn))?;
    let id = map_db_err(diesel::select(last_insert_rowid()).get_result::<i64>(&mut conn))?;
    drop(conn);
    self.find_one(Table::Items, id)?.ok_or_else(|| SoftDeleteError::NotFound(format!("items #{}", id)))
  }

  /// Carga la fila `id` de `table`, sin filtrar por borrado lógico.
  pub fn find_one(&self, table: Table, id: i64) -> Result<Option<SqlRecord>> {
    let sql = format!("SELECT * FROM \"{}\" WHERE \"id\" = ?", table.name());
    let rows = self.load_rows(table, prepare(sql, &[AttributeValue::Int(id)]))?;
    let behavior = self.behavior(table)?;
    Ok(rows.into_iter().next().map(|row| SqlRecord::load(self.clone(), table, row, behavior)))
  }

  /// Query sobre `table` con alias igual al nombre de la tabla.
  pub fn find(&self, table: Table) -> SqlSelect {
    SqlSelect::new(self.clone(), table)
  }

  /// Registro prototipo (sin persistir) de `table`.
  pub fn instance(&self, table: Table) -> Result<SqlRecord> {
    Ok(SqlRecord::load(self.clone(), table, table.defaults(), self.behavior(table)?))
  }

  /// Número de filas físicas de `table`.
  pub fn count(&self, table: Table) -> Result<i64> {
    self.count_rows(prepare(format!("SELECT COUNT(*) AS count FROM \"{}\"", table.name()), &[]))
  }

  pub(crate) fn load_rows(&self, table: Table, query: BoxedQuery<'_>) -> Result<Vec<Row>> {
    let mut conn = self.conn()?;
    match table {
      Table::Categories => Ok(map_db_err(query.load::<CategoryRow>(&mut conn))?.into_iter().map(Row::from).collect()),
      Table::Items => Ok(map_db_err(query.load::<ItemRow>(&mut conn))?.into_iter().map(Row::from).collect()),
    }
  }

  pub(crate) fn count_rows(&self, query: BoxedQuery<'_>) -> Result<i64> {
    let mut conn = self.conn()?;
    Ok(map_db_err(query.get_result::<CountRow>(&mut conn))?.count)
  }

  pub(crate) fn execute(&self, query: BoxedQuery<'_>) -> Result<usize> {
    let mut conn = self.conn()?;
    map_db_err(query.execute(&mut conn))
  }
}

impl fmt::Debug for DieselStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DieselStore").field("pool", &self.pool.state()).finish()
  }
}

/// Crea el almacén desde las variables de entorno.
///
/// - `SOFTDELETE_DB_URL` (o `DATABASE_URL`): ruta del fichero SQLite.
/// - `SOFTDELETE_ITEM_SETTINGS`: JSON opcional con `DeletionSettings` para
///   la tabla `items`.
pub fn new_from_env() -> Result<DieselStore> {
  dotenvy::dotenv().ok();
  let url = std::env::var("SOFTDELETE_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                              .map_err(|_| {
                                                SoftDeleteError::Configuration("SOFTDELETE_DB_URL / DATABASE_URL not set"
                                                                                                                      .into())
                                              })?;
  let store = DieselStore::new(&url)?;
  if let Ok(raw) = std::env::var("SOFTDELETE_ITEM_SETTINGS") {
    let settings = DeletionSettings::from_json(&raw)?;
    store.set_behavior(Table::Items, DeletionMutator::from_settings(settings)?)?;
    info!("comportamiento de items cargado desde SOFTDELETE_ITEM_SETTINGS");
  }
  Ok(store)
}

// Helper de tests: almacén sobre un fichero SQLite explícito, sin leer el
// entorno.
pub fn new_sqlite_for_test(database_url: &str) -> Result<DieselStore> {
  DieselStore::new(database_url)
}
