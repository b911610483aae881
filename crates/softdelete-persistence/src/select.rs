use crate::record::SqlRecord;
use crate::store::{prepare, DieselStore, Table};
use indexmap::IndexMap;
use softdelete::{AttributeValue, Condition, DeletionQueryFilter, Query, Result, SoftDeleteError, SoftDeleteQuery};

#[derive(Debug, Clone)]
struct Join {
  table: Table,
  alias: String,
  on: String,
}

/// `SELECT` sobre una tabla del catálogo con inner joins opcionales.
///
/// Las condiciones se renderizan con identificadores entre comillas y
/// parámetros enlazados; `Null` se traduce a `IS NULL`.
#[derive(Debug, Clone)]
pub struct SqlSelect {
  store: DieselStore,
  table: Table,
  alias: String,
  joins: Vec<Join>,
  conditions: Vec<Condition>,
  filter: DeletionQueryFilter<SqlRecord>,
}

impl SqlSelect {
  pub(crate) fn new(store: DieselStore, table: Table) -> Self {
    Self { store,
           table,
           alias: table.name().to_string(),
           joins: Vec::new(),
           conditions: Vec::new(),
           filter: DeletionQueryFilter::new() }
  }

  pub fn alias(mut self, alias: &str) -> Self {
    self.alias = alias.to_string();
    self
  }

  /// `INNER JOIN table AS alias ON <on>`. `on` se inserta tal cual.
  pub fn inner_join(mut self, table: Table, alias: &str, on: &str) -> Self {
    self.joins.push(Join { table, alias: alias.to_string(), on: on.to_string() });
    self
  }

  /// Añade una condición con AND.
  pub fn and_where_condition(mut self, condition: Condition) -> Self {
    self.conditions.push(condition);
    self
  }

  pub fn conditions(&self) -> &[Condition] {
    &self.conditions
  }

  pub fn filter_mut(&mut self) -> &mut DeletionQueryFilter<SqlRecord> {
    &mut self.filter
  }

  /// SQL de la query (sin parámetros).
  pub fn sql(&self) -> Result<String> {
    Ok(self.render("\"{alias}\".*")?.0)
  }

  pub fn all(&self) -> Result<Vec<SqlRecord>> {
    let (sql, binds) = self.render("\"{alias}\".*")?;
    let rows = self.store.load_rows(self.table, prepare(sql, &binds))?;
    let behavior = self.store.behavior(self.table)?;
    Ok(rows.into_iter()
           .map(|row| SqlRecord::load(self.store.clone(), self.table, row, behavior.clone()))
           .collect())
  }

  pub fn one(&self) -> Result<Option<SqlRecord>> {
    Ok(self.all()?.into_iter().next())
  }

  pub fn count(&self) -> Result<i64> {
    let (sql, binds) = self.render("COUNT(*) AS count")?;
    self.store.count_rows(prepare(sql, &binds))
  }

  fn render(&self, projection: &str) -> Result<(String, Vec<AttributeValue>)> {
    let mut sql = format!("SELECT {} FROM \"{}\" AS \"{}\"",
                          projection.replace("{alias}", &self.alias),
                          self.table,
                          self.alias);
    for join in &self.joins {
      sql.push_str(&format!(" INNER JOIN \"{}\" AS \"{}\" ON {}", join.table, join.alias, join.on));
    }
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    for condition in &self.conditions {
      for (column, value) in condition.iter() {
        let column = self.quote_column(column)?;
        if value.is_null() {
          clauses.push(format!("{} IS NULL", column));
        } else {
          clauses.push(format!("{} = ?", column));
          binds.push(value.clone());
        }
      }
    }
    if !clauses.is_empty() {
      sql.push_str(" WHERE ");
      sql.push_str(&clauses.join(" AND "));
    }
    Ok((sql, binds))
  }

  /// Valida la columna contra las tablas de origen y la entrecomilla.
  fn quote_column(&self, column: &str) -> Result<String> {
    let (alias, name) = match column.split_once('.') {
      Some((alias, name)) => (Some(alias), name),
      None => (None, column),
    };
    let table = match alias {
      None => self.table,
      Some(a) if a == self.alias => self.table,
      Some(a) => self.joins
                     .iter()
                     .find(|j| j.alias == a)
                     .map(|j| j.table)
                     .ok_or_else(|| SoftDeleteError::InvalidValue(format!("alias desconocido: {}", a)))?,
    };
    if !table.has_column(name) {
      return Err(SoftDeleteError::InvalidValue(format!("columna desconocida: {}", column)));
    }
    Ok(match alias {
      Some(a) => format!("\"{}\".\"{}\"", a, name),
      None => format!("\"{}\"", name),
    })
  }
}

impl Query for SqlSelect {
  type Model = SqlRecord;

  fn model_instance(&self) -> Result<SqlRecord> {
    self.store.instance(self.table)
  }

  fn and_where(&mut self, condition: Condition) {
    self.conditions.push(condition);
  }

  fn source_tables(&self) -> IndexMap<String, String> {
    let mut tables = IndexMap::new();
    tables.insert(self.alias.clone(), self.table.name().to_string());
    for join in &self.joins {
      tables.insert(join.alias.clone(), join.table.name().to_string());
    }
    tables
  }
}

impl SoftDeleteQuery for SqlSelect {
  fn deletion_filter(&self) -> &DeletionQueryFilter<SqlRecord> {
    &self.filter
  }
}
