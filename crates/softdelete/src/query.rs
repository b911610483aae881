// Archivo: query.rs
// Propósito: definir `Condition` (condición hash atributo = valor, en
// conjunción) y el trait `Query`, contrato mínimo que debe cumplir el
// constructor de queries del host para que el filtro de borrado lógico
// pueda inyectar condiciones.
use crate::attributes::AttributeValue;
use crate::errors::Result;
use crate::mutator::SoftDeletable;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Condición en forma de mapa ordenado `columna -> valor esperado`.
///
/// Todas las entradas se combinan con AND. Un valor `Null` significa
/// `columna IS NULL`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Condition(IndexMap<String, AttributeValue>);

impl Condition {
  pub fn new() -> Self {
    Self(IndexMap::new())
  }

  pub fn with(mut self, column: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
    self.insert(column, value);
    self
  }

  pub fn insert(&mut self, column: impl Into<String>, value: impl Into<AttributeValue>) {
    self.0.insert(column.into(), value.into());
  }

  pub fn get(&self, column: &str) -> Option<&AttributeValue> {
    self.0.get(column)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn columns(&self) -> Vec<&str> {
    self.0.keys().map(String::as_str).collect()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Prefija con `alias.` cada columna que no esté ya calificada y que no
  /// sea puramente numérica (posicional).
  pub fn qualified(&self, alias: &str) -> Condition {
    let entries = self.0
                      .iter()
                      .map(|(column, value)| {
                        if is_qualified(column) || is_positional(column) {
                          (column.clone(), value.clone())
                        } else {
                          (format!("{}.{}", alias, column), value.clone())
                        }
                      })
                      .collect();
    Condition(entries)
  }
}

fn is_qualified(column: &str) -> bool {
  column.contains('.')
}

fn is_positional(column: &str) -> bool {
  !column.is_empty() && column.chars().all(|c| c.is_ascii_digit())
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for Condition {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Condition(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

/// Contrato mínimo del constructor de queries del host.
///
/// El filtro de borrado lógico sólo añade condiciones; nunca reemplaza las
/// existentes.
pub trait Query {
  /// Tipo de registro al que apunta la query.
  type Model: SoftDeletable;

  /// Instancia prototipo del modelo, de la que se leen los mapas de
  /// atributos de borrado.
  fn model_instance(&self) -> Result<Self::Model>;

  /// Añade `condition` con AND a la cláusula WHERE.
  fn and_where(&mut self, condition: Condition);

  /// `true` si la query admite condiciones de relación (ON de un join).
  fn supports_on_condition(&self) -> bool {
    false
  }

  /// Añade `condition` a la condición ON de la relación. Por defecto cae a
  /// `and_where`.
  fn and_on_condition(&mut self, condition: Condition) {
    self.and_where(condition)
  }

  /// Tablas de origen `alias -> tabla`, la principal primero.
  fn source_tables(&self) -> IndexMap<String, String> {
    IndexMap::new()
  }

  /// `true` si la query combina varias tablas y las columnas deben
  /// calificarse con el alias principal.
  fn is_join_query(&self) -> bool {
    self.source_tables().len() > 1
  }

  /// Alias de la tabla principal.
  fn primary_alias(&self) -> Option<String> {
    self.source_tables().keys().next().cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn qualified_skips_dotted_and_positional_columns() {
    let c = Condition::new().with("is_deleted", true).with("x.status", 2).with("0", "raw");
    let q = c.qualified("t");
    assert_eq!(q.columns(), vec!["t.is_deleted", "x.status", "0"]);
    assert_eq!(q.get("t.is_deleted"), Some(&AttributeValue::Bool(true)));
  }
}
