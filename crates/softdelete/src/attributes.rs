// Archivo: attributes.rs
// Propósito: valores de atributos y el mapa ordenado atributo -> fuente de
// valor que comparten el mutador (qué se escribe al borrar/restaurar) y el
// filtro de queries (qué condición distingue filas borradas).
use crate::errors::{Result, SoftDeleteError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Valor escalar de un atributo de registro.
///
/// Se serializa sin etiqueta: `null`, `true`, `1`, `"texto"`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
  #[default]
  Null,
  Bool(bool),
  Int(i64),
  Text(String),
}

impl AttributeValue {
  pub fn is_null(&self) -> bool {
    matches!(self, AttributeValue::Null)
  }

  /// Veracidad al estilo SQL/escalar: `null`, `false`, `0`, `""` y `"0"`
  /// son falsos.
  pub fn is_truthy(&self) -> bool {
    match self {
      AttributeValue::Null => false,
      AttributeValue::Bool(b) => *b,
      AttributeValue::Int(i) => *i != 0,
      AttributeValue::Text(s) => !(s.is_empty() || s == "0"),
    }
  }

  /// Negación lógica: siempre devuelve un `Bool`.
  pub fn negate(&self) -> AttributeValue {
    AttributeValue::Bool(!self.is_truthy())
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      AttributeValue::Bool(b) => Some(i64::from(*b)),
      AttributeValue::Int(i) => Some(*i),
      AttributeValue::Text(s) => s.trim().parse().ok(),
      AttributeValue::Null => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      AttributeValue::Text(s) => Some(s),
      _ => None,
    }
  }

  /// Igualdad como la haría una columna SQL: `Bool` e `Int(0|1)` se
  /// comparan numéricamente. `Null` sólo es igual a `Null` (IS NULL).
  pub fn sql_eq(&self, other: &AttributeValue) -> bool {
    match (self, other) {
      (AttributeValue::Null, AttributeValue::Null) => true,
      (AttributeValue::Null, _) | (_, AttributeValue::Null) => false,
      (AttributeValue::Text(a), AttributeValue::Text(b)) => a == b,
      (AttributeValue::Text(_), _) | (_, AttributeValue::Text(_)) => false,
      (a, b) => a.as_i64() == b.as_i64(),
    }
  }
}

impl fmt::Display for AttributeValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AttributeValue::Null => write!(f, "NULL"),
      AttributeValue::Bool(b) => write!(f, "{}", b),
      AttributeValue::Int(i) => write!(f, "{}", i),
      AttributeValue::Text(s) => write!(f, "{:?}", s),
    }
  }
}

impl From<bool> for AttributeValue {
  fn from(v: bool) -> Self {
    AttributeValue::Bool(v)
  }
}

impl From<i64> for AttributeValue {
  fn from(v: i64) -> Self {
    AttributeValue::Int(v)
  }
}

impl From<i32> for AttributeValue {
  fn from(v: i32) -> Self {
    AttributeValue::Int(i64::from(v))
  }
}

impl From<&str> for AttributeValue {
  fn from(v: &str) -> Self {
    AttributeValue::Text(v.to_string())
  }
}

impl From<String> for AttributeValue {
  fn from(v: String) -> Self {
    AttributeValue::Text(v)
  }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
  fn from(v: Option<T>) -> Self {
    v.map(Into::into).unwrap_or(AttributeValue::Null)
  }
}

impl TryFrom<serde_json::Value> for AttributeValue {
  type Error = SoftDeleteError;

  fn try_from(v: serde_json::Value) -> Result<Self> {
    match v {
      serde_json::Value::Null => Ok(AttributeValue::Null),
      serde_json::Value::Bool(b) => Ok(AttributeValue::Bool(b)),
      serde_json::Value::Number(n) => n.as_i64()
                                       .map(AttributeValue::Int)
                                       .ok_or_else(|| SoftDeleteError::InvalidValue(format!("número no entero: {}", n))),
      serde_json::Value::String(s) => Ok(AttributeValue::Text(s)),
      other => Err(SoftDeleteError::InvalidValue(format!("valor no escalar: {}", other))),
    }
  }
}

/// Función que calcula un valor a partir del registro (p. ej. "ahora").
pub type ComputedValue<R> = Arc<dyn Fn(&R) -> AttributeValue + Send + Sync>;

/// Fuente del valor de un atributo: literal o calculado en el momento de
/// la mutación.
pub enum AttributeSource<R> {
  Literal(AttributeValue),
  Computed(ComputedValue<R>),
}

impl<R> AttributeSource<R> {
  pub fn computed<F>(f: F) -> Self
    where F: Fn(&R) -> AttributeValue + Send + Sync + 'static
  {
    AttributeSource::Computed(Arc::new(f))
  }

  pub fn is_computed(&self) -> bool {
    matches!(self, AttributeSource::Computed(_))
  }

  /// Resuelve el valor contra `record`.
  pub fn resolve(&self, record: &R) -> AttributeValue {
    match self {
      AttributeSource::Literal(v) => v.clone(),
      AttributeSource::Computed(f) => f(record),
    }
  }
}

impl<R> Clone for AttributeSource<R> {
  fn clone(&self) -> Self {
    match self {
      AttributeSource::Literal(v) => AttributeSource::Literal(v.clone()),
      AttributeSource::Computed(f) => AttributeSource::Computed(Arc::clone(f)),
    }
  }
}

impl<R> fmt::Debug for AttributeSource<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AttributeSource::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
      AttributeSource::Computed(_) => f.write_str("Computed(..)"),
    }
  }
}

macro_rules! literal_source_from {
  ($($t:ty),*) => {
    $(impl<R> From<$t> for AttributeSource<R> {
      fn from(v: $t) -> Self {
        AttributeSource::Literal(v.into())
      }
    })*
  };
}

literal_source_from!(AttributeValue, bool, i64, i32, &str, String);

/// Mapa ordenado atributo -> fuente de valor.
///
/// Es el único punto de acoplamiento entre el mutador y el filtro: las
/// condiciones "borrado"/"no borrado" se derivan de este mismo mapa.
pub struct AttributeMap<R> {
  entries: IndexMap<String, AttributeSource<R>>,
}

impl<R> AttributeMap<R> {
  pub fn new() -> Self {
    Self { entries: IndexMap::new() }
  }

  /// Añade (o reemplaza) una entrada. Estilo builder.
  pub fn with(mut self, attribute: impl Into<String>, source: impl Into<AttributeSource<R>>) -> Self {
    self.insert(attribute, source);
    self
  }

  /// Añade una entrada calculada.
  pub fn with_computed<F>(mut self, attribute: impl Into<String>, f: F) -> Self
    where F: Fn(&R) -> AttributeValue + Send + Sync + 'static
  {
    self.insert(attribute, AttributeSource::computed(f));
    self
  }

  pub fn insert(&mut self, attribute: impl Into<String>, source: impl Into<AttributeSource<R>>) {
    self.entries.insert(attribute.into(), source.into());
  }

  pub fn get(&self, attribute: &str) -> Option<&AttributeSource<R>> {
    self.entries.get(attribute)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeSource<R>)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn names(&self) -> Vec<&str> {
    self.entries.keys().map(String::as_str).collect()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Resuelve todas las entradas contra `record`, en orden.
  pub fn resolve(&self, record: &R) -> Vec<(String, AttributeValue)> {
    self.entries.iter().map(|(k, s)| (k.clone(), s.resolve(record))).collect()
  }

  /// Mapa de restauración por defecto: invierte los literales booleanos
  /// (`true`/`false`, `1`/`0`) y deja a `Null` el resto, incluidas las
  /// entradas calculadas (un "momento del borrado" no tiene inverso).
  pub fn inverted(&self) -> AttributeMap<R> {
    let entries = self.entries
                      .iter()
                      .map(|(k, s)| {
                        let v = match s {
                          AttributeSource::Literal(AttributeValue::Bool(b)) => AttributeValue::Bool(!b),
                          AttributeSource::Literal(AttributeValue::Int(i)) if *i == 0 || *i == 1 => {
                            AttributeValue::Int(1 - i)
                          }
                          _ => AttributeValue::Null,
                        };
                        (k.clone(), AttributeSource::Literal(v))
                      })
                      .collect();
    AttributeMap { entries }
  }
}

impl<R> Default for AttributeMap<R> {
  fn default() -> Self {
    Self::new()
  }
}

impl<R> Clone for AttributeMap<R> {
  fn clone(&self) -> Self {
    Self { entries: self.entries.clone() }
  }
}

impl<R> fmt::Debug for AttributeMap<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_map().entries(self.entries.iter()).finish()
  }
}

impl<R, K, V> FromIterator<(K, V)> for AttributeMap<R>
  where K: Into<String>,
        V: Into<AttributeSource<R>>
{
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut map = AttributeMap::new();
    for (k, v) in iter {
      map.insert(k, v);
    }
    map
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truthiness_follows_scalar_rules() {
    assert!(!AttributeValue::Null.is_truthy());
    assert!(!AttributeValue::Text("0".into()).is_truthy());
    assert!(!AttributeValue::Text(String::new()).is_truthy());
    assert!(AttributeValue::Text("all".into()).is_truthy());
    assert!(AttributeValue::Int(2).is_truthy());
    assert_eq!(AttributeValue::Int(2).negate(), AttributeValue::Bool(false));
  }

  #[test]
  fn sql_eq_mixes_bool_and_int() {
    assert!(AttributeValue::Bool(true).sql_eq(&AttributeValue::Int(1)));
    assert!(!AttributeValue::Bool(false).sql_eq(&AttributeValue::Null));
    assert!(AttributeValue::Null.sql_eq(&AttributeValue::Null));
  }

  #[test]
  fn inverted_map_nulls_computed_and_status_values() {
    let map: AttributeMap<()> = AttributeMap::new().with("is_deleted", true)
                                                   .with("status", 3)
                                                   .with("flag", 1)
                                                   .with_computed("deleted_at", |_| AttributeValue::Int(10));
    let inv = map.inverted().resolve(&());
    assert_eq!(inv,
               vec![("is_deleted".to_string(), AttributeValue::Bool(false)),
                    ("status".to_string(), AttributeValue::Null),
                    ("flag".to_string(), AttributeValue::Int(0)),
                    ("deleted_at".to_string(), AttributeValue::Null)]);
  }

  #[test]
  fn json_values_convert_to_attributes() {
    let v = AttributeValue::try_from(serde_json::json!(true)).unwrap();
    assert_eq!(v, AttributeValue::Bool(true));
    assert!(AttributeValue::try_from(serde_json::json!([1])).is_err());
  }
}
