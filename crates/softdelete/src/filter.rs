// Archivo: filter.rs
// Propósito: implementar `DeletionQueryFilter`, el comportamiento adjunto a
// una query que añade las condiciones "borrado" / "no borrado" derivadas
// del mismo mapa de atributos que usa el mutador, y el filtro tri-estado
// `filter_deleted`.
use crate::attributes::{AttributeSource, AttributeValue};
use crate::errors::Result;
use crate::mutator::SoftDeletable;
use crate::query::{Condition, Query};
use log::debug;
use once_cell::unsync::OnceCell;
use std::fmt;
use std::marker::PhantomData;

/// Valor de entrada de `filter_deleted`, tal como llega de un parámetro
/// de petición o de configuración.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Text(String),
  List(Vec<FilterValue>),
}

/// Decisión de `filter_deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
  /// Sólo filas no borradas.
  NotDeleted,
  /// Sólo filas borradas.
  Deleted,
  /// Sin filtro: borradas y no borradas.
  All,
}

/// Token que explícitamente significa "todas las filas".
pub const ALL_TOKEN: &str = "all";

impl FilterValue {
  /// Vacío: `null`, `""` o lista vacía.
  pub fn is_empty(&self) -> bool {
    match self {
      FilterValue::Null => true,
      FilterValue::Text(s) => s.is_empty(),
      FilterValue::List(items) => items.is_empty(),
      _ => false,
    }
  }

  /// Conversión a entero: los textos se leen por su prefijo numérico
  /// (`"12abc"` -> 12, `"0.5e1"` -> 5, `"all"` -> 0), los flotantes se
  /// truncan saturando en los límites de `i64` (infinito y NaN valen 0) y
  /// una lista no vacía vale 1.
  pub fn as_int(&self) -> i64 {
    match self {
      FilterValue::Null => 0,
      FilterValue::Bool(b) => i64::from(*b),
      FilterValue::Int(i) => *i,
      FilterValue::Float(f) => float_to_int(*f),
      FilterValue::Text(s) if s.trim().eq_ignore_ascii_case(ALL_TOKEN) => 0,
      FilterValue::Text(s) => leading_int(s),
      FilterValue::List(items) => i64::from(!items.is_empty()),
    }
  }

  pub fn mode(&self) -> FilterMode {
    if self.is_empty() {
      FilterMode::NotDeleted
    } else if self.as_int() != 0 {
      FilterMode::Deleted
    } else {
      FilterMode::All
    }
  }
}

/// Truncado hacia cero; los valores no finitos valen 0 y `as` satura el
/// resto en `i64::MIN..=i64::MAX`.
fn float_to_int(f: f64) -> i64 {
  if f.is_finite() {
    f.trunc() as i64
  } else {
    0
  }
}

/// Prefijo numérico de `raw`: signo, dígitos, parte decimal y exponente
/// opcionales. Un entero sin decimales ni exponente satura si desborda.
fn leading_int(raw: &str) -> i64 {
  let s = raw.trim_start();
  let bytes = s.as_bytes();
  let digits_from = |mut i: usize| {
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
      i += 1;
    }
    i
  };

  let sign_len = usize::from(matches!(bytes.first(), Some(b'-' | b'+')));
  let int_end = digits_from(sign_len);
  let mut end = int_end;
  let mut is_float = false;
  if bytes.get(end) == Some(&b'.') {
    let frac_end = digits_from(end + 1);
    if frac_end > end + 1 || int_end > sign_len {
      end = frac_end;
      is_float = true;
    }
  }
  if end == sign_len {
    return 0;
  }
  if matches!(bytes.get(end), Some(b'e' | b'E')) {
    let exp_sign = usize::from(matches!(bytes.get(end + 1), Some(b'-' | b'+')));
    let exp_end = digits_from(end + 1 + exp_sign);
    if exp_end > end + 1 + exp_sign {
      end = exp_end;
      is_float = true;
    }
  }

  let prefix = &s[..end];
  if is_float {
    return prefix.parse::<f64>().map(float_to_int).unwrap_or(0);
  }
  let saturated = if sign_len == 1 && bytes[0] == b'-' { i64::MIN } else { i64::MAX };
  prefix.parse::<i64>().unwrap_or(saturated)
}

impl From<&str> for FilterValue {
  fn from(v: &str) -> Self {
    FilterValue::Text(v.to_string())
  }
}

impl From<String> for FilterValue {
  fn from(v: String) -> Self {
    FilterValue::Text(v)
  }
}

impl From<bool> for FilterValue {
  fn from(v: bool) -> Self {
    FilterValue::Bool(v)
  }
}

impl From<i64> for FilterValue {
  fn from(v: i64) -> Self {
    FilterValue::Int(v)
  }
}

impl From<i32> for FilterValue {
  fn from(v: i32) -> Self {
    FilterValue::Int(i64::from(v))
  }
}

impl From<f64> for FilterValue {
  fn from(v: f64) -> Self {
    FilterValue::Float(v)
  }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
  fn from(v: Option<T>) -> Self {
    v.map(Into::into).unwrap_or(FilterValue::Null)
  }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
  fn from(v: Vec<T>) -> Self {
    FilterValue::List(v.into_iter().map(Into::into).collect())
  }
}

impl From<AttributeValue> for FilterValue {
  fn from(v: AttributeValue) -> Self {
    match v {
      AttributeValue::Null => FilterValue::Null,
      AttributeValue::Bool(b) => FilterValue::Bool(b),
      AttributeValue::Int(i) => FilterValue::Int(i),
      AttributeValue::Text(s) => FilterValue::Text(s),
    }
  }
}

impl From<serde_json::Value> for FilterValue {
  fn from(v: serde_json::Value) -> Self {
    match v {
      serde_json::Value::Null => FilterValue::Null,
      serde_json::Value::Bool(b) => FilterValue::Bool(b),
      serde_json::Value::Number(n) => match n.as_i64() {
        Some(i) => FilterValue::Int(i),
        None => FilterValue::Float(n.as_f64().unwrap_or(0.0)),
      },
      serde_json::Value::String(s) => FilterValue::Text(s),
      serde_json::Value::Array(items) => FilterValue::List(items.into_iter().map(FilterValue::from).collect()),
      // Un objeto se trata como una colección: vacía o no.
      serde_json::Value::Object(map) => FilterValue::List(map.into_iter().map(|(_, v)| FilterValue::from(v)).collect()),
    }
  }
}

/// Condición "borrado" por defecto: cada atributo con su valor de borrado.
/// Los valores calculados se evalúan contra `model` (instancia prototipo).
pub fn default_deleted_condition<M: SoftDeletable>(model: &M) -> Condition {
  model.deletion()
       .soft_delete_attribute_values()
       .iter()
       .map(|(name, source)| (name, source.resolve(model)))
       .collect()
}

/// Condición "no borrado" por defecto: la negación de cada literal, o
/// `Null` para los valores calculados.
pub fn default_not_deleted_condition<M: SoftDeletable>(model: &M) -> Condition {
  model.deletion()
       .soft_delete_attribute_values()
       .iter()
       .map(|(name, source)| {
         let value = match source {
           AttributeSource::Computed(_) => AttributeValue::Null,
           AttributeSource::Literal(v) => v.negate(),
         };
         (name, value)
       })
       .collect()
}

/// Califica las columnas con el alias principal si la query es un join.
pub fn normalize_filter_condition<Q: Query>(query: &Q, condition: Condition) -> Condition {
  if query.is_join_query() {
    if let Some(alias) = query.primary_alias() {
      return condition.qualified(&alias);
    }
  }
  condition
}

/// Normaliza y añade la condición: como condición ON si la query la
/// admite, si no con AND en el WHERE.
pub fn add_filter_condition<Q: Query>(query: &mut Q, condition: Condition) {
  let condition = normalize_filter_condition(query, condition);
  debug!("añadiendo condición de borrado lógico: {:?}", condition);
  if query.supports_on_condition() {
    query.and_on_condition(condition);
  } else {
    query.and_where(condition);
  }
}

/// Filtro de borrado lógico para queries sobre el modelo `M`.
///
/// Las condiciones se calculan una sola vez por instancia, a partir del
/// prototipo del modelo, salvo que se fijen explícitamente.
pub struct DeletionQueryFilter<M> {
  deleted_condition: OnceCell<Condition>,
  not_deleted_condition: OnceCell<Condition>,
  _model: PhantomData<fn() -> M>,
}

impl<M: SoftDeletable> DeletionQueryFilter<M> {
  pub fn new() -> Self {
    Self { deleted_condition: OnceCell::new(),
           not_deleted_condition: OnceCell::new(),
           _model: PhantomData }
  }

  pub fn deleted_condition<Q: Query<Model = M>>(&self, query: &Q) -> Result<&Condition> {
    self.deleted_condition
        .get_or_try_init(|| query.model_instance().map(|model| default_deleted_condition(&model)))
  }

  pub fn set_deleted_condition(&mut self, condition: Condition) {
    self.deleted_condition = OnceCell::with_value(condition);
  }

  pub fn not_deleted_condition<Q: Query<Model = M>>(&self, query: &Q) -> Result<&Condition> {
    self.not_deleted_condition
        .get_or_try_init(|| query.model_instance().map(|model| default_not_deleted_condition(&model)))
  }

  pub fn set_not_deleted_condition(&mut self, condition: Condition) {
    self.not_deleted_condition = OnceCell::with_value(condition);
  }

  /// Restringe `query` a las filas borradas.
  pub fn deleted<'q, Q: Query<Model = M>>(&self, query: &'q mut Q) -> Result<&'q mut Q> {
    let condition = self.deleted_condition(query)?.clone();
    add_filter_condition(query, condition);
    Ok(query)
  }

  /// Restringe `query` a las filas no borradas.
  pub fn not_deleted<'q, Q: Query<Model = M>>(&self, query: &'q mut Q) -> Result<&'q mut Q> {
    let condition = self.not_deleted_condition(query)?.clone();
    add_filter_condition(query, condition);
    Ok(query)
  }

  /// Vacío -> `not_deleted`; entero no nulo -> `deleted`; resto (`"0"`,
  /// `false`, `"all"`...) -> la query sin modificar.
  pub fn filter_deleted<'q, Q: Query<Model = M>>(&self,
                                                  query: &'q mut Q,
                                                  value: impl Into<FilterValue>)
                                                  -> Result<&'q mut Q> {
    match value.into().mode() {
      FilterMode::NotDeleted => self.not_deleted(query),
      FilterMode::Deleted => self.deleted(query),
      FilterMode::All => Ok(query),
    }
  }
}

impl<M: SoftDeletable> Default for DeletionQueryFilter<M> {
  fn default() -> Self {
    Self::new()
  }
}

impl<M> Clone for DeletionQueryFilter<M> {
  fn clone(&self) -> Self {
    Self { deleted_condition: self.deleted_condition.clone(),
           not_deleted_condition: self.not_deleted_condition.clone(),
           _model: PhantomData }
  }
}

impl<M> fmt::Debug for DeletionQueryFilter<M> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DeletionQueryFilter")
     .field("deleted_condition", &self.deleted_condition.get())
     .field("not_deleted_condition", &self.not_deleted_condition.get())
     .finish()
  }
}

/// Queries del host que llevan su propio `DeletionQueryFilter`. Ofrece los
/// filtros como métodos encadenables.
pub trait SoftDeleteQuery: Query + Sized {
  fn deletion_filter(&self) -> &DeletionQueryFilter<Self::Model>;

  fn deleted(mut self) -> Result<Self> {
    let condition = self.deletion_filter().deleted_condition(&self)?.clone();
    add_filter_condition(&mut self, condition);
    Ok(self)
  }

  fn not_deleted(mut self) -> Result<Self> {
    let condition = self.deletion_filter().not_deleted_condition(&self)?.clone();
    add_filter_condition(&mut self, condition);
    Ok(self)
  }

  fn filter_deleted(self, value: impl Into<FilterValue>) -> Result<Self> {
    match value.into().mode() {
      FilterMode::NotDeleted => self.not_deleted(),
      FilterMode::Deleted => self.deleted(),
      FilterMode::All => Ok(self),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filter_modes_follow_integer_coercion() {
    assert_eq!(FilterValue::from("").mode(), FilterMode::NotDeleted);
    assert_eq!(FilterValue::Null.mode(), FilterMode::NotDeleted);
    assert_eq!(FilterValue::from(Vec::<i64>::new()).mode(), FilterMode::NotDeleted);
    assert_eq!(FilterValue::from("1").mode(), FilterMode::Deleted);
    assert_eq!(FilterValue::from(true).mode(), FilterMode::Deleted);
    assert_eq!(FilterValue::from("0").mode(), FilterMode::All);
    assert_eq!(FilterValue::from(false).mode(), FilterMode::All);
    assert_eq!(FilterValue::from("all").mode(), FilterMode::All);
    assert_eq!(FilterValue::from(0).mode(), FilterMode::All);
    assert_eq!(FilterValue::from("99999999999999999999").mode(), FilterMode::Deleted);
    assert_eq!(FilterValue::from("0.5e1").mode(), FilterMode::Deleted);
    assert_eq!(FilterValue::from("0.5").mode(), FilterMode::All);
    assert_eq!(FilterValue::from(f64::INFINITY).mode(), FilterMode::All);
    assert_eq!(FilterValue::from(f64::NAN).mode(), FilterMode::All);
    assert_eq!(FilterValue::from(1e30).mode(), FilterMode::Deleted);
  }

  #[test]
  fn leading_int_reads_numeric_prefix() {
    assert_eq!(leading_int(" 12abc"), 12);
    assert_eq!(leading_int("-3"), -3);
    assert_eq!(leading_int("1.9"), 1);
    assert_eq!(leading_int("abc"), 0);
    assert_eq!(leading_int(""), 0);
    assert_eq!(leading_int("99999999999999999999"), i64::MAX);
    assert_eq!(leading_int("-99999999999999999999"), i64::MIN);
    assert_eq!(leading_int("0.5e1"), 5);
    assert_eq!(leading_int("1e3x"), 1000);
    assert_eq!(leading_int("2e"), 2);
    assert_eq!(leading_int(".5"), 0);
    assert_eq!(leading_int("-"), 0);
    assert_eq!(leading_int("."), 0);
  }

  #[test]
  fn json_values_map_to_filter_values() {
    assert_eq!(FilterValue::from(serde_json::json!(null)).mode(), FilterMode::NotDeleted);
    assert_eq!(FilterValue::from(serde_json::json!([])).mode(), FilterMode::NotDeleted);
    assert_eq!(FilterValue::from(serde_json::json!(2)).mode(), FilterMode::Deleted);
    assert_eq!(FilterValue::from(serde_json::json!(0.5)).mode(), FilterMode::All);
  }
}
