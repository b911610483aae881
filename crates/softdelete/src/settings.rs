// Archivo: settings.rs
// Propósito: configuración serializable (JSON) del comportamiento de
// borrado lógico, para poder definirlo fuera del código (variables de
// entorno, ficheros). Sólo admite valores literales y un conjunto cerrado
// de valores calculados.
use crate::attributes::{AttributeMap, AttributeSource, AttributeValue};
use crate::errors::{ErrorKind, Result};
use crate::mutator::DeletionMutator;
use crate::record::Record;
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Valores calculados disponibles desde configuración.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputedSetting {
  /// Segundos desde epoch (UTC) en el momento de la mutación.
  Timestamp,
  /// Fecha RFC 3339 (UTC) en el momento de la mutación.
  Rfc3339,
}

/// Valor de un atributo en configuración: `{"computed": "timestamp"}` o un
/// literal escalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeSetting {
  Computed { computed: ComputedSetting },
  Literal(AttributeValue),
}

impl AttributeSetting {
  fn into_source<R: 'static>(self) -> AttributeSource<R> {
    match self {
      AttributeSetting::Literal(v) => AttributeSource::Literal(v),
      AttributeSetting::Computed { computed: ComputedSetting::Timestamp } => {
        AttributeSource::computed(|_: &R| AttributeValue::Int(Utc::now().timestamp()))
      }
      AttributeSetting::Computed { computed: ComputedSetting::Rfc3339 } => {
        AttributeSource::computed(|_: &R| AttributeValue::Text(Utc::now().to_rfc3339()))
      }
    }
  }
}

/// Configuración de `DeletionMutator`.
///
/// ```json
/// {
///   "soft_delete_attribute_values": {"is_deleted": true, "deleted_at": {"computed": "timestamp"}},
///   "replace_regular_delete": true,
///   "delete_fallback": "integrity"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionSettings {
  pub soft_delete_attribute_values: IndexMap<String, AttributeSetting>,
  pub restore_attribute_values: Option<IndexMap<String, AttributeSetting>>,
  pub invoke_delete_events: bool,
  pub use_restore_attribute_values_as_defaults: bool,
  pub replace_regular_delete: bool,
  pub delete_fallback: Option<ErrorKind>,
}

impl Default for DeletionSettings {
  fn default() -> Self {
    let mut values = IndexMap::new();
    values.insert("is_deleted".to_string(), AttributeSetting::Literal(AttributeValue::Bool(true)));
    Self { soft_delete_attribute_values: values,
           restore_attribute_values: None,
           invoke_delete_events: true,
           use_restore_attribute_values_as_defaults: true,
           replace_regular_delete: false,
           delete_fallback: None }
  }
}

impl DeletionSettings {
  pub fn from_json(raw: &str) -> Result<Self> {
    Ok(serde_json::from_str(raw)?)
  }
}

fn to_map<R: 'static>(values: IndexMap<String, AttributeSetting>) -> AttributeMap<R> {
  values.into_iter().map(|(k, v)| (k, v.into_source())).collect()
}

impl<R: Record> DeletionMutator<R> {
  /// Construye el mutador a partir de la configuración.
  pub fn from_settings(settings: DeletionSettings) -> Result<Self> {
    let mut builder =
      DeletionMutator::builder().soft_delete_attribute_values(to_map(settings.soft_delete_attribute_values))
                                .invoke_delete_events(settings.invoke_delete_events)
                                .use_restore_attribute_values_as_defaults(settings.use_restore_attribute_values_as_defaults)
                                .replace_regular_delete(settings.replace_regular_delete);
    if let Some(restore) = settings.restore_attribute_values {
      builder = builder.restore_attribute_values(to_map(restore));
    }
    if let Some(kind) = settings.delete_fallback {
      builder = builder.delete_fallback(kind);
    }
    builder.build()
  }
}
