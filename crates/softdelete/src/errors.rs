// Archivo: errors.rs
// Propósito: definir los errores del borrado lógico y el alias Result<T>
// usado por las APIs del crate. `ErrorKind` permite clasificar un error sin
// inspeccionar su mensaje (lo usa `safe_delete` para decidir el fallback).
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errores comunes del borrado lógico y de los hosts (registros/queries).
///
/// - `Configuration`: mapa de atributos vacío o restore sin configurar.
/// - `NotFound`: registro o tabla inexistente.
/// - `Integrity`: violación de restricción (p. ej. clave foránea).
/// - `StaleObject`: conflicto de bloqueo optimista (columna de versión).
/// - `InvalidValue`: valor de atributo o de filtro no aceptable.
/// - `Storage`: error genérico de almacenamiento.
/// - `Other`: cualquier otro error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SoftDeleteError {
  /// Configuración inválida del comportamiento.
  #[error("Error de configuración: {0}")]
  Configuration(String),
  /// Entidad no encontrada.
  #[error("No encontrado: {0}")]
  NotFound(String),
  /// Restricción de integridad violada (FK, unique, not null...).
  #[error("Violación de integridad: {0}")]
  Integrity(String),
  /// La fila cambió desde que se leyó (versión distinta).
  #[error("Objeto obsoleto: {0}")]
  StaleObject(String),
  /// Valor de atributo inválido.
  #[error("Valor inválido: {0}")]
  InvalidValue(String),
  /// Error de almacenamiento (BD, pool, mutex envenenado...).
  #[error("Error de almacenamiento: {0}")]
  Storage(String),
  /// Otro tipo de error.
  #[error("Otro: {0}")]
  Other(String),
}

/// Clasificación de `SoftDeleteError`.
///
/// `Database` no corresponde a ninguna variante concreta: agrupa
/// `Integrity`, `StaleObject` y `Storage`, de forma que un fallback
/// configurado como `Database` captura cualquiera de ellos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Configuration,
  NotFound,
  Database,
  Integrity,
  StaleObject,
  InvalidValue,
  Storage,
  Other,
}

impl ErrorKind {
  /// Devuelve el tipo padre, si existe.
  pub fn parent(self) -> Option<ErrorKind> {
    match self {
      ErrorKind::Integrity | ErrorKind::StaleObject | ErrorKind::Storage => Some(ErrorKind::Database),
      _ => None,
    }
  }

  /// `true` si `self` es `other` o uno de sus subtipos.
  pub fn is_kind_of(self, other: ErrorKind) -> bool {
    self == other || self.parent().is_some_and(|p| p == other)
  }
}

impl SoftDeleteError {
  /// Tipo del error.
  pub fn kind(&self) -> ErrorKind {
    match self {
      SoftDeleteError::Configuration(_) => ErrorKind::Configuration,
      SoftDeleteError::NotFound(_) => ErrorKind::NotFound,
      SoftDeleteError::Integrity(_) => ErrorKind::Integrity,
      SoftDeleteError::StaleObject(_) => ErrorKind::StaleObject,
      SoftDeleteError::InvalidValue(_) => ErrorKind::InvalidValue,
      SoftDeleteError::Storage(_) => ErrorKind::Storage,
      SoftDeleteError::Other(_) => ErrorKind::Other,
    }
  }

  /// Construye un error del tipo indicado. `Database` se materializa como
  /// `Storage`.
  pub fn of_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
    let msg = msg.into();
    match kind {
      ErrorKind::Configuration => SoftDeleteError::Configuration(msg),
      ErrorKind::NotFound => SoftDeleteError::NotFound(msg),
      ErrorKind::Integrity => SoftDeleteError::Integrity(msg),
      ErrorKind::StaleObject => SoftDeleteError::StaleObject(msg),
      ErrorKind::InvalidValue => SoftDeleteError::InvalidValue(msg),
      ErrorKind::Database | ErrorKind::Storage => SoftDeleteError::Storage(msg),
      ErrorKind::Other => SoftDeleteError::Other(msg),
    }
  }
}

impl From<serde_json::Error> for SoftDeleteError {
  fn from(e: serde_json::Error) -> Self {
    Self::InvalidValue(e.to_string())
  }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, SoftDeleteError>;
