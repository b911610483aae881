// Archivo: record.rs
// Propósito: definir el contrato que debe cumplir un registro persistente
// (`Record`) para poder borrarse lógicamente. Describe las primitivas que
// aporta el host (actualización parcial, borrado físico, listeners) y el
// ciclo de vida del borrado regular que el mutador puede interceptar.
use crate::attributes::AttributeValue;
use crate::errors::Result;
use crate::events::{ModelEvent, ModelEventKind, ModelEvents};

/// Resultado de una operación de borrado/restauración.
///
/// `Affected(0)` es un resultado válido (ninguna fila coincidió);
/// `NotPerformed` indica que un hook o listener rechazó la operación.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
  Affected(usize),
  NotPerformed,
}

impl MutationOutcome {
  /// Filas afectadas, o `None` si la operación no se realizó.
  pub fn rows(self) -> Option<usize> {
    match self {
      MutationOutcome::Affected(n) => Some(n),
      MutationOutcome::NotPerformed => None,
    }
  }

  pub fn is_performed(self) -> bool {
    matches!(self, MutationOutcome::Affected(_))
  }
}

/// Hooks opcionales a nivel de registro.
///
/// Un tipo que los implemente los expone devolviendo `Some(self)` desde
/// `Record::soft_delete_hooks`. Los `before_*` devuelven `false` para
/// rechazar la operación.
pub trait SoftDeleteHooks {
  fn before_soft_delete(&mut self) -> Result<bool> {
    Ok(true)
  }

  fn after_soft_delete(&mut self) -> Result<()> {
    Ok(())
  }

  fn before_restore(&mut self) -> Result<bool> {
    Ok(true)
  }

  fn after_restore(&mut self) -> Result<()> {
    Ok(())
  }
}

/// Contrato mínimo de un registro persistente.
///
/// Las primitivas (`update_attributes`, `delete_row`) las aporta el host.
/// `update_attributes` debe aplicar el control de concurrencia que use el
/// host (p. ej. columna de versión) y devolver `StaleObject` si falla; el
/// borrado lógico nunca escribe por otro camino.
pub trait Record: Sized + 'static {
  /// Valor actual del atributo, o `None` si el registro no lo tiene.
  fn attribute(&self, name: &str) -> Option<AttributeValue>;

  /// Asigna un atributo en memoria (sin persistir).
  fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()>;

  /// Persiste únicamente los atributos indicados y devuelve el número de
  /// filas afectadas.
  fn update_attributes(&mut self, names: &[&str]) -> Result<usize>;

  /// Borrado físico de la fila. Devuelve el número de filas eliminadas.
  fn delete_row(&mut self) -> Result<usize>;

  fn events(&self) -> &ModelEvents<Self>;

  fn events_mut(&mut self) -> &mut ModelEvents<Self>;

  /// Capacidad opcional: hooks de borrado lógico propios del registro.
  fn soft_delete_hooks(&mut self) -> Option<&mut dyn SoftDeleteHooks> {
    None
  }

  /// Hook previo al borrado. Por defecto emite `BeforeDelete`; un host que
  /// lo sobrescriba debe llamar a `trigger_cancelable` para conservar los
  /// listeners.
  fn before_delete(&mut self) -> Result<bool> {
    self.trigger_cancelable(ModelEventKind::BeforeDelete)
  }

  fn after_delete(&mut self) -> Result<()> {
    self.trigger(ModelEventKind::AfterDelete)
  }

  /// Borrado regular: `before_delete` -> `delete_row` -> `after_delete`.
  fn delete(&mut self) -> Result<MutationOutcome> {
    if !self.before_delete()? {
      return Ok(MutationOutcome::NotPerformed);
    }
    let rows = self.delete_row()?;
    self.after_delete()?;
    Ok(MutationOutcome::Affected(rows))
  }

  /// Emite un evento y devuelve su `is_valid` final. Para eventos no
  /// cancelables (`After*`) el resultado es siempre `true`.
  fn trigger_cancelable(&mut self, kind: ModelEventKind) -> Result<bool> {
    let mut event = ModelEvent::new(kind);
    for handler in self.events().handlers(kind) {
      handler(self, &mut event)?;
    }
    Ok(event.is_valid || !kind.is_cancelable())
  }

  /// Emite un evento sin consultar su resultado.
  fn trigger(&mut self, kind: ModelEventKind) -> Result<()> {
    let mut event = ModelEvent::new(kind);
    for handler in self.events().handlers(kind) {
      handler(self, &mut event)?;
    }
    Ok(())
  }
}
