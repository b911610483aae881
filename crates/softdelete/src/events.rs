// Archivo: events.rs
// Propósito: eventos de ciclo de vida de un registro y el registro de
// listeners por instancia. La emisión es síncrona: cada listener recibe
// acceso exclusivo al registro y al evento, y puede marcar el evento como
// inválido para cancelar la operación pendiente.
use crate::errors::Result;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Puntos del ciclo de vida en los que se pueden registrar listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEventKind {
  BeforeDelete,
  AfterDelete,
  BeforeSoftDelete,
  AfterSoftDelete,
  BeforeRestore,
  AfterRestore,
}

impl ModelEventKind {
  /// `true` para los eventos cuyo `is_valid` se consulta tras emitirlos.
  pub fn is_cancelable(self) -> bool {
    matches!(self,
             ModelEventKind::BeforeDelete | ModelEventKind::BeforeSoftDelete | ModelEventKind::BeforeRestore)
  }
}

/// Evento emitido a los listeners. `is_valid = false` cancela la operación
/// (sólo tiene efecto en eventos `Before*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEvent {
  pub kind: ModelEventKind,
  pub is_valid: bool,
}

impl ModelEvent {
  pub fn new(kind: ModelEventKind) -> Self {
    Self { kind, is_valid: true }
  }
}

/// Identidad estable de un listener. Registrar dos veces el mismo id para
/// el mismo evento no duplica el listener.
pub type HandlerId = &'static str;

/// Listener de eventos de un registro `R`.
pub type EventHandler<R> = Arc<dyn Fn(&mut R, &mut ModelEvent) -> Result<()> + Send + Sync>;

/// Listeners registrados en una instancia de registro.
pub struct ModelEvents<R> {
  handlers: IndexMap<(ModelEventKind, HandlerId), EventHandler<R>>,
}

impl<R> ModelEvents<R> {
  pub fn new() -> Self {
    Self { handlers: IndexMap::new() }
  }

  /// Registra `handler` bajo `id` si no estaba ya registrado.
  /// Devuelve `true` si se añadió.
  pub fn on(&mut self, kind: ModelEventKind, id: HandlerId, handler: EventHandler<R>) -> bool {
    if self.handlers.contains_key(&(kind, id)) {
      return false;
    }
    self.handlers.insert((kind, id), handler);
    true
  }

  /// Elimina el listener `id` si estaba registrado. Devuelve `true` si se
  /// eliminó.
  pub fn off(&mut self, kind: ModelEventKind, id: HandlerId) -> bool {
    self.handlers.shift_remove(&(kind, id)).is_some()
  }

  pub fn has(&self, kind: ModelEventKind, id: HandlerId) -> bool {
    self.handlers.contains_key(&(kind, id))
  }

  /// Listeners de `kind` en orden de registro. Se devuelven clonados para
  /// poder invocarlos con `&mut` sobre el registro que los contiene.
  pub fn handlers(&self, kind: ModelEventKind) -> Vec<EventHandler<R>> {
    self.handlers
        .iter()
        .filter(|((k, _), _)| *k == kind)
        .map(|(_, h)| Arc::clone(h))
        .collect()
  }

  /// Número de listeners registrados para `kind`.
  pub fn count(&self, kind: ModelEventKind) -> usize {
    self.handlers.keys().filter(|(k, _)| *k == kind).count()
  }
}

impl<R> Default for ModelEvents<R> {
  fn default() -> Self {
    Self::new()
  }
}

impl<R> Clone for ModelEvents<R> {
  fn clone(&self) -> Self {
    Self { handlers: self.handlers.clone() }
  }
}

impl<R> fmt::Debug for ModelEvents<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.handlers.keys()).finish()
  }
}
