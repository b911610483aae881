// Archivo: mutator.rs
// Propósito: implementar `DeletionMutator`, el comportamiento adjunto a un
// registro que calcula y aplica las mutaciones de borrado lógico y
// restauración, intercepta opcionalmente el borrado regular y ofrece un
// borrado "seguro" que degrada a borrado lógico cuando el físico falla.
use crate::attributes::{AttributeMap, AttributeValue};
use crate::errors::{ErrorKind, Result, SoftDeleteError};
use crate::events::{EventHandler, HandlerId, ModelEvent, ModelEventKind};
use crate::record::{MutationOutcome, Record};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

/// Id estable del listener que sustituye el borrado regular.
pub const REPLACE_REGULAR_DELETE_HANDLER: HandlerId = "softdelete.replace-regular-delete";

/// Predicado que decide si un registro todavía puede borrarse físicamente
/// cuando `replace_regular_delete` está activo.
pub type AllowDeleteCallback<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

/// Registro que lleva adjunto su `DeletionMutator`.
pub trait SoftDeletable: Record {
  fn deletion(&self) -> &Arc<DeletionMutator<Self>>;

  fn deletion_mut(&mut self) -> &mut Arc<DeletionMutator<Self>>;
}

/// Comportamiento de borrado lógico.
///
/// Se construye con `DeletionMutator::builder()` (o `from_settings`) y se
/// comparte entre registros del mismo tipo vía `Arc`. Cada operación recibe
/// el registro sobre el que actúa.
pub struct DeletionMutator<R> {
  soft_delete_attribute_values: AttributeMap<R>,
  restore_attribute_values: Option<AttributeMap<R>>,
  invoke_delete_events: bool,
  use_restore_attribute_values_as_defaults: bool,
  replace_regular_delete: bool,
  allow_delete_callback: Option<AllowDeleteCallback<R>>,
  delete_fallback: Option<ErrorKind>,
}

impl<R: Record> DeletionMutator<R> {
  pub fn builder() -> DeletionMutatorBuilder<R> {
    DeletionMutatorBuilder::new()
  }

  /// Mapa de atributos que se aplica al borrar.
  pub fn soft_delete_attribute_values(&self) -> &AttributeMap<R> {
    &self.soft_delete_attribute_values
  }

  /// Mapa que se aplica al restaurar: el configurado o, si no hay y
  /// `use_restore_attribute_values_as_defaults` está activo, el inverso del
  /// mapa de borrado.
  pub fn restore_attribute_values(&self) -> Result<AttributeMap<R>> {
    match &self.restore_attribute_values {
      Some(map) => Ok(map.clone()),
      None if self.use_restore_attribute_values_as_defaults => Ok(self.soft_delete_attribute_values.inverted()),
      None => Err(SoftDeleteError::Configuration("restore_attribute_values no configurado y \
                                                  use_restore_attribute_values_as_defaults \
                                                  desactivado"
                                                                   .into())),
    }
  }

  pub fn invoke_delete_events(&self) -> bool {
    self.invoke_delete_events
  }

  pub fn replace_regular_delete(&self) -> bool {
    self.replace_regular_delete
  }

  pub fn delete_fallback(&self) -> Option<ErrorKind> {
    self.delete_fallback
  }

  /// Marca el registro como borrado.
  ///
  /// Con `invoke_delete_events` se ejecutan además `before_delete` y
  /// `after_delete` del registro; si `before_delete` rechaza, no se muta
  /// nada y se devuelve `NotPerformed`.
  pub fn soft_delete(&self, record: &mut R) -> Result<MutationOutcome> {
    if self.invoke_delete_events && !record.before_delete()? {
      warn!("soft delete rechazado por before_delete");
      return Ok(MutationOutcome::NotPerformed);
    }
    let outcome = self.soft_delete_internal(record)?;
    if self.invoke_delete_events {
      record.after_delete()?;
    }
    Ok(outcome)
  }

  /// Núcleo del borrado lógico, sin los eventos de borrado regular.
  pub fn soft_delete_internal(&self, record: &mut R) -> Result<MutationOutcome> {
    if !self.before_soft_delete(record)? {
      warn!("soft delete cancelado por before_soft_delete");
      return Ok(MutationOutcome::NotPerformed);
    }
    let rows = apply_attribute_values(record, &self.soft_delete_attribute_values)?;
    self.after_soft_delete(record)?;
    info!("soft delete aplicado ({} filas)", rows);
    Ok(MutationOutcome::Affected(rows))
  }

  /// Hook del registro (si existe) y después el evento cancelable
  /// `BeforeSoftDelete`.
  pub fn before_soft_delete(&self, record: &mut R) -> Result<bool> {
    if let Some(hooks) = record.soft_delete_hooks() {
      if !hooks.before_soft_delete()? {
        return Ok(false);
      }
    }
    record.trigger_cancelable(ModelEventKind::BeforeSoftDelete)
  }

  pub fn after_soft_delete(&self, record: &mut R) -> Result<()> {
    if let Some(hooks) = record.soft_delete_hooks() {
      hooks.after_soft_delete()?;
    }
    record.trigger(ModelEventKind::AfterSoftDelete)
  }

  /// Revierte el borrado lógico aplicando el mapa de restauración.
  pub fn restore(&self, record: &mut R) -> Result<MutationOutcome> {
    let values = self.restore_attribute_values()?;
    if !self.before_restore(record)? {
      warn!("restore cancelado por before_restore");
      return Ok(MutationOutcome::NotPerformed);
    }
    let rows = apply_attribute_values(record, &values)?;
    self.after_restore(record)?;
    info!("restore aplicado ({} filas)", rows);
    Ok(MutationOutcome::Affected(rows))
  }

  pub fn before_restore(&self, record: &mut R) -> Result<bool> {
    if let Some(hooks) = record.soft_delete_hooks() {
      if !hooks.before_restore()? {
        return Ok(false);
      }
    }
    record.trigger_cancelable(ModelEventKind::BeforeRestore)
  }

  pub fn after_restore(&self, record: &mut R) -> Result<()> {
    if let Some(hooks) = record.soft_delete_hooks() {
      hooks.after_restore()?;
    }
    record.trigger(ModelEventKind::AfterRestore)
  }

  /// Intenta el borrado regular; si falla con un error del tipo configurado
  /// en `delete_fallback` (o con cualquier error si no hay ninguno), marca el
  /// registro como borrado lógicamente. Otros errores se propagan.
  pub fn safe_delete(&self, record: &mut R) -> Result<MutationOutcome> {
    match record.delete() {
      Ok(outcome) => Ok(outcome),
      Err(e) if self.accepts_fallback(&e) => {
        warn!("borrado físico fallido ({}); se aplica borrado lógico", e);
        self.soft_delete_internal(record)
      }
      Err(e) => Err(e),
    }
  }

  fn accepts_fallback(&self, error: &SoftDeleteError) -> bool {
    match self.delete_fallback {
      Some(kind) => error.kind().is_kind_of(kind),
      None => true,
    }
  }

  /// `true` si el borrado físico sigue permitido para `record`.
  pub fn is_delete_allowed(&self, record: &R) -> bool {
    self.allow_delete_callback.as_ref().is_some_and(|cb| cb(record))
  }
}

impl<R: SoftDeletable> DeletionMutator<R> {
  /// Sincroniza el listener de sustitución del borrado regular con el flag
  /// `replace_regular_delete`: primero lo retira y, si el flag está activo,
  /// lo vuelve a registrar.
  pub fn attach(&self, record: &mut R) {
    self.detach(record);
    if self.replace_regular_delete {
      record.events_mut()
            .on(ModelEventKind::BeforeDelete, REPLACE_REGULAR_DELETE_HANDLER, replace_regular_delete_handler());
    }
  }

  /// Retira el listener de sustitución del borrado regular.
  pub fn detach(&self, record: &mut R) {
    record.events_mut().off(ModelEventKind::BeforeDelete, REPLACE_REGULAR_DELETE_HANDLER);
  }
}

/// Listener de `BeforeDelete`: aplica el borrado lógico y cancela el
/// físico, salvo que `allow_delete_callback` lo permita. Lee el mutador
/// del propio registro en el momento de la llamada.
fn replace_regular_delete_handler<R: SoftDeletable>() -> EventHandler<R> {
  Arc::new(|record: &mut R, event: &mut ModelEvent| -> Result<()> {
    let mutator = Arc::clone(record.deletion());
    if mutator.is_delete_allowed(record) {
      debug!("borrado físico permitido por allow_delete_callback");
      return Ok(());
    }
    mutator.soft_delete_internal(record)?;
    event.is_valid = false;
    Ok(())
  })
}

/// Asigna los valores del mapa (resolviendo los calculados contra el propio
/// registro) y persiste sólo esos atributos.
fn apply_attribute_values<R: Record>(record: &mut R, map: &AttributeMap<R>) -> Result<usize> {
  let values: Vec<(String, AttributeValue)> = map.resolve(record);
  for (name, value) in &values {
    debug!("{} = {}", name, value);
    record.set_attribute(name, value.clone())?;
  }
  let names: Vec<&str> = values.iter().map(|(n, _)| n.as_str()).collect();
  record.update_attributes(&names)
}

impl<R> Clone for DeletionMutator<R> {
  fn clone(&self) -> Self {
    Self { soft_delete_attribute_values: self.soft_delete_attribute_values.clone(),
           restore_attribute_values: self.restore_attribute_values.clone(),
           invoke_delete_events: self.invoke_delete_events,
           use_restore_attribute_values_as_defaults: self.use_restore_attribute_values_as_defaults,
           replace_regular_delete: self.replace_regular_delete,
           allow_delete_callback: self.allow_delete_callback.clone(),
           delete_fallback: self.delete_fallback }
  }
}

impl<R> fmt::Debug for DeletionMutator<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DeletionMutator")
     .field("soft_delete_attribute_values", &self.soft_delete_attribute_values)
     .field("restore_attribute_values", &self.restore_attribute_values)
     .field("invoke_delete_events", &self.invoke_delete_events)
     .field("use_restore_attribute_values_as_defaults", &self.use_restore_attribute_values_as_defaults)
     .field("replace_regular_delete", &self.replace_regular_delete)
     .field("allow_delete_callback", &self.allow_delete_callback.is_some())
     .field("delete_fallback", &self.delete_fallback)
     .finish()
  }
}

/// Builder de `DeletionMutator`. `build` valida que el mapa de borrado no
/// esté vacío.
pub struct DeletionMutatorBuilder<R> {
  inner: DeletionMutator<R>,
}

impl<R: Record> DeletionMutatorBuilder<R> {
  pub fn new() -> Self {
    Self { inner: DeletionMutator { soft_delete_attribute_values: AttributeMap::new(),
                                    restore_attribute_values: None,
                                    invoke_delete_events: true,
                                    use_restore_attribute_values_as_defaults: true,
                                    replace_regular_delete: false,
                                    allow_delete_callback: None,
                                    delete_fallback: None } }
  }

  pub fn soft_delete_attribute_values(mut self, map: AttributeMap<R>) -> Self {
    self.inner.soft_delete_attribute_values = map;
    self
  }

  pub fn restore_attribute_values(mut self, map: AttributeMap<R>) -> Self {
    self.inner.restore_attribute_values = Some(map);
    self
  }

  pub fn invoke_delete_events(mut self, enabled: bool) -> Self {
    self.inner.invoke_delete_events = enabled;
    self
  }

  pub fn use_restore_attribute_values_as_defaults(mut self, enabled: bool) -> Self {
    self.inner.use_restore_attribute_values_as_defaults = enabled;
    self
  }

  pub fn replace_regular_delete(mut self, enabled: bool) -> Self {
    self.inner.replace_regular_delete = enabled;
    self
  }

  pub fn allow_delete_callback<F>(mut self, f: F) -> Self
    where F: Fn(&R) -> bool + Send + Sync + 'static
  {
    self.inner.allow_delete_callback = Some(Arc::new(f));
    self
  }

  pub fn delete_fallback(mut self, kind: ErrorKind) -> Self {
    self.inner.delete_fallback = Some(kind);
    self
  }

  pub fn build(self) -> Result<DeletionMutator<R>> {
    if self.inner.soft_delete_attribute_values.is_empty() {
      return Err(SoftDeleteError::Configuration("soft_delete_attribute_values no puede estar vacío".into()));
    }
    Ok(self.inner)
  }
}

impl<R: Record> Default for DeletionMutatorBuilder<R> {
  fn default() -> Self {
    Self::new()
  }
}

/// Atajos sobre cualquier registro `SoftDeletable`: delegan en el mutador
/// adjunto al registro.
pub trait SoftDeleteExt: SoftDeletable {
  fn soft_delete(&mut self) -> Result<MutationOutcome> {
    let mutator = Arc::clone(self.deletion());
    mutator.soft_delete(self)
  }

  fn restore(&mut self) -> Result<MutationOutcome> {
    let mutator = Arc::clone(self.deletion());
    mutator.restore(self)
  }

  fn safe_delete(&mut self) -> Result<MutationOutcome> {
    let mutator = Arc::clone(self.deletion());
    mutator.safe_delete(self)
  }

  /// Registra (o retira) el listener de sustitución según el mutador
  /// actual del registro.
  fn attach_soft_delete(&mut self) {
    let mutator = Arc::clone(self.deletion());
    mutator.attach(self);
  }

  /// Cambia `replace_regular_delete` para este registro y re-sincroniza el
  /// listener (detach + attach).
  fn set_replace_regular_delete(&mut self, enabled: bool) {
    Arc::make_mut(self.deletion_mut()).replace_regular_delete = enabled;
    self.attach_soft_delete();
  }

  /// Cambia el tipo de error que activa el fallback de `safe_delete`.
  fn set_delete_fallback(&mut self, kind: Option<ErrorKind>) {
    Arc::make_mut(self.deletion_mut()).delete_fallback = kind;
  }
}

impl<R: SoftDeletable> SoftDeleteExt for R {}
