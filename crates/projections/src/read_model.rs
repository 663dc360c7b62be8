//! Read model trait for query-side views.

/// A read model providing query access to denormalized data.
///
/// Read models are fed by event handlers and optimized for fast reads. They
/// are eventually consistent with the event log.
pub trait ReadModel: Send + Sync {
    /// Returns the name of this read model.
    fn name(&self) -> &'static str;

    /// Returns the number of entries in this read model.
    fn count(&self) -> usize;
}
