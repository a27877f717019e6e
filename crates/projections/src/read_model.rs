//! Read model trait for query-side views.

/// A read model providing query access to denormalized data. Updated
/// by projections, optimized for reads.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of entries currently held.
    fn count(&self) -> usize;
}
