//! Lister trait: enumerates the source collection.

use std::future::Future;
use std::pin::Pin;

use crate::error::ListError;
use crate::types::ItemDescriptor;

/// Enumerates the finite set of items a run should consider.
///
/// Keys must be unique within one listing. The scheduler treats the
/// returned order as arbitrary.
pub trait Lister: Send + Sync {
    /// Produces one descriptor per item in the source collection.
    fn list(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ItemDescriptor>, ListError>> + Send + '_>>;
}
