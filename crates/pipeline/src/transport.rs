//! Transport trait: the byte-moving collaborator.
//!
//! Implemented outside the pipeline (a directory transport ships in
//! `ferry-fs-transport`; remote services bring their own). Using a trait
//! keeps the pipeline independent of any particular service and testable
//! with mocks.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::TransportError;
use crate::types::ItemDescriptor;

/// Progress callback invoked with the cumulative byte count of the
/// current operation. Implementations may call it at any granularity.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Abstract byte-level transport between the source collection, local
/// staging and the destination collection.
pub trait Transport: Send + Sync {
    /// Streams the remote object named by `item` into the local file at
    /// `dest`, invoking `progress` with the cumulative byte count.
    ///
    /// Returns the actual number of bytes written. The actual count
    /// overrides the descriptor's declared size from this point on.
    fn fetch<'a>(
        &'a self,
        item: &'a ItemDescriptor,
        dest: &'a Path,
        progress: ProgressFn,
    ) -> Pin<Box<dyn Future<Output = Result<u64, TransportError>> + Send + 'a>>;

    /// Streams the staged local file at `src` to the destination slot for
    /// `item`, invoking `progress` with the cumulative byte count.
    ///
    /// Must not return before the destination has accepted the bytes.
    fn relay<'a>(
        &'a self,
        src: &'a Path,
        item: &'a ItemDescriptor,
        progress: ProgressFn,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;
}
