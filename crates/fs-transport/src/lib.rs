//! Directory-backed collections for the transfer pipeline.
//!
//! Treats plain directories as the source and destination collections:
//! [`DirLister`] enumerates a source tree into item descriptors and
//! [`DirTransport`] moves bytes between source, staging and destination.
//! Useful for local mirroring, for tests, and as a reference for what
//! remote transports must honor.

mod lister;
mod transport;

pub use lister::DirLister;
pub use transport::DirTransport;
