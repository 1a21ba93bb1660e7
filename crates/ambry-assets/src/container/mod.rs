//! The serialized container format.
//!
//! A container holds a list of dependency asset names followed by a set of named byte
//! arrays. The layout (all integers little-endian `i32`):
//!
//! ```text
//! i32 dependency_count
//!     7-bit length prefix + UTF-8 bytes        (per dependency)
//! i32 property_count
//!     i32 name_len, name bytes, i32 offset, i32 length   (per property)
//! payload bytes, in index order
//! ```
//!
//! Offsets are measured from the first byte of the container. The writer never seeks
//! backward, so containers can be streamed into sockets or pipes; the reader fetches
//! property bytes lazily, from either a seekable or a forward-only source.

mod reader;
mod wire;
mod writer;

pub use reader::{AssetStream, ReadableContainer, SeekRead};
pub use writer::WritableContainer;

/// Property holding the tag of the loader that understands the container.
pub const LOADER_PROPERTY: &str = "Loader";

/// Conventional property for an asset's primary payload.
pub const DATA_PROPERTY: &str = "Data";
