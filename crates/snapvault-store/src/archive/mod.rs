//! Snapshot archive codec.
//!
//! Archives are gzip-compressed tarballs with entries in sorted path order,
//! zeroed timestamps and owners, so the same tree always encodes to the same
//! bytes. Regular files, directories (so empty ones survive) and symlinks
//! (stored as links, never followed) are preserved.
//!
//! Extraction decodes the whole archive before touching the destination:
//! malformed input is reported as `ArchiveCorrupt` with nothing written, and
//! only a failure while writing surfaces as `Io`.

mod codec;
mod materialize;

pub use codec::{ArchiveStore, DEFAULT_COMPRESSION_LEVEL};
pub use materialize::{materialize_entry, remove_leaf};
