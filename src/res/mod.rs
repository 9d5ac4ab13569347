//! The `.res` archive container: signatures, hash-table layout, and the
//! stream-backed reader/writer.

pub mod archive;
pub mod format;

pub use archive::{EntryInfo, EntryMode, Mode, ResFile, SubFile};
pub use format::{name_hash, SIGNATURE_EI, SIGNATURE_ETH2RU};
