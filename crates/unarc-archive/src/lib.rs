//! Archive reading for unarc.
//!
//! # Architecture
//!
//! - `format.rs` - Extension-based format classification
//! - `entry.rs` - Entry metadata shared by all formats
//! - `sanitize.rs` - Member name normalization (zip-slip prevention)
//! - `policy.rs` - Junk filtering and destination layout
//! - `extract/` - Per-format entry readers behind [`EntrySource`]

pub use entry::{ArchiveEntry, EntryKind, local_path};
pub use error::{Error, Result};
pub use extract::{ArchiveReader, EntrySource, OpenOptions};
pub use format::{ArchiveFormat, archive_stem};
pub use policy::{EntryPolicy, Layout, is_junk};
pub use sanitize::{normalize_separators, sanitize_entry_name};

#[cfg(feature = "7z")]
pub use extract::SevenZipSource;
#[cfg(feature = "zip")]
pub use extract::ZipSource;

pub mod entry;
mod error;
pub mod extract;
mod format;
pub mod policy;
mod sanitize;
