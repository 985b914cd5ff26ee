//! Constants used throughout chanmirror-core.

/// Name of the plain per-platform index.
pub const REPODATA_FILENAME: &str = "repodata.json";

/// Name of the bzip2-compressed per-platform index.
pub const REPODATA_FILENAME_COMPRESSED: &str = "repodata.json.bz2";

/// Index files that live next to the packages but are never packages themselves.
pub const RESERVED_FILENAMES: [&str; 2] = [REPODATA_FILENAME, REPODATA_FILENAME_COMPRESSED];

/// Magic bytes at the start of every bzip2 stream.
pub const BZIP2_MAGIC_BYTES: [u8; 3] = [0x42, 0x5a, 0x68];
