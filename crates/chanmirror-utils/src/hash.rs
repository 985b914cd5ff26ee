use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use sha2::{Digest, Sha256};

use crate::error::{HashError, HashResult};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Calculates the SHA-256 checksum of a file.
///
/// The file is streamed through the hasher in fixed-size blocks, so memory use does not
/// grow with the file size. The digest is returned as a lowercase hex string.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be opened or read.
///
/// # Example
///
/// ```no_run
/// use chanmirror_utils::error::HashResult;
/// use chanmirror_utils::hash::calculate_sha256;
///
/// fn main() -> HashResult<()> {
///     let checksum = calculate_sha256("/srv/mirror/noarch/six-1.16.0-pyh6c4a22f_0.tar.bz2")?;
///     println!("Checksum is {}", checksum);
///     Ok(())
/// }
/// ```
pub fn calculate_sha256<P: AsRef<Path>>(file_path: P) -> HashResult<String> {
    let file_path = file_path.as_ref();
    let read_failed = |err| {
        HashError::ReadFailed {
            path: file_path.to_path_buf(),
            source: err,
        }
    };

    let file = File::open(file_path).map_err(read_failed)?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buffer).map_err(read_failed)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hashes an in-memory buffer with SHA-256.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Returns `true` if `value` looks like a SHA-256 hex digest.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
