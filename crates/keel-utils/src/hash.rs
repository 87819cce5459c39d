use std::{fs::File, io, path::Path};

use sha2::{Digest, Sha256};

use crate::error::{HashError, HashResult};

/// Name of the blake3 checksum algorithm as it appears in checksum sets.
pub const BLAKE3: &str = "blake3";

/// Name of the sha256 checksum algorithm as it appears in checksum sets.
pub const SHA256: &str = "sha256";

/// Algorithms computed for every published file.
pub const DEFAULT_ALGORITHMS: [&str; 2] = [BLAKE3, SHA256];

/// Calculates the blake3 checksum of a file.
///
/// The file is memory-mapped when possible and the digest is returned as a
/// lowercase hex string.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be read.
///
/// # Example
///
/// ```no_run
/// use keel_utils::error::HashResult;
/// use keel_utils::hash::calculate_checksum;
///
/// fn main() -> HashResult<()> {
///     let checksum = calculate_checksum("/path/to/file")?;
///     println!("Checksum is {}", checksum);
///     Ok(())
/// }
/// ```
pub fn calculate_checksum<P: AsRef<Path>>(file_path: P) -> HashResult<String> {
    let file_path = file_path.as_ref();
    let mut hasher = blake3::Hasher::new();
    hasher.update_mmap(file_path).map_err(|err| {
        HashError::ReadFailed {
            path: file_path.to_path_buf(),
            source: err,
        }
    })?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Calculates the sha256 checksum of a file as a lowercase hex string.
pub fn calculate_sha256<P: AsRef<Path>>(file_path: P) -> HashResult<String> {
    let file_path = file_path.as_ref();
    let read_failed = |err| {
        HashError::ReadFailed {
            path: file_path.to_path_buf(),
            source: err,
        }
    };

    let mut file = File::open(file_path).map_err(read_failed)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(read_failed)?;

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

/// Calculates the checksum of a file with the named algorithm.
///
/// # Errors
///
/// * [`HashError::UnsupportedAlgorithm`] if `algorithm` is neither `blake3` nor `sha256`.
/// * [`HashError::ReadFailed`] if the file cannot be read.
pub fn calculate_with<P: AsRef<Path>>(algorithm: &str, file_path: P) -> HashResult<String> {
    match algorithm {
        BLAKE3 => calculate_checksum(file_path),
        SHA256 => calculate_sha256(file_path),
        other => {
            Err(HashError::UnsupportedAlgorithm {
                algorithm: other.to_string(),
            })
        }
    }
}
