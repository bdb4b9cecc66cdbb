//! Content checksums for change detection.
//!
//! CRC32 is fast and good enough to decide whether two files differ; it is
//! not a security boundary.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Hash arbitrary bytes into an 8-digit lowercase hex digest.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:08x}", crc32fast::hash(data))
}

/// Hash a file by path, streaming in 64KB chunks.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:08x}", hasher.finalize()))
}
