//! Utility functions for Overload.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{OverloadError, Result};

/// Maximum file size that can be read into memory (10 MB).
///
/// Program files and the history log should stay well under this limit.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB

/// Read a file into a string with size limit protection.
///
/// # Errors
///
/// Returns an error if:
/// * The file cannot be read (doesn't exist, permission denied, etc.)
/// * The file exceeds `MAX_FILE_SIZE`
pub fn read_to_string_limited(path: &Path) -> Result<String> {
    read_to_string_with_limit(path, MAX_FILE_SIZE)
}

/// Read a file into a string with a custom size limit.
///
/// # Errors
///
/// Returns an error if the file exceeds `max_size` or cannot be read.
pub fn read_to_string_with_limit(path: &Path, max_size: u64) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| OverloadError::storage(path, e))?;

    let size = metadata.len();
    if size > max_size {
        return Err(OverloadError::storage(
            path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file is too large ({} bytes, max {} bytes)", size, max_size),
            ),
        ));
    }

    fs::read_to_string(path).map_err(|e| OverloadError::storage(path, e))
}

/// Check that an id can be used as a single path component.
///
/// Ids must be non-empty and made of ASCII letters, digits, `-`, `_` or `.`,
/// and must not start with a dot.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(OverloadError::invalid_input("id must not be empty"));
    }
    if id.starts_with('.') {
        return Err(OverloadError::invalid_input(format!(
            "id '{}' must not start with '.'",
            id
        )));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(OverloadError::invalid_input(format!(
            "id '{}' contains invalid character {:?}",
            id, c
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_read_to_string_limited_success() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("test.txt");
        fs::write(&path, "Hello, world!").unwrap();

        let content = read_to_string_limited(&path).unwrap();
        assert_eq!(content, "Hello, world!");
    }

    #[test]
    fn test_read_to_string_limited_nonexistent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.txt");

        let result = read_to_string_limited(&path);
        assert!(matches!(result, Err(OverloadError::Storage { .. })));
    }

    #[test]
    fn test_read_to_string_with_limit_exceeds() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("large.txt");

        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[b'x'; 1000]).unwrap();

        let err = read_to_string_with_limit(&path, 500)
            .unwrap_err()
            .to_string();
        assert!(err.contains("too large"));
        assert!(err.contains("1000 bytes"));
        assert!(err.contains("max 500 bytes"));
    }

    #[test]
    fn test_read_to_string_limited_at_boundary() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("boundary.txt");
        fs::write(&path, "x".repeat(100)).unwrap();

        assert!(read_to_string_with_limit(&path, 100).is_ok());
        assert!(read_to_string_with_limit(&path, 99).is_err());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("push-pull-legs").is_ok());
        assert!(validate_id("block_2.v1").is_ok());

        assert!(validate_id("").is_err());
        assert!(validate_id(".hidden").is_err());
        assert!(validate_id("../escape").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("white space").is_err());
    }
}
