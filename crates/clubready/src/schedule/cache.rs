//! JSON cache for a parsed class table.
//!
//! Instants are stored as RFC 3339 strings with their UTC offset, so a table
//! read back from the cache compares equal to the one that was written.

use super::error::CacheError;
use super::types::ClassRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

/// File name of the class table cache inside the config directory.
pub const TABLE_CACHE_NAME: &str = "class_table.json";

/// Serializes a class table to the cache document format.
pub fn serialize_class_table(class_table: &[ClassRecord]) -> Result<String, CacheError> {
    Ok(serde_json::to_string_pretty(class_table)?)
}

/// Reads a class table back from a cache document.
pub fn load_serialized_class_table(document: &str) -> Result<Vec<ClassRecord>, CacheError> {
    Ok(serde_json::from_str(document)?)
}

/// Loads the cached class table at `path`.
///
/// # Returns
/// * `Ok(Some(_))` - The cached table
/// * `Ok(None)` - If no cache file exists
/// * `Err(CacheError)` - If the file cannot be read or is malformed
pub fn read_cache(path: &Path) -> Result<Option<Vec<ClassRecord>>, CacheError> {
    let document = match fs::read_to_string(path) {
        Ok(document) => document,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let class_table = load_serialized_class_table(&document)?;
    info!(
        path = %path.display(),
        classes = class_table.len(),
        "Loaded class table from cache"
    );
    Ok(Some(class_table))
}

/// Writes a class table to the cache file at `path`.
pub fn write_cache(path: &Path, class_table: &[ClassRecord]) -> Result<(), CacheError> {
    let document = serialize_class_table(class_table)?;
    fs::write(path, document).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        classes = class_table.len(),
        "Stored class table in cache"
    );
    Ok(())
}
