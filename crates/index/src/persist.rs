//! Whole-structure persistence.
//!
//! Every variant serializes its complete node graph as one JSON document
//! wrapped in a format envelope, so a document saved by one variant is
//! rejected (not misread) by another. Path helpers wrap the stream-based
//! contract operations for callers that persist one file per index.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CorruptedSnafu, Result};
use crate::index::OrderedIndex;
use crate::integrity::Violation;

pub(crate) const AVL_FORMAT: &str = "grove.avl.v1";
pub(crate) const REDBLACK_FORMAT: &str = "grove.redblack.v1";
pub(crate) const BTREE_FORMAT: &str = "grove.btree.v1";
pub(crate) const FLAT_FORMAT: &str = "grove.flat.v1";

#[derive(Serialize)]
struct DocumentRef<'a, T> {
    format: &'a str,
    tree: &'a T,
}

#[derive(Deserialize)]
struct Document<T> {
    format: String,
    tree: T,
}

/// Writes `tree` wrapped in the given format envelope.
pub(crate) fn write_document<T: Serialize>(
    dest: &mut dyn Write,
    format: &str,
    tree: &T,
) -> Result<()> {
    serde_json::to_writer(&mut *dest, &DocumentRef { format, tree })?;
    Ok(())
}

/// Reads a document and checks its format envelope.
pub(crate) fn read_document<T: DeserializeOwned>(src: &mut dyn Read, format: &str) -> Result<T> {
    let doc: Document<T> = serde_json::from_reader(&mut *src)?;
    if doc.format != format {
        return CorruptedSnafu {
            reason: format!("expected format {format}, found {}", doc.format),
        }
        .fail();
    }
    Ok(doc.tree)
}

/// Converts load-time structural violations into a corruption error.
pub(crate) fn validate_loaded(violations: Vec<Violation>) -> Result<()> {
    match violations.into_iter().next() {
        None => Ok(()),
        Some(first) => CorruptedSnafu { reason: first.to_string() }.fail(),
    }
}

/// Saves an index to a file, creating or truncating it and syncing the
/// result to durable storage.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be written.
pub fn save_to_path<V>(index: &dyn OrderedIndex<V>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    index.save(&mut writer)?;
    writer.flush()?;
    let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    file.sync_all()?;
    tracing::debug!(path = %path.display(), entries = index.len(), "index saved");
    Ok(())
}

/// Loads an index from a file, replacing its state wholesale.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read and `Error::Corrupted`
/// if its contents are malformed.
pub fn load_from_path<V>(index: &mut dyn OrderedIndex<V>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    index.load(&mut reader)?;
    tracing::debug!(path = %path.display(), entries = index.len(), "index loaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_document_round_trip() {
        let mut buf = Vec::new();
        write_document(&mut buf, "grove.test.v1", &vec![1u64, 2, 3]).unwrap();

        let decoded: Vec<u64> = read_document(&mut buf.as_slice(), "grove.test.v1").unwrap();
        assert_eq!(decoded, [1, 2, 3]);
    }

    #[test]
    fn test_format_mismatch_is_corruption() {
        let mut buf = Vec::new();
        write_document(&mut buf, "grove.avl.v1", &0u64).unwrap();

        let err = read_document::<u64>(&mut buf.as_slice(), "grove.btree.v1").unwrap_err();
        assert!(matches!(err, Error::Corrupted { .. }), "got {err:?}");
    }

    #[test]
    fn test_truncated_document_is_corruption() {
        let mut buf = Vec::new();
        write_document(&mut buf, "grove.avl.v1", &vec![1u64, 2, 3]).unwrap();
        buf.truncate(buf.len() / 2);

        let err = read_document::<Vec<u64>>(&mut buf.as_slice(), "grove.avl.v1").unwrap_err();
        assert!(matches!(err, Error::Corrupted { .. }), "got {err:?}");
    }

    #[test]
    fn test_garbage_document_is_corruption() {
        let garbage = b"definitely not json";
        let err = read_document::<u64>(&mut garbage.as_slice(), "grove.avl.v1").unwrap_err();
        assert!(matches!(err, Error::Corrupted { .. }), "got {err:?}");
    }
}
