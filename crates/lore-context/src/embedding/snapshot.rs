//! Binary snapshot format for vector documents.
//!
//! Big-endian throughout, no header or version tag:
//!
//! ```text
//! i32 count
//! count × { utf id, utf content, i32 len, f32[len], utf kind,
//!           bool has_owner, [utf owner], bool has_counterpart, [utf counterpart],
//!           i64 timestamp, i32 chunk_index, i32 chunk_total }
//! ```
//!
//! `utf` is a `u16` byte length followed by modified UTF-8 (NUL as `C0 80`,
//! supplementary characters as encoded surrogate pairs), so snapshots written
//! by the existing JVM tooling load unchanged.

use lore_core::{DocumentKind, Error, Result, VectorDocument, VectorMetadata};
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Upper bound for speculative allocations driven by on-disk lengths
const MAX_PREALLOCATION: usize = 4096;

/// Result of a lenient snapshot read
#[derive(Debug, Default)]
pub struct SnapshotInspection {
    /// Document count the header claims
    pub declared: usize,
    /// Documents decoded before the first error
    pub documents: Vec<VectorDocument>,
    /// Why decoding stopped early, if it did
    pub truncation: Option<String>,
}

impl SnapshotInspection {
    /// Whether every declared document was decoded
    pub fn is_complete(&self) -> bool {
        self.truncation.is_none()
    }
}

/// Encode `documents` in snapshot format
///
/// # Errors
/// Returns [`Error::Encoding`] if a string or the document count does not fit
/// the format, or an I/O error from `writer`
pub fn write_snapshot<'doc, W, I>(writer: &mut W, documents: I) -> Result<()>
where
    W: Write,
    I: ExactSizeIterator<Item = &'doc VectorDocument>,
{
    write_length(writer, documents.len(), "document count")?;
    for document in documents {
        write_document(writer, document)?;
    }
    writer.flush()?;
    Ok(())
}

/// Decode a complete snapshot
///
/// Bytes after the last declared document are ignored.
///
/// # Errors
/// Returns [`Error::CorruptedStore`] on truncated or malformed input
pub fn read_snapshot<R: Read>(reader: &mut R) -> Result<Vec<VectorDocument>> {
    let declared = read_count(reader, "document count")?;
    let mut documents = Vec::with_capacity(declared.min(MAX_PREALLOCATION));
    for _ in 0..declared {
        documents.push(read_document(reader)?);
    }
    Ok(documents)
}

/// Read a snapshot file; `Ok(None)` when it does not exist
///
/// # Errors
/// Returns an I/O error for unreadable files and [`Error::CorruptedStore`]
/// for malformed content
pub fn read_snapshot_file(path: &Path) -> Result<Option<Vec<VectorDocument>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    read_snapshot(&mut BufReader::new(file)).map(Some)
}

/// Replace `path` with `bytes` via a temporary sibling file and a rename,
/// creating parent directories as needed
///
/// # Errors
/// Returns an I/O error if the directory, temp file or rename fails
pub fn write_snapshot_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|error| Error::Io(error.error))?;
    Ok(())
}

/// Decode as many documents as possible, reporting where decoding stopped
/// instead of failing
///
/// # Errors
/// Only fails if the file cannot be opened
pub fn inspect_snapshot(path: &Path) -> Result<SnapshotInspection> {
    let file = File::open(path)?;
    Ok(inspect_reader(&mut BufReader::new(file)))
}

/// Lenient counterpart of [`read_snapshot`]
pub fn inspect_reader<R: Read>(reader: &mut R) -> SnapshotInspection {
    let declared = match read_count(reader, "document count") {
        Ok(declared) => declared,
        Err(error) => {
            return SnapshotInspection {
                truncation: Some(error.to_string()),
                ..SnapshotInspection::default()
            };
        }
    };

    let mut inspection = SnapshotInspection {
        declared,
        documents: Vec::with_capacity(declared.min(MAX_PREALLOCATION)),
        truncation: None,
    };
    for index in 0..declared {
        match read_document(reader) {
            Ok(document) => inspection.documents.push(document),
            Err(error) => {
                inspection.truncation = Some(format!("document {index} of {declared}: {error}"));
                break;
            }
        }
    }
    inspection
}

fn write_document<W: Write>(writer: &mut W, document: &VectorDocument) -> Result<()> {
    write_utf(writer, &document.id)?;
    write_utf(writer, &document.content)?;

    write_length(writer, document.embedding.len(), "embedding length")?;
    for value in &document.embedding {
        writer.write_all(&value.to_be_bytes())?;
    }

    let metadata = &document.metadata;
    write_utf(writer, metadata.kind.as_str())?;
    write_optional_utf(writer, metadata.owner_id.as_deref())?;
    write_optional_utf(writer, metadata.counterpart_id.as_deref())?;
    writer.write_all(&metadata.timestamp.to_be_bytes())?;
    write_length(writer, metadata.chunk_index as usize, "chunk index")?;
    write_length(writer, metadata.chunk_total as usize, "chunk total")?;
    Ok(())
}

fn read_document<R: Read>(reader: &mut R) -> Result<VectorDocument> {
    let id = read_utf(reader, "id")?;
    let content = read_utf(reader, "content")?;

    let length = read_count(reader, "embedding length")?;
    let mut embedding = Vec::with_capacity(length.min(MAX_PREALLOCATION));
    for _ in 0..length {
        embedding.push(f32::from_be_bytes(read_array(reader, "embedding")?));
    }

    let kind: DocumentKind = read_utf(reader, "kind")?.parse()?;
    let owner_id = read_optional_utf(reader, "owner id")?;
    let counterpart_id = read_optional_utf(reader, "counterpart id")?;
    let timestamp = i64::from_be_bytes(read_array(reader, "timestamp")?);
    let chunk_index = read_u32(reader, "chunk index")?;
    let chunk_total = read_u32(reader, "chunk total")?;

    Ok(VectorDocument {
        id,
        content,
        embedding,
        metadata: VectorMetadata {
            kind,
            owner_id,
            counterpart_id,
            timestamp,
            chunk_index,
            chunk_total,
        },
    })
}

fn write_length<W: Write>(writer: &mut W, value: usize, what: &str) -> Result<()> {
    let value = i32::try_from(value)
        .map_err(|_overflow| Error::Encoding(format!("{what} {value} does not fit in 32 bits")))?;
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

fn write_optional_utf<W: Write>(writer: &mut W, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => {
            writer.write_all(&[1])?;
            write_utf(writer, value)
        }
        None => {
            writer.write_all(&[0])?;
            Ok(())
        }
    }
}

fn write_utf<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let bytes = encode_modified_utf8(value);
    let length = u16::try_from(bytes.len()).map_err(|_overflow| {
        Error::Encoding(format!(
            "string of {} encoded bytes exceeds the 65535 byte limit",
            bytes.len()
        ))
    })?;
    writer.write_all(&length.to_be_bytes())?;
    writer.write_all(&bytes)?;
    Ok(())
}

fn read_array<R: Read, const N: usize>(reader: &mut R, what: &str) -> Result<[u8; N]> {
    let mut buffer = [0; N];
    read_exact(reader, &mut buffer, what)?;
    Ok(buffer)
}

fn read_exact<R: Read>(reader: &mut R, buffer: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buffer).map_err(|error| {
        if error.kind() == ErrorKind::UnexpectedEof {
            Error::CorruptedStore(format!("Snapshot truncated while reading {what}"))
        } else {
            Error::Io(error)
        }
    })
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = i32::from_be_bytes(read_array(reader, what)?);
    usize::try_from(value)
        .map_err(|_negative| Error::CorruptedStore(format!("Negative {what}: {value}")))
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let value = i32::from_be_bytes(read_array(reader, what)?);
    u32::try_from(value).map_err(|_negative| Error::CorruptedStore(format!("Negative {what}: {value}")))
}

fn read_optional_utf<R: Read>(reader: &mut R, what: &str) -> Result<Option<String>> {
    let [present]: [u8; 1] = read_array(reader, what)?;
    if present == 0 {
        Ok(None)
    } else {
        read_utf(reader, what).map(Some)
    }
}

fn read_utf<R: Read>(reader: &mut R, what: &str) -> Result<String> {
    let length = u16::from_be_bytes(read_array(reader, what)?);
    let mut bytes = vec![0; usize::from(length)];
    read_exact(reader, &mut bytes, what)?;
    decode_modified_utf8(&bytes)
        .ok_or_else(|| Error::CorruptedStore(format!("Malformed modified UTF-8 in {what}")))
}

/// Encode UTF-16 code units the way `DataOutput::writeUTF` does
pub(crate) fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => bytes.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                bytes.push(0xC0 | (unit >> 6) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                bytes.push(0xE0 | (unit >> 12) as u8);
                bytes.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                bytes.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    bytes
}

/// Inverse of [`encode_modified_utf8`]; `None` on malformed input
pub(crate) fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        let first = bytes[index];
        if first & 0x80 == 0 {
            units.push(u16::from(first));
            index += 1;
        } else if first & 0xE0 == 0xC0 {
            let second = continuation(bytes, index + 1)?;
            units.push((u16::from(first & 0x1F) << 6) | u16::from(second & 0x3F));
            index += 2;
        } else if first & 0xF0 == 0xE0 {
            let second = continuation(bytes, index + 1)?;
            let third = continuation(bytes, index + 2)?;
            units.push(
                (u16::from(first & 0x0F) << 12)
                    | (u16::from(second & 0x3F) << 6)
                    | u16::from(third & 0x3F),
            );
            index += 3;
        } else {
            return None;
        }
    }

    String::from_utf16(&units).ok()
}

fn continuation(bytes: &[u8], index: usize) -> Option<u8> {
    bytes.get(index).copied().filter(|byte| byte & 0xC0 == 0x80)
}
