//! Snapshots must stay byte-compatible with files produced by the JVM tooling.

use lore_context::{MergeReport, VectorIndex, inspect_snapshot};
use lore_core::{DocumentKind, Error};
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

fn push_utf(bytes: &mut Vec<u8>, encoded: &[u8]) {
    bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
    bytes.extend_from_slice(encoded);
}

/// One memory chunk laid out exactly as `DataOutputStream` writes it
fn jvm_snapshot() -> Vec<u8> {
    let mut bytes = Vec::default();
    bytes.extend_from_slice(&1i32.to_be_bytes());
    push_utf(&mut bytes, b"seed-1");
    // "Café" followed by NUL, in modified UTF-8
    push_utf(&mut bytes, &[b'C', b'a', b'f', 0xC3, 0xA9, 0xC0, 0x80]);
    bytes.extend_from_slice(&2i32.to_be_bytes());
    bytes.extend_from_slice(&0.5f32.to_be_bytes());
    bytes.extend_from_slice(&(-0.25f32).to_be_bytes());
    push_utf(&mut bytes, b"memory");
    bytes.push(1);
    push_utf(&mut bytes, b"owner-1");
    bytes.push(0);
    bytes.extend_from_slice(&1_234i64.to_be_bytes());
    bytes.extend_from_slice(&0i32.to_be_bytes());
    bytes.extend_from_slice(&1i32.to_be_bytes());
    bytes
}

#[test]
fn test_jvm_snapshot_loads_and_reencodes_identically() {
    let bytes = jvm_snapshot();
    let mut index = VectorIndex::new(2);

    let report = index.load_from_reader(Cursor::new(bytes.clone())).unwrap();
    assert_eq!(report, MergeReport { added: 1, skipped: 0 });

    let document = index.get("seed-1").unwrap();
    assert_eq!(document.content, "Café\0");
    assert_eq!(document.embedding, vec![0.5, -0.25]);
    assert_eq!(document.metadata.kind, DocumentKind::Memory);
    assert_eq!(document.metadata.owner_id.as_deref(), Some("owner-1"));
    assert_eq!(document.metadata.counterpart_id, None);
    assert_eq!(document.metadata.timestamp, 1_234);
    assert_eq!((document.metadata.chunk_index, document.metadata.chunk_total), (0, 1));

    assert_eq!(index.to_snapshot_bytes().unwrap(), bytes);
}

#[test]
fn test_truncated_file_fails_to_load_but_can_be_inspected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("documents.store");

    let mut bytes = jvm_snapshot();
    bytes[3] = 2; // declare a second document that never follows
    fs::write(&path, &bytes).unwrap();

    let mut index = VectorIndex::new(2);
    assert!(matches!(index.load(&path), Err(Error::CorruptedStore(_))));
    assert!(index.is_empty());

    let inspection = inspect_snapshot(&path).unwrap();
    assert_eq!(inspection.declared, 2);
    assert_eq!(inspection.documents.len(), 1);
    assert_eq!(inspection.documents[0].id, "seed-1");
    assert!(!inspection.is_complete());
}

#[test]
fn test_persisted_file_replaces_previous_snapshot() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("vectorstore/vectors.store");

    let mut index = VectorIndex::new(2);
    index.load_from_reader(Cursor::new(jvm_snapshot())).unwrap();
    index.persist(&path).unwrap();
    assert_eq!(fs::read(&path).unwrap(), jvm_snapshot());

    index.clear();
    index.persist(&path).unwrap();
    assert_eq!(fs::read(&path).unwrap(), vec![0, 0, 0, 0]);

    let leftovers = fs::read_dir(temp.path().join("vectorstore")).unwrap().count();
    assert_eq!(leftovers, 1, "Temporary files must not be left behind");
}
