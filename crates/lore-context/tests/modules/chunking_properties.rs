//! Behaviour shared by every chunker.

use lore_context::{Chunker, ContentFormat};
use lore_core::{ChunkingConfig, Error};

fn chunker(format: ContentFormat, chunk_size: usize) -> Chunker {
    let config = ChunkingConfig {
        chunk_size,
        chunk_overlap: chunk_size / 8,
        ..ChunkingConfig::default()
    };
    Chunker::for_format(format, &config)
}

#[test]
fn test_content_within_limit_is_returned_trimmed() {
    for format in [ContentFormat::Text, ContentFormat::Conversation] {
        let chunks = chunker(format, 512).chunk("\n  Player: Hi\nVillager: Hello  \n").unwrap();
        assert_eq!(chunks, vec!["Player: Hi\nVillager: Hello".to_owned()]);
    }
}

#[test]
fn test_no_chunker_emits_empty_chunks() {
    let prose = "Villagers sleep at night.   \n\n\n   Golems do not. ".repeat(20);
    let transcript = "Player: Where is the smith?\n\nVillager: By the well.\n   \n".repeat(15);
    let json = format!("[{}]", [r#"{"item":"bread","price":3}"#; 30].join(","));

    let cases = [
        (ContentFormat::Text, prose),
        (ContentFormat::Conversation, transcript),
        (ContentFormat::Json, json),
    ];
    for (format, content) in cases {
        let chunks = chunker(format, 64).chunk(&content).unwrap();
        assert!(chunks.len() > 1, "{format:?} should split");
        for chunk in &chunks {
            assert!(!chunk.trim().is_empty(), "{format:?} produced an empty chunk");
        }
    }

    for format in [ContentFormat::Text, ContentFormat::Conversation] {
        assert!(chunker(format, 64).chunk(" \n\t ").unwrap().is_empty());
    }
}

#[test]
fn test_conversation_chunks_carry_both_speakers() {
    let transcript = (1..=12)
        .map(|turn| format!("Player: Question number {turn}?\nVillager: Answer number {turn}."))
        .collect::<Vec<_>>()
        .join("\n");

    let chunks = chunker(ContentFormat::Conversation, 120).chunk(&transcript).unwrap();
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.contains("Player:") && chunk.contains("Villager:"), "{chunk}");
    }
}

#[test]
fn test_json_chunks_skip_unselected_siblings() {
    let content = r#"{"recipes":[{"name":"a","inputs":[1,2]},{"name":"b","inputs":[3,4]}],"meta":{"version":1}}"#;
    let chunks = chunker(ContentFormat::Json, 60).chunk(content).unwrap();

    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|chunk| !chunk.contains("\"meta\"")));
    assert!(chunks.iter().any(|chunk| chunk.contains("\"name\"")));
}

#[test]
fn test_malformed_json_is_invalid_content() {
    let result = chunker(ContentFormat::Json, 60).chunk(r#"{"recipes": [}"#);
    assert!(matches!(result, Err(Error::InvalidContent(_))));
}
