//! End-to-end store, query, persist and reload through the retrieval service.

use crate::support::{KeywordProvider, test_config};
use lore_context::{DocumentSource, MergeReport, RetrievalService};
use lore_core::{DocumentKind, MetadataFilter};
use std::fs;
use tempfile::TempDir;

fn service(temp: &TempDir) -> RetrievalService<KeywordProvider> {
    RetrievalService::with_provider(test_config(temp.path()), KeywordProvider).unwrap()
}

#[tokio::test]
async fn test_documents_and_memories_are_kept_apart() {
    let temp = TempDir::new().unwrap();
    let service = service(&temp);

    service
        .store_document(DocumentSource::Text("Iron golems defend villages.".into()))
        .await
        .unwrap();
    service
        .store_document(DocumentSource::Text("Farmers trade bread for emeralds.".into()))
        .await
        .unwrap();
    service
        .store_memory("Player: I saw a golem\nVillager: Stay safe", "owner-1", Some("steve"))
        .await
        .unwrap();

    let documents = service.query_documents("golem", 5).await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].document.content, "Iron golems defend villages.");
    assert!((documents[0].score - 1.0).abs() < 1e-6);

    let memories = service.query_memories("golem", "owner-1", 5).await.unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].document.metadata.kind, DocumentKind::Memory);
    assert_eq!(memories[0].document.metadata.counterpart_id.as_deref(), Some("steve"));

    assert!(service.query_memories("golem", "owner-2", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_hello_memory_for_owner() {
    let temp = TempDir::new().unwrap();
    let service = service(&temp);

    let stored = service
        .store_memory("Player: Hello\nVillager: Hi there", "owner-1", None)
        .await
        .unwrap();
    assert_eq!(stored, 1);

    let hits = service.query_memories("Hello", "owner-1", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.content, "Player: Hello\nVillager: Hi there");
    assert_eq!(hits[0].document.metadata.owner_id.as_deref(), Some("owner-1"));
}

#[tokio::test]
async fn test_short_exchange_is_recalled_for_its_owner() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(temp.path());
    config.chunking.first_speaker = "A".to_owned();
    config.chunking.second_speaker = "B".to_owned();
    let service = RetrievalService::with_provider(config, KeywordProvider).unwrap();

    let stored = service
        .store_memory("A: Hello\nB: Hi there", "owner-1", None)
        .await
        .unwrap();
    assert_eq!(stored, 1);

    let hits = service.query_memories("Hello", "owner-1", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.content, "A: Hello\nB: Hi there");
    assert_eq!(hits[0].document.metadata.kind, DocumentKind::Memory);
    assert_eq!(hits[0].document.metadata.owner_id.as_deref(), Some("owner-1"));
    assert!((hits[0].score - 1.0).abs() < 1e-6);

    assert!(service.query_memories("Hello", "owner-2", 5).await.unwrap().is_empty());
    assert!(service.query_documents("Hello", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_files_are_chunked_by_extension() {
    let temp = TempDir::new().unwrap();
    let service = service(&temp);

    let json_path = temp.path().join("trades.json");
    fs::write(
        &json_path,
        r#"{"trades":[{"item":"bread","cost":"1 emerald"},{"item":"golem spawn egg","cost":"none"}],"meta":{"v":1}}"#,
    )
    .unwrap();
    let text_path = temp.path().join("lore.txt");
    fs::write(&text_path, "The ender dragon sleeps in the End.").unwrap();

    let mut config = test_config(temp.path());
    config.chunking.chunk_size = 60;
    config.chunking.chunk_overlap = 8;
    let small = RetrievalService::with_provider(config, KeywordProvider).unwrap();

    assert_eq!(small.store_document(DocumentSource::Path(json_path)).await.unwrap(), 2);
    assert_eq!(service.store_document(DocumentSource::Path(text_path)).await.unwrap(), 1);

    let hits = small.query_documents("golem", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].document.content.contains("golem spawn egg"));
    assert!(!hits[0].document.content.contains("meta"));

    let dragon = service.query_documents("dragon", 5).await.unwrap();
    assert_eq!(dragon[0].document.content, "The ender dragon sleeps in the End.");
}

#[tokio::test]
async fn test_persisted_store_survives_restart() {
    let temp = TempDir::new().unwrap();
    {
        let service = service(&temp);
        service
            .store_document(DocumentSource::Text("Golems are made of iron.".into()))
            .await
            .unwrap();
        service
            .store_memory("Player: Hello\nVillager: Welcome", "owner-1", None)
            .await
            .unwrap();
        service.persist_all().await.unwrap();
    }

    let restarted = service(&temp);
    assert_eq!(restarted.count(None).await, 0);
    assert_eq!(restarted.load_all().await.unwrap(), 2);

    assert_eq!(restarted.query_documents("golem", 3).await.unwrap().len(), 1);
    assert_eq!(restarted.query_memories("hello", "owner-1", 3).await.unwrap().len(), 1);
    assert_eq!(restarted.count(Some(&MetadataFilter::memories())).await, 1);
}

#[tokio::test]
async fn test_seed_snapshot_is_merged_into_live_store() {
    let temp = TempDir::new().unwrap();

    // Build the seed with a service whose live store is the seed path
    let mut seed_config = test_config(temp.path());
    seed_config.storage.data_directory = temp.path().join("seed");
    seed_config.storage.store_file = "documents.store".to_owned();
    let seeder = RetrievalService::with_provider(seed_config, KeywordProvider).unwrap();
    seeder
        .store_document(DocumentSource::Text("Emeralds are the villager currency.".into()))
        .await
        .unwrap();
    seeder.persist_all().await.unwrap();

    let service = service(&temp);
    service
        .store_memory("Player: Hello\nVillager: Hi", "owner-1", None)
        .await
        .unwrap();

    let report = service.load_seed_data().await.unwrap();
    assert_eq!(report, MergeReport { added: 1, skipped: 0 });
    assert_eq!(service.count(None).await, 2);

    let again = service.load_seed_data().await.unwrap();
    assert_eq!(again, MergeReport { added: 0, skipped: 1 });

    let hits = service.query_documents("emerald", 1).await.unwrap();
    assert_eq!(hits[0].document.content, "Emeralds are the villager currency.");
}
