use super::*;

#[test]
fn record_from_chunk_keeps_citation_metadata() {
    let chunk = DocumentChunk {
        text: "Heat shield performed nominally".to_string(),
        source_file: "pdfs/reentry.pdf".to_string(),
        page_number: 12,
        chunk_index: 2,
    };

    let record = EmbeddingRecord::from_chunk(&chunk, vec![0.1, 0.2], "2024-01-01T00:00:00Z");

    assert_eq!(record.vector, vec![0.1, 0.2]);
    assert_eq!(record.metadata.source_file, "pdfs/reentry.pdf");
    assert_eq!(record.metadata.page_number, 12);
    assert_eq!(record.metadata.chunk_index, 2);
    assert_eq!(record.metadata.content, "Heat shield performed nominally");
    assert_eq!(record.metadata.created_at, "2024-01-01T00:00:00Z");
    assert!(uuid::Uuid::parse_str(&record.id).is_ok());
}

#[test]
fn records_get_distinct_ids() {
    let chunk = DocumentChunk {
        text: "text".to_string(),
        source_file: "a.pdf".to_string(),
        page_number: 1,
        chunk_index: 0,
    };

    let first = EmbeddingRecord::from_chunk(&chunk, vec![1.0], "now");
    let second = EmbeddingRecord::from_chunk(&chunk, vec![1.0], "now");
    assert_ne!(first.id, second.id);
}
