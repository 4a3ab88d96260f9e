use super::*;
use tempfile::TempDir;

const DIM: usize = 4;

fn record(source: &str, page: u32, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        id: format!("{}-{}", source, page),
        vector,
        metadata: ChunkMetadata {
            source_file: source.to_string(),
            page_number: page,
            chunk_index: 0,
            content: format!("Content of {} page {}", source, page),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

fn sample_records() -> Vec<EmbeddingRecord> {
    vec![
        record("pdfs/propulsion.pdf", 1, vec![1.0, 0.0, 0.0, 0.0]),
        record("pdfs/propulsion.pdf", 2, vec![0.9, 0.1, 0.0, 0.0]),
        record("pdfs/habitat.pdf", 1, vec![0.0, 1.0, 0.0, 0.0]),
        record("pdfs/comms.pdf", 4, vec![0.0, 0.0, 0.0, 1.0]),
    ]
}

async fn open_store(temp_dir: &TempDir) -> VectorStore {
    VectorStore::open(&temp_dir.path().join("vectors"), DIM)
        .await
        .expect("store should open")
}

#[tokio::test]
async fn new_store_is_empty() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = open_store(&temp_dir).await;

    assert_eq!(store.count_embeddings().await.expect("count"), 0);
    assert_eq!(store.dimension(), DIM);
    assert_eq!(store.table_name, "embeddings");
}

#[tokio::test]
async fn zero_dimension_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let result = VectorStore::open(&temp_dir.path().join("vectors"), 0).await;
    assert!(matches!(result, Err(QaError::Database(_))));
}

#[tokio::test]
async fn search_on_empty_store_returns_nothing() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = open_store(&temp_dir).await;

    let results = store
        .search_similar(&[1.0, 0.0, 0.0, 0.0], 5)
        .await
        .expect("search should succeed");
    assert!(results.is_empty());
}

#[tokio::test]
async fn search_returns_nearest_first() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_store(&temp_dir).await;
    store.rebuild(sample_records()).await.expect("rebuild");

    let results = store
        .search_similar(&[1.0, 0.05, 0.0, 0.0], 2)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 2);
    assert!(
        results
            .iter()
            .all(|r| r.chunk_metadata.source_file == "pdfs/propulsion.pdf")
    );
    assert!(results[0].distance <= results[1].distance);
    assert!(results[0].similarity_score > 0.9);
}

#[tokio::test]
async fn search_limit_larger_than_store() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_store(&temp_dir).await;
    store.rebuild(sample_records()).await.expect("rebuild");

    let results = store
        .search_similar(&[0.0, 0.0, 0.0, 1.0], 50)
        .await
        .expect("search should succeed");

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].chunk_metadata.source_file, "pdfs/comms.pdf");
    assert_eq!(results[0].chunk_metadata.page_number, 4);
    assert_eq!(results[0].chunk_metadata.content, "Content of pdfs/comms.pdf page 4");
}

#[tokio::test]
async fn rebuild_replaces_previous_contents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_store(&temp_dir).await;
    store.rebuild(sample_records()).await.expect("first rebuild");

    let stored = store
        .rebuild(vec![record("pdfs/new.pdf", 7, vec![0.0, 0.0, 1.0, 0.0])])
        .await
        .expect("second rebuild");

    assert_eq!(stored, 1);
    assert_eq!(store.count_embeddings().await.expect("count"), 1);
    assert_eq!(store.count_source_files().await.expect("sources"), 1);

    let results = store
        .search_similar(&[1.0, 0.0, 0.0, 0.0], 10)
        .await
        .expect("search should succeed");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_metadata.source_file, "pdfs/new.pdf");
}

#[tokio::test]
async fn rebuild_with_nothing_empties_store() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_store(&temp_dir).await;
    store.rebuild(sample_records()).await.expect("rebuild");

    assert_eq!(store.rebuild(Vec::new()).await.expect("empty rebuild"), 0);
    assert_eq!(store.count_embeddings().await.expect("count"), 0);
}

#[tokio::test]
async fn rebuild_rejects_wrong_dimension_without_touching_store() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = open_store(&temp_dir).await;
    store.rebuild(sample_records()).await.expect("rebuild");

    let result = store
        .rebuild(vec![record("pdfs/bad.pdf", 1, vec![1.0, 0.0])])
        .await;

    assert!(matches!(result, Err(QaError::Database(_))));
    assert_eq!(store.count_embeddings().await.expect("count"), 4);
}

#[tokio::test]
async fn query_with_wrong_dimension_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = open_store(&temp_dir).await;

    let result = store.search_similar(&[1.0, 0.0], 3).await;
    assert!(matches!(result, Err(QaError::Database(_))));
}

#[tokio::test]
async fn contents_survive_reopen() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_store(&temp_dir).await;
        store.rebuild(sample_records()).await.expect("rebuild");
    }

    let store = open_store(&temp_dir).await;
    assert_eq!(store.count_embeddings().await.expect("count"), 4);
    assert_eq!(store.count_source_files().await.expect("sources"), 3);
}

#[tokio::test]
async fn reopen_with_other_dimension_reports_stored_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    {
        let mut store = open_store(&temp_dir).await;
        store.rebuild(sample_records()).await.expect("rebuild");
    }

    let store = VectorStore::open(&temp_dir.path().join("vectors"), 8)
        .await
        .expect("store should open");
    assert_eq!(store.dimension(), DIM);
}

/// Restores the process working directory when dropped
struct CurrentDirGuard(PathBuf);

impl Drop for CurrentDirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

#[tokio::test]
#[serial_test::serial]
async fn relative_path_is_resolved_against_current_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let _guard = CurrentDirGuard(std::env::current_dir().expect("current dir"));
    std::env::set_current_dir(temp_dir.path()).expect("should enter temp dir");

    let mut store = VectorStore::open(Path::new("data/vectors"), DIM)
        .await
        .expect("store should open");
    store
        .rebuild(sample_records())
        .await
        .expect("rebuild should succeed");

    let expected = temp_dir
        .path()
        .canonicalize()
        .expect("canonical temp dir")
        .join("data")
        .join("vectors");
    assert_eq!(store.path(), expected.as_path());
    assert!(expected.join("embeddings.lance").is_dir());
    assert_eq!(store.count_embeddings().await.expect("count"), 4);
}

#[tokio::test]
async fn path_with_space_and_hash_is_used_verbatim() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let dir = temp_dir.path().join("mission #2 reports").join("vectors");

    let mut store = VectorStore::open(&dir, DIM).await.expect("store should open");
    store
        .rebuild(sample_records())
        .await
        .expect("rebuild should succeed");

    assert!(dir.join("embeddings.lance").is_dir());
    assert_eq!(store.count_embeddings().await.expect("count"), 4);
}
