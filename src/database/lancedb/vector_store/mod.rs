#[cfg(test)]
mod tests;

use super::{ChunkMetadata, EmbeddingRecord};
use crate::{QaError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TABLE_NAME: &str = "embeddings";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    table_name: String,
    /// Dimension the next rebuild writes
    configured_dimension: usize,
    /// Dimension of the vectors currently on disk
    stored_dimension: usize,
}

/// A stored chunk together with its distance from the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    pub similarity_score: f32,
    /// Cosine distance, smaller is closer
    pub distance: f32,
}

fn db_error(context: &str) -> impl FnOnce(lancedb::Error) -> QaError + '_ {
    move |e| QaError::Database(format!("{}: {}", context, e))
}

impl VectorStore {
    /// Open the store under the configured base directory
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, QaError> {
        Self::open(
            &config.vector_database_path(),
            config.ollama.embedding_dimension as usize,
        )
        .await
    }

    /// Open (or create) the store at `path` for vectors of `dimension` components
    #[inline]
    pub async fn open(path: &Path, dimension: usize) -> Result<Self, QaError> {
        if dimension == 0 {
            return Err(QaError::Database(
                "Vector dimension must be greater than zero".to_string(),
            ));
        }

        debug!("Initializing LanceDB at path: {}", path.display());

        std::fs::create_dir_all(path).map_err(|e| {
            QaError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        // lancedb takes plain paths; relative ones must not be read as URL hosts
        let path = path.canonicalize().map_err(|e| {
            QaError::Database(format!(
                "Failed to resolve vector database path {}: {}",
                path.display(),
                e
            ))
        })?;
        let uri = path.to_str().ok_or_else(|| {
            QaError::Database(format!(
                "Vector database path is not valid UTF-8: {}",
                path.display()
            ))
        })?;
        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(db_error("Failed to connect to LanceDB"))?;

        let mut store = Self {
            connection,
            path: path.clone(),
            table_name: TABLE_NAME.to_string(),
            configured_dimension: dimension,
            stored_dimension: dimension,
        };

        store.initialize_table().await?;

        info!("Vector store opened at {}", path.display());
        Ok(store)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dimension of the vectors currently stored
    #[inline]
    pub fn dimension(&self) -> usize {
        self.stored_dimension
    }

    async fn initialize_table(&mut self) -> Result<(), QaError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(db_error("Failed to list tables"))?;

        if table_names.contains(&self.table_name) {
            let existing = self.detect_existing_vector_dimension().await?;
            if existing != self.configured_dimension {
                warn!(
                    "Stored vectors have {} dimensions but {} are configured; re-run ingest to rebuild the index",
                    existing, self.configured_dimension
                );
            }
            self.stored_dimension = existing;
            return Ok(());
        }

        self.create_empty_table(self.configured_dimension).await?;
        self.stored_dimension = self.configured_dimension;
        info!(
            "Embeddings table created with {} dimensions",
            self.configured_dimension
        );
        Ok(())
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize, QaError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(db_error("Failed to open existing table"))?;

        let schema = table
            .schema()
            .await
            .map_err(db_error("Failed to get table schema"))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                QaError::Database("Could not find vector column or determine dimension".to_string())
            })
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("source_file", DataType::Utf8, false),
            Field::new("page_number", DataType::UInt32, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn create_empty_table(&self, vector_dim: usize) -> Result<(), QaError> {
        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
            .execute()
            .await
            .map_err(db_error("Failed to create table"))?;
        Ok(())
    }

    async fn drop_table_if_exists(&self) -> Result<(), QaError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(db_error("Failed to list tables for drop"))?;

        if table_names.contains(&self.table_name) {
            debug!("Dropping existing embeddings table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(db_error("Failed to drop table"))?;
        }

        Ok(())
    }

    /// Replace the whole index with `records`
    ///
    /// Every record must match the configured dimension, and the Arrow batch is
    /// built before the old table is dropped. Nothing on disk is touched when
    /// either step fails. A failure while writing the new table leaves the
    /// index empty or partial; re-run ingestion to recover.
    #[inline]
    pub async fn rebuild(&mut self, records: Vec<EmbeddingRecord>) -> Result<usize, QaError> {
        let vector_dim = self.configured_dimension;

        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(QaError::Database(format!(
                "Embedding {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                vector_dim
            )));
        }

        let record_batch = if records.is_empty() {
            None
        } else {
            Some(Self::create_record_batch(&records, vector_dim)?)
        };

        info!("Rebuilding vector index with {} records", records.len());

        self.drop_table_if_exists().await?;
        self.create_empty_table(vector_dim).await?;
        self.stored_dimension = vector_dim;

        let Some(record_batch) = record_batch else {
            info!("Vector index is empty");
            return Ok(0);
        };

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(db_error("Failed to open table"))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(db_error("Failed to insert embeddings"))?;

        info!("Stored {} embeddings", records.len());
        Ok(records.len())
    }

    fn create_record_batch(
        records: &[EmbeddingRecord],
        vector_dim: usize,
    ) -> Result<RecordBatch, QaError> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut source_files = Vec::with_capacity(len);
        let mut page_numbers = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            source_files.push(record.metadata.source_file.as_str());
            page_numbers.push(record.metadata.page_number);
            chunk_indices.push(record.metadata.chunk_index);
            contents.push(record.metadata.content.as_str());
            created_ats.push(record.metadata.created_at.as_str());
        }

        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            vector_dim as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| QaError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(source_files)),
            Arc::new(UInt32Array::from(page_numbers)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| QaError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Return up to `limit` stored chunks closest to `query_vector` by cosine distance,
    /// nearest first
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, QaError> {
        if query_vector.len() != self.stored_dimension {
            return Err(QaError::Database(format!(
                "Query vector has {} dimensions but the index holds {}-dimensional vectors",
                query_vector.len(),
                self.stored_dimension
            )));
        }

        if limit == 0 || self.count_embeddings().await? == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(db_error("Failed to open table"))?;

        let results = table
            .vector_search(query_vector)
            .map_err(db_error("Failed to create vector search"))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(db_error("Failed to execute search"))?;

        let mut search_results = Self::parse_search_results_stream(results).await?;
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(search_results)
    }

    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, QaError> {
        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(db_error("Failed to read result stream"))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, QaError> {
        batch
            .column_by_name(name)
            .ok_or_else(|| QaError::Database(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| QaError::Database(format!("Invalid {} column type", name)))
    }

    fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array, QaError> {
        batch
            .column_by_name(name)
            .ok_or_else(|| QaError::Database(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| QaError::Database(format!("Invalid {} column type", name)))
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, QaError> {
        let source_files = Self::string_column(batch, "source_file")?;
        let page_numbers = Self::u32_column(batch, "page_number")?;
        let chunk_indices = Self::u32_column(batch, "chunk_index")?;
        let contents = Self::string_column(batch, "content")?;
        let created_ats = Self::string_column(batch, "created_at")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let results = (0..batch.num_rows())
            .map(|row| {
                let distance =
                    distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

                SearchResult {
                    chunk_metadata: ChunkMetadata {
                        source_file: source_files.value(row).to_string(),
                        page_number: page_numbers.value(row),
                        chunk_index: chunk_indices.value(row),
                        content: contents.value(row).to_string(),
                        created_at: created_ats.value(row).to_string(),
                    },
                    similarity_score: 1.0 - distance,
                    distance,
                }
            })
            .collect();

        Ok(results)
    }

    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64, QaError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(db_error("Failed to open table"))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(db_error("Failed to count rows"))?;

        Ok(count as u64)
    }

    /// Number of distinct PDFs represented in the index
    #[inline]
    pub async fn count_source_files(&self) -> Result<usize, QaError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(db_error("Failed to open table"))?;

        let mut batches = table
            .query()
            .select(lancedb::query::Select::columns(&["source_file"]))
            .execute()
            .await
            .map_err(db_error("Failed to scan table"))?;

        let mut sources = std::collections::HashSet::new();
        while let Some(batch) = batches
            .try_next()
            .await
            .map_err(db_error("Failed to read scan stream"))?
        {
            let column = Self::string_column(&batch, "source_file")?;
            for row in 0..column.len() {
                sources.insert(column.value(row).to_string());
            }
        }

        Ok(sources.len())
    }
}
