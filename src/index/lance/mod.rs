
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{CorpusEntry, CorpusIndex, RetrievalResult, check_parallel};
use crate::embeddings::Embedding;
use crate::{LoreError, Result};

/// Corpus index persisted in a LanceDB table
pub struct LanceIndex {
    connection: Connection,
    table_name: String,
    // merge_insert commits race each other; one writer at a time per process
    write_lock: Mutex<()>,
}

fn db_error(context: &str) -> impl FnOnce(lancedb::Error) -> LoreError + '_ {
    move |e| LoreError::Index(format!("{}: {}", context, e))
}

impl LanceIndex {
    /// Connect to (or create) the database directory at `db_path`
    #[inline]
    pub async fn open(db_path: PathBuf, table_name: &str) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(&db_path).map_err(|e| {
            LoreError::Index(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(db_error("Failed to connect to LanceDB"))?;

        info!("Vector index opened at {}", db_path.display());
        Ok(Self {
            connection,
            table_name: table_name.to_string(),
            write_lock: Mutex::new(()),
        })
    }

    /// The table is created lazily on the first upsert, once the dimension is known
    async fn open_existing(&self) -> Result<Option<Table>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(db_error("Failed to list tables"))?;

        if !table_names.contains(&self.table_name) {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(db_error("Failed to open table"))?;
        Ok(Some(table))
    }

    async fn vector_dimension(table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(db_error("Failed to get table schema"))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(LoreError::Index(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("title", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("tags", DataType::Utf8, false),
            Field::new("updated_at", DataType::Utf8, false),
        ]))
    }

    fn create_record_batch(
        entries: &[&CorpusEntry],
        vectors: &[&Embedding],
        vector_dim: usize,
    ) -> Result<RecordBatch> {
        let schema = Self::create_schema(vector_dim);
        let updated_at = chrono::Utc::now().to_rfc3339();

        let mut flat_values = Vec::with_capacity(vectors.len() * vector_dim);
        for vector in vectors {
            flat_values.extend_from_slice(vector);
        }
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            vector_dim as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| LoreError::Index(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| &e.id))),
            Arc::new(vector_array),
            Arc::new(StringArray::from_iter_values(
                entries.iter().map(|e| &e.title),
            )),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| &e.text))),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| &e.tags))),
            Arc::new(StringArray::from_iter_values(
                entries.iter().map(|_| updated_at.as_str()),
            )),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| LoreError::Index(format!("Failed to create record batch: {}", e)))
    }

    fn parse_batch(batch: &RecordBatch) -> Result<Vec<RetrievalResult>> {
        let titles = string_column(batch, "title")?;
        let texts = string_column(batch, "text")?;
        let tags = string_column(batch, "tags")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| LoreError::Index("Missing _distance column".to_string()))?;

        Ok((0..batch.num_rows())
            .map(|row| RetrievalResult {
                title: titles.value(row).to_string(),
                tags: tags.value(row).to_string(),
                text: texts.value(row).to_string(),
                distance: distances.value(row),
            })
            .collect())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| LoreError::Index(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| LoreError::Index(format!("Invalid {} column type", name)))
}

/// Keep only the last occurrence of each id, in first-seen order
fn last_write_wins<'a>(
    entries: &'a [CorpusEntry],
    vectors: &'a [Embedding],
) -> (Vec<&'a CorpusEntry>, Vec<&'a Embedding>) {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut kept: Vec<(&CorpusEntry, &Embedding)> = Vec::with_capacity(entries.len());

    for (entry, vector) in entries.iter().zip(vectors) {
        match slots.get(entry.id.as_str()) {
            Some(&slot) => kept[slot] = (entry, vector),
            None => {
                slots.insert(entry.id.as_str(), kept.len());
                kept.push((entry, vector));
            }
        }
    }

    kept.into_iter().unzip()
}

#[async_trait]
impl CorpusIndex for LanceIndex {
    #[inline]
    async fn upsert(&self, entries: &[CorpusEntry], vectors: &[Embedding]) -> Result<()> {
        check_parallel(entries, vectors)?;
        if entries.is_empty() {
            debug!("No entries to upsert");
            return Ok(());
        }

        let vector_dim = vectors[0].len();
        if let Some(bad) = vectors.iter().find(|v| v.len() != vector_dim) {
            return Err(LoreError::Index(format!(
                "Inconsistent vector dimensions in batch: {} vs {}",
                vector_dim,
                bad.len()
            )));
        }

        let _guard = self.write_lock.lock().await;

        let table = match self.open_existing().await? {
            Some(table) => {
                let existing = Self::vector_dimension(&table).await?;
                if existing != vector_dim {
                    return Err(LoreError::Index(format!(
                        "Vector dimension {} does not match index dimension {}",
                        vector_dim, existing
                    )));
                }
                table
            }
            None => {
                info!(
                    "Creating table {} with {} dimensions",
                    self.table_name, vector_dim
                );
                self.connection
                    .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
                    .execute()
                    .await
                    .map_err(db_error("Failed to create table"))?
            }
        };

        let (entries, vectors) = last_write_wins(entries, vectors);
        let record_batch = Self::create_record_batch(&entries, &vectors, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(db_error("Failed to upsert entries"))?;

        info!("Upserted {} entries", entries.len());
        Ok(())
    }

    #[inline]
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let Some(table) = self.open_existing().await? else {
            debug!("Table {} does not exist yet, no matches", self.table_name);
            return Ok(Vec::new());
        };

        let dimension = Self::vector_dimension(&table).await?;
        if dimension != vector.len() {
            return Err(LoreError::Index(format!(
                "Query dimension {} does not match index dimension {}",
                vector.len(),
                dimension
            )));
        }

        debug!("Searching for similar vectors with limit: {}", top_k);

        let mut stream = table
            .vector_search(vector)
            .map_err(db_error("Failed to create vector search"))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .select(Select::columns(&["title", "text", "tags"]))
            .limit(top_k)
            .execute()
            .await
            .map_err(db_error("Failed to execute search"))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(db_error("Failed to read result stream"))?
        {
            results.extend(Self::parse_batch(&batch)?);
        }

        // Batches are ordered individually; make the whole list ascending
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(top_k);

        debug!("Found {} neighbours", results.len());
        Ok(results)
    }

    #[inline]
    async fn count(&self) -> Result<usize> {
        let Some(table) = self.open_existing().await? else {
            return Ok(0);
        };

        table
            .count_rows(None)
            .await
            .map_err(db_error("Failed to count rows"))
    }
}
