//! Entity embedding sources.
//!
//! The batch sampler only needs four things from a pretrained vector store:
//! membership, lookup, vocabulary size and positional access (for drawing
//! random filler entities). [`EmbeddingSource`] captures exactly that, so
//! fastText/word2vec/wikipedia2vec backends can live outside this crate.
//!
//! [`EmbeddingStore`] is the in-memory implementation used by tests and small
//! vocabularies. It reads the word2vec text format:
//!
//! ```text
//! 3 4
//! dog 0.1 0.2 0.3 0.4
//! cat 0.1 0.2 0.3 0.5
//! animal 0.0 0.0 0.1 0.1
//! ```

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::collections::HashMap;
use std::io::BufRead;

/// A store mapping entities to fixed-width vectors.
pub trait EmbeddingSource {
    /// Whether `entity` can be encoded.
    fn has_embedding(&self, entity: &str) -> bool;

    /// Vector for `entity`.
    fn embedding(&self, entity: &str) -> Result<Array1<f32>>;

    /// Number of entities in the vocabulary.
    fn vocabulary_size(&self) -> usize;

    /// Entity at a vocabulary position, `None` when out of range.
    fn entity_at_index(&self, index: usize) -> Option<&str>;

    /// Vector width.
    fn dim(&self) -> usize;
}

/// In-memory embedding table with a stable vocabulary order.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    entities: Vec<String>,
    index: HashMap<String, usize>,
    vectors: Array2<f32>,
}

impl EmbeddingStore {
    /// Empty store of width `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            entities: Vec::new(),
            index: HashMap::new(),
            vectors: Array2::zeros((0, dim)),
        }
    }

    /// Build from an entity list and a row-aligned matrix.
    ///
    /// Duplicate entity names keep the last row.
    pub fn from_rows(entities: Vec<String>, vectors: Array2<f32>) -> Result<Self> {
        if entities.len() != vectors.nrows() {
            return Err(Error::DimensionMismatch {
                expected: entities.len(),
                got: vectors.nrows(),
            });
        }
        let mut store = Self::new(vectors.ncols());
        for (entity, row) in entities.into_iter().zip(vectors.axis_iter(Axis(0))) {
            store.insert_view(entity, row)?;
        }
        Ok(store)
    }

    /// Add or replace one entity.
    pub fn insert(&mut self, entity: impl Into<String>, vector: &[f32]) -> Result<()> {
        self.insert_view(entity.into(), ArrayView1::from(vector))
    }

    fn insert_view(&mut self, entity: String, row: ArrayView1<'_, f32>) -> Result<()> {
        let dim = self.vectors.ncols();
        if row.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                got: row.len(),
            });
        }
        if let Some(&idx) = self.index.get(&entity) {
            self.vectors.row_mut(idx).assign(&row);
            return Ok(());
        }
        self.vectors
            .push_row(row)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        self.index.insert(entity.clone(), self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    /// Parse the word2vec text format.
    ///
    /// The `count dim` header is optional; without it the width of the first
    /// vector line fixes the dimension.
    pub fn from_word2vec_text<R: BufRead>(reader: R) -> Result<Self> {
        let mut store: Option<Self> = None;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(head) = parts.next() else {
                continue;
            };
            let rest: Vec<&str> = parts.collect();

            // header: "<count> <dim>"
            if store.is_none() && rest.len() == 1 && head.parse::<usize>().is_ok() {
                let dim = rest[0].parse::<usize>().map_err(|e| Error::Parse {
                    line: lineno + 1,
                    message: format!("bad dimension in header: {e}"),
                })?;
                store = Some(Self::new(dim));
                continue;
            }

            let vector = rest
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| Error::Parse {
                    line: lineno + 1,
                    message: e.to_string(),
                })?;

            let store = store.get_or_insert_with(|| Self::new(vector.len()));
            store.insert(head, &vector)?;
        }

        Ok(store.unwrap_or_else(|| Self::new(0)))
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Vocabulary in insertion order.
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    /// Borrowed row for `entity`.
    pub fn view(&self, entity: &str) -> Option<ArrayView1<'_, f32>> {
        self.index.get(entity).map(|&i| self.vectors.row(i))
    }
}

impl EmbeddingSource for EmbeddingStore {
    fn has_embedding(&self, entity: &str) -> bool {
        self.index.contains_key(entity)
    }

    fn embedding(&self, entity: &str) -> Result<Array1<f32>> {
        self.view(entity)
            .map(|row| row.to_owned())
            .ok_or_else(|| Error::EntityNotFound(entity.to_string()))
    }

    fn vocabulary_size(&self) -> usize {
        self.entities.len()
    }

    fn entity_at_index(&self, index: usize) -> Option<&str> {
        self.entities.get(index).map(String::as_str)
    }

    fn dim(&self) -> usize {
        self.vectors.ncols()
    }
}
