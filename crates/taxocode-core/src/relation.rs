//! Knowledge-base relation sources.

use crate::error::{Error, Result};
use crate::filter::RecordFilter;
use crate::record::HyponymyRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

/// Which taxonomy oracle a relation source supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonomyKind {
    /// Generic DAG built from direct edges.
    #[default]
    Basic,
    /// Synset graph with native hierarchy queries.
    WordNet,
}

impl FromStr for TaxonomyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "wordnet" => Ok(Self::WordNet),
            other => Err(Error::UnsupportedTaxonomy(other.to_string())),
        }
    }
}

impl fmt::Display for TaxonomyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => f.write_str("basic"),
            Self::WordNet => f.write_str("wordnet"),
        }
    }
}

/// Random-access source of hyponymy records.
pub trait RelationSource {
    /// Number of records.
    fn total_size(&self) -> usize;

    /// Records in `start..end`, clamped to the available range.
    fn slice(&self, start: usize, end: usize) -> Vec<HyponymyRecord>;

    /// Taxonomy flavour of the underlying knowledge base.
    fn taxonomy_kind(&self) -> TaxonomyKind {
        TaxonomyKind::Basic
    }
}

/// In-memory list of hyponymy records.
#[derive(Debug, Clone, Default)]
pub struct HyponymyDataset {
    records: Vec<HyponymyRecord>,
    kind: TaxonomyKind,
}

impl HyponymyDataset {
    pub fn new(records: Vec<HyponymyRecord>) -> Self {
        Self {
            records,
            kind: TaxonomyKind::Basic,
        }
    }

    /// From `(hyponym, hypernym, distance)` tuples.
    pub fn from_tuples<'a>(tuples: impl IntoIterator<Item = (&'a str, &'a str, f32)>) -> Self {
        Self::new(
            tuples
                .into_iter()
                .map(|(hypo, hyper, d)| HyponymyRecord::new(hypo, hyper, d))
                .collect(),
        )
    }

    /// Parse `hyponym<TAB>hypernym<TAB>distance` lines.
    ///
    /// Blank lines and `#` comments are skipped.
    pub fn from_tsv<R: BufRead>(reader: R) -> Result<Self> {
        let mut records = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 3 {
                return Err(Error::Parse {
                    line: lineno + 1,
                    message: format!("expected 3 tab-separated fields, got {}", fields.len()),
                });
            }
            let distance = fields[2].trim().parse::<f32>().map_err(|e| Error::Parse {
                line: lineno + 1,
                message: e.to_string(),
            })?;
            records.push(HyponymyRecord::new(fields[0].trim(), fields[1].trim(), distance));
        }
        Ok(Self::new(records))
    }

    pub fn with_kind(mut self, kind: TaxonomyKind) -> Self {
        self.kind = kind;
        self
    }

    /// Drop records the filter rejects.
    pub fn with_filter(mut self, filter: &RecordFilter) -> Self {
        self.records.retain(|r| filter.accepts(r));
        self
    }

    pub fn records(&self) -> &[HyponymyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RelationSource for HyponymyDataset {
    fn total_size(&self) -> usize {
        self.records.len()
    }

    fn slice(&self, start: usize, end: usize) -> Vec<HyponymyRecord> {
        let end = end.min(self.records.len());
        if start >= end {
            return Vec::new();
        }
        self.records[start..end].to_vec()
    }

    fn taxonomy_kind(&self) -> TaxonomyKind {
        self.kind
    }
}
