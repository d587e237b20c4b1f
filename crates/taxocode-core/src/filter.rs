//! Field-based include/exclude filtering of hyponymy records.

use crate::error::{Error, Result};
use crate::record::HyponymyRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Record field a filter rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordField {
    Hyponym,
    Hypernym,
}

impl RecordField {
    fn value<'a>(&self, record: &'a HyponymyRecord) -> &'a str {
        match self {
            Self::Hyponym => &record.hyponym,
            Self::Hypernym => &record.hypernym,
        }
    }
}

/// Values per field.
pub type FieldValues = HashMap<RecordField, HashSet<String>>;

#[derive(Debug, Clone)]
enum Mode {
    Include(FieldValues),
    Exclude(FieldValues),
}

/// Keeps or drops records depending on whether a field value is listed.
///
/// Include mode keeps a record if *any* listed field matches; exclude mode
/// drops it if any listed field matches.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    mode: Mode,
}

impl RecordFilter {
    /// Exactly one of `includes` / `excludes` must be given.
    pub fn new(includes: Option<FieldValues>, excludes: Option<FieldValues>) -> Result<Self> {
        match (includes, excludes) {
            (Some(inc), None) => Ok(Self { mode: Mode::Include(inc) }),
            (None, Some(exc)) => Ok(Self { mode: Mode::Exclude(exc) }),
            (Some(_), Some(_)) => Err(Error::FilterConfig(
                "`includes` and `excludes` cannot be specified at the same time".into(),
            )),
            (None, None) => Err(Error::FilterConfig(
                "either `includes` or `excludes` must be specified".into(),
            )),
        }
    }

    pub fn include(values: FieldValues) -> Self {
        Self { mode: Mode::Include(values) }
    }

    pub fn exclude(values: FieldValues) -> Self {
        Self { mode: Mode::Exclude(values) }
    }

    /// Whether `record` passes.
    pub fn accepts(&self, record: &HyponymyRecord) -> bool {
        let matches = |values: &FieldValues| {
            values
                .iter()
                .any(|(field, set)| set.contains(field.value(record)))
        };
        match &self.mode {
            Mode::Include(values) => matches(values),
            Mode::Exclude(values) => !matches(values),
        }
    }
}
