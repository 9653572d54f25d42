//! Batch model: what a sender accumulates and a receiver hands to the aggregator.
//!
//! On the wire a batch is a map of monitor name to `{"cls": ..., "data": ...}`,
//! the layout existing peers already speak.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// One monitor's result: its type name plus an opaque state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRecord {
    #[serde(rename = "cls")]
    pub type_name: String,
    #[serde(rename = "data")]
    pub state: Value,
}

impl MonitorRecord {
    pub fn new(type_name: impl Into<String>, state: Value) -> Self {
        Self {
            type_name: type_name.into(),
            state,
        }
    }

    /// Capture any serializable state.
    pub fn from_state<S: Serialize + ?Sized>(
        type_name: impl Into<String>,
        state: &S,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(type_name, serde_json::to_value(state)?))
    }
}

/// Something that can report its result into a batch.
///
/// Implemented by the monitoring side; the relay only needs a type name and
/// a snapshot of state.
pub trait Reportable {
    fn type_name(&self) -> &str;

    fn state(&self) -> Result<Value, serde_json::Error>;

    fn to_record(&self) -> Result<MonitorRecord, serde_json::Error> {
        Ok(MonitorRecord::new(self.type_name(), self.state()?))
    }
}

impl Reportable for MonitorRecord {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn state(&self) -> Result<Value, serde_json::Error> {
        Ok(self.state.clone())
    }
}

/// Monitor results keyed by monitor name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchRecord {
    records: BTreeMap<String, MonitorRecord>,
}

impl BatchRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a monitor's record, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, record: MonitorRecord) -> Option<MonitorRecord> {
        self.records.insert(name.into(), record)
    }

    pub fn get(&self, name: &str) -> Option<&MonitorRecord> {
        self.records.get(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MonitorRecord> {
        self.records.iter()
    }

    /// Move all records out, leaving this batch empty.
    pub fn take(&mut self) -> BatchRecord {
        std::mem::take(self)
    }
}

impl IntoIterator for BatchRecord {
    type Item = (String, MonitorRecord);
    type IntoIter = btree_map::IntoIter<String, MonitorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a BatchRecord {
    type Item = (&'a String, &'a MonitorRecord);
    type IntoIter = btree_map::Iter<'a, String, MonitorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<(String, MonitorRecord)> for BatchRecord {
    fn from_iter<I: IntoIterator<Item = (String, MonitorRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
