//! Records of training statistics.
//!
//! A [`Record`] is a string-keyed container for the values produced during one
//! optimization call, typically losses and gradient norms. It is what the
//! training loops hand back to whatever aggregates or logs metrics.
use crate::error::OffPolicyError;
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// Value types storable in a [`Record`].
#[derive(Debug, Clone)]
pub enum RecordValue {
    /// A single value, typically a loss or a gradient norm.
    Scalar(f32),

    /// A 1-dimensional array, e.g. downsampled per-sample values.
    Array1(Vec<f32>),

    /// A text value.
    String(String),
}

/// A set of named values of an optimization step.
#[derive(Debug, Clone)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns the keys of the record.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over key-value pairs.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns a consuming iterator over key-value pairs.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Gets the value for the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records, the right-hand side winning on key collisions.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Returns `true` if the record has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets a scalar value.
    pub fn get_scalar(&self, k: &str) -> Result<f32, OffPolicyError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(OffPolicyError::RecordValueTypeError("Scalar".to_string())),
            None => Err(OffPolicyError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 1-dimensional array value.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, OffPolicyError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(OffPolicyError::RecordValueTypeError("Array1".to_string())),
            None => Err(OffPolicyError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string value.
    pub fn get_string(&self, k: &str) -> Result<String, OffPolicyError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(OffPolicyError::RecordValueTypeError("String".to_string())),
            None => Err(OffPolicyError::RecordKeyError(k.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Record, RecordValue};

    #[test]
    fn scalar_roundtrip() {
        let mut record = Record::from_scalar("loss_critic", 0.25);
        record.insert("loss_actor", RecordValue::Scalar(-1.5));
        assert_eq!(record.get_scalar("loss_critic").unwrap(), 0.25);
        assert_eq!(record.get_scalar("loss_actor").unwrap(), -1.5);
        assert!(record.get_scalar("missing").is_err());
    }

    #[test]
    fn merge_overwrites() {
        let r1 = Record::from_scalar("a", 1.0);
        let r2 = Record::from_slice(&[
            ("a", RecordValue::Scalar(2.0)),
            ("b", RecordValue::Scalar(3.0)),
        ]);
        let merged = r1.merge(r2);
        assert_eq!(merged.get_scalar("a").unwrap(), 2.0);
        assert_eq!(merged.get_scalar("b").unwrap(), 3.0);
    }
}
