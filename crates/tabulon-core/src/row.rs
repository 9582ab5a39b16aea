//! Row identity

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Stable identity of a record
///
/// Keys correlate filtering, selection and augmentation results. They must be
/// stable across refreshes for the same logical record and unique within a
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey(Arc<str>);

impl RowKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RowKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<u64> for RowKey {
    fn from(value: u64) -> Self {
        Self::new(value.to_string())
    }
}

impl From<i64> for RowKey {
    fn from(value: i64) -> Self {
        Self::new(value.to_string())
    }
}

impl From<u32> for RowKey {
    fn from(value: u32) -> Self {
        Self::new(value.to_string())
    }
}

/// Caller-supplied key derivation, shared between the engine and job tasks
pub type RowIdFn<T> = Arc<dyn Fn(&T) -> RowKey + Send + Sync>;

/// Derives row keys for records and enforces uniqueness within a snapshot
pub struct RowIdentity<T> {
    key_fn: RowIdFn<T>,
}

impl<T> Clone for RowIdentity<T> {
    fn clone(&self) -> Self {
        Self {
            key_fn: self.key_fn.clone(),
        }
    }
}

impl<T> RowIdentity<T> {
    pub fn new(key_fn: impl Fn(&T) -> RowKey + Send + Sync + 'static) -> Self {
        Self {
            key_fn: Arc::new(key_fn),
        }
    }

    /// Key for a single record
    pub fn key(&self, record: &T) -> RowKey {
        (self.key_fn)(record)
    }

    /// Keys for a whole snapshot, in record order.
    ///
    /// Fails on the first duplicate so that two logical records can never
    /// share selection state or augmentation results.
    pub fn keys(&self, records: &[T]) -> Result<Vec<RowKey>> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut keys = Vec::with_capacity(records.len());
        for record in records {
            let key = self.key(record);
            if !seen.insert(key.clone()) {
                return Err(EngineError::DuplicateRowKey(key.to_string()));
            }
            keys.push(key);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_in_record_order() {
        let identity = RowIdentity::new(|n: &u64| RowKey::from(*n));
        let keys = identity.keys(&[3, 1, 2]).unwrap();
        assert_eq!(keys, vec![RowKey::from(3u64), RowKey::from(1u64), RowKey::from(2u64)]);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let identity = RowIdentity::new(|n: &u64| RowKey::from(*n % 2));
        let err = identity.keys(&[1, 2, 3]).unwrap_err();
        assert_eq!(err, EngineError::DuplicateRowKey("1".to_string()));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(RowKey::from("row-7").to_string(), "row-7");
        assert_eq!(RowKey::from(7i64).as_str(), "7");
    }
}
