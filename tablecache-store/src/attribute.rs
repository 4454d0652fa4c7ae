//! Attribute values as the remote table represents them.

use std::collections::HashMap;

/// A single typed attribute value.
///
/// Numbers travel as strings, the way the table's wire format carries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number, in its decimal string form.
    N(String),
    /// Binary.
    B(Vec<u8>),
    /// Boolean.
    Bool(bool),
    /// Explicit null.
    Null,
}

impl AttributeValue {
    /// String payload, if this is a string attribute.
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// Number payload, if this is a number attribute.
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// Build a number attribute from an integer.
    pub fn number(n: i64) -> Self {
        Self::N(n.to_string())
    }
}

/// One row of the table: column name to value.
pub type Record = HashMap<String, AttributeValue>;

/// Build a record holding only the primary key.
pub fn key_record(primary_field: &str, key: &str) -> Record {
    let mut record = Record::with_capacity(1);
    record.insert(primary_field.to_string(), AttributeValue::S(key.to_string()));
    record
}

/// Read the string primary key out of a record.
pub fn primary_key<'a>(record: &'a Record, primary_field: &str) -> Option<&'a str> {
    record.get(primary_field).and_then(AttributeValue::as_s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(AttributeValue::S("a".into()).as_s(), Some("a"));
        assert_eq!(AttributeValue::S("a".into()).as_n(), None);
        assert_eq!(AttributeValue::number(60).as_n(), Some("60"));
        assert_eq!(AttributeValue::Null.as_s(), None);
    }

    #[test]
    fn test_key_record_roundtrip() {
        let record = key_record("id", "user.42");
        assert_eq!(record.len(), 1);
        assert_eq!(primary_key(&record, "id"), Some("user.42"));
        assert_eq!(primary_key(&record, "pk"), None);
    }
}
