//! Configuration types

use serde::{Deserialize, Serialize};

use crate::error::{CacheResult, ConfigError};
use crate::key::contains_reserved;

/// Table layout and key handling for a table-backed cache.
///
/// Column names are parameters rather than fixed names so the cache can sit
/// on an existing table. Loading this struct from files or the environment is
/// left to the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCacheConfig {
    /// Name of the table holding cache records.
    pub table_name: String,
    /// Primary key column (string).
    pub primary_field: String,
    /// Value column (codec-encoded string).
    pub value_field: String,
    /// TTL column (Unix seconds).
    pub ttl_field: String,
    /// Optional prefix prepended to every key before it reaches the table.
    pub prefix: Option<String>,
    /// Use strongly-consistent single-item reads.
    pub consistent_read: bool,
}

impl Default for TableCacheConfig {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            primary_field: "id".to_string(),
            value_field: "value".to_string(),
            ttl_field: "ttl".to_string(),
            prefix: None,
            consistent_read: true,
        }
    }
}

impl TableCacheConfig {
    /// Create a config for `table_name` with default column names.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Set the primary key column name.
    pub fn with_primary_field(mut self, field: impl Into<String>) -> Self {
        self.primary_field = field.into();
        self
    }

    /// Set the value column name.
    pub fn with_value_field(mut self, field: impl Into<String>) -> Self {
        self.value_field = field.into();
        self
    }

    /// Set the TTL column name.
    pub fn with_ttl_field(mut self, field: impl Into<String>) -> Self {
        self.ttl_field = field.into();
        self
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Enable or disable strongly-consistent single reads.
    pub fn with_consistent_read(mut self, enabled: bool) -> Self {
        self.consistent_read = enabled;
        self
    }

    /// Apply the configured prefix to a caller key.
    pub fn prefixed(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_string(),
        }
    }

    /// Strip the configured prefix from a key read back from the table.
    pub fn unprefixed<'a>(&self, key: &'a str) -> &'a str {
        match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str()).unwrap_or(key),
            None => key,
        }
    }

    /// Check that the layout is usable.
    pub fn validate(&self) -> CacheResult<()> {
        if self.table_name.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "table_name".to_string(),
            }
            .into());
        }

        let columns = [
            ("primary_field", &self.primary_field),
            ("value_field", &self.value_field),
            ("ttl_field", &self.ttl_field),
        ];
        for (field, value) in columns {
            if value.is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: field.to_string(),
                }
                .into());
            }
        }
        for (i, (field, value)) in columns.iter().enumerate() {
            if columns[..i].iter().any(|(_, other)| other == value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "column names must be distinct".to_string(),
                }
                .into());
            }
        }

        if let Some(prefix) = &self.prefix {
            if contains_reserved(prefix) {
                return Err(ConfigError::InvalidValue {
                    field: "prefix".to_string(),
                    value: prefix.clone(),
                    reason: "contains reserved characters".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}
