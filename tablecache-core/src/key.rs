//! Cache key rules.

use crate::error::{CacheResult, InvalidArgumentError};

/// Characters the table's key format reserves.
pub const RESERVED_CHARACTERS: &str = "{}()/\\@:";

/// Returns true if `key` contains any reserved character.
pub fn contains_reserved(key: &str) -> bool {
    key.contains(|c: char| RESERVED_CHARACTERS.contains(c))
}

/// Validate a (possibly prefixed) cache key.
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(InvalidArgumentError::EmptyKey.into());
    }
    if contains_reserved(key) {
        return Err(InvalidArgumentError::ReservedCharacters {
            key: key.to_string(),
            reserved: RESERVED_CHARACTERS.to_string(),
        }
        .into());
    }
    Ok(())
}
