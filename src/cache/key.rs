use super::CacheError;

/// Separates the entity label and every identifier segment
pub const KEY_DELIMITER: char = '+';

/// Build `LABEL+seg1+seg2+` from a label followed by identifier segments.
///
/// Segments containing the delimiter are rejected, otherwise two different
/// inputs could produce the same key.
pub fn encode_cache_key<S: AsRef<str>>(parts: &[S]) -> Result<String, CacheError> {
    let mut key = String::new();
    for part in parts {
        let part = part.as_ref();
        if part.contains(KEY_DELIMITER) {
            return Err(CacheError::InvalidSegment {
                segment: part.to_string(),
            });
        }
        key.push_str(part);
        key.push(KEY_DELIMITER);
    }
    Ok(key)
}

/// Split a composite key back into label and segments
pub fn decode_cache_key(key: &str) -> Vec<String> {
    let mut parts: Vec<String> = key.split(KEY_DELIMITER).map(str::to_string).collect();
    if parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}
