//! Resource id handling.
//!
//! Ids are generated by the store as positive integers. Anything else a
//! caller supplies cannot name a stored row.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("Resource id is empty")]
    Empty,
    #[error("Resource id '{0}' is not numeric")]
    NotNumeric(String),
    #[error("Resource id '{0}' is out of range")]
    OutOfRange(String),
}

/// Parse a boundary id string into a row id.
pub fn parse_resource_id(raw: &str) -> Result<i64, IdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IdError::Empty);
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(IdError::NotNumeric(raw.to_string()));
    }
    match trimmed.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(IdError::OutOfRange(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_ids() {
        assert_eq!(parse_resource_id("1"), Ok(1));
        assert_eq!(parse_resource_id(" 42 "), Ok(42));
    }

    #[test]
    fn test_parse_invalid_ids() {
        assert_eq!(parse_resource_id(""), Err(IdError::Empty));
        assert!(matches!(parse_resource_id("abc"), Err(IdError::NotNumeric(_))));
        assert!(matches!(parse_resource_id("-3"), Err(IdError::NotNumeric(_))));
        assert!(matches!(parse_resource_id("0"), Err(IdError::OutOfRange(_))));
        assert!(matches!(
            parse_resource_id("99999999999999999999"),
            Err(IdError::OutOfRange(_))
        ));
    }
}
