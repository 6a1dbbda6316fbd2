//! Input validation for client-supplied fields.
//!
//! Lengths are measured in Unicode code points after trimming; every check
//! returns the trimmed value so callers never store raw input.

use super::error_codes::GameError;
use super::types::BOARD_CELLS;

pub const MAX_NICKNAME_LENGTH: usize = 20;
pub const MAX_ROOM_NAME_LENGTH: usize = 50;
pub const MIN_ACCESS_CODE_LENGTH: usize = 4;
pub const MAX_ACCESS_CODE_LENGTH: usize = 20;
pub const MIN_CAPACITY: u8 = 2;
pub const MAX_CAPACITY: u8 = 4;

/// Nickname: 1..=20 code points after trimming, no control characters.
pub fn validate_nickname(raw: &str) -> Result<String, GameError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GameError::InvalidInput("nickname must not be empty".into()));
    }
    let count = trimmed.chars().count();
    if count > MAX_NICKNAME_LENGTH {
        return Err(GameError::InvalidInput(format!(
            "nickname must be at most {MAX_NICKNAME_LENGTH} characters (got {count})"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(GameError::InvalidInput(
            "nickname must not contain control characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Room name: 1..=50 code points after trimming.
pub fn validate_room_name(raw: &str) -> Result<String, GameError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GameError::InvalidInput(
            "room name must not be empty".into(),
        ));
    }
    let count = trimmed.chars().count();
    if count > MAX_ROOM_NAME_LENGTH {
        return Err(GameError::InvalidInput(format!(
            "room name must be at most {MAX_ROOM_NAME_LENGTH} characters (got {count})"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(GameError::InvalidInput(
            "room name must not contain control characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Access code: 4..=20 code points, taken verbatim (case-sensitive).
pub fn validate_access_code(raw: &str) -> Result<String, GameError> {
    let count = raw.chars().count();
    if !(MIN_ACCESS_CODE_LENGTH..=MAX_ACCESS_CODE_LENGTH).contains(&count) {
        return Err(GameError::InvalidInput(format!(
            "access code must be {MIN_ACCESS_CODE_LENGTH}..={MAX_ACCESS_CODE_LENGTH} characters"
        )));
    }
    Ok(raw.to_string())
}

/// Room capacity: 2, 3, or 4 seats.
pub fn validate_capacity(capacity: u8) -> Result<u8, GameError> {
    if (MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
        Ok(capacity)
    } else {
        Err(GameError::InvalidInput(format!(
            "capacity must be between {MIN_CAPACITY} and {MAX_CAPACITY} (got {capacity})"
        )))
    }
}

/// Cell index: 0..=8, row-major.
pub fn validate_cell_index(cell: usize) -> Result<usize, GameError> {
    if cell < BOARD_CELLS {
        Ok(cell)
    } else {
        Err(GameError::InvalidInput(format!(
            "cell index must be 0..={} (got {cell})",
            BOARD_CELLS - 1
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nickname_rules() {
        assert_eq!(validate_nickname("Ada").unwrap(), "Ada");
        assert_eq!(validate_nickname("  Ada  ").unwrap(), "Ada");
        assert!(validate_nickname("").is_err());
        assert!(validate_nickname("   ").is_err());
        assert!(validate_nickname("a\tb").is_err());
        assert!(validate_nickname(&"x".repeat(21)).is_err());
        assert!(validate_nickname(&"x".repeat(20)).is_ok());
        // Code points, not bytes.
        assert!(validate_nickname(&"é".repeat(20)).is_ok());
    }

    #[test]
    fn room_name_rules() {
        assert_eq!(validate_room_name(" Friday night ").unwrap(), "Friday night");
        assert!(validate_room_name("").is_err());
        assert!(validate_room_name(&"n".repeat(51)).is_err());
        assert!(validate_room_name(&"n".repeat(50)).is_ok());
    }

    #[test]
    fn access_code_rules() {
        assert!(validate_access_code("abc").is_err());
        assert!(validate_access_code("abcd").is_ok());
        assert!(validate_access_code(&"c".repeat(20)).is_ok());
        assert!(validate_access_code(&"c".repeat(21)).is_err());
        // Codes are taken verbatim; case matters downstream.
        assert_eq!(validate_access_code("AbCd").unwrap(), "AbCd");
    }

    #[test]
    fn capacity_rules() {
        assert!(validate_capacity(1).is_err());
        assert!(validate_capacity(2).is_ok());
        assert!(validate_capacity(4).is_ok());
        assert!(validate_capacity(5).is_err());
    }

    #[test]
    fn cell_index_rules() {
        assert_eq!(validate_cell_index(0).unwrap(), 0);
        assert_eq!(validate_cell_index(8).unwrap(), 8);
        assert!(validate_cell_index(9).is_err());
    }

    proptest! {
        #[test]
        fn nickname_validation_matches_predicate(raw in proptest::collection::vec(any::<char>(), 0..=32)) {
            let candidate: String = raw.into_iter().collect();
            let trimmed = candidate.trim();
            let expected = !trimmed.is_empty()
                && trimmed.chars().count() <= MAX_NICKNAME_LENGTH
                && !trimmed.chars().any(char::is_control);
            prop_assert_eq!(validate_nickname(&candidate).is_ok(), expected);
        }

        #[test]
        fn accepted_nicknames_are_always_trimmed(raw in "\\PC{1,40}") {
            if let Ok(nick) = validate_nickname(&raw) {
                prop_assert_eq!(nick.trim(), nick.as_str());
                prop_assert!(!nick.is_empty());
            }
        }
    }
}
