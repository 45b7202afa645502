//! Local input validation.

use oneword_core::error::ValidationError;

/// Shortest accepted author name, in characters.
pub const NAME_MIN_CHARS: usize = 1;
/// Longest accepted author name, in characters.
pub const NAME_MAX_CHARS: usize = 10;
/// Longest accepted story word, in characters.
pub const WORD_MAX_CHARS: usize = 20;

/// Checks an author name's length.
///
/// # Errors
///
/// Returns `NameTooShort` or `NameTooLong` when the name has fewer than
/// [`NAME_MIN_CHARS`] or more than [`NAME_MAX_CHARS`] characters.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let chars = name.chars().count();
    if chars < NAME_MIN_CHARS {
        return Err(ValidationError::NameTooShort {
            min: NAME_MIN_CHARS,
        });
    }
    if chars > NAME_MAX_CHARS {
        return Err(ValidationError::NameTooLong {
            max: NAME_MAX_CHARS,
        });
    }
    Ok(())
}

/// Trims a submitted word and checks it.
///
/// # Errors
///
/// Returns `EmptyWord`, `WordTooLong` or `WordContainsWhitespace`.
pub fn validate_word(raw: &str) -> Result<String, ValidationError> {
    let word = raw.trim();
    if word.is_empty() {
        return Err(ValidationError::EmptyWord);
    }
    if word.chars().count() > WORD_MAX_CHARS {
        return Err(ValidationError::WordTooLong {
            max: WORD_MAX_CHARS,
        });
    }
    if word.chars().any(char::is_whitespace) {
        return Err(ValidationError::WordContainsWhitespace);
    }
    Ok(word.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_length_bounds_are_inclusive() {
        assert_eq!(
            validate_name(""),
            Err(ValidationError::NameTooShort { min: 1 })
        );
        assert!(validate_name("a").is_ok());
        assert!(validate_name("abcdefghij").is_ok());
        assert_eq!(
            validate_name("abcdefghijk"),
            Err(ValidationError::NameTooLong { max: 10 })
        );
    }

    #[test]
    fn test_name_length_counts_characters_not_bytes() {
        assert!(validate_name("éléphantes").is_ok());
    }

    #[test]
    fn test_word_is_trimmed() {
        assert_eq!(validate_word("  lantern \n").as_deref(), Ok("lantern"));
    }

    #[test]
    fn test_word_rejections() {
        assert_eq!(validate_word("   "), Err(ValidationError::EmptyWord));
        assert_eq!(
            validate_word("antidisestablishments"),
            Err(ValidationError::WordTooLong { max: 20 })
        );
        assert_eq!(
            validate_word("two words"),
            Err(ValidationError::WordContainsWhitespace)
        );
    }
}
