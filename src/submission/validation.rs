use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Empty posts are not allowed!")]
    Empty,
    #[error("Posts shorter than {required} characters are not allowed! Current length: {current}")]
    TooShort { required: usize, current: usize },
    #[error("No keystrokes recorded! Please type something before submitting.")]
    NoKeystrokes,
}

/// Check the typed text against the minimum length and the capture count.
/// Length is counted in Unicode scalar values of the trimmed text, so an
/// emoji counts once even where it spans two UTF-16 units.
pub fn validate(text: &str, min_length: usize, event_count: usize) -> Result<(), ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let current = trimmed.chars().count();
    if current < min_length {
        return Err(ValidationError::TooShort {
            required: min_length,
            current,
        });
    }

    if event_count == 0 {
        return Err(ValidationError::NoKeystrokes);
    }

    Ok(())
}
