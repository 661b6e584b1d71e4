//! Frame validation rules.

use nestly_core::error::AppError;

/// Maximum accepted frame size in bytes.
pub const MAX_FRAME_SIZE: usize = 1_048_576;

/// Validates a raw inbound frame before parsing.
pub fn validate_frame(raw: &str) -> Result<(), AppError> {
    if raw.len() > MAX_FRAME_SIZE {
        return Err(AppError::validation(format!(
            "Frame exceeds maximum size of {} bytes",
            MAX_FRAME_SIZE
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty frame"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(validate_frame("  ").is_err());
        assert!(validate_frame(&"x".repeat(MAX_FRAME_SIZE + 1)).is_err());
        assert!(validate_frame(r#"{"event":"connected"}"#).is_ok());
    }
}
