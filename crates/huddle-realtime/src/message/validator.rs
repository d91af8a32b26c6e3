//! Validation rules applied at the session boundary.

use huddle_core::error::AppError;
use huddle_core::types::{MessageMetadata, OutboundPayload};

/// Maximum length of an extra metadata key in bytes.
const MAX_METADATA_KEY_BYTES: usize = 64;

/// Validates a channel name. Names are opaque; only emptiness and length are checked.
pub fn validate_channel_name(channel: &str, max_bytes: usize) -> Result<(), AppError> {
    if channel.trim().is_empty() {
        return Err(AppError::validation("Channel name must not be empty"));
    }

    if channel.len() > max_bytes {
        return Err(AppError::validation(format!(
            "Channel name exceeds {max_bytes} bytes"
        )));
    }

    Ok(())
}

/// Validates caller metadata before it is stamped into a payload.
pub fn validate_metadata(metadata: &MessageMetadata, max_entries: usize) -> Result<(), AppError> {
    if metadata.extra.len() > max_entries {
        return Err(AppError::validation(format!(
            "Metadata has {} entries, maximum is {max_entries}",
            metadata.extra.len()
        )));
    }

    if let Some(key) = metadata
        .extra
        .keys()
        .find(|k| k.is_empty() || k.len() > MAX_METADATA_KEY_BYTES)
    {
        return Err(AppError::validation(format!(
            "Invalid metadata key '{key}'"
        )));
    }

    Ok(())
}

/// Serializes a payload and rejects it if it exceeds `max_bytes`.
///
/// Returns the encoded size on success.
pub fn validate_payload_size(payload: &OutboundPayload, max_bytes: usize) -> Result<usize, AppError> {
    let size = serde_json::to_vec(payload)?.len();
    if size > max_bytes {
        return Err(AppError::payload_too_large(size, max_bytes));
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::error::ErrorKind;
    use huddle_core::types::MessageId;

    fn payload(content: String) -> OutboundPayload {
        OutboundPayload {
            id: MessageId::new(),
            content,
            sender_id: "alice".into(),
            sender_display_name: "Alice".into(),
            sender_avatar: None,
            timestamp_millis: 1,
            topic: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_channel_names_are_opaque() {
        assert!(validate_channel_name("dm:alice-bob", 256).is_ok());
        assert!(validate_channel_name("topic:rust lang/🦀", 256).is_ok());
        assert!(validate_channel_name("   ", 256).is_err());
        assert!(validate_channel_name(&"x".repeat(257), 256).is_err());
    }

    #[test]
    fn test_metadata_entry_limit() {
        let mut metadata = MessageMetadata::new();
        for i in 0..3 {
            metadata.extra.insert(format!("k{i}"), serde_json::json!(i));
        }
        assert!(validate_metadata(&metadata, 3).is_ok());
        let err = validate_metadata(&metadata, 2).unwrap_err();
        assert!(err.is(ErrorKind::Validation));
    }

    #[test]
    fn test_metadata_key_length() {
        let metadata = MessageMetadata::new().with_extra("k".repeat(65), serde_json::json!(true));
        assert!(validate_metadata(&metadata, 32).is_err());
    }

    #[test]
    fn test_payload_size_threshold() {
        assert!(validate_payload_size(&payload("small".into()), 60_000).is_ok());
        let err = validate_payload_size(&payload("x".repeat(60_000)), 60_000).unwrap_err();
        assert!(err.is(ErrorKind::PayloadTooLarge));
    }
}
