//! Image intake: validates a file-like source and produces the preview
//! encoding plus the canonical upload payload.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use image::ImageFormat;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CreativeError, CreativeResult};
use crate::types::{ImageSource, Intake};

/// Validate `source` and turn it into an [`Intake`].
///
/// The declared content type must be `image/<subtype>` and the payload must be
/// non-empty and no larger than `max_bytes`.
pub fn accept(source: ImageSource, max_bytes: usize) -> CreativeResult<Intake> {
    let content_type = source
        .content_type
        .as_deref()
        .map(normalize_content_type)
        .ok_or_else(|| {
            CreativeError::InvalidIntake(format!("{} declares no content type", source.file_name))
        })?;

    let is_image = content_type
        .strip_prefix("image/")
        .map(|subtype| !subtype.is_empty())
        .unwrap_or(false);
    if !is_image {
        return Err(CreativeError::InvalidIntake(format!(
            "{} is {content_type}, not an image",
            source.file_name
        )));
    }

    if source.bytes.is_empty() {
        return Err(CreativeError::InvalidIntake(format!(
            "{} is empty",
            source.file_name
        )));
    }
    if source.bytes.len() > max_bytes {
        return Err(CreativeError::InvalidIntake(format!(
            "{} is {} bytes, limit is {max_bytes}",
            source.file_name,
            source.bytes.len()
        )));
    }

    let preview = data_uri(&content_type, &source.bytes);
    debug!(
        file = %source.file_name,
        content_type = %content_type,
        bytes = source.bytes.len(),
        "image intake accepted"
    );

    Ok(Intake {
        id: Uuid::new_v4(),
        file_name: source.file_name,
        content_type,
        raw: source.bytes,
        preview,
        origin: source.origin,
        accepted_at: Utc::now(),
    })
}

/// Map a file extension to an image MIME type.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    ImageFormat::from_path(path)
        .ok()
        .map(|format| format.to_mime_type())
}

/// Encode bytes as a base64 data-URI.
pub fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{content_type};base64,{}", BASE64.encode(bytes))
}

fn normalize_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntakeOrigin;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn test_accept_png() {
        let source = ImageSource::from_bytes("product.png", Some("image/png"), PNG_MAGIC.to_vec());
        let intake = accept(source, 1024).unwrap();
        assert_eq!(intake.content_type(), "image/png");
        assert!(intake.preview().starts_with("data:image/png;base64,"));
        assert_eq!(intake.encoded_payload(), intake.preview());
        assert_eq!(intake.size_bytes(), PNG_MAGIC.len());
    }

    #[test]
    fn test_content_type_parameters_are_stripped() {
        let source =
            ImageSource::from_bytes("a.jpg", Some("Image/JPEG; q=0.9"), vec![0xFF, 0xD8, 0xFF]);
        let intake = accept(source, 1024).unwrap();
        assert_eq!(intake.content_type(), "image/jpeg");
    }

    #[test]
    fn test_reject_non_image() {
        let source = ImageSource::from_bytes("notes.txt", Some("text/plain"), b"hello".to_vec())
            .with_origin(IntakeOrigin::DragDrop);
        let err = accept(source, 1024).unwrap_err();
        assert!(matches!(err, CreativeError::InvalidIntake(_)));
    }

    #[test]
    fn test_reject_missing_type_empty_and_oversized() {
        let untyped = ImageSource::from_bytes("blob", None, PNG_MAGIC.to_vec());
        assert!(accept(untyped, 1024).is_err());

        let bare = ImageSource::from_bytes("x.png", Some("image/"), PNG_MAGIC.to_vec());
        assert!(accept(bare, 1024).is_err());

        let empty = ImageSource::from_bytes("x.png", Some("image/png"), Vec::new());
        assert!(accept(empty, 1024).is_err());

        let big = ImageSource::from_bytes("x.png", Some("image/png"), vec![0u8; 2048]);
        assert!(accept(big, 1024).is_err());
    }

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("a/b/product.PNG")), Some("image/png"));
        assert_eq!(content_type_for_path(Path::new("shot.jpeg")), Some("image/jpeg"));
        assert_eq!(content_type_for_path(Path::new("notes.txt")), None);
    }

    #[tokio::test]
    async fn test_image_source_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("product.png");
        tokio::fs::write(&path, PNG_MAGIC).await.unwrap();

        let source = ImageSource::from_path(&path).await.unwrap();
        assert_eq!(source.file_name, "product.png");
        assert_eq!(source.content_type.as_deref(), Some("image/png"));
        assert_eq!(source.origin, IntakeOrigin::Picker);
        assert!(accept(source, 1024).is_ok());

        let notes = dir.path().join("notes.txt");
        tokio::fs::write(&notes, b"hello").await.unwrap();
        let source = ImageSource::from_path(&notes).await.unwrap();
        assert_eq!(source.content_type.as_deref(), Some("application/octet-stream"));
        assert!(matches!(accept(source, 1024), Err(CreativeError::InvalidIntake(_))));
    }
}
