//! Image attachments for user messages

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use weft_wire::StoredItem;

use crate::error::{Error, Result};

/// Maximum number of images accepted per message; extras are dropped
pub const MAX_IMAGE_ATTACHMENTS: usize = 10;

/// Maximum size for a local image file
pub const MAX_IMAGE_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Build the user item for `text` plus image attachments.
///
/// Images that fail to process are skipped with a warning rather than
/// failing the send. With no usable images this degrades to a plain text
/// message.
pub async fn build_user_message(text: &str, images: &[String]) -> StoredItem {
    if images.is_empty() {
        return StoredItem::user(text);
    }

    let mut images = images;
    if images.len() > MAX_IMAGE_ATTACHMENTS {
        tracing::warn!(
            "too many images provided ({}), only processing the first {}",
            images.len(),
            MAX_IMAGE_ATTACHMENTS
        );
        images = &images[..MAX_IMAGE_ATTACHMENTS];
    }

    let mut parts = Vec::with_capacity(images.len() + 1);
    for image in images {
        match process_image(image).await {
            Ok(part) => parts.push(part),
            Err(e) => tracing::warn!("failed to process image {image}: {e}"),
        }
    }

    if parts.is_empty() {
        return StoredItem::user(text);
    }
    parts.push(json!({"type": "input_text", "text": text}));

    let payload = json!({
        "type": "message",
        "role": "user",
        "content": parts,
    });
    StoredItem::user_with_payload(text, payload)
}

/// Turn an image reference (URL, data URL, or local path) into an
/// input_image content part
async fn process_image(image: &str) -> Result<Value> {
    if image.starts_with("https://") || image.starts_with("data:") {
        return Ok(json!({"type": "input_image", "image_url": image}));
    }
    if image.starts_with("http://") {
        return Err(Error::Other(format!(
            "only HTTPS URLs are supported for images: {image}"
        )));
    }

    let path = image.strip_prefix("file://").unwrap_or(image);

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::Other(format!("failed to stat image file: {e}")))?;
    if metadata.len() > MAX_IMAGE_FILE_SIZE {
        return Err(Error::Other(format!(
            "image file too large: {} bytes (max: {} bytes)",
            metadata.len(),
            MAX_IMAGE_FILE_SIZE
        )));
    }

    let mime = mime_for_extension(path)?;
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| Error::Other(format!("failed to read image file: {e}")))?;
    let data_url = format!("data:{mime};base64,{}", STANDARD.encode(data));
    Ok(json!({"type": "input_image", "image_url": data_url}))
}

fn mime_for_extension(path: &str) -> Result<&'static str> {
    let ext = std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        _ => Err(Error::Other(format!(
            "unsupported image format: .{ext} (supported: .jpg, .jpeg, .png, .gif, .webp)"
        ))),
    }
}
