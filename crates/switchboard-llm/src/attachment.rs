//! Image attachment validation and encoding

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use switchboard_config::AttachmentsConfig;
use thiserror::Error;

use crate::types::{Attachment, Message};

/// Image formats every dialect accepts
const SUPPORTED: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Count and size ceilings for attachments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentLimits {
    /// Maximum images across the whole request
    pub max_count: usize,
    /// Maximum bytes for a single image
    pub max_bytes: usize,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self::from(&AttachmentsConfig::default())
    }
}

impl From<&AttachmentsConfig> for AttachmentLimits {
    fn from(config: &AttachmentsConfig) -> Self {
        Self {
            max_count: config.max_count,
            max_bytes: config.max_bytes,
        }
    }
}

/// Attachment validation failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttachmentError {
    /// Too many images in one request
    #[error("request carries {count} attachments, the limit is {limit}")]
    TooMany {
        /// Attachments found
        count: usize,
        /// Configured ceiling
        limit: usize,
    },
    /// One image is too large
    #[error("attachment '{file_name}' is {size} bytes, the limit is {limit}")]
    TooLarge {
        /// File name
        file_name: String,
        /// Actual size
        size: usize,
        /// Configured ceiling
        limit: usize,
    },
    /// Content is not a supported image format
    #[error("attachment '{file_name}' has unsupported type '{mime_type}'")]
    Unsupported {
        /// File name
        file_name: String,
        /// Declared or detected type
        mime_type: String,
    },
    /// Declared type disagrees with the file's magic bytes
    #[error("attachment '{file_name}' is declared as '{declared}' but its content is '{detected}'")]
    MimeMismatch {
        /// File name
        file_name: String,
        /// Declared type
        declared: String,
        /// Type sniffed from content
        detected: String,
    },
}

/// Validated image ready for a request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Canonical MIME type
    pub mime_type: &'static str,
    /// Base64 payload
    pub data: String,
}

impl EncodedImage {
    /// `data:` URI form used by the `OpenAI` dialects
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Check the total attachment count of a history
pub fn check_count(history: &[Message], limits: AttachmentLimits) -> Result<(), AttachmentError> {
    let count = history.iter().map(|m| m.attachments.len()).sum::<usize>();
    if count > limits.max_count {
        return Err(AttachmentError::TooMany {
            count,
            limit: limits.max_count,
        });
    }
    Ok(())
}

/// Validate one attachment against its magic bytes and encode it
pub fn encode(attachment: &Attachment, limits: AttachmentLimits) -> Result<EncodedImage, AttachmentError> {
    let size = attachment.bytes.len();
    if size > limits.max_bytes {
        return Err(AttachmentError::TooLarge {
            file_name: attachment.file_name.clone(),
            size,
            limit: limits.max_bytes,
        });
    }

    let declared = normalize(&attachment.mime_type);
    let Some(detected) = infer::get(&attachment.bytes).map(|kind| kind.mime_type()) else {
        return Err(AttachmentError::Unsupported {
            file_name: attachment.file_name.clone(),
            mime_type: declared,
        });
    };

    let Some(canonical) = SUPPORTED.iter().copied().find(|supported| *supported == detected) else {
        return Err(AttachmentError::Unsupported {
            file_name: attachment.file_name.clone(),
            mime_type: detected.to_owned(),
        });
    };

    if declared != canonical {
        return Err(AttachmentError::MimeMismatch {
            file_name: attachment.file_name.clone(),
            declared,
            detected: canonical.to_owned(),
        });
    }

    Ok(EncodedImage {
        mime_type: canonical,
        data: STANDARD.encode(&attachment.bytes),
    })
}

fn normalize(mime_type: &str) -> String {
    let lowered = mime_type.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_owned(),
        _ => lowered,
    }
}
