//! Inbound media classification and text extraction
//!
//! Webhook messages carry a free-form media tag. This module turns the tag
//! into a closed [`MediaKind`] and, for binary kinds, decodes the base64
//! payload and asks the model provider for a transcription or OCR text.

use crate::error::{FinbotError, Result};
use crate::providers::Provider;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Tag for literal text messages
pub const TEXT_TAG: &str = "text";

/// Prefix of accepted audio tags (WhatsApp voice notes)
pub const AUDIO_TAG_PREFIX: &str = "audio/ogg; codecs=opus";

/// Prefix of accepted image tags
pub const IMAGE_TAG_PREFIX: &str = "image/jpeg";

/// Declared kind of an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    /// Content is the message text itself
    Text,
    /// Content is base64 OGG/Opus audio; carries the declared MIME type
    Audio(String),
    /// Content is a base64 JPEG image; carries the declared MIME type
    Image(String),
    /// Any other tag
    Unsupported(String),
}

impl MediaKind {
    /// Classify a media tag
    ///
    /// # Examples
    ///
    /// ```
    /// use finbot::media::MediaKind;
    ///
    /// assert_eq!(MediaKind::classify("text"), MediaKind::Text);
    /// assert!(matches!(MediaKind::classify("image/jpeg"), MediaKind::Image(_)));
    /// assert!(matches!(MediaKind::classify("video/mp4"), MediaKind::Unsupported(_)));
    /// ```
    pub fn classify(tag: &str) -> Self {
        if tag == TEXT_TAG {
            Self::Text
        } else if tag.starts_with(AUDIO_TAG_PREFIX) {
            Self::Audio(tag.to_string())
        } else if tag.starts_with(IMAGE_TAG_PREFIX) {
            Self::Image(tag.to_string())
        } else {
            Self::Unsupported(tag.to_string())
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio(_) => "audio",
            Self::Image(_) => "image",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

/// Decode a base64 transport payload
///
/// Surrounding whitespace and embedded line breaks are ignored, since some
/// gateways wrap long payloads.
///
/// # Errors
///
/// Returns `FinbotError::Decode` if the payload is empty or not valid base64
pub fn decode_payload(content: &str) -> Result<Vec<u8>> {
    let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(FinbotError::Decode("payload is empty".to_string()).into());
    }

    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| FinbotError::Decode(e.to_string()))?;

    tracing::debug!(bytes = bytes.len(), "Decoded base64 payload");
    Ok(bytes)
}

/// Turn an inbound message into plain text
///
/// Text passes through untouched. Audio and image payloads are decoded and
/// sent to the provider; a blank result counts as a failure.
///
/// # Errors
///
/// - `FinbotError::UnsupportedMedia` for unknown tags
/// - `FinbotError::Decode` for invalid base64
/// - `FinbotError::EmptyExtraction` when transcription or OCR yields no text
/// - `FinbotError::Provider` when the provider call itself fails
pub async fn extract_text(provider: &dyn Provider, kind: &MediaKind, content: &str) -> Result<String> {
    match kind {
        MediaKind::Text => Ok(content.to_string()),
        MediaKind::Audio(mime_type) => {
            let audio = decode_payload(content)?;
            tracing::info!(bytes = audio.len(), "Transcribing audio");
            let text = provider.transcribe_audio(&audio, mime_type).await?;
            non_blank(text, "audio transcription was empty")
        }
        MediaKind::Image(mime_type) => {
            let image = decode_payload(content)?;
            tracing::info!(bytes = image.len(), "Extracting text from image");
            let text = provider.extract_image_text(&image, mime_type).await?;
            non_blank(text, "image text extraction was empty")
        }
        MediaKind::Unsupported(tag) => Err(FinbotError::UnsupportedMedia(tag.clone()).into()),
    }
}

fn non_blank(text: String, reason: &str) -> Result<String> {
    if text.trim().is_empty() {
        tracing::warn!("{}", reason);
        Err(FinbotError::EmptyExtraction(reason.to_string()).into())
    } else {
        Ok(text)
    }
}
