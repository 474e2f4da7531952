//! Payload Codec
//!
//! Classifies outbound input into a tagged [`Envelope`] and turns inbound
//! frames back into [`Message`]s.
//!
//! The wire form stays compatible with the browser client this protocol
//! started from:
//!
//! - text travels as a bare JSON string: `"hello"`
//! - images travel as `{"type":"image","data":"data:image/png;base64,..."}`
//!
//! Decoding never fails. Anything that is not recognisably an image frame is
//! treated as text, using the raw frame content when it is not a JSON string.

use core::fmt;
use core::str::FromStr;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::CodecError;
use crate::message::{Message, MessageKind};

/// Tag the browser client puts in the `type` field of binary frames
pub const IMAGE_TAG: &str = "image";

/// MIME type used when neither the file name nor the content identify it
pub const FALLBACK_MIME: &str = "application/octet-stream";

// ----------------------------------------------------------------------------
// Data URI
// ----------------------------------------------------------------------------

/// Self-describing binary payload (`data:<mime>;base64,<payload>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime: String,
    data: Vec<u8>,
}

impl DataUri {
    pub fn new(mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            data,
        }
    }

    /// Build a data URI for file content, guessing the MIME type from the
    /// file name and falling back to the content's magic bytes
    pub fn from_file(name: Option<&str>, data: Vec<u8>) -> Self {
        let mime = name
            .and_then(mime_from_extension)
            .or_else(|| mime_from_magic(&data))
            .unwrap_or(FALLBACK_MIME);
        Self::new(mime, data)
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }
}

impl FromStr for DataUri {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("data:").ok_or_else(|| CodecError::InvalidDataUri {
            reason: "missing `data:` scheme".to_string(),
        })?;
        let (header, payload) = rest.split_once(',').ok_or_else(|| CodecError::InvalidDataUri {
            reason: "missing `,` separator".to_string(),
        })?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| CodecError::InvalidDataUri {
                reason: "only base64 payloads are supported".to_string(),
            })?;
        // RFC 2397 default media type
        let mime = if mime.is_empty() {
            "text/plain;charset=US-ASCII"
        } else {
            mime
        };
        let data = STANDARD.decode(payload)?;
        Ok(Self::new(mime, data))
    }
}

fn mime_from_extension(name: &str) -> Option<&'static str> {
    let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "avif" => "image/avif",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

fn mime_from_magic(data: &[u8]) -> Option<&'static str> {
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    if data.starts_with(PNG) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

// ----------------------------------------------------------------------------
// Raw Input and Envelope
// ----------------------------------------------------------------------------

/// Outbound input before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    /// Typed text
    Text(String),
    /// Content of a user-selected file
    File { name: Option<String>, data: Vec<u8> },
}

/// Tagged payload as it travels over a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub kind: MessageKind,
    pub content: String,
}

impl Envelope {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            content: content.into(),
        }
    }

    pub fn binary(data: &DataUri) -> Self {
        Self {
            kind: MessageKind::Binary,
            content: data.to_string(),
        }
    }

    /// Serialize to the wire form
    pub fn to_wire(&self) -> Vec<u8> {
        let value = match self.kind {
            MessageKind::Text => Value::String(self.content.clone()),
            MessageKind::Binary => json!({ "type": IMAGE_TAG, "data": self.content }),
        };
        value.to_string().into_bytes()
    }

    /// Parse a wire frame, defaulting to text for anything unrecognised
    pub fn from_wire(frame: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(frame) {
            Ok(Value::String(text)) => Self::text(text),
            Ok(Value::Object(fields)) => match (fields.get("type"), fields.get("data")) {
                (Some(Value::String(tag)), Some(Value::String(data))) if tag == IMAGE_TAG => {
                    Self {
                        kind: MessageKind::Binary,
                        content: data.clone(),
                    }
                }
                _ => {
                    debug!("Untagged object frame, treating as text");
                    Self::text(String::from_utf8_lossy(frame))
                }
            },
            Ok(_) | Err(_) => {
                debug!(len = frame.len(), "Frame is not a JSON string, treating as text");
                Self::text(String::from_utf8_lossy(frame))
            }
        }
    }

    /// The message this envelope represents
    pub fn to_message(&self) -> Message {
        Message::new(self.kind, self.content.clone())
    }
}

// ----------------------------------------------------------------------------
// Encode / Decode
// ----------------------------------------------------------------------------

/// Classify and wrap outbound input
pub fn encode(input: RawInput) -> Envelope {
    match input {
        RawInput::Text(text) => Envelope::text(text),
        RawInput::File { name, data } => Envelope::binary(&DataUri::from_file(name.as_deref(), data)),
    }
}

/// Unwrap an envelope into the message it carries
pub fn decode(envelope: Envelope) -> Message {
    Message::new(envelope.kind, envelope.content)
}

/// Decode a raw wire frame straight into a message
pub fn decode_frame(frame: &[u8]) -> Message {
    decode(Envelope::from_wire(frame))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_text_wire_form_is_bare_json_string() {
        let envelope = encode(RawInput::Text("hello".to_string()));
        assert_eq!(envelope.to_wire(), br#""hello""#.to_vec());
    }

    #[test]
    fn test_image_wire_form_matches_browser_client() {
        let envelope = Envelope::binary(&DataUri::new("image/png", vec![1, 2, 3]));
        let wire: Value = serde_json::from_slice(&envelope.to_wire()).unwrap();
        assert_eq!(wire["type"], "image");
        assert_eq!(wire["data"], "data:image/png;base64,AQID");
    }

    #[test]
    fn test_decode_image_frame_from_browser() {
        let frame = br#"{"type":"image","data":"data:image/gif;base64,R0lGODlh"}"#;
        let message = decode_frame(frame);
        assert_eq!(message.kind(), MessageKind::Binary);
        assert_eq!(message.content(), "data:image/gif;base64,R0lGODlh");
    }

    #[test]
    fn test_unknown_object_defaults_to_raw_text() {
        let frame = br#"{"type":"video","data":"x"}"#;
        let message = decode_frame(frame);
        assert!(message.is_text());
        assert_eq!(message.content(), r#"{"type":"video","data":"x"}"#);
    }

    #[test]
    fn test_non_json_and_non_utf8_default_to_text() {
        assert_eq!(decode_frame(b"plain words").content(), "plain words");
        assert_eq!(decode_frame(b"42").content(), "42");
        let message = decode_frame(&[0xFF, 0xFE, b'a']);
        assert!(message.is_text());
        assert!(message.content().ends_with('a'));
    }

    #[test]
    fn test_mime_from_extension_wins_over_magic() {
        let uri = DataUri::from_file(Some("photo.JPG"), PNG_HEADER.to_vec());
        assert_eq!(uri.mime(), "image/jpeg");
    }

    #[test]
    fn test_mime_sniffed_from_content() {
        assert_eq!(DataUri::from_file(None, PNG_HEADER.to_vec()).mime(), "image/png");
        assert_eq!(DataUri::from_file(Some("x.bin"), b"GIF89a...".to_vec()).mime(), "image/gif");
        assert_eq!(DataUri::from_file(None, vec![0, 1, 2]).mime(), FALLBACK_MIME);
    }

    #[test]
    fn test_data_uri_parse_errors() {
        assert!("image/png;base64,AAAA".parse::<DataUri>().is_err());
        assert!("data:image/png;base64".parse::<DataUri>().is_err());
        assert!("data:text/plain,hello".parse::<DataUri>().is_err());
        assert!("data:image/png;base64,@@@".parse::<DataUri>().is_err());
    }

    #[test]
    fn test_bad_base64_keeps_decoder_error_as_source() {
        let err = "data:image/png;base64,@@@".parse::<DataUri>().unwrap_err();
        assert!(matches!(err, CodecError::Base64(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_image_tag_with_non_string_data_is_text() {
        let frame = br#"{"type":"image","data":[1,2,3]}"#;
        let message = decode_frame(frame);
        assert!(message.is_text());
        assert_eq!(message.content(), r#"{"type":"image","data":[1,2,3]}"#);
    }

    #[test]
    fn test_data_uri_default_media_type() {
        let uri: DataUri = "data:;base64,aGk=".parse().unwrap();
        assert_eq!(uri.mime(), "text/plain;charset=US-ASCII");
        assert_eq!(uri.data(), b"hi");
    }
}
