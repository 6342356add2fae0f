//! `data:` URI decoding for embedded buffers and images.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

pub const BUFFER_MIME_TYPES: [&str; 2] = ["application/octet-stream", "application/gltf-buffer"];
pub const IMAGE_MIME_TYPES: [&str; 2] = ["image/png", "image/jpeg"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataUriError {
    #[error("data URI has no ',' separator")]
    MissingSeparator,

    #[error("data URI payload is not base64-encoded")]
    NotBase64,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Classification of a buffer or image `uri` value.
#[derive(Debug)]
pub enum UriKind<'a> {
    Data(Result<DataUri, DataUriError>),
    External(&'a str),
}

pub fn classify(uri: &str) -> UriKind<'_> {
    match uri.strip_prefix("data:") {
        Some(rest) => UriKind::Data(decode_data_uri(rest)),
        None => UriKind::External(uri),
    }
}

/// Decode the part after `data:`, i.e. `<mime>[;params];base64,<payload>`.
fn decode_data_uri(rest: &str) -> Result<DataUri, DataUriError> {
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingSeparator)?;
    let Some(mime_type) = header.strip_suffix(";base64") else {
        return Err(DataUriError::NotBase64);
    };
    let mime_type = mime_type.split(';').next().unwrap_or_default();
    let payload = STANDARD.decode(payload)?;
    Ok(DataUri {
        mime_type: mime_type.to_string(),
        payload,
    })
}
