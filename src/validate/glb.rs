//! GLB container parsing: header, JSON chunk, optional BIN chunk.
//!
//! Recoverable container problems are recorded and parsing continues; only
//! conditions that leave no JSON chunk at all surface as [`GlbError`].

use log::debug;
use thiserror::Error;

use super::issues::{IssueCode, IssueCollector};

/// `glTF` in little-endian byte order.
pub const GLB_MAGIC: u32 = 0x4654_6C67;
pub const CHUNK_TYPE_JSON: u32 = 0x4E4F_534A;
pub const CHUNK_TYPE_BIN: u32 = 0x004E_4942;

const HEADER_LENGTH: usize = 12;
const CHUNK_HEADER_LENGTH: usize = 8;

/// Chunks extracted from a GLB container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlbChunks<'a> {
    pub version: u32,
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

/// Container conditions that prevent any document from being produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GlbError {
    #[error("Unexpected end of GLB header ({length} bytes available, 12 required)")]
    UnexpectedEndOfHeader { length: usize },

    #[error("Invalid GLB magic value ({magic:#010X})")]
    InvalidMagic { magic: u32 },

    #[error("First chunk must be JSON (0x4E4F534A), found {found:#010X}")]
    UnexpectedFirstChunk { found: u32, offset: usize },

    #[error("GLB does not contain a JSON chunk")]
    MissingJsonChunk { offset: usize },
}

impl GlbError {
    pub fn code(&self) -> IssueCode {
        match self {
            GlbError::UnexpectedEndOfHeader { .. } => IssueCode::GlbUnexpectedEndOfHeader,
            GlbError::InvalidMagic { .. } => IssueCode::GlbInvalidMagic,
            GlbError::UnexpectedFirstChunk { .. } => IssueCode::GlbUnexpectedFirstChunk,
            GlbError::MissingJsonChunk { .. } => IssueCode::GlbUnexpectedEndOfChunkHeader,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            GlbError::UnexpectedEndOfHeader { .. } | GlbError::InvalidMagic { .. } => 0,
            GlbError::UnexpectedFirstChunk { offset, .. }
            | GlbError::MissingJsonChunk { offset } => *offset,
        }
    }
}

/// True when `bytes` start with the GLB magic.
pub fn is_glb(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && read_u32(bytes, 0) == GLB_MAGIC
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn chunk_type_name(chunk_type: u32) -> String {
    let bytes = chunk_type.to_le_bytes();
    if bytes.iter().all(|byte| byte.is_ascii_graphic() || *byte == 0) {
        String::from_utf8_lossy(&bytes)
            .trim_end_matches('\0')
            .to_string()
    } else {
        format!("{chunk_type:#010X}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    JsonChunk,
    BinChunk,
}

/// Split a GLB container into its JSON and BIN chunks.
pub fn parse_glb<'a>(
    bytes: &'a [u8],
    issues: &mut IssueCollector,
) -> Result<GlbChunks<'a>, GlbError> {
    let mut state = State::Header;
    let mut offset = 0usize;
    let mut version = 0u32;
    let mut json: Option<&'a [u8]> = None;
    let mut bin: Option<&'a [u8]> = None;

    loop {
        if state == State::Header {
            if bytes.len() < HEADER_LENGTH {
                return Err(GlbError::UnexpectedEndOfHeader {
                    length: bytes.len(),
                });
            }
            let magic = read_u32(bytes, 0);
            if magic != GLB_MAGIC {
                return Err(GlbError::InvalidMagic { magic });
            }

            version = read_u32(bytes, 4);
            if version != 2 {
                issues.record_at_offset(
                    IssueCode::GlbInvalidVersion,
                    4,
                    format!("Invalid GLB version value {version}"),
                );
            }

            let declared_length = read_u32(bytes, 8) as usize;
            if declared_length != bytes.len() {
                issues.record_at_offset(
                    IssueCode::GlbLengthMismatch,
                    8,
                    format!(
                        "Declared GLB length ({declared_length}) does not match actual length ({})",
                        bytes.len()
                    ),
                );
            }

            offset = HEADER_LENGTH;
            state = State::JsonChunk;
            continue;
        }

        if offset >= bytes.len() {
            break;
        }
        if bytes.len() - offset < CHUNK_HEADER_LENGTH {
            issues.record_at_offset(
                IssueCode::GlbUnexpectedEndOfChunkHeader,
                offset,
                "Unexpected end of chunk header",
            );
            break;
        }

        let chunk_offset = offset;
        let declared = read_u32(bytes, chunk_offset) as usize;
        let chunk_type = read_u32(bytes, chunk_offset + 4);
        let data_start = chunk_offset + CHUNK_HEADER_LENGTH;

        if declared % 4 != 0 {
            issues.record_at_offset(
                IssueCode::GlbChunkLengthUnaligned,
                chunk_offset,
                format!(
                    "Length of {} chunk is not aligned to 4-byte boundaries",
                    chunk_type_name(chunk_type)
                ),
            );
        }

        let available = bytes.len() - data_start;
        let truncated = declared > available;
        if truncated {
            issues.record_at_offset(
                IssueCode::GlbChunkTooBig,
                chunk_offset,
                format!(
                    "Chunk ({}) length ({declared}) is too big; only {available} bytes remain",
                    chunk_type_name(chunk_type)
                ),
            );
        }
        let data_end = data_start + declared.min(available);
        let data = &bytes[data_start..data_end];

        match (state, chunk_type) {
            (State::JsonChunk, CHUNK_TYPE_JSON) => {
                if declared == 0 {
                    issues.record_at_offset(
                        IssueCode::GlbEmptyChunk,
                        chunk_offset,
                        "JSON chunk is empty",
                    );
                }
                json = Some(data);
                state = State::BinChunk;
            }
            (State::JsonChunk, found) => {
                return Err(GlbError::UnexpectedFirstChunk {
                    found,
                    offset: chunk_offset,
                });
            }
            (_, CHUNK_TYPE_BIN) if bin.is_none() => {
                if declared == 0 {
                    issues.record_at_offset(
                        IssueCode::GlbEmptyChunk,
                        chunk_offset,
                        "BIN chunk is empty",
                    );
                }
                bin = Some(data);
            }
            (_, CHUNK_TYPE_JSON | CHUNK_TYPE_BIN) => {
                issues.record_at_offset(
                    IssueCode::GlbDuplicateChunk,
                    chunk_offset,
                    format!("Chunk of type {} has already been used", chunk_type_name(chunk_type)),
                );
            }
            (_, other) => {
                issues.record_at_offset(
                    IssueCode::GlbUnknownChunkType,
                    chunk_offset + 4,
                    format!("Unknown GLB chunk type: {}", chunk_type_name(other)),
                );
            }
        }

        if truncated {
            break;
        }
        offset = (data_end + (4 - declared % 4) % 4).min(bytes.len());
    }

    let Some(json) = json else {
        return Err(GlbError::MissingJsonChunk { offset });
    };

    debug!(
        "GLB v{version}: JSON chunk {} bytes, BIN chunk {:?} bytes",
        json.len(),
        bin.map(<[u8]>::len)
    );
    Ok(GlbChunks { version, json, bin })
}
