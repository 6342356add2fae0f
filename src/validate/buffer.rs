//! Buffers, buffer views and the bytes behind them.

use std::borrow::Cow;
use std::ops::Range;

use log::{debug, warn};

use super::document::Document;
use super::issues::{IssueCode, IssueCollector};
use super::layout::{ARRAY_BUFFER, ELEMENT_ARRAY_BUFFER};
use super::reader::ObjectReader;
use super::registry::{ArrayKind, Registry};
use super::uri::{BUFFER_MIME_TYPES, UriKind, classify};
use crate::resource::ResourceLoader;

const BUFFER_KEYS: [&str; 2] = ["uri", "byteLength"];
const BUFFER_VIEW_KEYS: [&str; 5] = ["buffer", "byteOffset", "byteLength", "byteStride", "target"];

#[derive(Debug, Clone, Default)]
pub(super) struct Buffer {
    pub(super) uri: Option<String>,
    pub(super) byte_length: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct BufferView {
    pub(super) buffer: Option<usize>,
    pub(super) byte_offset: u64,
    pub(super) byte_length: Option<u64>,
    pub(super) byte_stride: Option<u64>,
    pub(super) target: Option<u64>,
    /// An optional layout property was present but unusable.
    pub(super) malformed: bool,
}

impl BufferView {
    /// Byte range of the view inside its buffer.
    pub(super) fn effective_byte_range(&self) -> Option<Range<u64>> {
        let end = self.byte_offset.checked_add(self.byte_length?)?;
        Some(self.byte_offset..end)
    }
}

pub(super) fn parse_buffer(reader: &ObjectReader<'_>, issues: &mut IssueCollector) -> Buffer {
    reader.check_keys(&BUFFER_KEYS, issues);
    Buffer {
        uri: reader.string("uri", issues).map(str::to_string),
        byte_length: reader.uint_at_least("byteLength", 1, true, issues),
    }
}

pub(super) fn parse_buffer_view(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> BufferView {
    reader.check_keys(&BUFFER_VIEW_KEYS, issues);
    let buffer = reader.required_index("buffer", ArrayKind::Buffers, registry, issues);
    let byte_offset = reader.uint("byteOffset", issues);
    let byte_length = reader.uint_at_least("byteLength", 1, true, issues);
    let byte_stride = reader.uint("byteStride", issues);
    let target = reader.uint("target", issues);

    BufferView {
        buffer,
        malformed: reader.rejected("byteOffset", &byte_offset)
            || reader.rejected("byteStride", &byte_stride),
        byte_offset: byte_offset.unwrap_or(0),
        byte_length,
        byte_stride,
        target,
    }
}

/// Payloads bound to each buffer, borrowed from the BIN chunk or owned when
/// decoded or loaded.
#[derive(Debug, Default)]
pub(super) struct BufferData<'a> {
    payloads: Vec<Option<Cow<'a, [u8]>>>,
}

impl BufferData<'_> {
    pub(super) fn buffer(&self, index: usize) -> Option<&[u8]> {
        self.payloads.get(index)?.as_deref()
    }

    /// Bytes covered by a valid buffer view, if its buffer has data.
    pub(super) fn view_bytes(
        &self,
        document: &Document,
        registry: &Registry,
        view_index: usize,
    ) -> Option<&[u8]> {
        if !registry.is_valid(ArrayKind::BufferViews, view_index) {
            return None;
        }
        let view = document.buffer_views.get(view_index)?;
        let range = view.effective_byte_range()?;
        let bytes = self.buffer(view.buffer?)?;
        let start = usize::try_from(range.start).ok()?;
        let end = usize::try_from(range.end).ok()?;
        bytes.get(start..end)
    }
}

/// Resolve the payload of every buffer: the GLB BIN chunk for an uri-less
/// buffer 0, embedded `data:` URIs, or the resource loader. Uri-less buffers
/// of a JSON document simply have no data.
pub(super) fn bind_buffer_data<'a>(
    document: &Document,
    is_glb: bool,
    bin: Option<&'a [u8]>,
    loader: &dyn ResourceLoader,
    registry: &mut Registry,
    issues: &mut IssueCollector,
) -> BufferData<'a> {
    let mut payloads = Vec::with_capacity(document.buffers.len());
    let mut bin_bound = false;

    for (index, buffer) in document.buffers.iter().enumerate() {
        let pointer = format!("/buffers/{index}");
        if buffer.byte_length.is_none() {
            registry.mark_invalid(ArrayKind::Buffers, index);
        }

        let payload = match buffer.uri.as_deref() {
            None if index == 0 && bin.is_some() => {
                bin_bound = true;
                bin.map(|bin| {
                    check_glb_payload(bin, buffer.byte_length, &pointer, issues);
                    Cow::Borrowed(bin)
                })
            }
            None => {
                if is_glb && registry.is_valid(ArrayKind::Buffers, index) {
                    issues.record(
                        IssueCode::BufferMissingGlbData,
                        pointer,
                        "Buffer refers to an unresolved GLB binary chunk",
                    );
                }
                None
            }
            Some(uri) => load_uri_payload(uri, buffer.byte_length, &pointer, loader, issues),
        };
        payloads.push(payload);
    }

    if let Some(bin) = bin
        && !bin_bound
    {
        issues.record(
            IssueCode::GlbUnusedBinChunk,
            "/",
            format!("GLB-stored BIN chunk ({} bytes) is not used by any buffer", bin.len()),
        );
    }

    BufferData { payloads }
}

fn check_glb_payload(
    bin: &[u8],
    byte_length: Option<u64>,
    pointer: &str,
    issues: &mut IssueCollector,
) {
    let Some(byte_length) = byte_length else {
        return;
    };
    let actual = bin.len() as u64;
    if actual < byte_length {
        issues.record(
            IssueCode::BufferExternalBytelengthMismatch,
            format!("{pointer}/byteLength"),
            format!(
                "Actual data length {actual} is less than the declared buffer byteLength {byte_length}"
            ),
        );
    } else if actual > byte_length + 3 {
        issues.record(
            IssueCode::BufferGlbChunkTooBig,
            format!("{pointer}/byteLength"),
            format!("GLB-stored BIN chunk contains {} extra padding byte(s)", actual - byte_length),
        );
    }
}

fn load_uri_payload<'a>(
    uri: &str,
    byte_length: Option<u64>,
    pointer: &str,
    loader: &dyn ResourceLoader,
    issues: &mut IssueCollector,
) -> Option<Cow<'a, [u8]>> {
    let uri_pointer = format!("{pointer}/uri");
    match classify(uri) {
        UriKind::Data(Err(error)) => {
            issues.record(IssueCode::InvalidUri, uri_pointer, format!("Invalid URI: {error}"));
            None
        }
        UriKind::Data(Ok(data)) => {
            if !BUFFER_MIME_TYPES.contains(&data.mime_type.as_str()) {
                issues.record(
                    IssueCode::UnsupportedMimeType,
                    uri_pointer,
                    format!("Unsupported buffer MIME type '{}'", data.mime_type),
                );
                return None;
            }
            let actual = data.payload.len() as u64;
            if let Some(byte_length) = byte_length
                && actual != byte_length
            {
                issues.record(
                    IssueCode::BufferEmbeddedBytelengthMismatch,
                    format!("{pointer}/byteLength"),
                    format!(
                        "Actual data length {actual} is not equal to the declared buffer byteLength {byte_length}"
                    ),
                );
            }
            Some(Cow::Owned(data.payload))
        }
        UriKind::External(uri) => match loader.load(uri) {
            Ok(Some(bytes)) => {
                let actual = bytes.len() as u64;
                if let Some(byte_length) = byte_length
                    && actual < byte_length
                {
                    issues.record(
                        IssueCode::BufferExternalBytelengthMismatch,
                        format!("{pointer}/byteLength"),
                        format!(
                            "Actual data length {actual} is less than the declared buffer byteLength {byte_length}"
                        ),
                    );
                }
                debug!("Bound {actual} bytes to {pointer} from {uri}");
                Some(Cow::Owned(bytes))
            }
            Ok(None) => None,
            Err(error) => {
                warn!("Failed to load buffer {uri}: {error}");
                issues.record(IssueCode::IoError, uri_pointer, error.to_string());
                None
            }
        },
    }
}

/// Range and stride checks for every buffer view; failures flag the view
/// invalid so accessors skip their byte-level checks.
pub(super) fn validate_buffer_views(
    document: &Document,
    registry: &mut Registry,
    issues: &mut IssueCollector,
) {
    for (index, view) in document.buffer_views.iter().enumerate() {
        if !registry.is_valid(ArrayKind::BufferViews, index) {
            continue;
        }
        let pointer = format!("/bufferViews/{index}");
        let mut valid = !view.malformed && view.buffer.is_some() && view.byte_length.is_some();

        if let Some(stride) = view.byte_stride {
            if !(4..=252).contains(&stride) {
                issues.record(
                    IssueCode::ValueNotInRange,
                    format!("{pointer}/byteStride"),
                    format!("Value {stride} is out of range"),
                );
                valid = false;
            } else if stride % 4 != 0 {
                issues.record(
                    IssueCode::ValueMultipleOf,
                    format!("{pointer}/byteStride"),
                    format!("Value {stride} is not a multiple of 4"),
                );
                valid = false;
            }
            if view.target == Some(ELEMENT_ARRAY_BUFFER) {
                issues.record(
                    IssueCode::BufferViewElementArrayByteStride,
                    format!("{pointer}/byteStride"),
                    "bufferView.byteStride must not be defined for indices",
                );
            }
        }

        if let Some(target) = view.target
            && target != ARRAY_BUFFER
            && target != ELEMENT_ARRAY_BUFFER
        {
            issues.record(
                IssueCode::ValueNotInList,
                format!("{pointer}/target"),
                format!("Invalid value {target}. Valid values are (34962, 34963)"),
            );
        }

        if let (Some(buffer), Some(byte_length)) = (view.buffer, view.byte_length) {
            match document.buffers.get(buffer).and_then(|buffer| buffer.byte_length) {
                Some(buffer_length) if registry.is_valid(ArrayKind::Buffers, buffer) => {
                    let end = view.byte_offset.saturating_add(byte_length);
                    if end > buffer_length {
                        issues.record(
                            IssueCode::BufferViewTooLong,
                            pointer.as_str(),
                            format!(
                                "BufferView does not fit buffer ({buffer}) byteLength ({end} > {buffer_length})"
                            ),
                        );
                        valid = false;
                    }
                }
                _ => valid = false,
            }
        }

        if !valid {
            registry.mark_invalid(ArrayKind::BufferViews, index);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resource::NoExternalResources;
    use crate::validate::document::tests::parse_document;

    fn codes(issues: &IssueCollector) -> Vec<&str> {
        issues.issues().iter().map(|issue| issue.code.as_str()).collect()
    }

    #[test]
    fn given_views_overrunning_buffer_when_validating_then_too_long_is_reported_and_view_invalid() {
        let (document, mut registry, mut issues) = parse_document(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 16}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 4, "byteLength": 12},
                {"buffer": 0, "byteOffset": 8, "byteLength": 12}
            ]
        }));

        validate_buffer_views(&document, &mut registry, &mut issues);

        assert_eq!(codes(&issues), vec!["BUFFER_VIEW_TOO_LONG"]);
        assert_eq!(issues.issues()[0].pointer.as_deref(), Some("/bufferViews/1"));
        assert!(registry.is_valid(ArrayKind::BufferViews, 0));
        assert!(!registry.is_valid(ArrayKind::BufferViews, 1));
    }

    #[test]
    fn given_bad_strides_and_targets_when_validating_then_each_rule_reports() {
        let (document, mut registry, mut issues) = parse_document(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 64}],
            "bufferViews": [
                {"buffer": 0, "byteLength": 8, "byteStride": 2},
                {"buffer": 0, "byteLength": 8, "byteStride": 6},
                {"buffer": 0, "byteLength": 8, "byteStride": 4, "target": 34963},
                {"buffer": 0, "byteLength": 8, "target": 1}
            ]
        }));

        validate_buffer_views(&document, &mut registry, &mut issues);

        assert_eq!(
            codes(&issues),
            vec![
                "VALUE_NOT_IN_RANGE",
                "VALUE_MULTIPLE_OF",
                "BUFFER_VIEW_ELEMENT_ARRAY_BYTE_STRIDE",
                "VALUE_NOT_IN_LIST",
            ]
        );
    }

    #[test]
    fn given_embedded_buffer_when_binding_then_length_mismatch_is_reported() {
        let (document, mut registry, mut issues) = parse_document(json!({
            "asset": {"version": "2.0"},
            "buffers": [
                {"byteLength": 5, "uri": "data:application/octet-stream;base64,AAECAw=="},
                {"byteLength": 4, "uri": "data:image/png;base64,AAECAw=="},
                {"byteLength": 4, "uri": "data:application/gltf-buffer,AAECAw=="}
            ]
        }));

        let data = bind_buffer_data(
            &document,
            false,
            None,
            &NoExternalResources,
            &mut registry,
            &mut issues,
        );

        assert_eq!(
            codes(&issues),
            vec![
                "BUFFER_EMBEDDED_BYTELENGTH_MISMATCH",
                "UNSUPPORTED_MIME_TYPE",
                "INVALID_URI",
            ]
        );
        assert_eq!(data.buffer(0), Some(&[0u8, 1, 2, 3][..]));
        assert_eq!(data.buffer(1), None);
    }

    #[test]
    fn given_glb_bin_chunk_when_binding_then_first_uriless_buffer_takes_it() {
        let (document, mut registry, mut issues) = parse_document(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 4}, {"byteLength": 4}],
            "bufferViews": [{"buffer": 0, "byteOffset": 2, "byteLength": 2}]
        }));
        let bin = [1u8, 2, 3, 4];

        let data = bind_buffer_data(
            &document,
            true,
            Some(&bin),
            &NoExternalResources,
            &mut registry,
            &mut issues,
        );

        assert_eq!(codes(&issues), vec!["BUFFER_MISSING_GLB_DATA"]);
        assert_eq!(issues.issues()[0].pointer.as_deref(), Some("/buffers/1"));
        assert_eq!(data.view_bytes(&document, &registry, 0), Some(&[3u8, 4][..]));
    }

    #[test]
    fn given_bin_chunk_and_uri_buffer_when_binding_then_unused_bin_is_reported() {
        let (document, mut registry, mut issues) = parse_document(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 4, "uri": "external.bin"}]
        }));

        let data = bind_buffer_data(
            &document,
            true,
            Some(&[0u8; 8]),
            &NoExternalResources,
            &mut registry,
            &mut issues,
        );

        assert_eq!(codes(&issues), vec!["GLB_UNUSED_BIN_CHUNK"]);
        assert_eq!(data.buffer(0), None);
    }
}
