//! glTF 2.0 / GLB validation pipeline.
//!
//! Stages run in dependency order and communicate only through the issue
//! collector and the registry's validity flags:
//! container → JSON → registry → document → buffers → accessors →
//! meshes/nodes/skins → animations → usage → extensions → info.

mod accessor;
mod animation;
mod buffer;
mod document;
mod extensions;
pub mod glb;
mod info;
pub mod issues;
pub mod layout;
mod mesh;
mod node;
mod reader;
pub mod registry;
pub mod types;
mod uri;
mod usage;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;

use crate::resource::{FileResourceLoader, ResourceLoader};

use self::accessor::validate_accessors;
use self::animation::validate_animations;
use self::buffer::{bind_buffer_data, validate_buffer_views};
use self::document::Document;
use self::extensions::validate_extensions;
use self::glb::{is_glb, parse_glb};
use self::info::collect_info;
use self::issues::{IssueCode, IssueCollector};
use self::mesh::validate_meshes;
use self::node::{validate_nodes, validate_skins};
use self::reader::ObjectReader;
use self::registry::{ArrayKind, Registry};
use self::types::{AssetInfo, MIME_TYPE_GLB, MIME_TYPE_GLTF, ValidationOptions, ValidationReport};
use self::usage::track_usage;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Validate a glTF or GLB byte buffer. Never fails: every problem, including
/// input that is not glTF at all, ends up as an issue in the report.
pub fn validate_bytes(
    bytes: &[u8],
    options: &ValidationOptions,
    loader: &dyn ResourceLoader,
) -> ValidationReport {
    let mut issues = IssueCollector::from_options(options);
    let glb = is_glb(bytes);
    debug!(
        "Validating {} ({} bytes, {})",
        options.uri,
        bytes.len(),
        if glb { "GLB" } else { "JSON" }
    );

    let info = if glb {
        match parse_glb(bytes, &mut issues) {
            Ok(chunks) => {
                validate_json(chunks.json, true, chunks.bin, options, loader, &mut issues)
            }
            Err(error) => {
                issues.record_at_offset(error.code(), error.offset(), error.to_string());
                None
            }
        }
    } else {
        validate_json(bytes, false, None, options, loader, &mut issues)
    };

    if issues.is_full() {
        debug!("Issue limit of {} reached", options.max_issues);
    }

    ValidationReport {
        uri: options.uri.clone(),
        mime_type: if glb { MIME_TYPE_GLB } else { MIME_TYPE_GLTF }.to_string(),
        validator_version: env!("CARGO_PKG_VERSION").to_string(),
        issues: issues.into_summary(),
        info,
    }
}

/// Read and validate a file. External resources are resolved relative to the
/// file's directory. Only I/O failures on the file itself are errors.
pub fn validate_file(path: &Path, options: &ValidationOptions) -> Result<ValidationReport> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read input file: {}", path.display()))?;

    let mut options = options.clone();
    if options.uri.is_empty() {
        options.uri = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let loader = FileResourceLoader::new(base_dir);

    Ok(validate_bytes(&bytes, &options, &loader))
}

fn validate_json(
    json: &[u8],
    is_glb: bool,
    bin: Option<&[u8]>,
    options: &ValidationOptions,
    loader: &dyn ResourceLoader,
    issues: &mut IssueCollector,
) -> Option<AssetInfo> {
    let json = match json.strip_prefix(UTF8_BOM) {
        Some(rest) => {
            issues.record(
                IssueCode::BomFound,
                "/",
                "Invalid BOM: the JSON content must not begin with a byte order mark",
            );
            rest
        }
        None => json,
    };

    let root = match serde_json::from_slice::<Value>(json) {
        Ok(Value::Object(root)) => root,
        Ok(other) => {
            issues.record(
                IssueCode::TypeMismatch,
                "/",
                format!(
                    "Type mismatch. {} is not an object",
                    registry::describe(&other)
                ),
            );
            return None;
        }
        Err(error) => {
            issues.record(IssueCode::InvalidJson, "/", format!("Invalid JSON data: {error}"));
            return None;
        }
    };

    let mut registry = Registry::new(&root, issues);
    for kind in ArrayKind::ALL {
        debug!("{}: {} entries", kind.key(), registry.len(kind));
    }

    let reader = ObjectReader::from_map(&root, "");
    let document = Document::parse(&reader, &mut registry, issues);

    let data = bind_buffer_data(&document, is_glb, bin, loader, &mut registry, issues);
    validate_buffer_views(&document, &mut registry, issues);
    validate_accessors(&document, &mut registry, &data, options, issues);
    validate_meshes(&document, &registry, issues);
    validate_nodes(&document, &registry, issues);
    validate_skins(&document, &registry, issues);
    validate_animations(&document, &registry, &data, options, issues);
    let usage = track_usage(&document, &registry, issues);
    validate_extensions(&root, &document, issues);

    debug!(
        "Validation finished: {} errors, {} warnings, {} infos",
        issues.num_errors(),
        issues.num_warnings(),
        issues.num_infos()
    );
    Some(collect_info(&document, &registry, &usage))
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use gltf::binary::{Glb, Header};
    use serde_json::json;

    use super::*;
    use crate::resource::NoExternalResources;
    use crate::validate::types::Severity;

    fn options(uri: &str) -> ValidationOptions {
        ValidationOptions {
            uri: uri.to_string(),
            ..ValidationOptions::default()
        }
    }

    fn validate_value(value: serde_json::Value, options: &ValidationOptions) -> ValidationReport {
        let bytes = serde_json::to_vec(&value).expect("serialize fixture");
        validate_bytes(&bytes, options, &NoExternalResources)
    }

    fn codes(report: &ValidationReport) -> Vec<&str> {
        report
            .issues
            .messages
            .iter()
            .map(|issue| issue.code.as_str())
            .collect()
    }

    fn triangle() -> (serde_json::Value, Vec<u8>) {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bin = positions
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect::<Vec<_>>();
        let json = json!({
            "asset": {"version": "2.0", "generator": "test"},
            "buffers": [{"byteLength": 36}],
            "bufferViews": [{"buffer": 0, "byteLength": 36, "target": 34962}],
            "accessors": [{
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            }],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
            "nodes": [{"mesh": 0}],
            "scenes": [{"nodes": [0]}],
            "scene": 0
        });
        (json, bin)
    }

    #[test]
    fn given_minimal_asset_when_validating_then_report_has_no_errors() {
        let report = validate_value(json!({"asset": {"version": "2.0"}}), &options("min.gltf"));

        assert!(!report.has_errors());
        assert_eq!(report.mime_type, MIME_TYPE_GLTF);
        assert_eq!(report.uri, "min.gltf");
        assert_eq!(
            report.info.and_then(|info| info.version).as_deref(),
            Some("2.0")
        );
    }

    #[test]
    fn given_reference_encoded_triangle_glb_when_validating_then_it_is_clean() {
        let (json, bin) = triangle();
        let json = serde_json::to_vec(&json).expect("serialize fixture");
        let bytes = Glb {
            header: Header {
                magic: *b"glTF",
                version: 2,
                length: (12 + 8 + json.len().div_ceil(4) * 4 + 8 + bin.len()) as u32,
            },
            json: Cow::Owned(json),
            bin: Some(Cow::Borrowed(&bin)),
        }
        .to_vec()
        .expect("encode GLB");

        let report = validate_bytes(&bytes, &options("triangle.glb"), &NoExternalResources);

        assert!(report.issues.messages.is_empty(), "{:?}", report.issues.messages);
        assert_eq!(report.mime_type, MIME_TYPE_GLB);
        let info = report.info.expect("info");
        assert_eq!(info.draw_call_count, 1);
        assert_eq!(info.total_vertex_count, 3);
        assert_eq!(info.total_triangle_count, 1);
        assert_eq!(info.generator.as_deref(), Some("test"));
    }

    #[test]
    fn given_glb_with_bin_first_when_validating_then_one_fatal_issue_and_uri_are_returned() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"glTF");
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&24u32.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(b"BIN\0");
        bytes.extend_from_slice(&[0, 0, 0, 0]);

        let report = validate_bytes(&bytes, &options("broken.glb"), &NoExternalResources);

        assert!(report.has_errors());
        assert_eq!(codes(&report), vec!["GLB_UNEXPECTED_FIRST_CHUNK"]);
        assert_eq!(report.issues.messages[0].offset, Some(12));
        assert_eq!(report.uri, "broken.glb");
        assert!(report.info.is_none());
    }

    #[test]
    fn given_unparseable_or_non_object_json_when_validating_then_single_issue_without_info() {
        let report = validate_bytes(b"{\"asset\":", &options("a.gltf"), &NoExternalResources);
        assert_eq!(codes(&report), vec!["INVALID_JSON"]);
        assert!(report.info.is_none());

        let report = validate_bytes(b"[1, 2]", &options("b.gltf"), &NoExternalResources);
        assert_eq!(codes(&report), vec!["TYPE_MISMATCH"]);
        assert_eq!(report.issues.messages[0].pointer.as_deref(), Some("/"));
        assert!(report.info.is_none());
    }

    #[test]
    fn given_leading_bom_when_validating_then_warning_is_recorded_and_document_is_read() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(br#"{"asset":{"version":"2.0"}}"#);

        let report = validate_bytes(&bytes, &options("bom.gltf"), &NoExternalResources);

        assert_eq!(codes(&report), vec!["BOM_FOUND"]);
        assert_eq!(report.issues.num_warnings, 1);
        assert!(report.info.is_some());
    }

    #[test]
    fn given_misaligned_mat4_accessor_when_validating_then_alignment_and_length_are_reported() {
        let report = validate_value(
            json!({
                "asset": {"version": "2.0"},
                "buffers": [{"byteLength": 64}],
                "bufferViews": [{"buffer": 0, "byteLength": 64}],
                "accessors": [{
                    "componentType": 5126, "count": 16, "type": "MAT4",
                    "bufferView": 0, "byteOffset": 1
                }],
                "skins": [{"joints": [0], "inverseBindMatrices": 0}],
                "nodes": [{"skin": 0}],
                "scenes": [{"nodes": [0]}]
            }),
            &options("mat4.gltf"),
        );

        let codes = codes(&report);
        assert!(codes.contains(&"ACCESSOR_OFFSET_ALIGNMENT"));
        assert!(codes.contains(&"ACCESSOR_TOO_LONG"));
        // The invalid accessor is not re-checked by the skin.
        assert!(!codes.contains(&"SKIN_IBM_INVALID_COUNT"));
    }

    #[test]
    fn given_cubic_spline_sampler_with_four_outputs_when_validating_then_count_error_is_reported() {
        let times: [f32; 3] = [0.0, 0.5, 1.0];
        let bytes = times.iter().flat_map(|value| value.to_le_bytes()).collect::<Vec<_>>();
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &bytes)
        );
        let report = validate_value(
            json!({
                "asset": {"version": "2.0"},
                "buffers": [{"byteLength": 12, "uri": uri}],
                "bufferViews": [{"buffer": 0, "byteLength": 12}],
                "accessors": [
                    {
                        "bufferView": 0, "componentType": 5126, "count": 3, "type": "SCALAR",
                        "min": [0.0], "max": [1.0]
                    },
                    {"componentType": 5126, "count": 4, "type": "VEC3"}
                ],
                "nodes": [{}],
                "scenes": [{"nodes": [0]}],
                "animations": [{
                    "samplers": [{"input": 0, "output": 1, "interpolation": "CUBICSPLINE"}],
                    "channels": [{"sampler": 0, "target": {"node": 0, "path": "translation"}}]
                }]
            }),
            &options("anim.gltf"),
        );

        assert_eq!(
            codes(&report),
            vec!["ANIMATION_SAMPLER_OUTPUT_ACCESSOR_INVALID_COUNT"]
        );
        assert_eq!(report.info.map(|info| info.animation_count), Some(1));
    }

    #[test]
    fn given_same_bytes_when_validating_twice_then_reports_are_identical() {
        let (json, _) = triangle();
        let first = validate_value(json.clone(), &options("twice.gltf"));
        let second = validate_value(json, &options("twice.gltf"));

        assert_eq!(
            serde_json::to_value(&first).expect("serialize"),
            serde_json::to_value(&second).expect("serialize")
        );
    }

    #[test]
    fn given_issue_options_when_validating_then_filters_overrides_and_cap_apply() {
        let document = json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 4}, {"byteLength": 4}, {"byteLength": 4}],
            "bogus": true
        });

        let ignoring = ValidationOptions {
            ignored_issues: vec!["UNEXPECTED_PROPERTY".to_string()],
            severity_overrides: [("UNUSED_OBJECT".to_string(), Severity::Error)].into(),
            ..options("opts.gltf")
        };
        let report = validate_value(document.clone(), &ignoring);
        assert_eq!(codes(&report), vec!["UNUSED_OBJECT"; 3]);
        assert_eq!(report.issues.num_errors, 3);

        let capped = ValidationOptions {
            max_issues: 2,
            ..options("opts.gltf")
        };
        let report = validate_value(document, &capped);
        assert_eq!(report.issues.messages.len(), 2);
        assert!(report.issues.truncated);
    }
}
