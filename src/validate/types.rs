use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─── Options ──────────────────────────────────────────────────────────────────

/// Validation options shared by the CLI and library entry points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationOptions {
    /// Name reported back in the result; usually the input file name.
    pub uri: String,
    /// Maximum number of issues to keep. `0` keeps everything.
    pub max_issues: usize,
    /// Issue codes dropped at record time.
    pub ignored_issues: Vec<String>,
    /// Per-code severity replacing the built-in default.
    pub severity_overrides: BTreeMap<String, Severity>,
    /// Decode accessor bytes and run the data-dependent checks.
    pub validate_accessor_data: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            uri: String::new(),
            max_issues: 0,
            ignored_issues: Vec::new(),
            severity_overrides: BTreeMap::new(),
            validate_accessor_data: true,
        }
    }
}

// ─── Issues ───────────────────────────────────────────────────────────────────

/// Severity level used by validation issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A single validation issue. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub code: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    pub message: String,
}

/// Issue list with aggregate counts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IssuesSummary {
    pub num_errors: usize,
    pub num_warnings: usize,
    pub num_infos: usize,
    pub truncated: bool,
    pub messages: Vec<ValidationIssue>,
}

// ─── Report ───────────────────────────────────────────────────────────────────

pub const MIME_TYPE_GLTF: &str = "model/gltf+json";
pub const MIME_TYPE_GLB: &str = "model/gltf-binary";

/// Summary statistics about a document that could be parsed.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    pub extensions_used: Vec<String>,
    pub extensions_required: Vec<String>,
    pub animation_count: usize,
    pub material_count: usize,
    pub has_morph_targets: bool,
    pub has_skins: bool,
    pub has_textures: bool,
    pub has_default_scene: bool,
    pub draw_call_count: usize,
    pub total_vertex_count: usize,
    pub total_triangle_count: usize,
    pub max_uvs: usize,
    pub max_influences: usize,
    pub max_attributes: usize,
}

/// Full validation result returned for every input, valid or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub uri: String,
    pub mime_type: String,
    pub validator_version: String,
    pub issues: IssuesSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<AssetInfo>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.issues.num_errors > 0
    }
}
