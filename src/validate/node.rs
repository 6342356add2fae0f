use nalgebra::{Matrix4, Quaternion};

use super::document::Document;
use super::issues::{IssueCode, IssueCollector};
use super::layout::{AccessorType, ComponentType};
use super::reader::ObjectReader;
use super::registry::{ArrayKind, Registry};

const NODE_KEYS: [&str; 9] = [
    "camera",
    "children",
    "skin",
    "matrix",
    "mesh",
    "rotation",
    "scale",
    "translation",
    "weights",
];
const SKIN_KEYS: [&str; 3] = ["inverseBindMatrices", "skeleton", "joints"];
const TRS_KEYS: [&str; 3] = ["translation", "rotation", "scale"];

/// Largest accepted deviation of a quaternion's length from 1.
pub(super) const UNIT_LENGTH_THRESHOLD: f64 = 0.00769;

#[derive(Debug, Clone, Default)]
pub(super) struct Node {
    /// `(position, node)` pairs of resolved children.
    pub(super) children: Vec<(usize, usize)>,
    pub(super) camera: Option<usize>,
    pub(super) mesh: Option<usize>,
    pub(super) skin: Option<usize>,
    pub(super) has_matrix: bool,
    pub(super) weights: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Skin {
    pub(super) joints: Vec<(usize, usize)>,
    /// Length of the raw `joints` array, resolved or not.
    pub(super) joint_count: usize,
    pub(super) skeleton: Option<usize>,
    pub(super) inverse_bind_matrices: Option<usize>,
}

pub(super) fn quaternion_length(xyzw: &[f64]) -> f64 {
    Quaternion::new(xyzw[3], xyzw[0], xyzw[1], xyzw[2]).norm()
}

pub(super) fn parse_node(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Node {
    reader.check_keys(&NODE_KEYS, issues);

    let has_matrix = reader.has("matrix");
    if has_matrix && TRS_KEYS.iter().any(|key| reader.has(key)) {
        issues.record(
            IssueCode::MutuallyExclusiveProperties,
            reader.pointer(),
            "The matrix property must not be defined together with translation, rotation or scale",
        );
    }

    if let Some(matrix) = reader.fixed_number_array("matrix", 16, issues) {
        let matrix = Matrix4::from_column_slice(&matrix);
        if !matrix.row(3).iter().copied().eq([0.0, 0.0, 0.0, 1.0]) {
            issues.record(
                IssueCode::NodeMatrixNotAffine,
                reader.child("matrix"),
                "Matrix must be an affine transform (last row must be [0, 0, 0, 1])",
            );
        }
    }

    reader.fixed_number_array("translation", 3, issues);
    reader.fixed_number_array("scale", 3, issues);
    if let Some(rotation) = reader.fixed_number_array("rotation", 4, issues) {
        let length = quaternion_length(&rotation);
        if (length - 1.0).abs() > UNIT_LENGTH_THRESHOLD {
            issues.record(
                IssueCode::RotationNonUnit,
                reader.child("rotation"),
                format!("Rotation quaternion must be normalized (length is {length})"),
            );
        }
    }

    Node {
        children: reader.index_array("children", ArrayKind::Nodes, registry, issues),
        camera: reader.index("camera", ArrayKind::Cameras, registry, issues),
        mesh: reader.index("mesh", ArrayKind::Meshes, registry, issues),
        skin: reader.index("skin", ArrayKind::Skins, registry, issues),
        has_matrix,
        weights: reader.number_array("weights", issues),
    }
}

pub(super) fn parse_skin(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Skin {
    reader.check_keys(&SKIN_KEYS, issues);

    let raw_joints = reader.raw("joints").and_then(|joints| joints.as_array());
    let joint_count = raw_joints.map_or(0, Vec::len);
    if raw_joints.is_some_and(|joints| joints.is_empty()) {
        issues.record(
            IssueCode::InvalidArrayLength,
            reader.child("joints"),
            "Invalid array length 0. Valid lengths are: 1 or more",
        );
    }

    Skin {
        joints: reader.required_index_array("joints", ArrayKind::Nodes, registry, issues),
        joint_count,
        skeleton: reader.index("skeleton", ArrayKind::Nodes, registry, issues),
        inverse_bind_matrices: reader.index(
            "inverseBindMatrices",
            ArrayKind::Accessors,
            registry,
            issues,
        ),
    }
}

/// Checks that need the node's mesh: morph weight count.
pub(super) fn validate_nodes(
    document: &Document,
    registry: &Registry,
    issues: &mut IssueCollector,
) {
    for (index, node) in document.nodes.iter().enumerate() {
        let (Some(weights), Some(mesh)) = (&node.weights, node.mesh) else {
            continue;
        };
        if !registry.is_valid(ArrayKind::Meshes, mesh) {
            continue;
        }
        let target_count = document.meshes[mesh].morph_target_count();
        if weights.len() != target_count {
            issues.record(
                IssueCode::NodeWeightsInvalid,
                format!("/nodes/{index}/weights"),
                format!(
                    "The length of weights array ({}) does not match the number of morph targets ({target_count})",
                    weights.len()
                ),
            );
        }
    }
}

/// Inverse bind matrices must be one MAT4 FLOAT per joint.
pub(super) fn validate_skins(
    document: &Document,
    registry: &Registry,
    issues: &mut IssueCollector,
) {
    for (index, skin) in document.skins.iter().enumerate() {
        let Some(accessor_index) = skin.inverse_bind_matrices else {
            continue;
        };
        if !registry.is_valid(ArrayKind::Accessors, accessor_index) {
            continue;
        }
        let accessor = &document.accessors[accessor_index];
        let pointer = format!("/skins/{index}/inverseBindMatrices");

        if accessor.format() != Some((ComponentType::Float, AccessorType::Mat4)) {
            issues.record(
                IssueCode::SkinIbmInvalidFormat,
                pointer.as_str(),
                format!(
                    "Invalid IBM accessor format '{}'. Must be one of ('{{MAT4, FLOAT}}')",
                    accessor.format_name()
                ),
            );
        }
        if let Some(count) = accessor.count
            && count != skin.joint_count as u64
        {
            issues.record(
                IssueCode::SkinIbmInvalidCount,
                pointer,
                format!(
                    "IBM accessor must have {} elements. Found {count}",
                    skin.joint_count
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::validate::document::tests::parse_document;

    fn codes(issues: &IssueCollector) -> Vec<&str> {
        issues.issues().iter().map(|issue| issue.code.as_str()).collect()
    }

    #[test]
    fn given_matrix_with_trs_when_parsing_then_exclusivity_and_affinity_are_checked() {
        let (_, _, issues) = parse_document(json!({
            "asset": {"version": "2.0"},
            "nodes": [{
                "matrix": [1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0.5, 0, 0, 0, 1],
                "translation": [0, 0, 0]
            }]
        }));

        assert_eq!(
            codes(&issues),
            vec!["MUTUALLY_EXCLUSIVE_PROPERTIES", "NODE_MATRIX_NOT_AFFINE"]
        );
    }

    #[test]
    fn given_bad_trs_arrays_when_parsing_then_length_and_unit_checks_apply() {
        let (_, _, issues) = parse_document(json!({
            "asset": {"version": "2.0"},
            "nodes": [
                {"translation": [0, 0], "rotation": [0, 0, 0, 2]},
                {"rotation": [0, 0, 0.7071068, 0.7071068], "scale": [1, 1, 1]}
            ]
        }));

        assert_eq!(
            codes(&issues),
            vec!["INVALID_ARRAY_LENGTH", "ROTATION_NON_UNIT"]
        );
    }

    #[test]
    fn given_node_weights_for_mesh_when_validating_then_morph_count_must_match() {
        let (document, registry, mut issues) = parse_document(json!({
            "asset": {"version": "2.0"},
            "accessors": [{"componentType": 5126, "count": 3, "type": "VEC3"}],
            "meshes": [{
                "primitives": [{"attributes": {"POSITION": 0}, "targets": [{"POSITION": 0}]}]
            }],
            "nodes": [{"mesh": 0, "weights": [0.5]}, {"mesh": 0, "weights": [0.5, 0.5]}]
        }));

        validate_nodes(&document, &registry, &mut issues);

        assert_eq!(codes(&issues), vec!["NODE_WEIGHTS_INVALID"]);
        assert_eq!(issues.issues()[0].pointer.as_deref(), Some("/nodes/1/weights"));
    }

    #[test]
    fn given_skin_ibm_accessor_when_validating_then_format_and_count_are_checked() {
        let (document, registry, mut issues) = parse_document(json!({
            "asset": {"version": "2.0"},
            "accessors": [{"componentType": 5126, "count": 1, "type": "MAT3"}],
            "nodes": [{}, {}],
            "skins": [{"joints": [0, 1], "inverseBindMatrices": 0}, {"joints": []}]
        }));

        validate_skins(&document, &registry, &mut issues);

        assert_eq!(
            codes(&issues),
            vec![
                "INVALID_ARRAY_LENGTH",
                "SKIN_IBM_INVALID_FORMAT",
                "SKIN_IBM_INVALID_COUNT"
            ]
        );
    }
}
