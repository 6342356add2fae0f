use super::accessor::Accessor;
use super::document::Document;
use super::issues::{IssueCode, IssueCollector};
use super::layout::AccessorType;
use super::reader::{ObjectReader, escape_pointer_segment};
use super::registry::{ArrayKind, Registry};

const MESH_KEYS: [&str; 2] = ["primitives", "weights"];
const PRIMITIVE_KEYS: [&str; 5] = ["attributes", "indices", "material", "mode", "targets"];

pub(super) const MODE_TRIANGLES: u64 = 4;
pub(super) const MODE_TRIANGLE_STRIP: u64 = 5;
pub(super) const MODE_TRIANGLE_FAN: u64 = 6;

#[derive(Debug, Clone, Default)]
pub(super) struct Mesh {
    pub(super) primitives: Vec<Primitive>,
    pub(super) weights: Option<Vec<f64>>,
}

impl Mesh {
    /// Morph target count of the mesh, taken from its first primitive.
    pub(super) fn morph_target_count(&self) -> usize {
        self.primitives
            .first()
            .map_or(0, |primitive| primitive.targets.len())
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct Primitive {
    /// Position inside the `primitives` array.
    pub(super) position: usize,
    /// `(semantic, accessor)` pairs that resolved.
    pub(super) attributes: Vec<(String, usize)>,
    pub(super) indices: Option<usize>,
    pub(super) material: Option<usize>,
    pub(super) mode: u64,
    pub(super) targets: Vec<Vec<(String, usize)>>,
}

impl Primitive {
    pub(super) fn attribute(&self, semantic: &str) -> Option<usize> {
        self.attributes
            .iter()
            .find(|(name, _)| name == semantic)
            .map(|(_, accessor)| *accessor)
    }

    /// Every accessor the primitive references.
    pub(super) fn accessors(&self) -> impl Iterator<Item = usize> + '_ {
        self.attributes
            .iter()
            .chain(self.targets.iter().flatten())
            .map(|(_, accessor)| *accessor)
            .chain(self.indices)
    }
}

pub(super) fn parse_mesh(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Mesh {
    reader.check_keys(&MESH_KEYS, issues);

    let mut primitives = Vec::new();
    if let Some(items) = reader.required_array("primitives", issues) {
        if items.is_empty() {
            issues.record(
                IssueCode::InvalidArrayLength,
                reader.child("primitives"),
                "Invalid array length 0. Valid lengths are: 1 or more",
            );
        }
        for (position, item) in items.iter().enumerate() {
            let pointer = format!("{}/{position}", reader.child("primitives"));
            if let Some(primitive) = ObjectReader::new(item, pointer, issues) {
                primitives.push(parse_primitive(&primitive, position, registry, issues));
            }
        }
    }

    Mesh {
        primitives,
        weights: reader.number_array("weights", issues),
    }
}

fn parse_primitive(
    reader: &ObjectReader<'_>,
    position: usize,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Primitive {
    reader.check_keys(&PRIMITIVE_KEYS, issues);

    let attributes = reader
        .required_object("attributes", issues)
        .map(|attributes| attribute_map(&attributes, registry, issues))
        .unwrap_or_default();

    let mode = reader.uint("mode", issues).unwrap_or(MODE_TRIANGLES);
    if mode > MODE_TRIANGLE_FAN {
        issues.record(
            IssueCode::ValueNotInRange,
            reader.child("mode"),
            format!("Value {mode} is out of range"),
        );
    }

    let mut targets = Vec::new();
    if let Some(items) = reader.array("targets", issues) {
        for (target_position, item) in items.iter().enumerate() {
            let pointer = format!("{}/{target_position}", reader.child("targets"));
            if let Some(target) = ObjectReader::new(item, pointer, issues) {
                targets.push(attribute_map(&target, registry, issues));
            }
        }
    }

    Primitive {
        position,
        attributes,
        indices: reader.index("indices", ArrayKind::Accessors, registry, issues),
        material: reader.index("material", ArrayKind::Materials, registry, issues),
        mode,
        targets,
    }
}

fn attribute_map(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Vec<(String, usize)> {
    reader
        .entries()
        .filter_map(|(semantic, value)| {
            registry
                .resolve(ArrayKind::Accessors, value, &reader.child(semantic), issues)
                .map(|accessor| (semantic.clone(), accessor))
        })
        .collect()
}

fn valid_accessor<'d>(
    document: &'d Document,
    registry: &Registry,
    index: usize,
) -> Option<&'d Accessor> {
    registry
        .is_valid(ArrayKind::Accessors, index)
        .then(|| document.accessors.get(index))
        .flatten()
}

pub(super) fn validate_meshes(
    document: &Document,
    registry: &Registry,
    issues: &mut IssueCollector,
) {
    for (mesh_index, mesh) in document.meshes.iter().enumerate() {
        if !registry.is_valid(ArrayKind::Meshes, mesh_index) {
            continue;
        }
        let pointer = format!("/meshes/{mesh_index}");
        let target_count = mesh.morph_target_count();

        for primitive in &mesh.primitives {
            let primitive_pointer = format!("{pointer}/primitives/{}", primitive.position);

            if primitive.targets.len() != target_count {
                issues.record(
                    IssueCode::MeshPrimitivesUnequalTargetsCount,
                    format!("{primitive_pointer}/targets"),
                    "All primitives must have the same number of morph targets",
                );
            }

            if primitive.attribute("POSITION").is_none() {
                issues.record(
                    IssueCode::MeshPrimitiveNoPosition,
                    format!("{primitive_pointer}/attributes"),
                    "No POSITION attribute found",
                );
            }

            let mut shared_count: Option<u64> = None;
            for (semantic, accessor_index) in &primitive.attributes {
                let Some(count) = valid_accessor(document, registry, *accessor_index)
                    .and_then(|accessor| accessor.count)
                else {
                    continue;
                };
                match shared_count {
                    None => shared_count = Some(count),
                    Some(expected) if expected != count => {
                        issues.record(
                            IssueCode::MeshPrimitiveUnequalAccessorCount,
                            format!(
                                "{primitive_pointer}/attributes/{}",
                                escape_pointer_segment(semantic)
                            ),
                            format!(
                                "All accessors of the same primitive must have the same count ({count} != {expected})"
                            ),
                        );
                    }
                    Some(_) => {}
                }
            }

            if let Some(indices) = primitive.indices
                && let Some(accessor) = valid_accessor(document, registry, indices)
            {
                let is_index_format = matches!(
                    accessor.format(),
                    Some((component_type, AccessorType::Scalar))
                        if component_type.is_unsigned_integer()
                );
                if !is_index_format {
                    issues.record(
                        IssueCode::MeshPrimitiveIndicesAccessorInvalidFormat,
                        format!("{primitive_pointer}/indices"),
                        format!(
                            "Invalid indices accessor format '{}'. Must be one of ('{{SCALAR, UNSIGNED_BYTE}}', '{{SCALAR, UNSIGNED_SHORT}}', '{{SCALAR, UNSIGNED_INT}}')",
                            accessor.format_name()
                        ),
                    );
                }
            }
        }

        if let Some(weights) = &mesh.weights
            && weights.len() != target_count
        {
            issues.record(
                IssueCode::MeshInvalidWeightsCount,
                format!("{pointer}/weights"),
                format!(
                    "The length of weights array ({}) does not match the number of morph targets ({target_count})",
                    weights.len()
                ),
            );
        }
    }
}
