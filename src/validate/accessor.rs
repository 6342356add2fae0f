//! Accessor layout validation, sparse reconstruction and data checks.
//!
//! Structural failures mark the accessor invalid in the registry; consumers
//! (meshes, skins, animations) then skip their own byte-level checks.

use log::debug;

use super::buffer::BufferData;
use super::document::Document;
use super::issues::{IssueCode, IssueCollector};
use super::layout::{
    AccessorType, ComponentType, component_offset, element_byte_size, occupied_end,
    offset_alignment,
};
use super::reader::ObjectReader;
use super::registry::{ArrayKind, Registry};
use super::types::ValidationOptions;

const ACCESSOR_KEYS: [&str; 9] = [
    "bufferView",
    "byteOffset",
    "componentType",
    "normalized",
    "count",
    "type",
    "max",
    "min",
    "sparse",
];
const SPARSE_KEYS: [&str; 3] = ["count", "indices", "values"];
const SPARSE_INDICES_KEYS: [&str; 3] = ["bufferView", "byteOffset", "componentType"];
const SPARSE_VALUES_KEYS: [&str; 2] = ["bufferView", "byteOffset"];

/// Accessors without a buffer view decode to zeros; larger ones are skipped.
const MAX_IMPLICIT_COMPONENTS: u64 = 1 << 26;

#[derive(Debug, Clone, Default)]
pub(super) struct Accessor {
    pub(super) buffer_view: Option<usize>,
    pub(super) byte_offset: u64,
    pub(super) component_type: Option<ComponentType>,
    pub(super) accessor_type: Option<AccessorType>,
    pub(super) count: Option<u64>,
    pub(super) normalized: bool,
    pub(super) min: Option<Vec<f64>>,
    pub(super) max: Option<Vec<f64>>,
    pub(super) sparse: Option<Sparse>,
    pub(super) malformed: bool,
}

impl Accessor {
    /// Component and element type, when both are known values.
    pub(super) fn format(&self) -> Option<(ComponentType, AccessorType)> {
        Some((self.component_type?, self.accessor_type?))
    }

    /// `{TYPE, COMPONENT_TYPE}` for messages.
    pub(super) fn format_name(&self) -> String {
        format!(
            "{{{}, {}}}",
            self.accessor_type.map_or("?", AccessorType::as_str),
            self.component_type.map_or("?", ComponentType::name)
        )
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct Sparse {
    pub(super) count: Option<u64>,
    pub(super) indices: Option<SparseIndices>,
    pub(super) values: Option<SparseValues>,
}

#[derive(Debug, Clone)]
pub(super) struct SparseIndices {
    pub(super) buffer_view: Option<usize>,
    pub(super) byte_offset: u64,
    pub(super) component_type: Option<ComponentType>,
    pub(super) malformed: bool,
}

#[derive(Debug, Clone)]
pub(super) struct SparseValues {
    pub(super) buffer_view: Option<usize>,
    pub(super) byte_offset: u64,
    pub(super) malformed: bool,
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

pub(super) fn parse_accessor(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Accessor {
    reader.check_keys(&ACCESSOR_KEYS, issues);

    let buffer_view = reader.index("bufferView", ArrayKind::BufferViews, registry, issues);
    let byte_offset = reader.uint("byteOffset", issues);
    let component_type = parse_component_type(reader, false, issues);
    let accessor_type = reader.required_string("type", issues).and_then(|name| {
        let parsed = AccessorType::parse(name);
        if parsed.is_none() {
            issues.record(
                IssueCode::InvalidType,
                reader.child("type"),
                format!(
                    "Invalid value '{name}'. Valid values are (SCALAR, VEC2, VEC3, VEC4, MAT2, MAT3, MAT4)"
                ),
            );
        }
        parsed
    });
    let count = reader.uint_at_least("count", 1, true, issues);
    let normalized = reader.boolean("normalized", issues);
    let min = reader.number_array("min", issues);
    let max = reader.number_array("max", issues);
    let sparse = reader.object("sparse", issues);

    Accessor {
        malformed: reader.rejected("bufferView", &buffer_view)
            || reader.rejected("byteOffset", &byte_offset)
            || reader.rejected("sparse", &sparse),
        buffer_view,
        byte_offset: byte_offset.unwrap_or(0),
        component_type,
        accessor_type,
        count,
        normalized: normalized.unwrap_or(false),
        min,
        max,
        sparse: sparse.map(|sparse| parse_sparse(&sparse, registry, issues)),
    }
}

fn parse_component_type(
    reader: &ObjectReader<'_>,
    unsigned_only: bool,
    issues: &mut IssueCollector,
) -> Option<ComponentType> {
    let value = reader.required_uint("componentType", issues)?;
    let parsed = ComponentType::from_gl(value)
        .filter(|component_type| !unsigned_only || component_type.is_unsigned_integer());
    if parsed.is_none() {
        let valid = if unsigned_only {
            "5121, 5123, 5125"
        } else {
            "5120, 5121, 5122, 5123, 5125, 5126"
        };
        issues.record(
            IssueCode::InvalidComponentType,
            reader.child("componentType"),
            format!("Invalid value {value}. Valid values are ({valid})"),
        );
    }
    parsed
}

fn parse_sparse(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Sparse {
    reader.check_keys(&SPARSE_KEYS, issues);
    let count = reader.required_uint("count", issues);

    let indices = reader.required_object("indices", issues).map(|indices| {
        indices.check_keys(&SPARSE_INDICES_KEYS, issues);
        let byte_offset = indices.uint("byteOffset", issues);
        SparseIndices {
            buffer_view: indices.required_index(
                "bufferView",
                ArrayKind::BufferViews,
                registry,
                issues,
            ),
            malformed: indices.rejected("byteOffset", &byte_offset),
            byte_offset: byte_offset.unwrap_or(0),
            component_type: parse_component_type(&indices, true, issues),
        }
    });

    let values = reader.required_object("values", issues).map(|values| {
        values.check_keys(&SPARSE_VALUES_KEYS, issues);
        let byte_offset = values.uint("byteOffset", issues);
        SparseValues {
            buffer_view: values.required_index(
                "bufferView",
                ArrayKind::BufferViews,
                registry,
                issues,
            ),
            malformed: values.rejected("byteOffset", &byte_offset),
            byte_offset: byte_offset.unwrap_or(0),
        }
    });

    Sparse {
        count,
        indices,
        values,
    }
}

// ─── Layout ───────────────────────────────────────────────────────────────────

pub(super) fn validate_accessors(
    document: &Document,
    registry: &mut Registry,
    data: &BufferData<'_>,
    options: &ValidationOptions,
    issues: &mut IssueCollector,
) {
    for (index, accessor) in document.accessors.iter().enumerate() {
        if !registry.is_valid(ArrayKind::Accessors, index) {
            continue;
        }
        let pointer = format!("/accessors/{index}");

        let mut valid = validate_layout(document, registry, accessor, &pointer, issues);
        if let Some(sparse) = &accessor.sparse {
            valid &= validate_sparse_layout(document, registry, accessor, sparse, &pointer, issues);
        }

        if !valid {
            debug!("Accessor {index} failed layout checks");
            registry.mark_invalid(ArrayKind::Accessors, index);
            continue;
        }
        if options.validate_accessor_data {
            validate_data(document, registry, data, accessor, &pointer, issues);
        }
    }
}

fn validate_layout(
    document: &Document,
    registry: &Registry,
    accessor: &Accessor,
    pointer: &str,
    issues: &mut IssueCollector,
) -> bool {
    let format = accessor.format();
    let mut valid = !accessor.malformed && format.is_some() && accessor.count.is_some();

    if accessor.normalized
        && matches!(
            accessor.component_type,
            Some(ComponentType::Float | ComponentType::UnsignedInt)
        )
    {
        issues.record(
            IssueCode::AccessorNormalizedInvalid,
            format!("{pointer}/normalized"),
            "Only (u)byte and (u)short accessors can be normalized",
        );
    }

    if let Some((_, accessor_type)) = format {
        let components = accessor_type.components() as usize;
        for (key, bound) in [("min", &accessor.min), ("max", &accessor.max)] {
            if let Some(bound) = bound
                && bound.len() != components
            {
                issues.record(
                    IssueCode::InvalidArrayLength,
                    format!("{pointer}/{key}"),
                    format!(
                        "Invalid array length {}. Valid lengths are: {components}",
                        bound.len()
                    ),
                );
            }
        }
    }

    let (Some((component_type, accessor_type)), Some(count), Some(view_index)) =
        (format, accessor.count, accessor.buffer_view)
    else {
        return valid;
    };
    if !registry.is_valid(ArrayKind::BufferViews, view_index) {
        return false;
    }
    let view = &document.buffer_views[view_index];
    let element_size = element_byte_size(component_type, accessor_type);
    let alignment = offset_alignment(component_type, accessor_type);

    if accessor.byte_offset % alignment != 0 {
        issues.record(
            IssueCode::AccessorOffsetAlignment,
            format!("{pointer}/byteOffset"),
            format!(
                "Offset {} is not a multiple of {alignment}",
                accessor.byte_offset
            ),
        );
        valid = false;
    } else if view.byte_offset.saturating_add(accessor.byte_offset) % component_type.size() != 0 {
        issues.record(
            IssueCode::AccessorTotalOffsetAlignment,
            format!("{pointer}/byteOffset"),
            format!(
                "Accessor's total byteOffset {} isn't a multiple of componentType length {}",
                view.byte_offset.saturating_add(accessor.byte_offset),
                component_type.size()
            ),
        );
        valid = false;
    }

    if let Some(stride) = view.byte_stride
        && stride < element_size
    {
        issues.record(
            IssueCode::AccessorSmallByteStride,
            format!("{pointer}/bufferView"),
            format!(
                "Referenced bufferView's byteStride value {stride} is less than accessor element's length {element_size}"
            ),
        );
        valid = false;
    }

    if let Some(view_length) = view.byte_length {
        let end = occupied_end(accessor.byte_offset, count, element_size, view.byte_stride);
        if end > view_length {
            issues.record(
                IssueCode::AccessorTooLong,
                pointer,
                format!(
                    "Accessor (offset: {}, length: {}) does not fit referenced bufferView [{view_index}] length {view_length}",
                    accessor.byte_offset,
                    end - accessor.byte_offset
                ),
            );
            valid = false;
        }
    }

    valid
}

fn validate_sparse_layout(
    document: &Document,
    registry: &Registry,
    accessor: &Accessor,
    sparse: &Sparse,
    pointer: &str,
    issues: &mut IssueCollector,
) -> bool {
    let sparse_pointer = format!("{pointer}/sparse");
    let Some(sparse_count) = sparse.count else {
        return false;
    };
    let mut valid = true;

    if let Some(count) = accessor.count
        && sparse_count > count
    {
        issues.record(
            IssueCode::AccessorSparseCountOutOfRange,
            format!("{sparse_pointer}/count"),
            format!(
                "Sparse accessor overrides more elements ({sparse_count}) than the base accessor contains ({count})"
            ),
        );
        valid = false;
    }

    match &sparse.indices {
        Some(SparseIndices {
            buffer_view: Some(view_index),
            byte_offset,
            component_type: Some(component_type),
            malformed: false,
        }) => {
            valid &= check_sub_region(
                document,
                registry,
                *view_index,
                *byte_offset,
                sparse_count.saturating_mul(component_type.size()),
                component_type.size(),
                &format!("{sparse_pointer}/indices"),
                issues,
            );
        }
        _ => valid = false,
    }

    match (&sparse.values, accessor.format()) {
        (
            Some(SparseValues {
                buffer_view: Some(view_index),
                byte_offset,
                malformed: false,
            }),
            Some((component_type, accessor_type)),
        ) => {
            valid &= check_sub_region(
                document,
                registry,
                *view_index,
                *byte_offset,
                sparse_count.saturating_mul(element_byte_size(component_type, accessor_type)),
                offset_alignment(component_type, accessor_type),
                &format!("{sparse_pointer}/values"),
                issues,
            );
        }
        _ => valid = false,
    }

    valid
}

/// Bounds and alignment of a sparse sub-region against its own buffer view.
#[allow(clippy::too_many_arguments)]
fn check_sub_region(
    document: &Document,
    registry: &Registry,
    view_index: usize,
    byte_offset: u64,
    byte_length: u64,
    alignment: u64,
    pointer: &str,
    issues: &mut IssueCollector,
) -> bool {
    if !registry.is_valid(ArrayKind::BufferViews, view_index) {
        return false;
    }
    let view = &document.buffer_views[view_index];
    let mut valid = true;

    if byte_offset % alignment != 0 {
        issues.record(
            IssueCode::AccessorOffsetAlignment,
            format!("{pointer}/byteOffset"),
            format!("Offset {byte_offset} is not a multiple of {alignment}"),
        );
        valid = false;
    }
    if let Some(view_length) = view.byte_length
        && byte_offset.saturating_add(byte_length) > view_length
    {
        issues.record(
            IssueCode::AccessorTooLong,
            pointer,
            format!(
                "Accessor (offset: {byte_offset}, length: {byte_length}) does not fit referenced bufferView [{view_index}] length {view_length}"
            ),
        );
        valid = false;
    }
    valid
}

// ─── Decoding ─────────────────────────────────────────────────────────────────

/// Decoded accessor contents with sparse substitutions applied. Values are
/// raw component values, flattened in element order.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct AccessorValues {
    pub(super) component_type: ComponentType,
    pub(super) accessor_type: AccessorType,
    pub(super) normalized: bool,
    pub(super) values: Vec<f64>,
}

impl AccessorValues {
    pub(super) fn elements(&self) -> impl Iterator<Item = &[f64]> {
        self.values
            .chunks_exact(self.accessor_type.components() as usize)
    }

    /// Component value as the shader would see it.
    pub(super) fn to_float(&self, raw: f64) -> f64 {
        if self.normalized {
            self.component_type.normalize(raw)
        } else {
            raw
        }
    }
}

struct Decoded {
    values: Vec<f64>,
    sparse_indices: Vec<u64>,
}

/// Decode a valid accessor. `None` when it is flagged invalid or its bytes
/// are not available.
pub(super) fn read_accessor(
    document: &Document,
    registry: &Registry,
    data: &BufferData<'_>,
    index: usize,
) -> Option<AccessorValues> {
    if !registry.is_valid(ArrayKind::Accessors, index) {
        return None;
    }
    let accessor = document.accessors.get(index)?;
    let (component_type, accessor_type) = accessor.format()?;
    let decoded = decode(document, registry, data, accessor)?;
    Some(AccessorValues {
        component_type,
        accessor_type,
        normalized: accessor.normalized,
        values: decoded.values,
    })
}

fn decode(
    document: &Document,
    registry: &Registry,
    data: &BufferData<'_>,
    accessor: &Accessor,
) -> Option<Decoded> {
    let (component_type, accessor_type) = accessor.format()?;
    let count = accessor.count?;
    let components = accessor_type.components();

    let mut values = match accessor.buffer_view {
        Some(view_index) => {
            let bytes = data.view_bytes(document, registry, view_index)?;
            let element_size = element_byte_size(component_type, accessor_type);
            let stride = document.buffer_views[view_index]
                .byte_stride
                .unwrap_or(element_size);
            read_elements(
                bytes,
                accessor.byte_offset,
                stride,
                count,
                component_type,
                accessor_type,
            )?
        }
        None => {
            let total = count.checked_mul(components)?;
            if total > MAX_IMPLICIT_COMPONENTS {
                return None;
            }
            vec![0.0; usize::try_from(total).ok()?]
        }
    };

    let mut sparse_indices = Vec::new();
    if let Some(sparse) = &accessor.sparse {
        let sparse_count = sparse.count?;
        let indices = sparse.indices.as_ref()?;
        let index_type = indices.component_type?;
        let index_bytes = data.view_bytes(document, registry, indices.buffer_view?)?;
        sparse_indices = read_elements(
            index_bytes,
            indices.byte_offset,
            index_type.size(),
            sparse_count,
            index_type,
            AccessorType::Scalar,
        )?
        .into_iter()
        .map(|index| index as u64)
        .collect();

        let sparse_values = sparse.values.as_ref()?;
        let value_bytes = data.view_bytes(document, registry, sparse_values.buffer_view?)?;
        let substitutes = read_elements(
            value_bytes,
            sparse_values.byte_offset,
            element_byte_size(component_type, accessor_type),
            sparse_count,
            component_type,
            accessor_type,
        )?;

        let components = components as usize;
        for (index, element) in sparse_indices.iter().zip(substitutes.chunks_exact(components)) {
            let Ok(index) = usize::try_from(*index) else {
                continue;
            };
            let start = index * components;
            if let Some(target) = values.get_mut(start..start + components) {
                target.copy_from_slice(element);
            }
        }
    }

    Some(Decoded {
        values,
        sparse_indices,
    })
}

fn read_elements(
    bytes: &[u8],
    byte_offset: u64,
    stride: u64,
    count: u64,
    component_type: ComponentType,
    accessor_type: AccessorType,
) -> Option<Vec<f64>> {
    let components = accessor_type.components();
    let mut values = Vec::with_capacity(usize::try_from(count.checked_mul(components)?).ok()?);
    for element in 0..count {
        let base = byte_offset.checked_add(element.checked_mul(stride)?)?;
        for component in 0..components {
            let offset = base + component_offset(component_type, accessor_type, component);
            let offset = usize::try_from(offset).ok()?;
            values.push(component_type.read(bytes.get(offset..)?)?);
        }
    }
    Some(values)
}

// ─── Data checks ──────────────────────────────────────────────────────────────

fn validate_data(
    document: &Document,
    registry: &Registry,
    data: &BufferData<'_>,
    accessor: &Accessor,
    pointer: &str,
    issues: &mut IssueCollector,
) {
    let (Some((component_type, accessor_type)), Some(count)) = (accessor.format(), accessor.count)
    else {
        return;
    };
    let Some(decoded) = decode(document, registry, data, accessor) else {
        return;
    };

    if accessor.sparse.is_some() {
        check_sparse_indices(&decoded.sparse_indices, count, pointer, issues);
    }

    if component_type == ComponentType::Float
        && decoded.values.iter().any(|value| !value.is_finite())
    {
        issues.record(
            IssueCode::AccessorInvalidFloat,
            pointer,
            "Accessor contains non-finite float values (NaN or infinity)",
        );
    }

    check_bounds(
        accessor,
        component_type,
        accessor_type.components() as usize,
        &decoded.values,
        pointer,
        issues,
    );
}

fn check_sparse_indices(indices: &[u64], count: u64, pointer: &str, issues: &mut IssueCollector) {
    let sparse_pointer = format!("{pointer}/sparse/indices");
    let mut previous: Option<u64> = None;
    let mut order_reported = false;
    let mut range_reported = false;

    for (position, &index) in indices.iter().enumerate() {
        if !order_reported && previous.is_some_and(|previous| index <= previous) {
            issues.record(
                IssueCode::AccessorSparseIndicesNonIncreasing,
                sparse_pointer.as_str(),
                format!(
                    "Sparse indices are not strictly increasing: index {index} at position {position}"
                ),
            );
            order_reported = true;
        }
        if !range_reported && index >= count {
            issues.record(
                IssueCode::AccessorSparseIndexOob,
                sparse_pointer.as_str(),
                format!(
                    "Sparse index {index} at position {position} is not less than accessor count {count}"
                ),
            );
            range_reported = true;
        }
        previous = Some(index);
    }
}

/// Compare declared `min`/`max` with the decoded data, per component.
fn check_bounds(
    accessor: &Accessor,
    component_type: ComponentType,
    components: usize,
    values: &[f64],
    pointer: &str,
    issues: &mut IssueCollector,
) {
    let mut actual_min = vec![f64::INFINITY; components];
    let mut actual_max = vec![f64::NEG_INFINITY; components];
    for element in values.chunks_exact(components) {
        for (component, value) in element.iter().copied().enumerate() {
            if value.is_finite() {
                actual_min[component] = actual_min[component].min(value);
                actual_max[component] = actual_max[component].max(value);
            }
        }
    }

    // Float data is compared at the precision it is stored with.
    let stored = |bound: f64| {
        if component_type == ComponentType::Float {
            bound as f32 as f64
        } else {
            bound
        }
    };

    if let Some(min) = accessor.min.as_deref()
        && min.len() == components
    {
        for (component, (&declared, &actual)) in min.iter().zip(&actual_min).enumerate() {
            let declared = stored(declared);
            if !actual.is_finite() {
                continue;
            }
            if actual < declared {
                issues.record(
                    IssueCode::AccessorElementOutOfMinBound,
                    format!("{pointer}/min/{component}"),
                    format!(
                        "Accessor contains {actual} element value less than declared minimum {declared}"
                    ),
                );
            } else if actual > declared {
                issues.record(
                    IssueCode::AccessorMinMismatch,
                    format!("{pointer}/min/{component}"),
                    format!(
                        "Declared minimum value for this component ({declared}) does not match actual minimum ({actual})"
                    ),
                );
            }
        }
    }

    if let Some(max) = accessor.max.as_deref()
        && max.len() == components
    {
        for (component, (&declared, &actual)) in max.iter().zip(&actual_max).enumerate() {
            let declared = stored(declared);
            if !actual.is_finite() {
                continue;
            }
            if actual > declared {
                issues.record(
                    IssueCode::AccessorElementOutOfMaxBound,
                    format!("{pointer}/max/{component}"),
                    format!(
                        "Accessor contains {actual} element value greater than declared maximum {declared}"
                    ),
                );
            } else if actual < declared {
                issues.record(
                    IssueCode::AccessorMaxMismatch,
                    format!("{pointer}/max/{component}"),
                    format!(
                        "Declared maximum value for this component ({declared}) does not match actual maximum ({actual})"
                    ),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::{Value, json};

    use super::*;
    use crate::resource::NoExternalResources;
    use crate::validate::buffer::{bind_buffer_data, validate_buffer_views};
    use crate::validate::document::tests::parse_document;

    fn data_uri(bytes: &[u8]) -> String {
        format!(
            "data:application/octet-stream;base64,{}",
            STANDARD.encode(bytes)
        )
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_le_bytes()).collect()
    }

    fn run(value: Value) -> (Document, Registry, BufferData<'static>, IssueCollector) {
        let (document, mut registry, mut issues) = parse_document(value);
        let data = bind_buffer_data(
            &document,
            false,
            None,
            &NoExternalResources,
            &mut registry,
            &mut issues,
        );
        validate_buffer_views(&document, &mut registry, &mut issues);
        validate_accessors(
            &document,
            &mut registry,
            &data,
            &ValidationOptions::default(),
            &mut issues,
        );
        (document, registry, data, issues)
    }

    fn codes(issues: &IssueCollector) -> Vec<&str> {
        issues.issues().iter().map(|issue| issue.code.as_str()).collect()
    }

    #[test]
    fn given_misaligned_mat4_over_short_view_when_validating_then_alignment_and_length_fail() {
        let (_, registry, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 64}],
            "bufferViews": [{"buffer": 0, "byteLength": 64}],
            "accessors": [{
                "componentType": 5126, "count": 16, "type": "MAT4",
                "bufferView": 0, "byteOffset": 1
            }]
        }));

        assert_eq!(
            codes(&issues),
            vec!["ACCESSOR_OFFSET_ALIGNMENT", "ACCESSOR_TOO_LONG"]
        );
        assert_eq!(issues.issues()[1].pointer.as_deref(), Some("/accessors/0"));
        assert!(!registry.is_valid(ArrayKind::Accessors, 0));
    }

    #[test]
    fn given_view_offset_breaking_alignment_when_validating_then_total_offset_is_reported() {
        let (_, _, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 16}],
            "bufferViews": [{"buffer": 0, "byteOffset": 2, "byteLength": 8}],
            "accessors": [{"componentType": 5126, "count": 2, "type": "SCALAR", "bufferView": 0}]
        }));

        assert_eq!(codes(&issues), vec!["ACCESSOR_TOTAL_OFFSET_ALIGNMENT"]);
    }

    #[test]
    fn given_stride_smaller_than_element_when_validating_then_small_stride_is_reported() {
        let (_, _, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 64}],
            "bufferViews": [{"buffer": 0, "byteLength": 64, "byteStride": 8}],
            "accessors": [{"componentType": 5126, "count": 2, "type": "VEC3", "bufferView": 0}]
        }));

        assert_eq!(codes(&issues), vec!["ACCESSOR_SMALL_BYTESTRIDE"]);
    }

    #[test]
    fn given_strided_view_when_checking_length_then_last_element_is_not_padded() {
        // (3 - 1) * 16 + 12 = 44 bytes fit a 44-byte view.
        let (_, registry, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 44}],
            "bufferViews": [{"buffer": 0, "byteLength": 44, "byteStride": 16}],
            "accessors": [{"componentType": 5126, "count": 3, "type": "VEC3", "bufferView": 0}]
        }));

        assert!(issues.issues().is_empty(), "{:?}", issues.issues());
        assert!(registry.is_valid(ArrayKind::Accessors, 0));
    }

    #[test]
    fn given_unknown_type_when_validating_then_only_invalid_type_is_reported() {
        let (_, registry, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 4}],
            "bufferViews": [{"buffer": 0, "byteLength": 4}],
            "accessors": [{
                "componentType": 5126, "count": 100, "type": "MAT5",
                "bufferView": 0, "byteOffset": 3
            }]
        }));

        assert_eq!(codes(&issues), vec!["INVALID_TYPE"]);
        assert!(!registry.is_valid(ArrayKind::Accessors, 0));
    }

    #[test]
    fn given_normalized_float_when_validating_then_normalized_invalid_is_reported() {
        let (_, _, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "accessors": [{"componentType": 5126, "count": 1, "type": "SCALAR", "normalized": true}]
        }));

        assert_eq!(codes(&issues), vec!["ACCESSOR_NORMALIZED_INVALID"]);
    }

    #[test]
    fn given_sparse_accessor_without_base_view_when_reading_then_substitutions_apply() {
        let mut bytes = vec![1u8, 3, 0, 0];
        bytes.extend(floats(&[1.0, 2.0]));
        let (document, registry, data, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 12, "uri": data_uri(&bytes)}],
            "bufferViews": [
                {"buffer": 0, "byteLength": 2},
                {"buffer": 0, "byteOffset": 4, "byteLength": 8}
            ],
            "accessors": [{
                "componentType": 5126, "count": 4, "type": "SCALAR",
                "min": [0.0], "max": [2.0],
                "sparse": {
                    "count": 2,
                    "indices": {"bufferView": 0, "componentType": 5121},
                    "values": {"bufferView": 1}
                }
            }]
        }));

        assert!(issues.issues().is_empty(), "{:?}", issues.issues());
        let decoded = read_accessor(&document, &registry, &data, 0).expect("decodable");
        assert_eq!(decoded.values, vec![0.0, 1.0, 0.0, 2.0]);
    }

    #[test]
    fn given_bad_sparse_indices_when_validating_then_order_and_range_are_reported_once() {
        let mut bytes = vec![2u8, 1, 9, 0];
        bytes.extend(floats(&[1.0, 2.0, 3.0]));
        let (_, _, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 16, "uri": data_uri(&bytes)}],
            "bufferViews": [
                {"buffer": 0, "byteLength": 3},
                {"buffer": 0, "byteOffset": 4, "byteLength": 12}
            ],
            "accessors": [{
                "componentType": 5126, "count": 4, "type": "SCALAR",
                "sparse": {
                    "count": 3,
                    "indices": {"bufferView": 0, "componentType": 5121},
                    "values": {"bufferView": 1}
                }
            }]
        }));

        assert_eq!(
            codes(&issues),
            vec![
                "ACCESSOR_SPARSE_INDICES_NON_INCREASING",
                "ACCESSOR_SPARSE_INDEX_OOB"
            ]
        );
        assert_eq!(
            issues.issues()[0].pointer.as_deref(),
            Some("/accessors/0/sparse/indices")
        );
    }

    #[test]
    fn given_sparse_regions_overrunning_views_when_validating_then_each_region_reports() {
        let (_, registry, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 8}],
            "bufferViews": [{"buffer": 0, "byteLength": 2}, {"buffer": 0, "byteLength": 4}],
            "accessors": [{
                "componentType": 5126, "count": 2, "type": "SCALAR",
                "sparse": {
                    "count": 3,
                    "indices": {"bufferView": 0, "componentType": 5123},
                    "values": {"bufferView": 1}
                }
            }]
        }));

        assert_eq!(
            codes(&issues),
            vec![
                "ACCESSOR_SPARSE_COUNT_OUT_OF_RANGE",
                "ACCESSOR_TOO_LONG",
                "ACCESSOR_TOO_LONG"
            ]
        );
        assert_eq!(
            issues.issues()[1].pointer.as_deref(),
            Some("/accessors/0/sparse/indices")
        );
        assert_eq!(
            issues.issues()[2].pointer.as_deref(),
            Some("/accessors/0/sparse/values")
        );
        assert!(!registry.is_valid(ArrayKind::Accessors, 0));
    }

    #[test]
    fn given_signed_sparse_index_type_when_parsing_then_invalid_component_type_is_reported() {
        let (_, _, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 8}],
            "bufferViews": [{"buffer": 0, "byteLength": 8}],
            "accessors": [{
                "componentType": 5126, "count": 2, "type": "SCALAR",
                "sparse": {
                    "count": 1,
                    "indices": {"bufferView": 0, "componentType": 5126},
                    "values": {"bufferView": 0}
                }
            }]
        }));

        assert_eq!(codes(&issues), vec!["INVALID_COMPONENT_TYPE"]);
        assert_eq!(
            issues.issues()[0].pointer.as_deref(),
            Some("/accessors/0/sparse/indices/componentType")
        );
    }

    #[test]
    fn given_bounds_drifting_from_data_when_validating_then_tightening_warns_and_widening_errors() {
        let bytes = floats(&[1.0, 2.0, 3.0]);
        let (_, _, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 12, "uri": data_uri(&bytes)}],
            "bufferViews": [{"buffer": 0, "byteLength": 12}],
            "accessors": [{
                "componentType": 5126, "count": 3, "type": "SCALAR", "bufferView": 0,
                "min": [0.0], "max": [2.5]
            }]
        }));

        assert_eq!(
            codes(&issues),
            vec!["ACCESSOR_MIN_MISMATCH", "ACCESSOR_ELEMENT_OUT_OF_MAX_BOUND"]
        );
        assert_eq!(issues.num_warnings(), 1);
        assert_eq!(issues.num_errors(), 1);
    }

    #[test]
    fn given_double_precision_bound_when_comparing_float_data_then_single_precision_is_used() {
        let bytes = floats(&[0.1]);
        let (_, _, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 4, "uri": data_uri(&bytes)}],
            "bufferViews": [{"buffer": 0, "byteLength": 4}],
            "accessors": [{
                "componentType": 5126, "count": 1, "type": "SCALAR", "bufferView": 0,
                "min": [0.1], "max": [0.1]
            }]
        }));

        assert!(issues.issues().is_empty(), "{:?}", issues.issues());
    }

    #[test]
    fn given_nan_in_float_data_when_validating_then_invalid_float_is_reported() {
        let bytes = floats(&[f32::NAN, 1.0]);
        let (_, _, _, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 8, "uri": data_uri(&bytes)}],
            "bufferViews": [{"buffer": 0, "byteLength": 8}],
            "accessors": [{"componentType": 5126, "count": 2, "type": "SCALAR", "bufferView": 0}]
        }));

        assert_eq!(codes(&issues), vec!["ACCESSOR_INVALID_FLOAT"]);
    }

    #[test]
    fn given_padded_byte_mat2_when_reading_then_column_padding_is_skipped() {
        let bytes = [1u8, 2, 0, 0, 3, 4, 0, 0];
        let (document, registry, data, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 8, "uri": data_uri(&bytes)}],
            "bufferViews": [{"buffer": 0, "byteLength": 8}],
            "accessors": [{
                "componentType": 5121,
                "count": 1,
                "type": "MAT2",
                "bufferView": 0,
                "normalized": true
            }]
        }));

        assert!(issues.issues().is_empty(), "{:?}", issues.issues());
        let decoded = read_accessor(&document, &registry, &data, 0).expect("decodable");
        assert_eq!(decoded.values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(decoded.to_float(255.0), 1.0);
    }
}
