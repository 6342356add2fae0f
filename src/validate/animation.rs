//! Animation channels and samplers.
//!
//! Parsing resolves sampler and target references. Validation then checks
//! each sampler's keyframe accessor, and checks each channel's output
//! accessor against the shape its target path requires.

use std::collections::HashSet;

use log::debug;

use super::accessor::{Accessor, read_accessor};
use super::buffer::BufferData;
use super::document::Document;
use super::issues::{IssueCode, IssueCollector};
use super::layout::{AccessorType, ComponentType};
use super::node::{UNIT_LENGTH_THRESHOLD, quaternion_length};
use super::reader::ObjectReader;
use super::registry::{ArrayKind, Registry};
use super::types::ValidationOptions;

const ANIMATION_KEYS: [&str; 2] = ["channels", "samplers"];
const CHANNEL_KEYS: [&str; 2] = ["sampler", "target"];
const TARGET_KEYS: [&str; 2] = ["node", "path"];
const SAMPLER_KEYS: [&str; 3] = ["input", "interpolation", "output"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum TargetPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

impl TargetPath {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "translation" => Some(Self::Translation),
            "rotation" => Some(Self::Rotation),
            "scale" => Some(Self::Scale),
            "weights" => Some(Self::Weights),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Interpolation {
    Linear,
    Step,
    CubicSpline,
}

impl Interpolation {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "LINEAR" => Some(Self::Linear),
            "STEP" => Some(Self::Step),
            "CUBICSPLINE" => Some(Self::CubicSpline),
            _ => None,
        }
    }

    /// Output elements stored per keyframe.
    fn elements_per_keyframe(self) -> u64 {
        match self {
            Self::CubicSpline => 3,
            Self::Linear | Self::Step => 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct Animation {
    pub(super) channels: Vec<Channel>,
    /// `None` where the entry is not an object.
    pub(super) samplers: Vec<Option<AnimationSampler>>,
}

#[derive(Debug, Clone)]
pub(super) struct Channel {
    pub(super) position: usize,
    pub(super) sampler: Option<usize>,
    pub(super) node: Option<usize>,
    pub(super) path: Option<TargetPath>,
}

#[derive(Debug, Clone)]
pub(super) struct AnimationSampler {
    pub(super) input: Option<usize>,
    pub(super) output: Option<usize>,
    /// `None` when the declared value is unknown.
    pub(super) interpolation: Option<Interpolation>,
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

pub(super) fn parse_animation(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Animation {
    reader.check_keys(&ANIMATION_KEYS, issues);

    let samplers = non_empty_array(reader, "samplers", issues)
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let pointer = format!("{}/{position}", reader.child("samplers"));
            ObjectReader::new(item, pointer, issues)
                .map(|sampler| parse_sampler(&sampler, registry, issues))
        })
        .collect::<Vec<_>>();

    let mut channels = Vec::new();
    for (position, item) in non_empty_array(reader, "channels", issues).iter().enumerate() {
        let pointer = format!("{}/{position}", reader.child("channels"));
        let Some(channel) = ObjectReader::new(item, pointer, issues) else {
            continue;
        };
        channel.check_keys(&CHANNEL_KEYS, issues);
        let sampler = channel.required_local_index("sampler", samplers.len(), issues);

        let (node, path) = match channel.required_object("target", issues) {
            Some(target) => {
                target.check_keys(&TARGET_KEYS, issues);
                let node = target.index("node", ArrayKind::Nodes, registry, issues);
                let path = target.required_string("path", issues).and_then(|name| {
                    let parsed = TargetPath::parse(name);
                    if parsed.is_none() {
                        issues.record(
                            IssueCode::ValueNotInList,
                            target.child("path"),
                            format!(
                                "Invalid value '{name}'. Valid values are ('translation', 'rotation', 'scale', 'weights')"
                            ),
                        );
                    }
                    parsed
                });
                (node, path)
            }
            None => (None, None),
        };

        channels.push(Channel {
            position,
            sampler,
            node,
            path,
        });
    }

    Animation { channels, samplers }
}

/// Required array with at least one element. Problems yield an empty slice.
fn non_empty_array<'a>(
    reader: &ObjectReader<'a>,
    key: &str,
    issues: &mut IssueCollector,
) -> &'a [serde_json::Value] {
    let items = reader.required_array(key, issues).unwrap_or_default();
    if items.is_empty() && reader.raw(key).is_some_and(serde_json::Value::is_array) {
        issues.record(
            IssueCode::InvalidArrayLength,
            reader.child(key),
            "Invalid array length 0. Valid lengths are: 1 or more",
        );
    }
    items
}

fn parse_sampler(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> AnimationSampler {
    reader.check_keys(&SAMPLER_KEYS, issues);

    let interpolation = match reader.string("interpolation", issues) {
        Some(name) => {
            let parsed = Interpolation::parse(name);
            if parsed.is_none() {
                issues.record(
                    IssueCode::ValueNotInList,
                    reader.child("interpolation"),
                    format!(
                        "Invalid value '{name}'. Valid values are ('LINEAR', 'STEP', 'CUBICSPLINE')"
                    ),
                );
            }
            parsed
        }
        None if reader.has("interpolation") => None,
        None => Some(Interpolation::Linear),
    };

    AnimationSampler {
        input: reader.required_index("input", ArrayKind::Accessors, registry, issues),
        output: reader.required_index("output", ArrayKind::Accessors, registry, issues),
        interpolation,
    }
}

// ─── Validation ───────────────────────────────────────────────────────────────

struct Context<'d, 'b> {
    document: &'d Document,
    registry: &'d Registry,
    data: &'d BufferData<'b>,
    read_data: bool,
}

impl<'d> Context<'d, '_> {
    fn accessor(&self, index: Option<usize>) -> Option<(usize, &'d Accessor)> {
        let index = index?;
        if !self.registry.is_valid(ArrayKind::Accessors, index) {
            return None;
        }
        Some((index, self.document.accessors.get(index)?))
    }

    fn has_byte_stride(&self, accessor: &Accessor) -> bool {
        accessor
            .buffer_view
            .and_then(|view| self.document.buffer_views.get(view))
            .is_some_and(|view| view.byte_stride.is_some())
    }

    /// Morph target count of the node's mesh, 0 without a usable mesh.
    fn morph_target_count(&self, node: usize) -> usize {
        self.document.nodes[node]
            .mesh
            .filter(|&mesh| self.registry.is_valid(ArrayKind::Meshes, mesh))
            .map_or(0, |mesh| self.document.meshes[mesh].morph_target_count())
    }
}

pub(super) fn validate_animations(
    document: &Document,
    registry: &Registry,
    data: &BufferData<'_>,
    options: &ValidationOptions,
    issues: &mut IssueCollector,
) {
    let context = Context {
        document,
        registry,
        data,
        read_data: options.validate_accessor_data,
    };

    for (index, animation) in document.animations.iter().enumerate() {
        if !registry.is_valid(ArrayKind::Animations, index) {
            continue;
        }
        let pointer = format!("/animations/{index}");
        debug!(
            "Animation {index}: {} channels, {} samplers",
            animation.channels.len(),
            animation.samplers.len()
        );

        for (position, sampler) in animation.samplers.iter().enumerate() {
            if let Some(sampler) = sampler {
                let sampler_pointer = format!("{pointer}/samplers/{position}");
                validate_sampler(&context, sampler, &sampler_pointer, issues);
            }
        }

        let mut used = vec![false; animation.samplers.len()];
        let mut targets = HashSet::<(usize, TargetPath)>::new();
        for channel in &animation.channels {
            if let Some(sampler) = channel.sampler {
                used[sampler] = true;
            }
            validate_channel(&context, animation, channel, &pointer, &mut targets, issues);
        }

        for (position, sampler) in animation.samplers.iter().enumerate() {
            if sampler.is_some() && !used[position] {
                issues.record(
                    IssueCode::UnusedObject,
                    format!("{pointer}/samplers/{position}"),
                    "This object may be unused",
                );
            }
        }
    }
}

/// Keyframe accessor checks plus the stride rule for both accessors.
fn validate_sampler(
    context: &Context<'_, '_>,
    sampler: &AnimationSampler,
    pointer: &str,
    issues: &mut IssueCollector,
) {
    if let Some((input_index, input)) = context.accessor(sampler.input) {
        let input_pointer = format!("{pointer}/input");
        let format_ok = input.format() == Some((ComponentType::Float, AccessorType::Scalar));
        if !format_ok {
            issues.record(
                IssueCode::AnimationSamplerInputAccessorInvalidFormat,
                input_pointer.as_str(),
                format!(
                    "Invalid Animation sampler input accessor format '{}'. Must be one of ('{{SCALAR, FLOAT}}')",
                    input.format_name()
                ),
            );
        }
        if input.min.is_none() || input.max.is_none() {
            issues.record(
                IssueCode::AnimationSamplerInputAccessorWithoutBounds,
                input_pointer.as_str(),
                "accessor.min and accessor.max must be defined for animation input accessor",
            );
        }
        if context.has_byte_stride(input) {
            issues.record(
                IssueCode::AnimationSamplerAccessorWithByteStride,
                input_pointer.as_str(),
                "bufferView.byteStride must not be defined for buffer views used by animation sampler accessors",
            );
        }
        if sampler.interpolation == Some(Interpolation::CubicSpline)
            && input.count.is_some_and(|count| count < 2)
        {
            issues.record(
                IssueCode::AnimationSamplerInputAccessorTooFewElements,
                input_pointer.as_str(),
                format!(
                    "Animation sampler with CUBICSPLINE interpolation must have at least 2 keyframes. Found {}",
                    input.count.unwrap_or_default()
                ),
            );
        }

        if format_ok
            && context.read_data
            && let Some(values) =
                read_accessor(context.document, context.registry, context.data, input_index)
            && let Some(position) = values.values.windows(2).position(|pair| pair[1] <= pair[0])
        {
            issues.record(
                IssueCode::AnimationSamplerInputAccessorNonIncreasing,
                input_pointer,
                format!(
                    "Animation input accessor element at index {} is less than or equal to previous: {} <= {}",
                    position + 1,
                    values.values[position + 1],
                    values.values[position]
                ),
            );
        }
    }

    if let Some((_, output)) = context.accessor(sampler.output)
        && context.has_byte_stride(output)
    {
        issues.record(
            IssueCode::AnimationSamplerAccessorWithByteStride,
            format!("{pointer}/output"),
            "bufferView.byteStride must not be defined for buffer views used by animation sampler accessors",
        );
    }
}

fn validate_channel(
    context: &Context<'_, '_>,
    animation: &Animation,
    channel: &Channel,
    animation_pointer: &str,
    targets: &mut HashSet<(usize, TargetPath)>,
    issues: &mut IssueCollector,
) {
    let pointer = format!("{animation_pointer}/channels/{}", channel.position);
    let (Some(node), Some(path)) = (channel.node, channel.path) else {
        return;
    };
    if !context.registry.is_valid(ArrayKind::Nodes, node) {
        return;
    }

    let morph_targets = context.morph_target_count(node);
    match path {
        TargetPath::Weights if morph_targets == 0 => {
            issues.record(
                IssueCode::AnimationChannelTargetNodeWeightsNoMorphs,
                format!("{pointer}/target/node"),
                "Animated node must have a mesh with morph targets when targeting weights",
            );
        }
        TargetPath::Translation | TargetPath::Rotation | TargetPath::Scale
            if context.document.nodes[node].has_matrix =>
        {
            issues.record(
                IssueCode::AnimationChannelTargetNodeMatrix,
                format!("{pointer}/target/path"),
                "Node with a matrix property must not be targeted by TRS animation channels",
            );
        }
        _ => {}
    }

    if !targets.insert((node, path)) {
        issues.record(
            IssueCode::AnimationDuplicateTargets,
            format!("{pointer}/target"),
            "Animation channel has the same target as a previous channel",
        );
    }

    let Some(sampler_index) = channel.sampler else {
        return;
    };
    let Some(sampler) = animation.samplers[sampler_index].as_ref() else {
        return;
    };
    let Some((output_index, output)) = context.accessor(sampler.output) else {
        return;
    };
    let output_pointer = format!("{animation_pointer}/samplers/{sampler_index}/output");

    let format_ok = output_format_matches(output, path);
    if !format_ok {
        let valid = match path {
            TargetPath::Translation | TargetPath::Scale => "'{VEC3, FLOAT}'",
            TargetPath::Rotation => {
                "'{VEC4, FLOAT}', '{VEC4, BYTE normalized}', '{VEC4, UNSIGNED_BYTE normalized}', '{VEC4, SHORT normalized}', '{VEC4, UNSIGNED_SHORT normalized}'"
            }
            TargetPath::Weights => {
                "'{SCALAR, FLOAT}', '{SCALAR, BYTE normalized}', '{SCALAR, UNSIGNED_BYTE normalized}', '{SCALAR, SHORT normalized}', '{SCALAR, UNSIGNED_SHORT normalized}'"
            }
        };
        issues.record(
            IssueCode::AnimationSamplerOutputAccessorInvalidFormat,
            output_pointer.as_str(),
            format!(
                "Invalid Animation sampler output accessor format '{}' for path '{}'. Must be one of ({valid})",
                output.format_name(),
                path_name(path)
            ),
        );
    }

    let input_count = context
        .accessor(sampler.input)
        .and_then(|(_, input)| input.count);
    let per_keyframe = match path {
        TargetPath::Weights => morph_targets as u64,
        _ => 1,
    };
    if let (Some(input_count), Some(output_count), Some(interpolation)) =
        (input_count, output.count, sampler.interpolation)
        && per_keyframe > 0
    {
        let expected = input_count
            .saturating_mul(per_keyframe)
            .saturating_mul(interpolation.elements_per_keyframe());
        if output_count != expected {
            issues.record(
                IssueCode::AnimationSamplerOutputAccessorInvalidCount,
                output_pointer.as_str(),
                format!(
                    "Animation sampler output accessor of count {expected} expected. Found {output_count}"
                ),
            );
        }
    }

    if path == TargetPath::Rotation && format_ok && context.read_data {
        check_unit_rotations(context, output_index, sampler.interpolation, &output_pointer, issues);
    }
}

fn path_name(path: TargetPath) -> &'static str {
    match path {
        TargetPath::Translation => "translation",
        TargetPath::Rotation => "rotation",
        TargetPath::Scale => "scale",
        TargetPath::Weights => "weights",
    }
}

fn output_format_matches(accessor: &Accessor, path: TargetPath) -> bool {
    let Some((component_type, accessor_type)) = accessor.format() else {
        return false;
    };
    let float_or_normalized = component_type == ComponentType::Float
        || (accessor.normalized
            && matches!(
                component_type,
                ComponentType::Byte
                    | ComponentType::UnsignedByte
                    | ComponentType::Short
                    | ComponentType::UnsignedShort
            ));
    match path {
        TargetPath::Translation | TargetPath::Scale => {
            (component_type, accessor_type) == (ComponentType::Float, AccessorType::Vec3)
        }
        TargetPath::Rotation => accessor_type == AccessorType::Vec4 && float_or_normalized,
        TargetPath::Weights => accessor_type == AccessorType::Scalar && float_or_normalized,
    }
}

/// Reports the first non-unit keyframe value. Cubic spline tangents are not
/// quaternions and are skipped.
fn check_unit_rotations(
    context: &Context<'_, '_>,
    output_index: usize,
    interpolation: Option<Interpolation>,
    pointer: &str,
    issues: &mut IssueCollector,
) {
    let Some(values) =
        read_accessor(context.document, context.registry, context.data, output_index)
    else {
        return;
    };
    let cubic = interpolation == Some(Interpolation::CubicSpline);

    for (element, raw) in values.elements().enumerate() {
        if cubic && element % 3 != 1 {
            continue;
        }
        let quaternion = raw.iter().map(|&value| values.to_float(value)).collect::<Vec<_>>();
        let length = quaternion_length(&quaternion);
        if (length - 1.0).abs() > UNIT_LENGTH_THRESHOLD {
            issues.record(
                IssueCode::AnimationSamplerOutputAccessorNonUnit,
                pointer,
                format!(
                    "Animation sampler output accessor element at index {element} is not of unit length: {length}"
                ),
            );
            return;
        }
    }
}
