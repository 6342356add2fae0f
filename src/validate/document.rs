//! Typed view of the JSON tree.
//!
//! Every reference is resolved through the registry while parsing, so later
//! stages only see in-range indices. An array entry that is not an object
//! becomes a default value and is flagged invalid.

use serde_json::Value;

use super::accessor::{Accessor, parse_accessor};
use super::animation::{Animation, parse_animation};
use super::buffer::{Buffer, BufferView, parse_buffer, parse_buffer_view};
use super::issues::{IssueCode, IssueCollector};
use super::mesh::{Mesh, parse_mesh};
use super::node::{Node, Skin, parse_node, parse_skin};
use super::reader::ObjectReader;
use super::registry::{ArrayKind, Registry, describe};
use super::uri::{IMAGE_MIME_TYPES, UriKind, classify};

const ROOT_KEYS: [&str; 17] = [
    "asset",
    "accessors",
    "animations",
    "buffers",
    "bufferViews",
    "cameras",
    "extensionsUsed",
    "extensionsRequired",
    "images",
    "materials",
    "meshes",
    "nodes",
    "samplers",
    "scene",
    "scenes",
    "skins",
    "textures",
];
const ASSET_KEYS: [&str; 4] = ["copyright", "generator", "version", "minVersion"];
const SCENE_KEYS: [&str; 1] = ["nodes"];
const MATERIAL_KEYS: [&str; 8] = [
    "pbrMetallicRoughness",
    "normalTexture",
    "occlusionTexture",
    "emissiveTexture",
    "emissiveFactor",
    "alphaMode",
    "alphaCutoff",
    "doubleSided",
];
const PBR_KEYS: [&str; 5] = [
    "baseColorFactor",
    "baseColorTexture",
    "metallicFactor",
    "roughnessFactor",
    "metallicRoughnessTexture",
];
const TEXTURE_KEYS: [&str; 2] = ["sampler", "source"];
const IMAGE_KEYS: [&str; 3] = ["uri", "mimeType", "bufferView"];
const SAMPLER_KEYS: [&str; 4] = ["magFilter", "minFilter", "wrapS", "wrapT"];
const CAMERA_KEYS: [&str; 3] = ["orthographic", "perspective", "type"];

#[derive(Debug, Clone, Default)]
pub(super) struct Asset {
    pub(super) version: Option<String>,
    pub(super) min_version: Option<String>,
    pub(super) generator: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Scene {
    /// `(position, node)` pairs of the scene's root list.
    pub(super) nodes: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Material {
    pub(super) textures: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Texture {
    pub(super) source: Option<usize>,
    pub(super) sampler: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Image {
    pub(super) buffer_view: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Document {
    pub(super) asset: Asset,
    pub(super) extensions_used: Vec<String>,
    pub(super) extensions_required: Vec<String>,
    pub(super) scene: Option<usize>,
    pub(super) buffers: Vec<Buffer>,
    pub(super) buffer_views: Vec<BufferView>,
    pub(super) accessors: Vec<Accessor>,
    pub(super) meshes: Vec<Mesh>,
    pub(super) nodes: Vec<Node>,
    pub(super) skins: Vec<Skin>,
    pub(super) animations: Vec<Animation>,
    pub(super) scenes: Vec<Scene>,
    pub(super) materials: Vec<Material>,
    pub(super) textures: Vec<Texture>,
    pub(super) images: Vec<Image>,
}

impl Document {
    pub(super) fn parse(
        root: &ObjectReader<'_>,
        registry: &mut Registry,
        issues: &mut IssueCollector,
    ) -> Self {
        root.check_keys(&ROOT_KEYS, issues);

        let asset = parse_asset(root, issues);
        let extensions_used = string_set(root, "extensionsUsed", issues);
        let extensions_required = string_set(root, "extensionsRequired", issues);

        let buffers = parse_array(root, ArrayKind::Buffers, registry, issues, |reader, _, issues| {
            parse_buffer(reader, issues)
        });
        let buffer_views =
            parse_array(root, ArrayKind::BufferViews, registry, issues, parse_buffer_view);
        let accessors = parse_array(root, ArrayKind::Accessors, registry, issues, parse_accessor);
        let meshes = parse_array(root, ArrayKind::Meshes, registry, issues, parse_mesh);
        let nodes = parse_array(root, ArrayKind::Nodes, registry, issues, parse_node);
        let skins = parse_array(root, ArrayKind::Skins, registry, issues, parse_skin);
        let animations =
            parse_array(root, ArrayKind::Animations, registry, issues, parse_animation);
        let scenes = parse_array(
            root,
            ArrayKind::Scenes,
            registry,
            issues,
            |reader, registry, issues| {
                reader.check_keys(&SCENE_KEYS, issues);
                Scene {
                    nodes: reader.index_array("nodes", ArrayKind::Nodes, registry, issues),
                }
            },
        );
        let scene = root.index("scene", ArrayKind::Scenes, registry, issues);
        let materials = parse_array(root, ArrayKind::Materials, registry, issues, parse_material);
        let textures = parse_array(
            root,
            ArrayKind::Textures,
            registry,
            issues,
            |reader, registry, issues| {
                reader.check_keys(&TEXTURE_KEYS, issues);
                Texture {
                    source: reader.index("source", ArrayKind::Images, registry, issues),
                    sampler: reader.index("sampler", ArrayKind::Samplers, registry, issues),
                }
            },
        );
        let images = parse_array(root, ArrayKind::Images, registry, issues, parse_image);
        parse_array(root, ArrayKind::Samplers, registry, issues, |reader, _, issues| {
            reader.check_keys(&SAMPLER_KEYS, issues);
        });
        parse_array(root, ArrayKind::Cameras, registry, issues, |reader, _, issues| {
            reader.check_keys(&CAMERA_KEYS, issues);
            reader.required_string("type", issues);
        });

        Self {
            asset,
            extensions_used,
            extensions_required,
            scene,
            buffers,
            buffer_views,
            accessors,
            meshes,
            nodes,
            skins,
            animations,
            scenes,
            materials,
            textures,
            images,
        }
    }
}

/// Parse every element of a top-level array with `parse`. Entries that are
/// not objects are reported, defaulted and flagged invalid so indices keep
/// lining up with the registry.
fn parse_array<'a, T: Default>(
    root: &ObjectReader<'a>,
    kind: ArrayKind,
    registry: &mut Registry,
    issues: &mut IssueCollector,
    mut parse: impl FnMut(&ObjectReader<'a>, &Registry, &mut IssueCollector) -> T,
) -> Vec<T> {
    let Some(Value::Array(items)) = root.raw(kind.key()) else {
        return Vec::new();
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match ObjectReader::new(item, format!("/{}/{index}", kind.key()), issues) {
            Some(reader) => parsed.push(parse(&reader, registry, issues)),
            None => {
                registry.mark_invalid(kind, index);
                parsed.push(T::default());
            }
        }
    }
    parsed
}

fn parse_asset(root: &ObjectReader<'_>, issues: &mut IssueCollector) -> Asset {
    let Some(asset) = root.required_object("asset", issues) else {
        return Asset::default();
    };
    asset.check_keys(&ASSET_KEYS, issues);
    asset.string("copyright", issues);

    let version = asset.required_string("version", issues);
    let min_version = asset.string("minVersion", issues);
    let generator = asset.string("generator", issues);

    let parsed_version = version.and_then(|text| parse_version(&asset, "version", text, issues));
    if let Some((major, minor)) = parsed_version {
        if major != 2 {
            issues.record(
                IssueCode::UnknownAssetMajorVersion,
                asset.child("version"),
                format!("Unknown glTF major asset version: {major}"),
            );
        } else if minor > 0 {
            issues.record(
                IssueCode::UnknownAssetMinorVersion,
                asset.child("version"),
                format!("Unknown glTF minor asset version: {minor}"),
            );
        }
    }

    let parsed_min = min_version.and_then(|text| parse_version(&asset, "minVersion", text, issues));
    if let (Some(min), Some(parsed)) = (parsed_min, parsed_version)
        && min > parsed
    {
        issues.record(
            IssueCode::AssetMinVersionGreaterThanVersion,
            asset.child("minVersion"),
            format!(
                "Asset minVersion '{}' is greater than version '{}'",
                min_version.unwrap_or_default(),
                version.unwrap_or_default()
            ),
        );
    }

    Asset {
        version: version.map(str::to_string),
        min_version: min_version.map(str::to_string),
        generator: generator.map(str::to_string),
    }
}

/// `<major>.<minor>`, both plain decimal integers.
fn parse_version(
    reader: &ObjectReader<'_>,
    key: &str,
    text: &str,
    issues: &mut IssueCollector,
) -> Option<(u64, u64)> {
    let parsed = text.split_once('.').and_then(|(major, minor)| {
        let is_number =
            |part: &str| !part.is_empty() && part.bytes().all(|byte| byte.is_ascii_digit());
        if !is_number(major) || !is_number(minor) {
            return None;
        }
        Some((major.parse().ok()?, minor.parse().ok()?))
    });
    if parsed.is_none() {
        issues.record(
            IssueCode::PatternMismatch,
            reader.child(key),
            format!("Value '{text}' does not match regexp pattern '^([0-9]+)\\.([0-9]+)$'"),
        );
    }
    parsed
}

/// Array of unique strings (`extensionsUsed`, `extensionsRequired`).
fn string_set(root: &ObjectReader<'_>, key: &str, issues: &mut IssueCollector) -> Vec<String> {
    let Some(items) = root.array(key, issues) else {
        return Vec::new();
    };

    let mut names = Vec::<String>::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let pointer = format!("{}/{position}", root.child(key));
        let Value::String(name) = item else {
            issues.record(
                IssueCode::TypeMismatch,
                pointer,
                format!("Type mismatch. {} is not a string", describe(item)),
            );
            continue;
        };
        if names.contains(name) {
            issues.record(
                IssueCode::DuplicateElements,
                pointer,
                format!("Array contains duplicate element '{name}'"),
            );
            continue;
        }
        names.push(name.clone());
    }
    names
}

fn parse_material(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Material {
    reader.check_keys(&MATERIAL_KEYS, issues);
    let mut textures = Vec::new();

    if let Some(pbr) = reader.object("pbrMetallicRoughness", issues) {
        pbr.check_keys(&PBR_KEYS, issues);
        for slot in ["baseColorTexture", "metallicRoughnessTexture"] {
            textures.extend(texture_info(&pbr, slot, &[], registry, issues));
        }
    }
    textures.extend(texture_info(reader, "normalTexture", &["scale"], registry, issues));
    textures.extend(texture_info(reader, "occlusionTexture", &["strength"], registry, issues));
    textures.extend(texture_info(reader, "emissiveTexture", &[], registry, issues));

    Material { textures }
}

fn texture_info(
    owner: &ObjectReader<'_>,
    key: &str,
    extra_keys: &[&str],
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Option<usize> {
    let info = owner.object(key, issues)?;
    let mut known = vec!["index", "texCoord"];
    known.extend_from_slice(extra_keys);
    info.check_keys(&known, issues);
    info.uint("texCoord", issues);
    info.required_index("index", ArrayKind::Textures, registry, issues)
}

fn parse_image(
    reader: &ObjectReader<'_>,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Image {
    reader.check_keys(&IMAGE_KEYS, issues);
    let buffer_view = reader.index("bufferView", ArrayKind::BufferViews, registry, issues);
    let uri = reader.string("uri", issues);

    if reader.has("uri") && reader.has("bufferView") {
        issues.record(
            IssueCode::MutuallyExclusiveProperties,
            reader.pointer(),
            "Only one of 'uri' or 'bufferView' may be defined",
        );
    }

    if let Some(mime_type) = reader.string("mimeType", issues)
        && !IMAGE_MIME_TYPES.contains(&mime_type)
    {
        issues.record(
            IssueCode::ValueNotInList,
            reader.child("mimeType"),
            format!("Invalid value '{mime_type}'. Valid values are ('image/jpeg', 'image/png')"),
        );
    }

    if let Some(uri) = uri {
        match classify(uri) {
            UriKind::Data(Ok(data)) if !IMAGE_MIME_TYPES.contains(&data.mime_type.as_str()) => {
                issues.record(
                    IssueCode::UnsupportedMimeType,
                    reader.child("uri"),
                    format!("Unsupported image MIME type '{}'", data.mime_type),
                );
            }
            UriKind::Data(Err(error)) => {
                issues.record(
                    IssueCode::InvalidUri,
                    reader.child("uri"),
                    format!("Invalid URI: {error}"),
                );
            }
            UriKind::Data(Ok(_)) | UriKind::External(_) => {}
        }
    }

    Image { buffer_view }
}
