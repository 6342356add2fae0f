use super::document::Document;
use super::mesh::{MODE_TRIANGLE_FAN, MODE_TRIANGLE_STRIP, MODE_TRIANGLES, Primitive};
use super::registry::{ArrayKind, Registry};
use super::types::AssetInfo;
use super::usage::Usage;

/// Summary statistics of a parsed document.
pub(super) fn collect_info(document: &Document, registry: &Registry, usage: &Usage) -> AssetInfo {
    let mut info = AssetInfo {
        version: document.asset.version.clone(),
        min_version: document.asset.min_version.clone(),
        generator: document.asset.generator.clone(),
        extensions_used: document.extensions_used.clone(),
        extensions_required: document.extensions_required.clone(),
        animation_count: document.animations.len(),
        material_count: document.materials.len(),
        has_morph_targets: document
            .meshes
            .iter()
            .flat_map(|mesh| &mesh.primitives)
            .any(|primitive| !primitive.targets.is_empty()),
        has_skins: !document.skins.is_empty(),
        has_textures: !document.textures.is_empty(),
        has_default_scene: document.scene.is_some(),
        ..AssetInfo::default()
    };

    for primitive in document.meshes.iter().flat_map(|mesh| &mesh.primitives) {
        let semantics = || primitive.attributes.iter().map(|(semantic, _)| semantic.as_str());
        info.max_attributes = info.max_attributes.max(primitive.attributes.len());
        info.max_uvs = info
            .max_uvs
            .max(semantics().filter(|name| name.starts_with("TEXCOORD_")).count());
        info.max_influences = info
            .max_influences
            .max(semantics().filter(|name| name.starts_with("JOINTS_")).count() * 4);
    }

    for (node_index, node) in document.nodes.iter().enumerate() {
        if !usage.is_used(ArrayKind::Nodes, node_index) {
            continue;
        }
        let Some(mesh) = node.mesh else {
            continue;
        };
        for primitive in &document.meshes[mesh].primitives {
            info.draw_call_count += 1;
            let vertices = accessor_count(document, registry, primitive.attribute("POSITION"));
            info.total_vertex_count += vertices;
            let elements = match primitive.indices {
                Some(_) => accessor_count(document, registry, primitive.indices),
                None => vertices,
            };
            info.total_triangle_count += triangle_count(primitive, elements);
        }
    }

    info
}

fn accessor_count(document: &Document, registry: &Registry, index: Option<usize>) -> usize {
    index
        .filter(|&index| registry.is_valid(ArrayKind::Accessors, index))
        .and_then(|index| document.accessors[index].count)
        .and_then(|count| usize::try_from(count).ok())
        .unwrap_or(0)
}

fn triangle_count(primitive: &Primitive, elements: usize) -> usize {
    match primitive.mode {
        MODE_TRIANGLES => elements / 3,
        MODE_TRIANGLE_STRIP | MODE_TRIANGLE_FAN => elements.saturating_sub(2),
        _ => 0,
    }
}
