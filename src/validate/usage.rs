//! Node hierarchy checks and the used/unused partition of every resource.
//!
//! The node graph is the flat `nodes` array with edges from `children`, so
//! every traversal here is index based with an explicit stack.

use std::collections::{BTreeMap, VecDeque};

use log::debug;

use super::document::Document;
use super::issues::{IssueCode, IssueCollector};
use super::registry::{ArrayKind, Registry};

/// Kinds reported as `UNUSED_OBJECT`, in report order.
const TRACKED_KINDS: [ArrayKind; 11] = [
    ArrayKind::Accessors,
    ArrayKind::BufferViews,
    ArrayKind::Buffers,
    ArrayKind::Cameras,
    ArrayKind::Images,
    ArrayKind::Materials,
    ArrayKind::Meshes,
    ArrayKind::Nodes,
    ArrayKind::Samplers,
    ArrayKind::Skins,
    ArrayKind::Textures,
];

/// Which entries of each top-level array are reachable from the roots.
#[derive(Debug, Clone, Default)]
pub(super) struct Usage {
    used: BTreeMap<ArrayKind, Vec<bool>>,
}

impl Usage {
    fn new(registry: &Registry) -> Self {
        let used = ArrayKind::ALL
            .into_iter()
            .map(|kind| (kind, vec![false; registry.len(kind)]))
            .collect();
        Self { used }
    }

    /// Mark `index` used. Returns true the first time.
    fn mark(&mut self, kind: ArrayKind, index: usize) -> bool {
        match self.used.get_mut(&kind).and_then(|flags| flags.get_mut(index)) {
            Some(flag) if !*flag => {
                *flag = true;
                true
            }
            _ => false,
        }
    }

    pub(super) fn is_used(&self, kind: ArrayKind, index: usize) -> bool {
        self.used
            .get(&kind)
            .and_then(|flags| flags.get(index))
            .copied()
            .unwrap_or(false)
    }

    fn unused(&self, kind: ArrayKind) -> impl Iterator<Item = usize> + '_ {
        self.used
            .get(&kind)
            .into_iter()
            .flat_map(|flags| flags.iter().enumerate())
            .filter(|(_, used)| !**used)
            .map(|(index, _)| index)
    }
}

pub(super) fn track_usage(
    document: &Document,
    registry: &Registry,
    issues: &mut IssueCollector,
) -> Usage {
    let parents = check_parents(document, issues);
    detect_cycles(document, issues);
    check_scene_roots(document, &parents, issues);

    let usage = mark_used(document, registry);
    check_skeletons(document, issues);

    for kind in TRACKED_KINDS {
        for index in usage.unused(kind) {
            issues.record(
                IssueCode::UnusedObject,
                format!("/{}/{index}", kind.key()),
                "This object may be unused",
            );
        }
    }
    usage
}

// ─── Hierarchy ────────────────────────────────────────────────────────────────

/// First parent of every node. Later parents are reported.
fn check_parents(document: &Document, issues: &mut IssueCollector) -> Vec<Option<usize>> {
    let mut parents = vec![None; document.nodes.len()];
    for (parent, node) in document.nodes.iter().enumerate() {
        for &(position, child) in &node.children {
            match parents[child] {
                Some(existing) => issues.record(
                    IssueCode::NodeParentOverride,
                    format!("/nodes/{parent}/children/{position}"),
                    format!("Value overrides parent of node {child} (previous parent: {existing})"),
                ),
                None => parents[child] = Some(parent),
            }
        }
    }
    parents
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnPath,
    Done,
}

/// Depth-first walk over the child graph. An edge back onto the current path
/// is a loop; it is reported and not followed.
fn detect_cycles(document: &Document, issues: &mut IssueCollector) {
    let mut state = vec![Visit::New; document.nodes.len()];

    for start in 0..document.nodes.len() {
        if state[start] != Visit::New {
            continue;
        }
        state[start] = Visit::OnPath;
        let mut stack = vec![(start, 0usize)];

        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            top.1 += 1;
            let Some(&(position, child)) = document.nodes[node].children.get(next) else {
                state[node] = Visit::Done;
                stack.pop();
                continue;
            };
            match state[child] {
                Visit::New => {
                    state[child] = Visit::OnPath;
                    stack.push((child, 0));
                }
                Visit::OnPath => issues.record(
                    IssueCode::NodeLoop,
                    format!("/nodes/{node}/children/{position}"),
                    format!("Node {child} is a part of a node loop"),
                ),
                Visit::Done => {}
            }
        }
    }
}

fn check_scene_roots(document: &Document, parents: &[Option<usize>], issues: &mut IssueCollector) {
    for (scene_index, scene) in document.scenes.iter().enumerate() {
        for &(position, node) in &scene.nodes {
            if let Some(parent) = parents[node] {
                issues.record(
                    IssueCode::SceneNonRootNode,
                    format!("/scenes/{scene_index}/nodes/{position}"),
                    format!("Node {node} is not a root node (parent: {parent})"),
                );
            }
        }
    }
}

/// Nodes reachable from `root` through `children`, `root` included.
fn descendants(document: &Document, root: usize) -> Vec<bool> {
    let mut reached = vec![false; document.nodes.len()];
    let mut queue = VecDeque::from([root]);
    reached[root] = true;
    while let Some(node) = queue.pop_front() {
        for &(_, child) in &document.nodes[node].children {
            if !reached[child] {
                reached[child] = true;
                queue.push_back(child);
            }
        }
    }
    reached
}

fn check_skeletons(document: &Document, issues: &mut IssueCollector) {
    for (skin_index, skin) in document.skins.iter().enumerate() {
        let Some(skeleton) = skin.skeleton else {
            continue;
        };
        let reached = descendants(document, skeleton);
        for &(position, joint) in &skin.joints {
            if !reached[joint] {
                issues.record(
                    IssueCode::SkinSkeletonInvalid,
                    format!("/skins/{skin_index}/joints/{position}"),
                    format!("Joint {joint} is not a descendant of skeleton node {skeleton}"),
                );
            }
        }
    }
}

// ─── Reachability ─────────────────────────────────────────────────────────────

fn mark_used(document: &Document, registry: &Registry) -> Usage {
    let mut usage = Usage::new(registry);

    let seed_scenes: Vec<usize> = match document.scene {
        Some(scene) => vec![scene],
        None => (0..document.scenes.len()).collect(),
    };
    let mut pending_nodes = seed_scenes
        .iter()
        .flat_map(|&scene| document.scenes[scene].nodes.iter().map(|&(_, node)| node))
        .collect::<Vec<_>>();

    for animation in &document.animations {
        pending_nodes.extend(animation.channels.iter().filter_map(|channel| channel.node));
        for sampler in animation.samplers.iter().flatten() {
            for accessor in [sampler.input, sampler.output].into_iter().flatten() {
                usage.mark(ArrayKind::Accessors, accessor);
            }
        }
    }

    while let Some(node_index) = pending_nodes.pop() {
        if !usage.mark(ArrayKind::Nodes, node_index) {
            continue;
        }
        let node = &document.nodes[node_index];
        pending_nodes.extend(node.children.iter().map(|&(_, child)| child));
        if let Some(mesh) = node.mesh {
            usage.mark(ArrayKind::Meshes, mesh);
        }
        if let Some(camera) = node.camera {
            usage.mark(ArrayKind::Cameras, camera);
        }
        if let Some(skin_index) = node.skin
            && usage.mark(ArrayKind::Skins, skin_index)
        {
            let skin = &document.skins[skin_index];
            pending_nodes.extend(skin.joints.iter().map(|&(_, joint)| joint));
            pending_nodes.extend(skin.skeleton);
            if let Some(accessor) = skin.inverse_bind_matrices {
                usage.mark(ArrayKind::Accessors, accessor);
            }
        }
    }

    for (mesh_index, mesh) in document.meshes.iter().enumerate() {
        if !usage.is_used(ArrayKind::Meshes, mesh_index) {
            continue;
        }
        for primitive in &mesh.primitives {
            for accessor in primitive.accessors() {
                usage.mark(ArrayKind::Accessors, accessor);
            }
            if let Some(material) = primitive.material {
                usage.mark(ArrayKind::Materials, material);
            }
        }
    }

    for (material_index, material) in document.materials.iter().enumerate() {
        if usage.is_used(ArrayKind::Materials, material_index) {
            for &texture in &material.textures {
                usage.mark(ArrayKind::Textures, texture);
            }
        }
    }

    for (texture_index, texture) in document.textures.iter().enumerate() {
        if !usage.is_used(ArrayKind::Textures, texture_index) {
            continue;
        }
        if let Some(image) = texture.source {
            usage.mark(ArrayKind::Images, image);
        }
        if let Some(sampler) = texture.sampler {
            usage.mark(ArrayKind::Samplers, sampler);
        }
    }

    for (accessor_index, accessor) in document.accessors.iter().enumerate() {
        if !usage.is_used(ArrayKind::Accessors, accessor_index) {
            continue;
        }
        let sparse_views = accessor.sparse.iter().flat_map(|sparse| {
            [
                sparse.indices.as_ref().and_then(|indices| indices.buffer_view),
                sparse.values.as_ref().and_then(|values| values.buffer_view),
            ]
        });
        for view in accessor.buffer_view.into_iter().chain(sparse_views.flatten()) {
            usage.mark(ArrayKind::BufferViews, view);
        }
    }

    for (image_index, image) in document.images.iter().enumerate() {
        if usage.is_used(ArrayKind::Images, image_index)
            && let Some(view) = image.buffer_view
        {
            usage.mark(ArrayKind::BufferViews, view);
        }
    }

    for (view_index, view) in document.buffer_views.iter().enumerate() {
        if usage.is_used(ArrayKind::BufferViews, view_index)
            && let Some(buffer) = view.buffer
        {
            usage.mark(ArrayKind::Buffers, buffer);
        }
    }

    debug!(
        "Usage seeded from {} scene(s) and {} animation(s)",
        seed_scenes.len(),
        document.animations.len()
    );
    usage
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::validate::document::tests::parse_document;

    fn run(value: Value) -> (Usage, IssueCollector) {
        let (document, registry, mut issues) = parse_document(value);
        let usage = track_usage(&document, &registry, &mut issues);
        (usage, issues)
    }

    fn codes(issues: &IssueCollector) -> Vec<&str> {
        issues.issues().iter().map(|issue| issue.code.as_str()).collect()
    }

    fn pointers(issues: &IssueCollector) -> Vec<&str> {
        issues
            .issues()
            .iter()
            .filter_map(|issue| issue.pointer.as_deref())
            .collect()
    }

    #[test]
    fn given_two_node_cycle_when_tracking_then_one_loop_is_reported_and_walk_terminates() {
        let (_, issues) = run(json!({
            "asset": {"version": "2.0"},
            "nodes": [{"children": [1]}, {"children": [0]}],
            "scenes": [{"nodes": [0]}]
        }));

        assert_eq!(codes(&issues), vec!["NODE_LOOP", "SCENE_NON_ROOT_NODE"]);
        assert_eq!(pointers(&issues), vec!["/nodes/1/children/0", "/scenes/0/nodes/0"]);
    }

    #[test]
    fn given_self_referencing_node_when_tracking_then_the_edge_is_a_loop() {
        let (_, issues) = run(json!({
            "asset": {"version": "2.0"},
            "nodes": [{"children": [0]}],
            "scenes": [{"nodes": [0]}]
        }));

        assert_eq!(
            codes(&issues),
            vec!["NODE_LOOP", "SCENE_NON_ROOT_NODE"]
        );
        assert_eq!(issues.issues()[0].pointer.as_deref(), Some("/nodes/0/children/0"));
    }

    #[test]
    fn given_shared_child_when_tracking_then_parent_override_is_reported() {
        let (_, issues) = run(json!({
            "asset": {"version": "2.0"},
            "nodes": [{"children": [2]}, {"children": [2]}, {}],
            "scenes": [{"nodes": [0, 1]}]
        }));

        assert_eq!(codes(&issues), vec!["NODE_PARENT_OVERRIDE"]);
        assert_eq!(pointers(&issues), vec!["/nodes/1/children/0"]);
    }

    #[test]
    fn given_buffer_reached_only_through_unused_view_when_tracking_then_both_are_unused() {
        let (usage, issues) = run(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 12}, {"byteLength": 12}],
            "bufferViews": [{"buffer": 0, "byteLength": 12}, {"buffer": 1, "byteLength": 12}],
            "accessors": [{"bufferView": 0, "componentType": 5126, "count": 1, "type": "VEC3"}],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
            "nodes": [{"mesh": 0}],
            "scenes": [{"nodes": [0]}]
        }));

        assert_eq!(codes(&issues), vec!["UNUSED_OBJECT", "UNUSED_OBJECT"]);
        assert_eq!(pointers(&issues), vec!["/bufferViews/1", "/buffers/1"]);
        assert!(usage.is_used(ArrayKind::Buffers, 0));
        assert!(!usage.is_used(ArrayKind::Buffers, 1));
    }

    #[test]
    fn given_joint_outside_skeleton_when_tracking_then_that_joint_is_reported() {
        let (_, issues) = run(json!({
            "asset": {"version": "2.0"},
            "nodes": [{"children": [1], "skin": 0}, {}, {}],
            "skins": [{"skeleton": 0, "joints": [1, 2]}],
            "scenes": [{"nodes": [0, 2]}]
        }));

        assert_eq!(codes(&issues), vec!["SKIN_SKELETON_INVALID"]);
        assert_eq!(pointers(&issues), vec!["/skins/0/joints/1"]);
    }

    #[test]
    fn given_default_scene_and_animation_when_tracking_then_only_their_graph_is_used() {
        let (usage, issues) = run(json!({
            "asset": {"version": "2.0"},
            "accessors": [{"componentType": 5126, "count": 1, "type": "SCALAR"}],
            "cameras": [{"type": "perspective"}],
            "nodes": [{}, {"camera": 0}, {}],
            "scenes": [{"nodes": [0]}, {"nodes": [1]}],
            "scene": 0,
            "animations": [{
                "samplers": [{"input": 0, "output": 0}],
                "channels": [{"sampler": 0, "target": {"node": 2, "path": "translation"}}]
            }]
        }));

        assert_eq!(pointers(&issues), vec!["/cameras/0", "/nodes/1"]);
        assert!(usage.is_used(ArrayKind::Nodes, 2));
        assert!(usage.is_used(ArrayKind::Accessors, 0));
    }
}
