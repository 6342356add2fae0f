//! Index space of every top-level array and the only place indices are
//! bounds-checked.

use serde_json::{Map, Value};

use super::issues::{IssueCode, IssueCollector};

/// Top-level document arrays that can be referenced by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArrayKind {
    Accessors,
    Animations,
    Buffers,
    BufferViews,
    Cameras,
    Images,
    Materials,
    Meshes,
    Nodes,
    Samplers,
    Scenes,
    Skins,
    Textures,
}

impl ArrayKind {
    pub const ALL: [ArrayKind; 13] = [
        ArrayKind::Accessors,
        ArrayKind::Animations,
        ArrayKind::Buffers,
        ArrayKind::BufferViews,
        ArrayKind::Cameras,
        ArrayKind::Images,
        ArrayKind::Materials,
        ArrayKind::Meshes,
        ArrayKind::Nodes,
        ArrayKind::Samplers,
        ArrayKind::Scenes,
        ArrayKind::Skins,
        ArrayKind::Textures,
    ];

    /// JSON key of the array in the root object.
    pub fn key(self) -> &'static str {
        match self {
            ArrayKind::Accessors => "accessors",
            ArrayKind::Animations => "animations",
            ArrayKind::Buffers => "buffers",
            ArrayKind::BufferViews => "bufferViews",
            ArrayKind::Cameras => "cameras",
            ArrayKind::Images => "images",
            ArrayKind::Materials => "materials",
            ArrayKind::Meshes => "meshes",
            ArrayKind::Nodes => "nodes",
            ArrayKind::Samplers => "samplers",
            ArrayKind::Scenes => "scenes",
            ArrayKind::Skins => "skins",
            ArrayKind::Textures => "textures",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Per-array lengths plus validity flags set by the stages that own each
/// entity kind. Downstream stages consult the flags instead of re-deriving
/// errors.
#[derive(Debug, Clone)]
pub struct Registry {
    lengths: Vec<usize>,
    valid: Vec<Vec<bool>>,
}

impl Registry {
    /// Index every top-level array of `root`. A present but non-array value is
    /// reported and treated as empty.
    pub fn new(root: &Map<String, Value>, issues: &mut IssueCollector) -> Self {
        let mut lengths = vec![0usize; ArrayKind::ALL.len()];
        for kind in ArrayKind::ALL {
            match root.get(kind.key()) {
                None => {}
                Some(Value::Array(items)) => lengths[kind.slot()] = items.len(),
                Some(_) => issues.record(
                    IssueCode::TypeMismatch,
                    format!("/{}", kind.key()),
                    format!("Type mismatch. Property `{}` must be an array", kind.key()),
                ),
            }
        }

        let valid = lengths.iter().map(|length| vec![true; *length]).collect();
        Self { lengths, valid }
    }

    pub fn len(&self, kind: ArrayKind) -> usize {
        self.lengths[kind.slot()]
    }

    /// Resolve a raw JSON value used as a reference into `kind`.
    ///
    /// Non-integers yield `TYPE_MISMATCH`; integers outside `[0, len)` yield
    /// `UNRESOLVED_REFERENCE`. Either way nothing is dereferenced.
    pub fn resolve(
        &self,
        kind: ArrayKind,
        value: &Value,
        pointer: &str,
        issues: &mut IssueCollector,
    ) -> Option<usize> {
        resolve_index(self.len(kind), value, pointer, issues)
    }

    pub fn mark_invalid(&mut self, kind: ArrayKind, index: usize) {
        if let Some(flag) = self.valid[kind.slot()].get_mut(index) {
            *flag = false;
        }
    }

    /// True when `index` exists and no owning stage flagged it.
    pub fn is_valid(&self, kind: ArrayKind, index: usize) -> bool {
        self.valid[kind.slot()].get(index).copied().unwrap_or(false)
    }
}

/// Resolve a reference into an array of `len` elements (top-level or nested,
/// e.g. animation samplers).
pub fn resolve_index(
    len: usize,
    value: &Value,
    pointer: &str,
    issues: &mut IssueCollector,
) -> Option<usize> {
    if let Some(index) = value.as_u64() {
        if let Ok(index) = usize::try_from(index)
            && index < len
        {
            return Some(index);
        }
        issues.record(
            IssueCode::UnresolvedReference,
            pointer,
            format!("Unresolved reference: {index}"),
        );
        return None;
    }

    if let Some(index) = value.as_i64() {
        issues.record(
            IssueCode::UnresolvedReference,
            pointer,
            format!("Unresolved reference: {index}"),
        );
        return None;
    }

    issues.record(
        IssueCode::TypeMismatch,
        pointer,
        format!("Type mismatch. {} is not an integer index", describe(value)),
    );
    None
}

/// Short description of a JSON value for messages.
pub(super) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => format!("Boolean {flag}"),
        Value::Number(number) => format!("Number {number}"),
        Value::String(text) => format!("String '{text}'"),
        Value::Array(_) => "Array".to_string(),
        Value::Object(_) => "Object".to_string(),
    }
}
