//! Issue taxonomy and the collector every validation stage reports through.

use std::collections::{BTreeMap, HashSet};

use super::types::{IssuesSummary, Severity, ValidationIssue, ValidationOptions};

macro_rules! issue_codes {
    ($($variant:ident => ($code:literal, $severity:ident),)*) => {
        /// Every issue code the validator can emit, with its default severity.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum IssueCode {
            $($variant,)*
        }

        impl IssueCode {
            pub const ALL: &'static [IssueCode] = &[$(IssueCode::$variant,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(IssueCode::$variant => $code,)*
                }
            }

            pub fn default_severity(self) -> Severity {
                match self {
                    $(IssueCode::$variant => Severity::$severity,)*
                }
            }
        }
    };
}

issue_codes! {
    // ─ document / schema ─
    InvalidJson => ("INVALID_JSON", Error),
    BomFound => ("BOM_FOUND", Warning),
    TypeMismatch => ("TYPE_MISMATCH", Error),
    UndefinedProperty => ("UNDEFINED_PROPERTY", Error),
    UnexpectedProperty => ("UNEXPECTED_PROPERTY", Warning),
    ValueNotInRange => ("VALUE_NOT_IN_RANGE", Error),
    ValueNotInList => ("VALUE_NOT_IN_LIST", Error),
    ValueMultipleOf => ("VALUE_MULTIPLE_OF", Error),
    InvalidArrayLength => ("INVALID_ARRAY_LENGTH", Error),
    DuplicateElements => ("DUPLICATE_ELEMENTS", Error),
    PatternMismatch => ("PATTERN_MISMATCH", Error),
    UnresolvedReference => ("UNRESOLVED_REFERENCE", Error),
    MutuallyExclusiveProperties => ("MUTUALLY_EXCLUSIVE_PROPERTIES", Error),
    UnknownAssetMajorVersion => ("UNKNOWN_ASSET_MAJOR_VERSION", Error),
    UnknownAssetMinorVersion => ("UNKNOWN_ASSET_MINOR_VERSION", Warning),
    AssetMinVersionGreaterThanVersion => ("ASSET_MIN_VERSION_GREATER_THAN_VERSION", Error),
    UndeclaredExtension => ("UNDECLARED_EXTENSION", Error),
    UnusedExtensionRequired => ("UNUSED_EXTENSION_REQUIRED", Error),
    UnsupportedExtension => ("UNSUPPORTED_EXTENSION", Info),
    InvalidUri => ("INVALID_URI", Error),
    UnsupportedMimeType => ("UNSUPPORTED_MIME_TYPE", Error),
    IoError => ("IO_ERROR", Error),

    // ─ GLB container ─
    GlbUnexpectedEndOfHeader => ("GLB_UNEXPECTED_END_OF_HEADER", Error),
    GlbInvalidMagic => ("GLB_INVALID_MAGIC", Error),
    GlbInvalidVersion => ("GLB_INVALID_VERSION", Error),
    GlbLengthMismatch => ("GLB_LENGTH_MISMATCH", Error),
    GlbUnexpectedEndOfChunkHeader => ("GLB_UNEXPECTED_END_OF_CHUNK_HEADER", Error),
    GlbChunkTooBig => ("GLB_CHUNK_TOO_BIG", Error),
    GlbChunkLengthUnaligned => ("GLB_CHUNK_LENGTH_UNALIGNED", Error),
    GlbEmptyChunk => ("GLB_EMPTY_CHUNK", Error),
    GlbUnexpectedFirstChunk => ("GLB_UNEXPECTED_FIRST_CHUNK", Error),
    GlbDuplicateChunk => ("GLB_DUPLICATE_CHUNK", Error),
    GlbUnknownChunkType => ("GLB_UNKNOWN_CHUNK_TYPE", Warning),
    GlbUnusedBinChunk => ("GLB_UNUSED_BIN_CHUNK", Warning),

    // ─ buffers / buffer views ─
    BufferMissingGlbData => ("BUFFER_MISSING_GLB_DATA", Error),
    BufferGlbChunkTooBig => ("BUFFER_GLB_CHUNK_TOO_BIG", Warning),
    BufferEmbeddedBytelengthMismatch => ("BUFFER_EMBEDDED_BYTELENGTH_MISMATCH", Error),
    BufferExternalBytelengthMismatch => ("BUFFER_EXTERNAL_BYTELENGTH_MISMATCH", Error),
    BufferViewTooLong => ("BUFFER_VIEW_TOO_LONG", Error),
    BufferViewElementArrayByteStride => ("BUFFER_VIEW_ELEMENT_ARRAY_BYTE_STRIDE", Error),

    // ─ accessors ─
    InvalidComponentType => ("INVALID_COMPONENT_TYPE", Error),
    InvalidType => ("INVALID_TYPE", Error),
    AccessorOffsetAlignment => ("ACCESSOR_OFFSET_ALIGNMENT", Error),
    AccessorTotalOffsetAlignment => ("ACCESSOR_TOTAL_OFFSET_ALIGNMENT", Error),
    AccessorSmallByteStride => ("ACCESSOR_SMALL_BYTESTRIDE", Error),
    AccessorTooLong => ("ACCESSOR_TOO_LONG", Error),
    AccessorNormalizedInvalid => ("ACCESSOR_NORMALIZED_INVALID", Error),
    AccessorSparseCountOutOfRange => ("ACCESSOR_SPARSE_COUNT_OUT_OF_RANGE", Error),
    AccessorSparseIndicesNonIncreasing => ("ACCESSOR_SPARSE_INDICES_NON_INCREASING", Error),
    AccessorSparseIndexOob => ("ACCESSOR_SPARSE_INDEX_OOB", Error),
    AccessorInvalidFloat => ("ACCESSOR_INVALID_FLOAT", Error),
    AccessorMinMismatch => ("ACCESSOR_MIN_MISMATCH", Warning),
    AccessorMaxMismatch => ("ACCESSOR_MAX_MISMATCH", Warning),
    AccessorElementOutOfMinBound => ("ACCESSOR_ELEMENT_OUT_OF_MIN_BOUND", Error),
    AccessorElementOutOfMaxBound => ("ACCESSOR_ELEMENT_OUT_OF_MAX_BOUND", Error),

    // ─ animations ─
    AnimationChannelTargetNodeMatrix => ("ANIMATION_CHANNEL_TARGET_NODE_MATRIX", Error),
    AnimationChannelTargetNodeWeightsNoMorphs => (
        "ANIMATION_CHANNEL_TARGET_NODE_WEIGHTS_NO_MORPHS",
        Error
    ),
    AnimationDuplicateTargets => ("ANIMATION_DUPLICATE_TARGETS", Error),
    AnimationSamplerInputAccessorInvalidFormat => (
        "ANIMATION_SAMPLER_INPUT_ACCESSOR_INVALID_FORMAT",
        Error
    ),
    AnimationSamplerInputAccessorWithoutBounds => (
        "ANIMATION_SAMPLER_INPUT_ACCESSOR_WITHOUT_BOUNDS",
        Error
    ),
    AnimationSamplerInputAccessorNonIncreasing => (
        "ANIMATION_SAMPLER_INPUT_ACCESSOR_NON_INCREASING",
        Error
    ),
    AnimationSamplerInputAccessorTooFewElements => (
        "ANIMATION_SAMPLER_INPUT_ACCESSOR_TOO_FEW_ELEMENTS",
        Error
    ),
    AnimationSamplerAccessorWithByteStride => ("ANIMATION_SAMPLER_ACCESSOR_WITH_BYTESTRIDE", Error),
    AnimationSamplerOutputAccessorInvalidFormat => (
        "ANIMATION_SAMPLER_OUTPUT_ACCESSOR_INVALID_FORMAT",
        Error
    ),
    AnimationSamplerOutputAccessorInvalidCount => (
        "ANIMATION_SAMPLER_OUTPUT_ACCESSOR_INVALID_COUNT",
        Error
    ),
    AnimationSamplerOutputAccessorNonUnit => (
        "ANIMATION_SAMPLER_OUTPUT_ACCESSOR_NON_UNIT",
        Warning
    ),

    // ─ nodes / skins / meshes ─
    NodeMatrixNotAffine => ("NODE_MATRIX_NOT_AFFINE", Error),
    RotationNonUnit => ("ROTATION_NON_UNIT", Error),
    NodeWeightsInvalid => ("NODE_WEIGHTS_INVALID", Error),
    SkinIbmInvalidFormat => ("SKIN_IBM_INVALID_FORMAT", Error),
    SkinIbmInvalidCount => ("SKIN_IBM_INVALID_COUNT", Error),
    MeshPrimitiveUnequalAccessorCount => ("MESH_PRIMITIVE_UNEQUAL_ACCESSOR_COUNT", Error),
    MeshPrimitiveNoPosition => ("MESH_PRIMITIVE_NO_POSITION", Warning),
    MeshPrimitiveIndicesAccessorInvalidFormat => (
        "MESH_PRIMITIVE_INDICES_ACCESSOR_INVALID_FORMAT",
        Error
    ),
    MeshPrimitivesUnequalTargetsCount => ("MESH_PRIMITIVES_UNEQUAL_TARGETS_COUNT", Error),
    MeshInvalidWeightsCount => ("MESH_INVALID_WEIGHTS_COUNT", Error),

    // ─ graph / usage ─
    NodeLoop => ("NODE_LOOP", Error),
    NodeParentOverride => ("NODE_PARENT_OVERRIDE", Error),
    SceneNonRootNode => ("SCENE_NON_ROOT_NODE", Error),
    SkinSkeletonInvalid => ("SKIN_SKELETON_INVALID", Error),
    UnusedObject => ("UNUSED_OBJECT", Warning),
}

/// Ordered, append-only issue list shared by all validation stages.
///
/// Filtering (`ignoredIssues`), severity overrides and the `maxIssues` cap are
/// applied at record time, so the counts always describe the accepted list.
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Vec<ValidationIssue>,
    max_issues: usize,
    ignored: HashSet<String>,
    overrides: BTreeMap<String, Severity>,
    truncated: bool,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: &ValidationOptions) -> Self {
        Self {
            issues: Vec::new(),
            max_issues: options.max_issues,
            ignored: options.ignored_issues.iter().cloned().collect(),
            overrides: options.severity_overrides.clone(),
            truncated: false,
        }
    }

    /// Record an issue located by a JSON pointer.
    pub fn record(
        &mut self,
        code: IssueCode,
        pointer: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.push(code, Some(pointer.into()), None, message.into());
    }

    /// Record an issue located by a byte offset in the input (GLB container).
    pub fn record_at_offset(
        &mut self,
        code: IssueCode,
        offset: usize,
        message: impl Into<String>,
    ) {
        self.push(code, None, Some(offset), message.into());
    }

    fn push(
        &mut self,
        code: IssueCode,
        pointer: Option<String>,
        offset: Option<usize>,
        message: String,
    ) {
        let code_str = code.as_str();
        if self.ignored.contains(code_str) {
            return;
        }
        if self.max_issues > 0 && self.issues.len() >= self.max_issues {
            self.truncated = true;
            return;
        }

        let severity = self
            .overrides
            .get(code_str)
            .copied()
            .unwrap_or_else(|| code.default_severity());

        self.issues.push(ValidationIssue {
            code: code_str.to_string(),
            severity,
            pointer,
            offset,
            message,
        });
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// True once the cap has been hit; callers may use it to stop early.
    pub fn is_full(&self) -> bool {
        self.max_issues > 0 && self.issues.len() >= self.max_issues
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }

    pub fn num_errors(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn num_warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn num_infos(&self) -> usize {
        self.count(Severity::Info)
    }

    pub fn into_summary(self) -> IssuesSummary {
        IssuesSummary {
            num_errors: self.num_errors(),
            num_warnings: self.num_warnings(),
            num_infos: self.num_infos(),
            truncated: self.truncated,
            messages: self.issues,
        }
    }
}
