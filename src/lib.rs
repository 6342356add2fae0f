//! glTF 2.0 and GLB validator.
//!
//! [`validate::validate_bytes`] checks a document and its binary payloads
//! and returns a [`ValidationReport`] listing every conformance issue.

pub mod error;
pub mod options;
pub mod resource;
pub mod validate;

pub use error::ValidatorError;
pub use options::{load_validation_options, save_validation_options};
pub use resource::{FileResourceLoader, NoExternalResources, ResourceLoader};
pub use validate::types::{
    AssetInfo, IssuesSummary, Severity, ValidationIssue, ValidationOptions, ValidationReport,
};
pub use validate::{validate_bytes, validate_file};
