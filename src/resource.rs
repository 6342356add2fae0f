//! Loading of external (non-`data:`) buffer and image resources.

use std::fs;
use std::path::PathBuf;

use log::debug;
use percent_encoding::percent_decode_str;

use crate::error::ValidatorError;

/// Fetches the bytes behind an external URI.
///
/// `Ok(None)` means the resource was deliberately not fetched; the validator
/// then skips every check that needs its contents.
pub trait ResourceLoader {
    fn load(&self, uri: &str) -> Result<Option<Vec<u8>>, ValidatorError>;
}

/// Loader that never fetches anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalResources;

impl ResourceLoader for NoExternalResources {
    fn load(&self, _uri: &str) -> Result<Option<Vec<u8>>, ValidatorError> {
        Ok(None)
    }
}

/// Resolves relative URIs against the directory of the validated file.
#[derive(Debug, Clone)]
pub struct FileResourceLoader {
    base_dir: PathBuf,
}

impl FileResourceLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl ResourceLoader for FileResourceLoader {
    fn load(&self, uri: &str) -> Result<Option<Vec<u8>>, ValidatorError> {
        if has_scheme(uri) {
            debug!("Skipping non-file resource {uri}");
            return Ok(None);
        }

        let relative = percent_decode_str(uri)
            .decode_utf8()
            .map_err(|error| ValidatorError::Resource {
                uri: uri.to_string(),
                reason: format!("decoded URI is not UTF-8: {error}"),
            })?;
        let path = self.base_dir.join(&*relative);
        let bytes = fs::read(&path).map_err(|error| ValidatorError::Resource {
            uri: uri.to_string(),
            reason: error.to_string(),
        })?;

        debug!("Loaded {} bytes from {}", bytes.len(), path.display());
        Ok(Some(bytes))
    }
}

/// `scheme:` prefix per RFC 3986. Single letters are left alone so Windows
/// drive paths are not mistaken for schemes.
fn has_scheme(uri: &str) -> bool {
    let Some((scheme, _)) = uri.split_once(':') else {
        return false;
    };
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn scratch_dir() -> PathBuf {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "gltf-validator-resource-{}-{timestamp}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn given_relative_uri_when_loading_then_file_next_to_document_is_read() {
        let dir = scratch_dir();
        fs::write(dir.join("mesh data.bin"), [1u8, 2, 3]).expect("write");
        let loader = FileResourceLoader::new(&dir);

        let bytes = loader.load("mesh%20data.bin").expect("load");

        assert_eq!(bytes, Some(vec![1, 2, 3]));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn given_literal_percent_sign_when_loading_then_file_name_is_kept() {
        let dir = scratch_dir();
        fs::write(dir.join("100%.bin"), [7u8]).expect("write");
        let loader = FileResourceLoader::new(&dir);

        assert_eq!(loader.load("100%.bin").expect("load"), Some(vec![7]));
        assert_eq!(loader.load("100%25.bin").expect("load"), Some(vec![7]));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn given_missing_file_when_loading_then_resource_error_is_returned() {
        let dir = scratch_dir();
        let loader = FileResourceLoader::new(&dir);

        let error = loader.load("missing.bin").expect_err("must fail");

        assert!(matches!(error, ValidatorError::Resource { ref uri, .. } if uri == "missing.bin"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn given_remote_uri_when_loading_then_nothing_is_fetched() {
        let loader = FileResourceLoader::new(".");
        assert_eq!(loader.load("https://example.com/a.bin").expect("skip"), None);
        assert!(!has_scheme("C:/models/a.bin"));
    }
}
