use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("Resource '{uri}' could not be loaded: {reason}")]
    Resource { uri: String, reason: String },
}
