use thiserror::Error;

pub type Result<T> = std::result::Result<T, TaxiError>;

#[derive(Debug, Error)]
pub enum TaxiError {
    /// Camera could not be opened, read, or produced an unusable frame.
    #[error("capture failure: {0}")]
    Capture(String),
    /// Invalid command-line value or missing model graph.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Pose graph failed to load or run.
    #[error("inference failure: {0}")]
    Inference(String),
    #[error("display error: {0}")]
    Display(String),
    /// Overlay assets (fonts) could not be provisioned.
    #[error("asset error: {0}")]
    Asset(String),
}

impl From<ort::Error> for TaxiError {
    fn from(err: ort::Error) -> Self {
        TaxiError::Inference(err.to_string())
    }
}
