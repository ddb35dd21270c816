use thiserror::Error;

/// Failures raised by the geometry and layout core.
///
/// These are local to a single page. The orchestrator records them against the
/// page and keeps going with the rest of the batch.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or missing mask/image data, or inputs that do not line up.
    #[error("input error: {0}")]
    Input(String),

    /// No word-preserving wrap exists at any size in the search range.
    #[error("text cannot be wrapped without breaking words at size {min_size}")]
    FitUnsatisfiable { min_size: u32 },

    /// An OCR, translation, segmentation or inpainting backend failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),
}

impl CoreError {
    pub(crate) fn input(message: impl Into<String>) -> Self {
        CoreError::Input(message.into())
    }

    pub(crate) fn collaborator(err: impl std::fmt::Display) -> Self {
        CoreError::Collaborator(err.to_string())
    }
}

impl From<image::ImageError> for CoreError {
    fn from(err: image::ImageError) -> Self {
        CoreError::Input(err.to_string())
    }
}
