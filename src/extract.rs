use std::path::PathBuf;

/// Default oversampling of the extracted region, leaving room for antialiasing.
pub const DEFAULT_SIZE_FACTOR: f64 = 1.5;

/// A request to extract a resized 2D image from a pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    /// Filesystem path of the pyramid's image group.
    pub path: PathBuf,
    pub target_width: u64,
    pub target_height: u64,
    /// The region read from the pyramid is this much larger than the target.
    pub size_factor: f64,
    /// Where to write the result, if anywhere.
    pub output: Option<PathBuf>,
}

impl ExtractRequest {
    pub fn new(path: impl Into<PathBuf>, target_width: u64, target_height: u64) -> Self {
        Self {
            path: path.into(),
            target_width,
            target_height,
            size_factor: DEFAULT_SIZE_FACTOR,
            output: None,
        }
    }

    pub fn with_size_factor(mut self, size_factor: f64) -> Self {
        self.size_factor = size_factor;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Resamples the best-fitting level of a 2D-like pyramid to a target size,
/// keeping its aspect ratio, pixel type and all channels.
pub trait PlaneExtractor {
    type Image;

    /// Returns None when the result is only written to [`ExtractRequest::output`].
    fn extract(&self, request: &ExtractRequest) -> crate::Result<Option<Self::Image>>;
}
