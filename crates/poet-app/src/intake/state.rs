//! Observable intake state

use poet_types::ImageDatum;

/// The single mutable record behind the intake flow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadState {
    pub photo: Option<ImageDatum>,
    pub file_name: Option<String>,
    pub poem: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Where the intake flow currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    /// A selected file is being read
    Processing,
    Ready,
    Generating,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Empty => "empty",
            Phase::Processing => "processing",
            Phase::Ready => "ready",
            Phase::Generating => "generating",
            Phase::Succeeded => "succeeded",
            Phase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl UploadState {
    pub fn phase(&self, is_processing: bool) -> Phase {
        if self.is_loading {
            return Phase::Generating;
        }
        if is_processing {
            return Phase::Processing;
        }
        match (&self.photo, &self.poem, &self.error) {
            (None, _, _) => Phase::Empty,
            (Some(_), Some(_), _) => Phase::Succeeded,
            (Some(_), None, Some(_)) => Phase::Failed,
            (Some(_), None, None) => Phase::Ready,
        }
    }
}
