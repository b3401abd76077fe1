use core::fmt;

use crate::dag::LightDAG;
use crate::Patch;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cache length is zero or not a multiple of the node width.
    #[error("invalid cache size {0}: must be a positive multiple of 64 bytes")]
    InvalidCacheSize(usize),
    /// Dataset length is zero or not a multiple of the mix width.
    #[error("invalid dataset size {0}: must be a positive multiple of 128 bytes")]
    InvalidDatasetSize(usize),
    #[error("failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },
    /// The progress callback asked to stop dataset generation.
    #[error("dataset generation cancelled at {percent}%")]
    Cancelled { percent: u32 },
    #[error("bad dataset file magic {0:#018x}")]
    BadMagic(u64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A failed [`FullDAG`](crate::FullDAG) construction.
///
/// The light handle that was passed in is handed back untouched, so the cache
/// can be reused or retried.
pub struct FullDAGError<P: Patch> {
    pub error: Error,
    pub light: LightDAG<P>,
}

impl<P: Patch> FullDAGError<P> {
    pub fn into_light(self) -> LightDAG<P> { self.light }

    pub fn into_parts(self) -> (Error, LightDAG<P>) { (self.error, self.light) }
}

impl<P: Patch> fmt::Debug for FullDAGError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullDAGError")
            .field("error", &self.error)
            .field("light", &self.light)
            .finish()
    }
}

impl<P: Patch> fmt::Display for FullDAGError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to build full dataset: {}", self.error)
    }
}

impl<P: Patch> std::error::Error for FullDAGError<P> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
