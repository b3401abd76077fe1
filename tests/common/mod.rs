use bzhash::Patch;

/// Small parameters so that a full dataset builds in milliseconds.
///
/// Epoch 0: 31 cache nodes, 251 dataset pages.
pub struct TinyPatch;

impl Patch for TinyPatch {
    const EPOCH_LENGTH: u64 = 2;
    const CACHE_BYTES_INIT: usize = 2048;
    const CACHE_BYTES_GROWTH: usize = 128;
    const DATASET_BYTES_INIT: usize = 32 * 1024;
    const DATASET_BYTES_GROWTH: usize = 1024;
}
