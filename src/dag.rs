use core::fmt;
use core::marker::PhantomData;
use core::ops::ControlFlow;
use std::io::{Read, Write};

use ethereum_types::H256;
use tracing::{debug, info};

use crate::error::{Error, FullDAGError};
use crate::{MainnetPatch, Patch, PowOutput, MIX_BYTES, NODE_BYTES};

/// Light verification handle: owns the epoch cache only.
pub struct LightDAG<P: Patch = MainnetPatch> {
    block_number: u64,
    epoch: usize,
    seed: H256,
    cache: Vec<u8>,
    full_size: usize,
    _marker: PhantomData<fn() -> P>,
}

impl<P: Patch> LightDAG<P> {
    /// Build the cache for the epoch of `block_number`.
    pub fn new(block_number: u64) -> Result<Self, Error> {
        let cache_size = P::cache_size(block_number);
        let seed = P::seedhash(block_number);
        Self::from_seed(block_number, cache_size, seed)
    }

    /// Build a cache of an explicit size from an explicit seed.
    ///
    /// `block_number` still selects the dataset size used by
    /// [`compute`](Self::compute).
    pub fn from_seed(
        block_number: u64,
        cache_size: usize,
        seed: H256,
    ) -> Result<Self, Error> {
        if cache_size == 0 || cache_size % NODE_BYTES != 0 {
            return Err(Error::InvalidCacheSize(cache_size));
        }
        let epoch = P::epoch(block_number);
        debug!(target: "bzhash::light", block_number, epoch, cache_size, "generating cache");

        let mut cache = alloc_zeroed(cache_size)?;
        crate::make_cache(&mut cache, seed)?;

        Ok(Self {
            block_number,
            epoch,
            seed,
            cache,
            full_size: P::full_size(block_number),
            _marker: PhantomData,
        })
    }

    pub fn compute(
        &self,
        header_hash: H256,
        nonce: u64,
    ) -> Result<PowOutput, Error> {
        self.compute_with_size(self.full_size, header_hash, nonce)
    }

    /// Like [`compute`](Self::compute) against a dataset of `full_size`
    /// bytes instead of the epoch's own size.
    pub fn compute_with_size(
        &self,
        full_size: usize,
        header_hash: H256,
        nonce: u64,
    ) -> Result<PowOutput, Error> {
        crate::hashimoto_light(header_hash, nonce, full_size, &self.cache)
    }

    pub fn is_valid_for(&self, block_number: u64) -> bool {
        P::epoch(block_number) == self.epoch
    }

    pub fn cache(&self) -> &[u8] { &self.cache }

    pub fn cache_size(&self) -> usize { self.cache.len() }

    pub fn full_size(&self) -> usize { self.full_size }

    pub fn block_number(&self) -> u64 { self.block_number }

    pub fn epoch(&self) -> usize { self.epoch }

    pub fn seedhash(&self) -> H256 { self.seed }
}

impl<P: Patch> fmt::Debug for LightDAG<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightDAG")
            .field("block_number", &self.block_number)
            .field("epoch", &self.epoch)
            .field("seed", &self.seed)
            .field("cache_size", &self.cache.len())
            .field("full_size", &self.full_size)
            .finish()
    }
}

/// Full handle: the light cache plus the complete dataset.
pub struct FullDAG<P: Patch = MainnetPatch> {
    light: LightDAG<P>,
    dataset: Vec<u8>,
}

impl<P: Patch> FullDAG<P> {
    /// Generate the dataset for `light`'s epoch, taking ownership of the
    /// cache.
    ///
    /// `callback` is invoked with the completion percentage between chunks
    /// of work; returning [`ControlFlow::Break`] aborts generation. On any
    /// failure the dataset buffer is released and `light` is returned in the
    /// error.
    pub fn new<F>(light: LightDAG<P>, callback: F) -> Result<Self, FullDAGError<P>>
    where
        F: FnMut(u32) -> ControlFlow<()>,
    {
        let full_size = light.full_size;
        Self::with_size(light, full_size, callback)
    }

    /// Like [`new`](Self::new) with an explicit dataset size.
    ///
    /// On success the inner light handle adopts `full_size`, so
    /// `full.light().compute(..)` stays equal to `full.compute(..)`.
    pub fn with_size<F>(
        mut light: LightDAG<P>,
        full_size: usize,
        callback: F,
    ) -> Result<Self, FullDAGError<P>>
    where
        F: FnMut(u32) -> ControlFlow<()>,
    {
        match generate(&light, full_size, callback) {
            Ok(dataset) => {
                light.full_size = full_size;
                Ok(Self { light, dataset })
            }
            Err(error) => Err(FullDAGError { error, light }),
        }
    }

    /// Adopt a dataset produced elsewhere, e.g. loaded from disk.
    pub fn from_dataset(
        light: LightDAG<P>,
        dataset: Vec<u8>,
    ) -> Result<Self, FullDAGError<P>> {
        if dataset.len() != light.full_size {
            let error = Error::InvalidDatasetSize(dataset.len());
            return Err(FullDAGError { error, light });
        }
        Ok(Self { light, dataset })
    }

    /// Load a dataset written by [`write_to`](Self::write_to).
    pub fn from_reader<R: Read>(
        light: LightDAG<P>,
        reader: R,
    ) -> Result<Self, FullDAGError<P>> {
        match crate::io::read_dag(reader, light.full_size) {
            Ok(dataset) => Self::from_dataset(light, dataset),
            Err(error) => Err(FullDAGError { error, light }),
        }
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), Error> {
        crate::io::write_dag(writer, &self.dataset)
    }

    pub fn compute(
        &self,
        header_hash: H256,
        nonce: u64,
    ) -> Result<PowOutput, Error> {
        crate::hashimoto_full(header_hash, nonce, &self.dataset)
    }

    /// Search `max_attempts` nonces from `start_nonce` for one whose result
    /// is within `boundary`.
    pub fn mine(
        &self,
        header_hash: H256,
        boundary: H256,
        start_nonce: u64,
        max_attempts: u64,
    ) -> Option<(u64, PowOutput)> {
        let mut nonce = start_nonce;
        for attempts in 0..max_attempts {
            let output = self.compute(header_hash, nonce).ok()?;
            if crate::check_difficulty(&output.result, &boundary) {
                debug!(target: "bzhash::mine", nonce, attempts, "nonce found");
                return Some((nonce, output));
            }
            nonce = nonce.wrapping_add(1);
        }
        debug!(target: "bzhash::mine", start_nonce, max_attempts, "search exhausted");
        None
    }

    pub fn dag(&self) -> &[u8] { &self.dataset }

    pub fn dag_size(&self) -> u64 { self.dataset.len() as u64 }

    pub fn light(&self) -> &LightDAG<P> { &self.light }
}

impl<P: Patch> fmt::Debug for FullDAG<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FullDAG")
            .field("light", &self.light)
            .field("dag_size", &self.dataset.len())
            .finish()
    }
}

fn generate<P, F>(
    light: &LightDAG<P>,
    full_size: usize,
    callback: F,
) -> Result<Vec<u8>, Error>
where
    P: Patch,
    F: FnMut(u32) -> ControlFlow<()>,
{
    if full_size == 0 || full_size % MIX_BYTES != 0 {
        return Err(Error::InvalidDatasetSize(full_size));
    }
    debug!(
        target: "bzhash::full",
        block_number = light.block_number,
        epoch = light.epoch,
        full_size,
        "generating dataset"
    );

    let mut dataset = alloc_zeroed(full_size)?;
    if let Err(err) = crate::make_dataset_with_progress(&mut dataset, &light.cache, callback) {
        debug!(target: "bzhash::full", %err, "dataset generation failed");
        return Err(err);
    }

    info!(target: "bzhash::full", epoch = light.epoch, full_size, "dataset ready");
    Ok(dataset)
}

pub(crate) fn alloc_zeroed(bytes: usize) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes)
        .map_err(|_| Error::Allocation { bytes })?;
    buf.resize(bytes, 0);
    Ok(buf)
}
