//! Apache-2 licensed bzhash implementation.
//!
//! bzhash is an Ethash-family memory-hard proof-of-work. Every epoch a small
//! pseudo-random cache is derived from the epoch seed, and a large dataset
//! (the DAG) is derived from the cache. The mixing loop ("hashimoto") reads
//! 64 pseudo-random 128-byte pages of the dataset per nonce, either from the
//! full dataset ([`FullDAG`]) or by recomputing the pages from the cache
//! ([`LightDAG`]). Both paths produce identical results.
//!
//! ```no_run
//! use bzhash::{quick_check_difficulty, LightDAG};
//! use ethereum_types::H256;
//!
//! let light: LightDAG = LightDAG::new(42).unwrap();
//! let header_hash = H256::repeat_byte(7);
//! let output = light.compute(header_hash, 0x1234).unwrap();
//! let boundary = H256::repeat_byte(0xff);
//! assert!(quick_check_difficulty(&header_hash, 0x1234, &output.mix_hash, &boundary));
//! ```

mod dag;
mod difficulty;
mod error;
pub mod io;
mod miller_rabin;
mod node;

use core::ops::ControlFlow;

use byteorder::{ByteOrder, LittleEndian};
use ethereum_types::H256;
use sha3::{Digest, Keccak256, Keccak512};
use tracing::trace;

pub use crate::dag::{FullDAG, LightDAG};
pub use crate::difficulty::{
    check_difficulty, difficulty_to_boundary, quick_check_difficulty,
    quick_hash,
};
pub use crate::error::{Error, FullDAGError};
pub use crate::miller_rabin::is_prime;
pub use crate::node::Node;

pub const NODE_BYTES: usize = 64;
pub const HASH_BYTES: usize = NODE_BYTES;
pub const WORD_BYTES: usize = 4;
pub const NODE_WORDS: usize = NODE_BYTES / WORD_BYTES;
pub const MIX_BYTES: usize = 128;
pub const MIX_WORDS: usize = MIX_BYTES / WORD_BYTES;
pub const MIX_NODES: usize = MIX_WORDS / NODE_WORDS;
pub const DATASET_PARENTS: u32 = 256;
pub const CACHE_ROUNDS: usize = 3;
pub const ACCESSES: u32 = 64;

pub const REVISION: u32 = 23;
pub const DAG_MAGIC_NUM_SIZE: usize = 8;
pub const DAG_MAGIC_NUM: u64 = 0xFEE1_DEAD_BADD_CAFE;

/// Network sizing parameters.
///
/// The provided methods derive everything that depends on the block number;
/// implementors only choose the constants.
pub trait Patch {
    const EPOCH_LENGTH: u64;
    const CACHE_BYTES_INIT: usize;
    const CACHE_BYTES_GROWTH: usize;
    const DATASET_BYTES_INIT: usize;
    const DATASET_BYTES_GROWTH: usize;

    fn epoch(block_number: u64) -> usize {
        (block_number / Self::EPOCH_LENGTH) as usize
    }

    /// Cache size in bytes for the epoch of `block_number`.
    fn cache_size(block_number: u64) -> usize {
        calc_size(
            Self::CACHE_BYTES_INIT,
            Self::CACHE_BYTES_GROWTH,
            NODE_BYTES,
            Self::epoch(block_number),
        )
    }

    /// Dataset size in bytes for the epoch of `block_number`.
    fn full_size(block_number: u64) -> usize {
        calc_size(
            Self::DATASET_BYTES_INIT,
            Self::DATASET_BYTES_GROWTH,
            MIX_BYTES,
            Self::epoch(block_number),
        )
    }

    fn seedhash(block_number: u64) -> H256 {
        seedhash_for_epoch(Self::epoch(block_number))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct MainnetPatch;

impl Patch for MainnetPatch {
    const EPOCH_LENGTH: u64 = 30_000;
    const CACHE_BYTES_INIT: usize = 16_777_216; // 2 to the power of 24.
    const CACHE_BYTES_GROWTH: usize = 131_072; // 2 to the power of 17.
    const DATASET_BYTES_INIT: usize = 1_073_741_824; // 2 to the power of 30.
    const DATASET_BYTES_GROWTH: usize = 8_388_608; // 2 to the power of 23.
}

/// Largest `init + growth * epoch - unit` (stepping down by two units) whose
/// unit count is prime.
///
/// Returns 0, which the handle constructors reject, when the size does not
/// fit in `usize`. Constants below two units give at most one unit instead
/// of underflowing.
fn calc_size(init: usize, growth: usize, unit: usize, epoch: usize) -> usize {
    let total = match growth.checked_mul(epoch).and_then(|g| g.checked_add(init)) {
        Some(total) => total,
        None => return 0,
    };
    let mut sz = total.saturating_sub(unit);
    // 2 and 3 are prime, so the step never runs below two units.
    while sz >= 2 * unit && !is_prime((sz / unit) as u64) {
        sz -= 2 * unit;
    }
    sz
}

pub fn epoch(block_number: u64) -> usize { MainnetPatch::epoch(block_number) }

pub fn get_cache_size(block_number: u64) -> usize {
    MainnetPatch::cache_size(block_number)
}

pub fn get_full_size(block_number: u64) -> usize {
    MainnetPatch::full_size(block_number)
}

/// Get the seedhash for a given block number.
pub fn get_seedhash(block_number: u64) -> H256 {
    MainnetPatch::seedhash(block_number)
}

pub fn seedhash_for_epoch(epoch: usize) -> H256 {
    let mut s = [0u8; 32];
    for _ in 0..epoch {
        s = keccak_256(&s);
    }
    H256(s)
}

pub fn keccak_512(data: &[u8]) -> [u8; 64] {
    let mut output = [0u8; 64];
    output.copy_from_slice(&Keccak512::digest(data));
    output
}

pub fn keccak_256(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&Keccak256::digest(data));
    output
}

const FNV_PRIME: u32 = 0x0100_0193;

pub fn fnv(v1: u32, v2: u32) -> u32 { v1.wrapping_mul(FNV_PRIME) ^ v2 }

fn check_cache(cache: &[u8]) -> Result<(), Error> {
    if cache.is_empty() || cache.len() % NODE_BYTES != 0 {
        return Err(Error::InvalidCacheSize(cache.len()));
    }
    Ok(())
}

fn check_full_size(full_size: usize) -> Result<(), Error> {
    if full_size == 0 || full_size % MIX_BYTES != 0 {
        return Err(Error::InvalidDatasetSize(full_size));
    }
    Ok(())
}

/// Make a cache using the given seed.
///
/// Both phases are strictly sequential. The hash chain needs the previous
/// node, and each mixing round reads nodes already rewritten earlier in the
/// same pass. This read-after-write chain is the memory-hardness of the
/// cache; do not parallelize either loop.
pub fn make_cache(cache: &mut [u8], seed: H256) -> Result<(), Error> {
    check_cache(cache)?;
    let n = cache.len() / NODE_BYTES;

    cache[..NODE_BYTES].copy_from_slice(&keccak_512(seed.as_bytes()));
    for i in 1..n {
        let (last, next) = cache.split_at_mut(i * NODE_BYTES);
        next[..NODE_BYTES]
            .copy_from_slice(&keccak_512(&last[(i - 1) * NODE_BYTES..]));
    }

    for _ in 0..CACHE_ROUNDS {
        for i in 0..n {
            let v = LittleEndian::read_u32(&cache[i * NODE_BYTES..]) as usize % n;
            let mut r = Node::load(cache, (i + n - 1) % n);
            r.xor_assign(&Node::load(cache, v));
            r.keccak_512().store(cache, i);
        }
    }
    Ok(())
}

/// Derive dataset element `index` from a finished cache.
///
/// Pure in `(cache, index)`; elements can be computed in any order or in
/// parallel.
pub fn calc_dataset_item(cache: &[u8], index: usize) -> Result<Node, Error> {
    check_cache(cache)?;
    Ok(dataset_item(cache, index))
}

// `cache` must already have passed `check_cache`.
fn dataset_item(cache: &[u8], index: usize) -> Node {
    let n = cache.len() / NODE_BYTES;
    let i = index as u32;

    let mut mix = Node::load(cache, index % n);
    mix.set_word(0, mix.word(0) ^ i);
    let mut mix = mix.keccak_512();

    for j in 0..DATASET_PARENTS {
        let parent = fnv(i ^ j, mix.word(j as usize % NODE_WORDS)) as usize % n;
        mix.fnv_mix(&Node::load(cache, parent));
    }
    mix.keccak_512()
}

/// Make a dataset from the given cache.
pub fn make_dataset(dataset: &mut [u8], cache: &[u8]) -> Result<(), Error> {
    make_dataset_with_progress(dataset, cache, |_| ControlFlow::Continue(()))
}

/// Make a dataset, reporting progress between chunks of roughly one percent.
///
/// `callback` receives the percentage of items already written (0 to 100)
/// and may return [`ControlFlow::Break`] to stop; the dataset contents are
/// then unspecified and [`Error::Cancelled`] is returned.
pub fn make_dataset_with_progress<F>(
    dataset: &mut [u8],
    cache: &[u8],
    mut callback: F,
) -> Result<(), Error>
where
    F: FnMut(u32) -> ControlFlow<()>,
{
    check_cache(cache)?;
    check_full_size(dataset.len())?;

    let n = dataset.len() / NODE_BYTES;
    let chunk_items = core::cmp::max(n / 100, 1);
    for (c, chunk) in dataset.chunks_mut(chunk_items * NODE_BYTES).enumerate() {
        let first = c * chunk_items;
        let percent = ((first * 100 + n - 1) / n) as u32;
        if callback(percent).is_break() {
            return Err(Error::Cancelled { percent });
        }
        trace!(target: "bzhash::dataset", percent, first, "generating items");
        fill_items(chunk, cache, first);
    }
    Ok(())
}

#[cfg(not(feature = "parallel"))]
fn fill_items(out: &mut [u8], cache: &[u8], first: usize) {
    for (k, item) in out.chunks_exact_mut(NODE_BYTES).enumerate() {
        dataset_item(cache, first + k).write_to(item);
    }
}

#[cfg(feature = "parallel")]
fn fill_items(out: &mut [u8], cache: &[u8], first: usize) {
    use rayon::prelude::*;
    static POOL: std::sync::Once = std::sync::Once::new();
    // setup rayon thread pool.
    POOL.call_once(|| {
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(num_cpus::get())
            .build_global()
            .is_ok();
    });

    out.par_chunks_exact_mut(NODE_BYTES)
        .enumerate()
        .for_each(|(k, item)| {
            dataset_item(cache, first + k).write_to(item)
        });
}

/// Output of the mixing loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PowOutput {
    /// Compressed final mix, committed to in the block header.
    pub mix_hash: H256,
    /// Value compared against the boundary.
    pub result: H256,
}

pub(crate) fn hash_seed(header_hash: H256, nonce: u64) -> Node {
    let mut buf = [0u8; 40];
    buf[..32].copy_from_slice(header_hash.as_bytes());
    LittleEndian::write_u64(&mut buf[32..], nonce);
    Node::from(keccak_512(&buf))
}

pub(crate) fn final_hash(seed: &Node, mix_hash: &H256) -> H256 {
    let mut buf = [0u8; NODE_BYTES + 32];
    seed.write_to(&mut buf[..NODE_BYTES]);
    buf[NODE_BYTES..].copy_from_slice(mix_hash.as_bytes());
    H256(keccak_256(&buf))
}

/// "Main" function of bzhash, calculating the mix digest and result given
/// the header hash and nonce.
///
/// `lookup(i)` must return dataset element `i` for a dataset of `full_size`
/// bytes.
pub fn hashimoto<F>(
    header_hash: H256,
    nonce: u64,
    full_size: usize,
    lookup: F,
) -> Result<PowOutput, Error>
where
    F: Fn(usize) -> Node,
{
    check_full_size(full_size)?;
    let pages = full_size / MIX_BYTES;

    let seed = hash_seed(header_hash, nonce);
    let seed_head = seed.word(0);
    let mut mix = [seed; MIX_NODES];

    for i in 0..ACCESSES {
        let w = i as usize % MIX_WORDS;
        let m = mix[w / NODE_WORDS].word(w % NODE_WORDS);
        let p = fnv(i ^ seed_head, m) as usize % pages * MIX_NODES;
        for (n, node) in mix.iter_mut().enumerate() {
            node.fnv_mix(&lookup(p + n));
        }
    }

    let word = |k: usize| mix[k / NODE_WORDS].word(k % NODE_WORDS);
    let mut cmix = [0u8; 32];
    for (w, out) in cmix.chunks_exact_mut(WORD_BYTES).enumerate() {
        let k = w * 4;
        let r = fnv(fnv(fnv(word(k), word(k + 1)), word(k + 2)), word(k + 3));
        LittleEndian::write_u32(out, r);
    }
    let mix_hash = H256(cmix);

    Ok(PowOutput {
        mix_hash,
        result: final_hash(&seed, &mix_hash),
    })
}

/// hashimoto used by a light client. Only reads the cache, recomputing the
/// accessed dataset elements on the fly.
pub fn hashimoto_light(
    header_hash: H256,
    nonce: u64,
    full_size: usize,
    cache: &[u8],
) -> Result<PowOutput, Error> {
    check_cache(cache)?;
    hashimoto(header_hash, nonce, full_size, |i| dataset_item(cache, i))
}

/// hashimoto used by a full client. Reads the whole dataset from memory.
pub fn hashimoto_full(
    header_hash: H256,
    nonce: u64,
    dataset: &[u8],
) -> Result<PowOutput, Error> {
    hashimoto(header_hash, nonce, dataset.len(), |i| Node::load(dataset, i))
}
