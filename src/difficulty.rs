use ethereum_types::{H256, U256};

use crate::{final_hash, hash_seed};

/// Recompute the result hash from a claimed mix digest, without touching the
/// cache or dataset.
///
/// For a `mix_hash` produced by [`hashimoto`](crate::hashimoto) this equals
/// the `result` it returned.
pub fn quick_hash(header_hash: &H256, nonce: u64, mix_hash: &H256) -> H256 {
    final_hash(&hash_seed(*header_hash, nonce), mix_hash)
}

/// Returns whether `hash <= boundary`, both read as big-endian 256-bit
/// integers.
pub fn check_difficulty(hash: &H256, boundary: &H256) -> bool {
    for (h, b) in hash.as_bytes().iter().zip(boundary.as_bytes()) {
        if h != b {
            return h < b;
        }
    }
    true
}

/// Difficulty pre-check for PoW verification.
pub fn quick_check_difficulty(
    header_hash: &H256,
    nonce: u64,
    mix_hash: &H256,
    boundary: &H256,
) -> bool {
    check_difficulty(&quick_hash(header_hash, nonce, mix_hash), boundary)
}

/// Boundary for a difficulty, `2^256 / difficulty`.
///
/// Difficulties 0 and 1 saturate to the all-ones boundary.
pub fn difficulty_to_boundary(difficulty: U256) -> H256 {
    if difficulty <= U256::one() {
        return H256::repeat_byte(0xff);
    }
    // 2^256 = MAX + 1, so the quotient gains one exactly when MAX % d == d - 1.
    let max = U256::max_value();
    let mut boundary = max / difficulty;
    if max % difficulty == difficulty - U256::one() {
        boundary = boundary + U256::one();
    }
    let mut out = [0u8; 32];
    boundary.to_big_endian(&mut out);
    H256(out)
}
