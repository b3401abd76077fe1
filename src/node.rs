use byteorder::{ByteOrder, LittleEndian};

use crate::{fnv, keccak_512, NODE_BYTES, NODE_WORDS};

/// A 64-byte unit of cache or dataset memory.
///
/// Words are held in native form and converted to and from the little-endian
/// byte layout used by the cache and dataset buffers on every load/store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Node([u32; NODE_WORDS]);

impl Node {
    pub fn from_words(words: [u32; NODE_WORDS]) -> Self { Self(words) }

    /// Loads a node from the first `NODE_BYTES` of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut words = [0u32; NODE_WORDS];
        LittleEndian::read_u32_into(&bytes[..NODE_BYTES], &mut words);
        Self(words)
    }

    /// Loads node `index` out of a buffer of concatenated nodes.
    pub fn load(buf: &[u8], index: usize) -> Self {
        Self::from_bytes(&buf[index * NODE_BYTES..(index + 1) * NODE_BYTES])
    }

    pub fn store(&self, buf: &mut [u8], index: usize) {
        self.write_to(&mut buf[index * NODE_BYTES..(index + 1) * NODE_BYTES]);
    }

    pub fn write_to(&self, out: &mut [u8]) {
        LittleEndian::write_u32_into(&self.0, &mut out[..NODE_BYTES]);
    }

    pub fn to_bytes(&self) -> [u8; NODE_BYTES] {
        let mut out = [0u8; NODE_BYTES];
        self.write_to(&mut out);
        out
    }

    pub fn words(&self) -> &[u32; NODE_WORDS] { &self.0 }

    pub fn word(&self, i: usize) -> u32 { self.0[i] }

    pub fn set_word(&mut self, i: usize, value: u32) { self.0[i] = value; }

    /// 64-bit view: word pair `2i, 2i + 1`, low word first.
    pub fn double_word(&self, i: usize) -> u64 {
        self.0[2 * i] as u64 | (self.0[2 * i + 1] as u64) << 32
    }

    pub fn xor_assign(&mut self, other: &Node) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a ^= *b;
        }
    }

    /// Word-wise FNV combine of `other` into `self`.
    pub fn fnv_mix(&mut self, other: &Node) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a = fnv(*a, *b);
        }
    }

    /// Keccak-512 of the node's byte layout, as a node.
    pub fn keccak_512(&self) -> Node {
        Node::from_bytes(&keccak_512(&self.to_bytes()))
    }
}

impl From<[u8; NODE_BYTES]> for Node {
    fn from(b: [u8; NODE_BYTES]) -> Self { Self::from_bytes(&b) }
}

impl From<Node> for [u8; NODE_BYTES] {
    fn from(node: Node) -> Self { node.to_bytes() }
}
