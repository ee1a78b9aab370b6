//! Structural hashing for expression identity.
//!
//! The hash decides the canonical operand order of sums and products, so it
//! must be a pure function of the tree: no random seeds, no pointer values,
//! no symbol ids. FNV-1a over a tagged byte stream gives that.

/// Running structural hash of one expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeHash(u64);

impl NodeHash {
    /// Start a node of the given kind.
    pub(crate) fn tagged(tag: &str) -> Self {
        Self(0xcbf2_9ce4_8422_2325).bytes(tag.as_bytes())
    }

    pub(crate) fn bytes(self, bytes: &[u8]) -> Self {
        Self(
            bytes
                .iter()
                .fold(self.0, |h, &b| (h ^ u64::from(b)).wrapping_mul(0x100_0000_01b3)),
        )
    }

    pub(crate) fn word(self, value: u64) -> Self {
        self.bytes(&value.to_le_bytes())
    }

    /// Fold in the hashes of child nodes, in order.
    pub(crate) fn children(self, hashes: impl IntoIterator<Item = u64>) -> Self {
        hashes.into_iter().fold(self, |h, child| h.word(child))
    }

    pub(crate) fn finish(self) -> u64 {
        self.0
    }
}
