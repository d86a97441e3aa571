//! Per-request record of peers already attempted.

const WORD_BITS: usize = usize::BITS as usize;

/// Fixed-capacity bitset over peer indices.
///
/// Groups small enough to fit one machine word (the common case) stay
/// inline; larger groups spill to a heap-allocated word array.
#[derive(Debug, Clone)]
pub struct TriedSet {
    repr: Repr,
}

#[derive(Debug, Clone)]
enum Repr {
    Inline(usize),
    Spilled(Box<[usize]>),
}

impl TriedSet {
    pub fn new(capacity: usize) -> Self {
        let repr = if capacity <= WORD_BITS {
            Repr::Inline(0)
        } else {
            let words = capacity.div_ceil(WORD_BITS);
            Repr::Spilled(vec![0; words].into_boxed_slice())
        };
        Self { repr }
    }

    pub fn insert(&mut self, index: usize) {
        match &mut self.repr {
            Repr::Inline(word) => *word |= 1 << index,
            Repr::Spilled(words) => words[index / WORD_BITS] |= 1 << (index % WORD_BITS),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        match &self.repr {
            Repr::Inline(word) => word & (1 << index) != 0,
            Repr::Spilled(words) => words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0,
        }
    }
}
