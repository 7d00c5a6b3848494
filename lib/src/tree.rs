use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::{hash_children, Hash};

/// Deepest tree the accumulator accepts.
pub const MAX_DEPTH: usize = 64;
/// Widest node the accumulator accepts.
pub const MAX_ARITY: usize = 16;

// =============================================================================
//                          TREE PARAMETERS
// =============================================================================

/// Shape of the deposit tree. Must agree with the pool contract's published
/// parameters, otherwise local roots diverge from the on-chain root.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeConfig {
    depth: usize,
    arity: usize,
    zero_leaf: Hash,
}

impl TreeConfig {
    pub fn new(depth: usize, arity: usize, zero_leaf: Hash) -> Result<Self, TreeError> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(TreeError::InvalidDepth(depth));
        }
        if !(2..=MAX_ARITY).contains(&arity) {
            return Err(TreeError::InvalidArity(arity));
        }
        if (arity as u64).checked_pow(depth as u32).is_none() {
            return Err(TreeError::CapacityOverflow { depth, arity });
        }
        Ok(Self {
            depth,
            arity,
            zero_leaf,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn zero_leaf(&self) -> Hash {
        self.zero_leaf
    }

    /// Number of leaves the tree can hold: arity^depth.
    pub fn capacity(&self) -> u64 {
        (self.arity as u64).pow(self.depth as u32)
    }
}

/// Compute the empty-subtree hash for each height of the tree.
/// Matches the pool contract constructor:
///   zeros[0] = zero_leaf
///   zeros[i] = keccak256(abi.encodePacked(zeros[i-1] x arity))
/// zeros[depth] is the root of an empty tree.
pub fn compute_zeros(config: &TreeConfig) -> Vec<Hash> {
    let mut zeros = Vec::with_capacity(config.depth + 1);
    zeros.push(config.zero_leaf);
    let mut children = vec![config.zero_leaf; config.arity];
    for _ in 0..config.depth {
        let next = hash_children(&children);
        zeros.push(next);
        children.fill(next);
    }
    zeros
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeError {
    InvalidDepth(usize),
    InvalidArity(usize),
    CapacityOverflow { depth: usize, arity: usize },
    Full { capacity: u64 },
    IndexOutOfRange { index: u64, len: u64 },
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::InvalidDepth(depth) => {
                write!(f, "tree depth {depth} outside 1..={MAX_DEPTH}")
            }
            TreeError::InvalidArity(arity) => {
                write!(f, "tree arity {arity} outside 2..={MAX_ARITY}")
            }
            TreeError::CapacityOverflow { depth, arity } => {
                write!(f, "{arity}^{depth} leaves does not fit in u64")
            }
            TreeError::Full { capacity } => write!(f, "tree is full ({capacity} leaves)"),
            TreeError::IndexOutOfRange { index, len } => {
                write!(f, "leaf index {index} out of range (tree holds {len} leaves)")
            }
        }
    }
}

impl core::error::Error for TreeError {}

// =============================================================================
//                          INCLUSION PATHS
// =============================================================================

/// One level of an inclusion path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    /// Position of the current node among its parent's children (0 = leftmost).
    pub selector: u8,
    /// The other `arity - 1` children of the parent, left to right.
    pub siblings: Vec<Hash>,
}

impl PathStep {
    /// Arity implied by this step's shape.
    pub fn arity(&self) -> usize {
        self.siblings.len() + 1
    }

    /// Hash `current` with its siblings into the parent node.
    /// Returns `None` if the step is malformed.
    pub fn parent(&self, current: &Hash) -> Option<Hash> {
        let arity = self.arity();
        let selector = self.selector as usize;
        if arity < 2 || arity > MAX_ARITY || selector >= arity {
            return None;
        }
        let mut children = [[0u8; 32]; MAX_ARITY];
        let mut siblings = self.siblings.iter();
        for (slot, child) in children[..arity].iter_mut().enumerate() {
            *child = if slot == selector {
                *current
            } else {
                *siblings.next()?
            };
        }
        Some(hash_children(&children[..arity]))
    }
}

/// Sibling hashes and branch selectors from a leaf up to the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionPath {
    pub leaf_index: u64,
    pub steps: Vec<PathStep>,
}

impl InclusionPath {
    pub fn selectors(&self) -> impl Iterator<Item = u8> + '_ {
        self.steps.iter().map(|step| step.selector)
    }

    /// Recompute the root from `leaf`, or `None` if any step is malformed.
    pub fn compute_root(&self, leaf: Hash) -> Option<Hash> {
        compute_root(leaf, &self.steps)
    }
}

/// Fold `leaf` up through `steps`.
pub fn compute_root(leaf: Hash, steps: &[PathStep]) -> Option<Hash> {
    steps
        .iter()
        .try_fold(leaf, |current, step| step.parent(&current))
}

/// Verify an inclusion path against an expected root.
pub fn verify_inclusion(leaf: Hash, path: &InclusionPath, expected_root: Hash) -> bool {
    path.compute_root(leaf) == Some(expected_root)
}

// =============================================================================
//                          ACCUMULATOR
// =============================================================================

/// Append-only k-ary Merkle tree mirroring the pool contract.
///
/// Only nodes covering inserted leaves are materialised; every other position
/// reads as the empty-subtree hash for its height, so paths and roots are
/// well defined for any prefix length without building 2^depth leaves.
#[derive(Clone, Debug)]
pub struct Accumulator {
    config: TreeConfig,
    zeros: Vec<Hash>,
    /// layers[0] are the leaves, layers[depth] holds at most the root.
    layers: Vec<Vec<Hash>>,
}

impl Accumulator {
    pub fn new(config: TreeConfig) -> Self {
        Accumulator {
            zeros: compute_zeros(&config),
            layers: vec![Vec::new(); config.depth + 1],
            config,
        }
    }

    /// Build a tree by replaying `leaves` in order.
    pub fn from_leaves(config: TreeConfig, leaves: &[Hash]) -> Result<Self, TreeError> {
        let mut tree = Self::new(config);
        for leaf in leaves {
            tree.insert(*leaf)?;
        }
        Ok(tree)
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn zeros(&self) -> &[Hash] {
        &self.zeros
    }

    pub fn leaves(&self) -> &[Hash] {
        &self.layers[0]
    }

    pub fn leaf(&self, index: u64) -> Option<Hash> {
        self.layers[0].get(usize::try_from(index).ok()?).copied()
    }

    pub fn len(&self) -> u64 {
        self.layers[0].len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    /// Append a leaf. Returns the leaf index.
    pub fn insert(&mut self, leaf: Hash) -> Result<u64, TreeError> {
        let index = self.len();
        let capacity = self.config.capacity();
        if index >= capacity {
            return Err(TreeError::Full { capacity });
        }
        self.layers[0].push(leaf);

        let mut position = self.layers[0].len() - 1;
        for level in 0..self.config.depth {
            let parent = position / self.config.arity;
            let node = self.hash_node(level, parent);
            let upper = &mut self.layers[level + 1];
            if parent < upper.len() {
                upper[parent] = node;
            } else {
                upper.push(node);
            }
            position = parent;
        }

        Ok(index)
    }

    /// Current root. Equals zeros[depth] while the tree is empty.
    pub fn root(&self) -> Hash {
        self.node(self.config.depth, 0)
    }

    /// Inclusion path for a previously inserted leaf.
    pub fn gen_path(&self, index: u64) -> Result<InclusionPath, TreeError> {
        let len = self.len();
        if index >= len {
            return Err(TreeError::IndexOutOfRange { index, len });
        }

        let arity = self.config.arity;
        let mut position = index as usize;
        let mut steps = Vec::with_capacity(self.config.depth);
        for level in 0..self.config.depth {
            let first = position - position % arity;
            let siblings = (first..first + arity)
                .filter(|p| *p != position)
                .map(|p| self.node(level, p))
                .collect();
            steps.push(PathStep {
                selector: (position - first) as u8,
                siblings,
            });
            position /= arity;
        }

        Ok(InclusionPath {
            leaf_index: index,
            steps,
        })
    }

    fn node(&self, level: usize, position: usize) -> Hash {
        self.layers[level]
            .get(position)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    fn hash_node(&self, level: usize, parent: usize) -> Hash {
        let arity = self.config.arity;
        let mut children = [[0u8; 32]; MAX_ARITY];
        for (offset, child) in children[..arity].iter_mut().enumerate() {
            *child = self.node(level, parent * arity + offset);
        }
        hash_children(&children[..arity])
    }
}
