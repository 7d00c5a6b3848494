use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::{
    compute_root, parse_secret, u128_word, word_to_u128, CurvePoint, DepositRecord, Hash,
    PathStep, TreeConfig,
};

/// Layout version of [`WithdrawWitness`]. Bump whenever a field changes.
pub const WITNESS_VERSION: u16 = 1;

/// Number of uint256 words the withdraw program commits.
pub const PUBLIC_SIGNAL_COUNT: usize = 7;

/// Size of the committed public values in bytes.
pub const PUBLIC_SIGNALS_LEN: usize = PUBLIC_SIGNAL_COUNT * 32;

// =============================================================================
//                          WITHDRAW WITNESS
// =============================================================================

/// Private inputs for the withdraw program.
#[derive(Clone, Serialize, Deserialize)]
pub struct WithdrawWitness {
    pub version: u16,
    /// Claimed deposit value
    pub value: u128,
    /// Tree root the path must reproduce
    pub root: Hash,
    /// Index of the deposit being withdrawn
    pub leaf_index: u64,
    pub masked_p: CurvePoint,
    pub masked_q: CurvePoint,
    /// Big-endian withdrawal secret scalar
    pub secret: [u8; 32],
    /// Leaf-to-root path, one step per level
    pub path: Vec<PathStep>,
}

impl fmt::Debug for WithdrawWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithdrawWitness")
            .field("version", &self.version)
            .field("value", &self.value)
            .field("leaf_index", &self.leaf_index)
            .field("path_len", &self.path.len())
            .field("secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl WithdrawWitness {
    pub fn record(&self) -> DepositRecord {
        DepositRecord {
            masked_p: self.masked_p,
            masked_q: self.masked_q,
            value: self.value,
        }
    }

    /// Check the witness shape against the tree it claims to open, before any
    /// proving work is spent on it.
    pub fn validate(&self, config: &TreeConfig) -> Result<(), WitnessError> {
        if self.version != WITNESS_VERSION {
            return Err(WitnessError::UnsupportedVersion(self.version));
        }
        if self.path.len() != config.depth() {
            return Err(WitnessError::PathLength {
                expected: config.depth(),
                actual: self.path.len(),
            });
        }
        if self.leaf_index >= config.capacity() {
            return Err(WitnessError::IndexOutOfRange(self.leaf_index));
        }
        for (level, step) in self.path.iter().enumerate() {
            if step.arity() != config.arity() {
                return Err(WitnessError::StepShape { level });
            }
        }
        check_selectors(self.leaf_index, &self.path)?;
        if parse_secret(&self.secret).is_none() {
            return Err(WitnessError::InvalidSecret);
        }
        if !self.record().is_well_formed() {
            return Err(WitnessError::MalformedPoint);
        }
        Ok(())
    }
}

/// The selectors must spell out `leaf_index` in base-arity, least
/// significant digit first, so the public index is bound to the path.
fn check_selectors(leaf_index: u64, path: &[PathStep]) -> Result<(), WitnessError> {
    let arity = match path.first() {
        Some(step) => step.arity(),
        None => return Err(WitnessError::PathLength { expected: 1, actual: 0 }),
    };
    let mut remaining = leaf_index;
    for (level, step) in path.iter().enumerate() {
        if step.arity() != arity || arity < 2 {
            return Err(WitnessError::StepShape { level });
        }
        if u64::from(step.selector) != remaining % arity as u64 {
            return Err(WitnessError::SelectorMismatch { level });
        }
        remaining /= arity as u64;
    }
    if remaining != 0 {
        return Err(WitnessError::IndexOutOfRange(leaf_index));
    }
    Ok(())
}

/// Withdraw constraints. The guest program runs exactly this, against the
/// tree shape it was built for:
/// - the witness passes [`WithdrawWitness::validate`] for `config`, so the
///   path is exactly `config.depth()` steps of `config.arity()` children
/// - Q == secret * P
/// - leaf(P, Q, value) folds up the path to the public root
///
/// On success returns the public signals to commit.
pub fn evaluate_withdraw(
    witness: &WithdrawWitness,
    config: &TreeConfig,
) -> Result<PublicSignals, WitnessError> {
    witness.validate(config)?;
    let secret = parse_secret(&witness.secret).ok_or(WitnessError::InvalidSecret)?;

    let record = witness.record();
    if !record.is_owned_by(&secret) {
        return Err(WitnessError::NotOwner);
    }

    match compute_root(record.leaf_hash(), &witness.path) {
        Some(root) if root == witness.root => {}
        _ => return Err(WitnessError::RootMismatch),
    }

    Ok(PublicSignals {
        root: witness.root,
        leaf_index: witness.leaf_index,
        value: witness.value,
        masked_p: witness.masked_p,
        masked_q: witness.masked_q,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WitnessError {
    UnsupportedVersion(u16),
    PathLength { expected: usize, actual: usize },
    StepShape { level: usize },
    SelectorMismatch { level: usize },
    IndexOutOfRange(u64),
    InvalidSecret,
    MalformedPoint,
    NotOwner,
    RootMismatch,
}

impl fmt::Display for WitnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WitnessError::UnsupportedVersion(v) => {
                write!(f, "witness version {v}, expected {WITNESS_VERSION}")
            }
            WitnessError::PathLength { expected, actual } => {
                write!(f, "path has {actual} steps, expected {expected}")
            }
            WitnessError::StepShape { level } => write!(f, "malformed path step at level {level}"),
            WitnessError::SelectorMismatch { level } => {
                write!(f, "path selector at level {level} does not match leaf index")
            }
            WitnessError::IndexOutOfRange(index) => {
                write!(f, "leaf index {index} exceeds tree capacity")
            }
            WitnessError::InvalidSecret => write!(f, "secret is not a valid non-zero scalar"),
            WitnessError::MalformedPoint => write!(f, "masked point is not on the curve"),
            WitnessError::NotOwner => write!(f, "secret does not open the masked points"),
            WitnessError::RootMismatch => write!(f, "path does not reproduce the root"),
        }
    }
}

impl core::error::Error for WitnessError {}

// =============================================================================
//                          PUBLIC SIGNALS
// =============================================================================

/// Public outputs of the withdraw program, committed as
///   [root, leafIndex, value, P.x, P.y, Q.x, Q.y]
/// each a big-endian uint256 word (224 bytes). The pool contract rebuilds the
/// committed bytes from the same `uint256[7]` it receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignals {
    pub root: Hash,
    pub leaf_index: u64,
    pub value: u128,
    pub masked_p: CurvePoint,
    pub masked_q: CurvePoint,
}

impl PublicSignals {
    pub fn words(&self) -> [Hash; PUBLIC_SIGNAL_COUNT] {
        [
            self.root,
            u128_word(u128::from(self.leaf_index)),
            u128_word(self.value),
            self.masked_p.x,
            self.masked_p.y,
            self.masked_q.x,
            self.masked_q.y,
        ]
    }

    pub fn encode(&self) -> [u8; PUBLIC_SIGNALS_LEN] {
        let mut out = [0u8; PUBLIC_SIGNALS_LEN];
        for (chunk, word) in out.chunks_exact_mut(32).zip(self.words()) {
            chunk.copy_from_slice(&word);
        }
        out
    }

    pub fn from_words(words: &[Hash; PUBLIC_SIGNAL_COUNT]) -> Result<Self, SignalsError> {
        let leaf_index = word_to_u128(&words[1])
            .and_then(|i| u64::try_from(i).ok())
            .ok_or(SignalsError::WordOverflow { slot: 1 })?;
        let value = word_to_u128(&words[2]).ok_or(SignalsError::WordOverflow { slot: 2 })?;
        Ok(PublicSignals {
            root: words[0],
            leaf_index,
            value,
            masked_p: CurvePoint {
                x: words[3],
                y: words[4],
            },
            masked_q: CurvePoint {
                x: words[5],
                y: words[6],
            },
        })
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SignalsError> {
        if bytes.len() != PUBLIC_SIGNALS_LEN {
            return Err(SignalsError::Length(bytes.len()));
        }
        let mut words = [[0u8; 32]; PUBLIC_SIGNAL_COUNT];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(32)) {
            word.copy_from_slice(chunk);
        }
        Self::from_words(&words)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignalsError {
    Length(usize),
    WordOverflow { slot: usize },
}

impl fmt::Display for SignalsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalsError::Length(len) => {
                write!(f, "public values are {len} bytes, expected {PUBLIC_SIGNALS_LEN}")
            }
            SignalsError::WordOverflow { slot } => write!(f, "public signal {slot} out of range"),
        }
    }
}

impl core::error::Error for SignalsError {}
