use std::fmt;
use std::str::FromStr;

use masked_pool_lib::DepositRecord;
use thiserror::Error;

use crate::error::OwnershipError;

/// Which owned deposit to withdraw when the secret opens several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Lowest owned leaf index.
    #[default]
    First,
    /// Highest owned leaf index.
    Last,
    /// Largest value, lowest index on ties.
    Largest,
    /// The k-th owned deposit in ascending index order, zero based.
    Nth(usize),
    /// A specific leaf index, which must be owned.
    Index(u64),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown selection policy {0:?}; expected first, last, largest, nth:<k> or index:<i>")]
pub struct ParsePolicyError(pub String);

impl SelectionPolicy {
    /// Pick one leaf index from `owned` (ascending, as returned by the scanner).
    pub fn select(&self, owned: &[u64], history: &[DepositRecord]) -> Result<u64, OwnershipError> {
        if owned.is_empty() {
            return Err(OwnershipError::NoneOwned {
                scanned: history.len(),
            });
        }
        match *self {
            SelectionPolicy::First => Ok(owned[0]),
            SelectionPolicy::Last => Ok(owned[owned.len() - 1]),
            SelectionPolicy::Largest => {
                let value = |index: u64| history.get(index as usize).map_or(0, |r| r.value);
                let mut best = owned[0];
                for &index in &owned[1..] {
                    if value(index) > value(best) {
                        best = index;
                    }
                }
                Ok(best)
            }
            SelectionPolicy::Nth(k) => owned
                .get(k)
                .copied()
                .ok_or(OwnershipError::NotEnoughOwned {
                    requested: k,
                    owned: owned.len(),
                }),
            SelectionPolicy::Index(index) => {
                if owned.binary_search(&index).is_ok() {
                    Ok(index)
                } else {
                    Err(OwnershipError::NotOwned { index })
                }
            }
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePolicyError(s.to_string());
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "first" => return Ok(SelectionPolicy::First),
            "last" => return Ok(SelectionPolicy::Last),
            "largest" => return Ok(SelectionPolicy::Largest),
            _ => {}
        }
        match lower.split_once(':') {
            Some(("nth", k)) => k.parse().map(SelectionPolicy::Nth).map_err(|_| err()),
            Some(("index", i)) => i.parse().map(SelectionPolicy::Index).map_err(|_| err()),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionPolicy::First => write!(f, "first"),
            SelectionPolicy::Last => write!(f, "last"),
            SelectionPolicy::Largest => write!(f, "largest"),
            SelectionPolicy::Nth(k) => write!(f, "nth:{k}"),
            SelectionPolicy::Index(i) => write!(f, "index:{i}"),
        }
    }
}
