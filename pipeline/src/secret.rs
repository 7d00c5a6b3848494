use std::fmt;
use std::str::FromStr;

use k256::Scalar;
use masked_pool_lib::parse_secret;
use thiserror::Error;

/// The withdrawal secret `s`. Never printed: `Debug` is redacted and there is
/// no `Display`.
#[derive(Clone)]
pub struct WithdrawSecret {
    bytes: [u8; 32],
    scalar: Scalar,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret is not valid hex")]
    Hex,
    #[error("secret must be 32 bytes, got {0}")]
    Length(usize),
    #[error("secret is zero or not below the secp256k1 group order")]
    OutOfRange,
}

impl WithdrawSecret {
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SecretError> {
        let scalar = parse_secret(&bytes).ok_or(SecretError::OutOfRange)?;
        Ok(Self { bytes, scalar })
    }

    pub fn scalar(&self) -> &Scalar {
        &self.scalar
    }

    /// Big-endian bytes, for the proving witness only.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }
}

impl FromStr for WithdrawSecret {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let decoded = hex::decode(s).map_err(|_| SecretError::Hex)?;
        let bytes: [u8; 32] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| SecretError::Length(decoded.len()))?;
        Self::from_bytes(bytes)
    }
}

impl fmt::Debug for WithdrawSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WithdrawSecret(<redacted>)")
    }
}
