use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::elliptic_curve::PrimeField;
use k256::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};

use crate::{keccak256, u128_word, Hash};

// =============================================================================
//                          CURVE POINTS
// =============================================================================

/// A secp256k1 point in affine form, as the pool contract stores it:
/// two big-endian uint256 coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl CurvePoint {
    /// Decode to a curve point, or `None` if (x, y) is not on the curve.
    pub fn to_affine(&self) -> Option<AffinePoint> {
        let encoded = EncodedPoint::from_affine_coordinates(
            &FieldBytes::clone_from_slice(&self.x),
            &FieldBytes::clone_from_slice(&self.y),
            false,
        );
        Option::from(AffinePoint::from_encoded_point(&encoded))
    }

    /// Encode a curve point. The identity has no affine form and yields `None`.
    pub fn from_affine(point: &AffinePoint) -> Option<Self> {
        let encoded = point.to_encoded_point(false);
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(encoded.x()?);
        y.copy_from_slice(encoded.y()?);
        Some(CurvePoint { x, y })
    }

    pub fn is_on_curve(&self) -> bool {
        self.to_affine().is_some()
    }
}

// =============================================================================
//                          OWNERSHIP RELATION
// =============================================================================

/// Parse a big-endian withdrawal secret. Zero and values >= the group order
/// are rejected.
pub fn parse_secret(bytes: &[u8; 32]) -> Option<Scalar> {
    let scalar: Option<Scalar> = Scalar::from_repr(FieldBytes::clone_from_slice(bytes)).into();
    scalar.filter(|s| *s != Scalar::ZERO)
}

/// The ownership relation enforced by the withdraw program: Q == secret * P.
pub fn owns(secret: &Scalar, masked_p: &CurvePoint, masked_q: &CurvePoint) -> bool {
    match (masked_p.to_affine(), masked_q.to_affine()) {
        (Some(p), Some(q)) => (ProjectivePoint::from(p) * *secret).to_affine() == q,
        _ => false,
    }
}

/// Depositor side of the relation: P = blinding * G, Q = secret * P.
/// Returns `None` if either point would be the identity.
pub fn mask_for(secret: &Scalar, blinding: &Scalar) -> Option<(CurvePoint, CurvePoint)> {
    let p = ProjectivePoint::GENERATOR * *blinding;
    let q = p * *secret;
    Some((
        CurvePoint::from_affine(&p.to_affine())?,
        CurvePoint::from_affine(&q.to_affine())?,
    ))
}

// =============================================================================
//                          DEPOSIT RECORDS
// =============================================================================

/// A deposit as emitted by the pool contract's `Deposit` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub masked_p: CurvePoint,
    pub masked_q: CurvePoint,
    /// Deposited value in the smallest currency unit.
    pub value: u128,
}

impl DepositRecord {
    /// Compute the tree leaf for this deposit.
    ///
    /// leaf = keccak256(abi.encodePacked(uint256[2] p, uint256[2] q, uint256 value))
    /// Total preimage: 160 bytes.
    pub fn leaf_hash(&self) -> Hash {
        let mut preimage = [0u8; 160];
        preimage[0..32].copy_from_slice(&self.masked_p.x);
        preimage[32..64].copy_from_slice(&self.masked_p.y);
        preimage[64..96].copy_from_slice(&self.masked_q.x);
        preimage[96..128].copy_from_slice(&self.masked_q.y);
        preimage[128..160].copy_from_slice(&u128_word(self.value));
        keccak256(&preimage)
    }

    pub fn is_well_formed(&self) -> bool {
        self.masked_p.is_on_curve() && self.masked_q.is_on_curve()
    }

    pub fn is_owned_by(&self, secret: &Scalar) -> bool {
        owns(secret, &self.masked_p, &self.masked_q)
    }
}
