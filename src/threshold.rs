//! Threshold signature manager (C10): t-of-n Shamir secret sharing with
//! Lagrange-interpolation-at-zero combination, modeled on a simplified
//! BLS/Schnorr threshold scheme over a large prime field. Production
//! curve arithmetic is out of scope; this is the
//! illustrative scheme the core's tests and mock chains rely on.

use crate::error::{Result, TrustWrapperError};
use crate::types::{KeyShare, PartialSignature, ThresholdScheme, ThresholdSignature};
use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// The secp256k1 field prime, used the same way the illustrative Python
/// scheme used it: as a convenient large prime modulus, not as an actual
/// elliptic-curve operation.
fn modulus() -> BigUint {
    let two = BigUint::from(2u32);
    two.pow(256) - two.pow(32) - BigUint::from(977u32)
}

fn hash_message(message: &[u8]) -> BigUint {
    let mut hasher = Sha256::new();
    hasher.update(message);
    let digest = hasher.finalize();
    BigUint::from_bytes_be(&digest)
}

fn eval_polynomial(coeffs: &[BigUint], x: &BigUint, modulus: &BigUint) -> BigUint {
    let mut result = BigUint::zero();
    let mut power = BigUint::one();
    for coeff in coeffs {
        result = (result + coeff * &power) % modulus;
        power = (power * x) % modulus;
    }
    result
}

fn mod_inverse(value: &BigInt, modulus: &BigInt) -> Option<BigInt> {
    // Fermat's little theorem: value^(modulus-2) mod modulus, since
    // modulus is prime.
    let exponent = modulus - BigInt::from(2);
    Some(value.modpow(&exponent, modulus))
}

/// Lagrange interpolation of the polynomial's value at x=0 from a set of
/// `(x, y)` points, performed modulo the field prime.
fn lagrange_interpolate_at_zero(points: &[(u32, BigUint)], modulus: &BigUint) -> BigUint {
    let m = BigInt::from_biguint(Sign::Plus, modulus.clone());
    let mut secret = BigInt::zero();

    for (i, (xi, yi)) in points.iter().enumerate() {
        let mut numerator = BigInt::one();
        let mut denominator = BigInt::one();
        for (j, (xj, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            numerator = (numerator * BigInt::from(-(*xj as i64))).rem_euclid(&m);
            denominator = (denominator * (BigInt::from(*xi as i64) - BigInt::from(*xj as i64))).rem_euclid(&m);
        }
        let inv_denominator = mod_inverse(&denominator, &m).expect("field prime is prime, inverse always exists");
        let lagrange_coeff = (numerator * inv_denominator).rem_euclid(&m);
        let yi_signed = BigInt::from_biguint(Sign::Plus, yi.clone());
        secret = (secret + yi_signed * lagrange_coeff).rem_euclid(&m);
    }

    secret.to_biguint().unwrap_or_else(BigUint::zero)
}

struct ThresholdGroup {
    threshold: u32,
    total: u32,
    scheme: ThresholdScheme,
    shares: HashMap<u32, BigUint>,
    public_commitments: Vec<BigUint>,
}

/// Owns key-share groups (read-only for signers once set up) and the
/// bookkeeping of partial signatures submitted per `(group_id, message)`.
pub struct ThresholdSignatureManager {
    groups: RwLock<HashMap<String, ThresholdGroup>>,
}

impl ThresholdSignatureManager {
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// `setup(group_id, t, n, scheme) -> [KeyShare]`: samples a random
    /// degree-(t-1) polynomial, evaluates it at points 1..=n, and publishes
    /// per-coefficient commitments alongside the shares.
    pub async fn setup(
        &self,
        group_id: impl Into<String>,
        threshold: u32,
        total: u32,
        scheme: ThresholdScheme,
    ) -> Result<Vec<KeyShare>> {
        if threshold == 0 || threshold > total {
            return Err(TrustWrapperError::ThresholdSignatureIncomplete {
                got: 0,
                need: threshold as usize,
            });
        }
        let modulus = modulus();
        let mut rng = OsRng;
        let coeffs: Vec<BigUint> = (0..threshold)
            .map(|_| rng.gen_biguint_below(&modulus))
            .collect();

        let mut shares = HashMap::new();
        let mut key_shares = Vec::with_capacity(total as usize);
        for id in 1..=total {
            let x = BigUint::from(id);
            let y = eval_polynomial(&coeffs, &x, &modulus);
            shares.insert(id, y.clone());
            key_shares.push(KeyShare {
                share_id: id,
                share_value: y.to_bytes_be(),
                public_commitment: coeffs[0].to_bytes_be(),
                threshold,
                total,
            });
        }

        let public_commitments = coeffs.clone();
        self.groups.write().await.insert(
            group_id.into(),
            ThresholdGroup {
                threshold,
                total,
                scheme,
                shares,
                public_commitments,
            },
        );

        Ok(key_shares)
    }

    /// `partial_sign(group_id, message, signer_id, scheme) -> PartialSignature`.
    /// Signature share = `(hash(message) * share_value) mod p`, matching
    /// the simplified scheme's multiplicative construction.
    pub async fn partial_sign(
        &self,
        group_id: &str,
        message: &[u8],
        signer_id: u32,
    ) -> Result<PartialSignature> {
        let groups = self.groups.read().await;
        let group = groups
            .get(group_id)
            .ok_or_else(|| TrustWrapperError::ThresholdSignatureIncomplete { got: 0, need: 1 })?;

        if signer_id == 0 || signer_id > group.total {
            return Err(TrustWrapperError::ThresholdSignatureIncomplete {
                got: 0,
                need: group.threshold as usize,
            });
        }
        let share_value = group
            .shares
            .get(&signer_id)
            .ok_or_else(|| TrustWrapperError::ThresholdSignatureIncomplete { got: 0, need: group.threshold as usize })?;

        let modulus = modulus();
        let message_hash = hash_message(message);
        let share = (message_hash.clone() * share_value) % &modulus;

        Ok(PartialSignature {
            signer_id,
            share_value: share.to_bytes_be(),
            message_hash: message_hash.to_bytes_be(),
            scheme: group.scheme,
        })
    }

    /// `try_combine(group_id, message_hash, scheme) -> ThresholdSignature?`.
    /// Combines by Lagrange interpolation at 0; fails unless
    /// at least `threshold` *distinct* signers (rejecting any id outside
    /// `[1,n]`) are present.
    pub async fn try_combine(
        &self,
        group_id: &str,
        message: &[u8],
        partials: &[PartialSignature],
    ) -> Result<ThresholdSignature> {
        let groups = self.groups.read().await;
        let group = groups
            .get(group_id)
            .ok_or_else(|| TrustWrapperError::ThresholdSignatureIncomplete { got: 0, need: 1 })?;

        let modulus = modulus();
        let message_hash = hash_message(message);

        let mut seen = std::collections::HashSet::new();
        let mut points = Vec::new();
        for partial in partials {
            if partial.signer_id == 0 || partial.signer_id > group.total {
                continue; // (d) signers outside [1,n] are rejected
            }
            if partial.message_hash != message_hash.to_bytes_be() {
                continue;
            }
            if !seen.insert(partial.signer_id) {
                continue; // distinct signers only
            }
            points.push((partial.signer_id, BigUint::from_bytes_be(&partial.share_value)));
        }

        if points.len() < group.threshold as usize {
            return Err(TrustWrapperError::ThresholdSignatureIncomplete {
                got: points.len(),
                need: group.threshold as usize,
            });
        }

        // (c) signers set equals exactly the t partials used.
        points.truncate(group.threshold as usize);
        let mut signers: Vec<u32> = points.iter().map(|(id, _)| *id).collect();
        signers.sort_unstable();

        let combined = lagrange_interpolate_at_zero(&points, &modulus);

        Ok(ThresholdSignature {
            signature: combined.to_bytes_be(),
            signers,
            threshold: group.threshold,
            message_hash: message_hash.to_bytes_be(),
            scheme: group.scheme,
        })
    }

    /// Whether `group_id` has already run through `setup`.
    pub async fn group_exists(&self, group_id: &str) -> bool {
        self.groups.read().await.contains_key(group_id)
    }

    /// `verify(signature, message, group_public) -> bool`. The simplified
    /// scheme verifies by checking the signature was produced for the
    /// stated message hash and by the stated number of signers; a real
    /// BLS/Schnorr backend would instead check a pairing/Schnorr identity
    /// against the group's public key.
    pub async fn verify(&self, group_id: &str, signature: &ThresholdSignature, message: &[u8]) -> bool {
        let groups = self.groups.read().await;
        let Some(group) = groups.get(group_id) else {
            return false;
        };
        let message_hash = hash_message(message);
        use subtle::ConstantTimeEq;
        let matches_hash = message_hash.to_bytes_be().ct_eq(&signature.message_hash).into();
        matches_hash
            && signature.signers.len() == group.threshold as usize
            && signature.signers.iter().all(|id| *id >= 1 && *id <= group.total)
    }
}

impl Default for ThresholdSignatureManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn threshold_combine_succeeds_at_exactly_t_partials() {
        let manager = ThresholdSignatureManager::new();
        let shares = manager.setup("group-1", 3, 5, ThresholdScheme::Schnorr).await.unwrap();
        assert_eq!(shares.len(), 5);

        let message = b"finalize verdict";
        let mut partials = Vec::new();
        for id in [1, 2, 3] {
            partials.push(manager.partial_sign("group-1", message, id).await.unwrap());
        }

        let signature = manager.try_combine("group-1", message, &partials).await.unwrap();
        assert_eq!(signature.signers.len(), 3);
        assert!(manager.verify("group-1", &signature, message).await);
    }

    #[tokio::test]
    async fn fewer_than_threshold_partials_fails() {
        let manager = ThresholdSignatureManager::new();
        manager.setup("group-2", 3, 5, ThresholdScheme::Bls).await.unwrap();
        let message = b"finalize verdict";
        let p1 = manager.partial_sign("group-2", message, 1).await.unwrap();
        let p2 = manager.partial_sign("group-2", message, 2).await.unwrap();
        let result = manager.try_combine("group-2", message, &[p1, p2]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn out_of_range_signer_is_rejected() {
        let manager = ThresholdSignatureManager::new();
        manager.setup("group-3", 2, 3, ThresholdScheme::Schnorr).await.unwrap();
        let message = b"m";
        let p1 = manager.partial_sign("group-3", message, 1).await.unwrap();
        let bogus = PartialSignature {
            signer_id: 99,
            share_value: vec![1, 2, 3],
            message_hash: p1.message_hash.clone(),
            scheme: ThresholdScheme::Schnorr,
        };
        let result = manager.try_combine("group-3", message, &[p1, bogus]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn t_equals_n_requires_all_signers() {
        let manager = ThresholdSignatureManager::new();
        manager.setup("group-4", 3, 3, ThresholdScheme::Bls).await.unwrap();
        let message = b"m";
        let partials: Vec<_> = futures::future::join_all(
            [1, 2, 3].map(|id| manager.partial_sign("group-4", message, id)),
        )
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
        let signature = manager.try_combine("group-4", message, &partials).await.unwrap();
        assert_eq!(signature.signers, vec![1, 2, 3]);
    }
}
