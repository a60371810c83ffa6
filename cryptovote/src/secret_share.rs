use crate::*;
use num_bigint::{BigInt, BigUint, RandBigInt};
use num_traits::Zero;
use rand::{CryptoRng, Rng};

/// Deal `secret` into `num_shares` Shamir shares, any `threshold` of which
/// determine it.
///
/// The dealing polynomial has degree `threshold - 1`, the secret as its
/// constant term and coefficients drawn uniformly from `[0, modulus)`. Share
/// `i` is the polynomial evaluated at `i`, for `i` in `1..=num_shares`.
pub fn split<R: Rng + CryptoRng>(
    rng: &mut R,
    secret: &BigUint,
    threshold: usize,
    num_shares: usize,
    modulus: &BigUint,
) -> Result<Vec<(usize, BigUint)>, Error> {
    if threshold == 0 || threshold > num_shares {
        return Err(Error::ParameterError(format!(
            "cannot deal {} shares with threshold {}",
            num_shares, threshold
        )));
    }
    if secret >= modulus {
        return Err(Error::DomainError(
            "secret must be reduced mod the sharing modulus".to_string(),
        ));
    }

    let mut coefficients = Vec::with_capacity(threshold);
    coefficients.push(secret.clone());
    for _ in 1..threshold {
        coefficients.push(rng.gen_biguint_below(modulus));
    }

    let shares = (1..=num_shares)
        .map(|index| {
            // Horner evaluation at x = index
            let x = BigUint::from(index);
            let value = coefficients
                .iter()
                .rev()
                .fold(BigUint::zero(), |acc, coefficient| {
                    (acc * &x + coefficient) % modulus
                });
            (index, value)
        })
        .collect();

    Ok(shares)
}

/// The integer Lagrange coefficient `delta * prod_{j != i} j / (j - i)` for
/// interpolating at zero from the share indices in `indices`.
///
/// `delta` must be a multiple of every denominator, which `num_shares!`
/// guarantees for indices drawn from `1..=num_shares`.
pub fn lagrange_coefficient(delta: &BigUint, index: usize, indices: &[usize]) -> BigInt {
    let mut numerator = BigInt::from(delta.clone());
    let mut denominator = BigInt::from(1);

    for &other in indices.iter().filter(|&&other| other != index) {
        numerator *= other as i64;
        denominator *= other as i64 - index as i64;
    }

    numerator / denominator
}
