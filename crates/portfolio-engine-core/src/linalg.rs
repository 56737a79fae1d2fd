//! Small dense vector/matrix helpers over `Decimal`.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

/// Dot product.
pub fn vec_dot(a: &[Decimal], b: &[Decimal]) -> Decimal {
    a.iter().zip(b.iter()).map(|(x, y)| *x * *y).sum()
}

/// Matrix-vector multiplication.
pub fn mat_vec_multiply(mat: &[Vec<Decimal>], v: &[Decimal]) -> Vec<Decimal> {
    mat.iter().map(|row| vec_dot(row, v)).collect()
}

/// Quadratic form w' * M * w.
pub fn quad_form(w: &[Decimal], mat: &[Vec<Decimal>]) -> Decimal {
    vec_dot(w, &mat_vec_multiply(mat, w))
}

/// Square root, zero for non-positive input.
pub fn sqrt_decimal(val: Decimal) -> Decimal {
    if val <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    val.sqrt().unwrap_or(Decimal::ZERO)
}

/// Equal weights for n assets, summing exactly to one.
pub fn equal_weights(n: usize) -> Vec<Decimal> {
    if n == 0 {
        return Vec::new();
    }
    let w = Decimal::ONE / Decimal::from(n as i64);
    let mut weights = vec![w; n];
    let residue = Decimal::ONE - weights.iter().copied().sum::<Decimal>();
    weights[0] += residue;
    weights
}

/// Normalize weights to sum to 1.
pub fn normalize_weights(w: &mut [Decimal]) {
    let total: Decimal = w.iter().sum();
    if !total.is_zero() {
        for wi in w.iter_mut() {
            *wi /= total;
        }
    }
}

/// Euclidean projection onto the probability simplex {w >= 0, sum(w) = 1}.
///
/// Sort-and-threshold: find the largest k such that the k biggest entries all
/// stay positive after subtracting the common shift theta.
pub fn project_onto_simplex(v: &[Decimal]) -> Vec<Decimal> {
    let n = v.len();
    if n == 0 {
        return Vec::new();
    }

    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.cmp(a));

    let mut cumsum = Decimal::ZERO;
    let mut theta = Decimal::ZERO;
    for (j, u) in sorted.iter().enumerate() {
        cumsum += *u;
        let k = Decimal::from((j + 1) as i64);
        let candidate = (cumsum - Decimal::ONE) / k;
        if *u - candidate > Decimal::ZERO {
            theta = candidate;
        }
    }

    v.iter()
        .map(|vi| {
            let p = *vi - theta;
            if p > Decimal::ZERO {
                p
            } else {
                Decimal::ZERO
            }
        })
        .collect()
}

/// Largest absolute element-wise difference.
pub fn max_abs_diff(a: &[Decimal], b: &[Decimal]) -> Decimal {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x - *y).abs())
        .fold(Decimal::ZERO, |acc, d| if d > acc { d } else { acc })
}
