use crate::error::GeometryError;

/// Compute the Moore-Penrose pseudo-inverse of a dense matrix.
///
/// The matrix is decomposed with a singular value decomposition `A = U S V^T` and
/// the pseudo-inverse is `V S^+ U^T`, where singular values below
/// `eps * max(rows, cols) * s_max` are treated as zero.
///
/// # Arguments
///
/// * `m` - The row-major input matrix with `R` rows and `C` columns.
///
/// # Returns
///
/// The row-major `C x R` pseudo-inverse.
///
/// # Example
///
/// ```
/// use manydepth_geometry::linalg::pseudo_inverse;
///
/// let m = [[2.0, 0.0], [0.0, 0.0]];
/// let pinv = pseudo_inverse(&m).unwrap();
///
/// assert!((pinv[0][0] - 0.5).abs() < 1e-12);
/// assert_eq!(pinv[1][1], 0.0);
/// ```
pub fn pseudo_inverse<const R: usize, const C: usize>(
    m: &[[f64; C]; R],
) -> Result<[[f64; R]; C], GeometryError> {
    if m.iter().flatten().any(|v| !v.is_finite()) {
        return Err(GeometryError::NonFiniteMatrix);
    }

    let mat = faer::Mat::<f64>::from_fn(R, C, |i, j| m[i][j]);
    let svd = mat.svd();

    let (u, s, v) = (svd.u(), svd.s_diagonal(), svd.v());
    let rank_max = R.min(C);

    let s_max = (0..rank_max).map(|k| s.read(k)).fold(0.0f64, f64::max);
    let tolerance = f64::EPSILON * R.max(C) as f64 * s_max;

    let s_inv = (0..rank_max)
        .map(|k| {
            let sk = s.read(k);
            if sk > tolerance {
                1.0 / sk
            } else {
                0.0
            }
        })
        .collect::<Vec<_>>();

    let mut pinv = [[0.0; R]; C];
    for (i, row) in pinv.iter_mut().enumerate() {
        for (j, out) in row.iter_mut().enumerate() {
            *out = s_inv
                .iter()
                .enumerate()
                .map(|(k, sk_inv)| v.read(i, k) * sk_inv * u.read(j, k))
                .sum();
        }
    }

    Ok(pinv)
}

/// Multiply two row-major matrices.
pub fn matmul<const R: usize, const K: usize, const C: usize>(
    a: &[[f64; K]; R],
    b: &[[f64; C]; K],
) -> [[f64; C]; R] {
    let mut out = [[0.0; C]; R];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, out) in row.iter_mut().enumerate() {
            *out = (0..K).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_matrix_eq<const R: usize, const C: usize>(
        a: &[[f64; C]; R],
        b: &[[f64; C]; R],
        epsilon: f64,
    ) {
        for r in 0..R {
            for c in 0..C {
                assert_relative_eq!(a[r][c], b[r][c], epsilon = epsilon);
            }
        }
    }

    #[test]
    fn pinv_of_invertible_is_inverse() -> Result<(), GeometryError> {
        let k = [
            [160.0, 0.0, 80.0, 0.0],
            [0.0, 48.0, 24.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let inv_k = pseudo_inverse(&k)?;

        let identity = std::array::from_fn(|r| std::array::from_fn(|c| (r == c) as u8 as f64));
        assert_matrix_eq(&matmul(&k, &inv_k), &identity, 1e-12);
        assert_relative_eq!(inv_k[0][0], 1.0 / 160.0, epsilon = 1e-15);
        assert_relative_eq!(inv_k[0][2], -0.5, epsilon = 1e-12);

        Ok(())
    }

    #[test]
    fn pinv_property_singular() -> Result<(), GeometryError> {
        // rank deficient: fx = 0
        let k = [
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 48.0, 24.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let inv_k = pseudo_inverse(&k)?;
        let k_inv_k_k = matmul(&matmul(&k, &inv_k), &k);
        assert_matrix_eq(&k_inv_k_k, &k, 1e-9);

        let inv_k_k_inv_k = matmul(&matmul(&inv_k, &k), &inv_k);
        assert_matrix_eq(&inv_k_k_inv_k, &inv_k, 1e-9);

        Ok(())
    }

    #[test]
    fn pinv_rectangular() -> Result<(), GeometryError> {
        let a = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let pinv = pseudo_inverse(&a)?;
        let back = matmul(&matmul(&a, &pinv), &a);
        assert_matrix_eq(&back, &a, 1e-9);
        Ok(())
    }

    #[test]
    fn pinv_zero_matrix() -> Result<(), GeometryError> {
        let z = [[0.0; 3]; 3];
        assert_eq!(pseudo_inverse(&z)?, [[0.0; 3]; 3]);
        Ok(())
    }

    #[test]
    fn pinv_rejects_nan() {
        let m = [[f64::NAN, 0.0], [0.0, 1.0]];
        assert_eq!(pseudo_inverse(&m), Err(GeometryError::NonFiniteMatrix));
    }
}
