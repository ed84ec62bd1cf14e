//! The erasure-code generator matrix and the Gaussian elimination used to
//! invert a received submatrix of it.
//!
//! The first `k` rows are the identity (data shreds are systematic: the
//! shred *is* the data, no encoding needed). Rows `k..k+m` are a Cauchy
//! matrix, `G[k+i][j] = 1 / (j XOR (k+i))` in GF(2^8): any square
//! submatrix of `[I | Cauchy]` is invertible, which a raw Vandermonde
//! submatrix is not guaranteed to be. This resolves the "exact GF(2^8)
//! Vandermonde generator" open question by using the Cauchy variant, the
//! standard production fix for the same non-invertibility problem.

use crate::gf256;

pub fn generator_row(row: usize, num_data: usize) -> Vec<u8> {
    if row < num_data {
        let mut r = vec![0u8; num_data];
        r[row] = 1;
        return r;
    }
    (0..num_data)
        .map(|j| gf256::inv((j as u8) ^ (row as u8)))
        .collect()
}

/// Inverts a `k x k` matrix over GF(2^8) via Gauss-Jordan elimination.
/// Returns `None` if the matrix is singular (should not happen for a
/// correctly chosen Cauchy submatrix).
pub fn invert(mut m: Vec<Vec<u8>>) -> Option<Vec<Vec<u8>>> {
    let k = m.len();
    let mut inv = (0..k)
        .map(|i| {
            let mut row = vec![0u8; k];
            row[i] = 1;
            row
        })
        .collect::<Vec<_>>();

    for col in 0..k {
        // Find a pivot with a non-zero entry in this column.
        let pivot_row = (col..k).find(|&r| m[r][col] != 0)?;
        m.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot_inv = gf256::inv(m[col][col]);
        for c in 0..k {
            m[col][c] = gf256::mul(m[col][c], pivot_inv);
            inv[col][c] = gf256::mul(inv[col][c], pivot_inv);
        }

        for row in 0..k {
            if row == col {
                continue;
            }
            let factor = m[row][col];
            if factor == 0 {
                continue;
            }
            for c in 0..k {
                m[row][c] = gf256::add(m[row][c], gf256::mul(factor, m[col][c]));
                inv[row][c] = gf256::add(inv[row][c], gf256::mul(factor, inv[col][c]));
            }
        }
    }
    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_submatrix_inverts_to_itself() {
        let k = 4;
        let rows: Vec<Vec<u8>> = (0..k).map(|r| generator_row(r, k)).collect();
        let inv = invert(rows.clone()).unwrap();
        for i in 0..k {
            for j in 0..k {
                let expected = if i == j { 1 } else { 0 };
                assert_eq!(inv[i][j], expected);
            }
        }
    }

    #[test]
    fn any_k_rows_of_generator_are_invertible() {
        let k = 6;
        let m = 3;
        // Try every combination of k rows out of k+m by dropping each
        // possible subset of m rows.
        for drop_start in 0..(k + m - k + 1) {
            let rows: Vec<usize> = (0..k + m)
                .filter(|&r| !(drop_start..drop_start + (k + m - k)).contains(&r))
                .collect();
            if rows.len() != k {
                continue;
            }
            let matrix: Vec<Vec<u8>> = rows.iter().map(|&r| generator_row(r, k)).collect();
            assert!(invert(matrix).is_some(), "rows {rows:?} should invert");
        }
    }
}
