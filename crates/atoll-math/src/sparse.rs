//! Compressed sparse row matrices.
//!
//! Hopping matrices and the assembled fermion matrices are sparse, while
//! the heavy algebra runs on dense blocks. This type therefore carries
//! only what the assembly code needs: triplet construction, sums,
//! scalings, sparse and mixed products, and densification.

use nalgebra::{DMatrix, DVector, Scalar};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, Mul, Sub};

use crate::CD;

/// Scalar element of a [`SparseMat`].
pub trait Element: Scalar + Copy + Zero + AddAssign + Mul<Output = Self> {}

impl<T> Element for T where T: Scalar + Copy + Zero + AddAssign + Mul<Output = T> {}

/// Sparse matrix in compressed sparse row format.
///
/// Entries within a row are stored in ascending column order; explicit
/// zeros are dropped on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseMat<T> {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<T>,
}

impl<T: Element> SparseMat<T> {
    /// Empty matrix of the given shape.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            row_ptr: vec![0; nrows + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from (row, col, value) triplets; duplicates are summed and
    /// zero results dropped.
    ///
    /// # Panics
    /// Panics when an index is out of bounds.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, T)]) -> Self {
        let mut rows: Vec<Vec<(usize, T)>> = vec![Vec::new(); nrows];
        for &(i, j, v) in triplets {
            assert!(i < nrows && j < ncols, "triplet ({i}, {j}) out of bounds");
            rows[i].push((j, v));
        }

        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for row in &mut rows {
            row.sort_unstable_by_key(|&(j, _)| j);
            let mut k = 0;
            while k < row.len() {
                let j = row[k].0;
                let mut acc = T::zero();
                while k < row.len() && row[k].0 == j {
                    acc += row[k].1;
                    k += 1;
                }
                if !acc.is_zero() {
                    col_idx.push(j);
                    values.push(acc);
                }
            }
            row_ptr.push(col_idx.len());
        }

        Self {
            nrows,
            ncols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Identity matrix scaled by `v`.
    pub fn scaled_identity(n: usize, v: T) -> Self {
        let triplets: Vec<_> = (0..n).map(|i| (i, i, v)).collect();
        Self::from_triplets(n, n, &triplets)
    }

    /// Diagonal matrix from a dense vector.
    pub fn from_diagonal(diag: &DVector<T>) -> Self {
        let triplets: Vec<_> = diag.iter().enumerate().map(|(i, &v)| (i, i, v)).collect();
        Self::from_triplets(diag.len(), diag.len(), &triplets)
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// Entry at (i, j); zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> T {
        let lo = self.row_ptr[i];
        let hi = self.row_ptr[i + 1];
        match self.col_idx[lo..hi].binary_search(&j) {
            Ok(pos) => self.values[lo + pos],
            Err(_) => T::zero(),
        }
    }

    /// Iterate over stored entries as (row, col, value).
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.nrows).flat_map(move |i| {
            (self.row_ptr[i]..self.row_ptr[i + 1]).map(move |k| (i, self.col_idx[k], self.values[k]))
        })
    }

    /// All entries multiplied by `s`.
    pub fn scaled(&self, s: T) -> Self {
        let triplets: Vec<_> = self.iter().map(|(i, j, v)| (i, j, s * v)).collect();
        Self::from_triplets(self.nrows, self.ncols, &triplets)
    }

    /// Elementwise sum.
    ///
    /// # Panics
    /// Panics on shape mismatch.
    pub fn add(&self, other: &Self) -> Self {
        assert_eq!(self.nrows, other.nrows, "row count mismatch");
        assert_eq!(self.ncols, other.ncols, "column count mismatch");
        let mut triplets: Vec<_> = self.iter().collect();
        triplets.extend(other.iter());
        Self::from_triplets(self.nrows, self.ncols, &triplets)
    }

    /// Sparse·sparse product.
    ///
    /// # Panics
    /// Panics on shape mismatch.
    pub fn matmul(&self, other: &Self) -> Self {
        assert_eq!(self.ncols, other.nrows, "inner dimension mismatch");
        let mut triplets = Vec::new();
        for (i, k, a) in self.iter() {
            for p in other.row_ptr[k]..other.row_ptr[k + 1] {
                triplets.push((i, other.col_idx[p], a * other.values[p]));
            }
        }
        Self::from_triplets(self.nrows, other.ncols, &triplets)
    }

    /// Dense product `self * rhs`.
    pub fn mul_dense(&self, rhs: &DMatrix<T>) -> DMatrix<T> {
        assert_eq!(self.ncols, rhs.nrows(), "inner dimension mismatch");
        let mut out = DMatrix::zeros(self.nrows, rhs.ncols());
        for (i, k, a) in self.iter() {
            for j in 0..rhs.ncols() {
                out[(i, j)] += a * rhs[(k, j)];
            }
        }
        out
    }

    /// Dense product `lhs * self`.
    pub fn rmul_dense(&self, lhs: &DMatrix<T>) -> DMatrix<T> {
        assert_eq!(lhs.ncols(), self.nrows, "inner dimension mismatch");
        let mut out = DMatrix::zeros(lhs.nrows(), self.ncols);
        for (k, j, a) in self.iter() {
            for i in 0..lhs.nrows() {
                out[(i, j)] += lhs[(i, k)] * a;
            }
        }
        out
    }

    /// Matrix-vector product.
    pub fn mul_vec(&self, v: &DVector<T>) -> DVector<T> {
        assert_eq!(self.ncols, v.len(), "inner dimension mismatch");
        let mut out = DVector::zeros(self.nrows);
        for (i, j, a) in self.iter() {
            out[i] += a * v[j];
        }
        out
    }

    /// Row `i` multiplied by `factors[i]`.
    pub fn scale_rows(&self, factors: &DVector<T>) -> Self {
        assert_eq!(self.nrows, factors.len(), "factor count mismatch");
        let triplets: Vec<_> = self.iter().map(|(i, j, v)| (i, j, factors[i] * v)).collect();
        Self::from_triplets(self.nrows, self.ncols, &triplets)
    }

    /// Column `j` multiplied by `factors[j]`.
    pub fn scale_cols(&self, factors: &DVector<T>) -> Self {
        assert_eq!(self.ncols, factors.len(), "factor count mismatch");
        let triplets: Vec<_> = self.iter().map(|(i, j, v)| (i, j, v * factors[j])).collect();
        Self::from_triplets(self.nrows, self.ncols, &triplets)
    }

    /// Densify.
    pub fn to_dense(&self) -> DMatrix<T> {
        let mut out = DMatrix::zeros(self.nrows, self.ncols);
        for (i, j, v) in self.iter() {
            out[(i, j)] = v;
        }
        out
    }

    /// Convert the element type.
    pub fn map<U: Element>(&self, f: impl Fn(T) -> U) -> SparseMat<U> {
        SparseMat {
            nrows: self.nrows,
            ncols: self.ncols,
            row_ptr: self.row_ptr.clone(),
            col_idx: self.col_idx.clone(),
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }
}

impl<T: Element + Sub<Output = T>> SparseMat<T> {
    /// Elementwise difference.
    ///
    /// # Panics
    /// Panics on shape mismatch.
    pub fn sub(&self, other: &Self) -> Self {
        assert_eq!(self.nrows, other.nrows, "row count mismatch");
        assert_eq!(self.ncols, other.ncols, "column count mismatch");
        let mut triplets: Vec<_> = self.iter().collect();
        triplets.extend(other.iter().map(|(i, j, v)| (i, j, T::zero() - v)));
        Self::from_triplets(self.nrows, self.ncols, &triplets)
    }
}

impl SparseMat<f64> {
    /// Identity matrix.
    pub fn identity(n: usize) -> Self {
        Self::scaled_identity(n, 1.0)
    }

    /// Promote to complex entries.
    pub fn to_complex(&self) -> SparseMat<CD> {
        self.map(|v| CD::new(v, 0.0))
    }

    /// Whether the matrix equals its transpose.
    pub fn is_symmetric(&self) -> bool {
        self.is_square() && self.iter().all(|(i, j, v)| self.get(j, i) == v)
    }

    /// Whether every diagonal entry vanishes.
    pub fn has_zero_diagonal(&self) -> bool {
        (0..self.nrows.min(self.ncols)).all(|i| self.get(i, i) == 0.0)
    }
}
