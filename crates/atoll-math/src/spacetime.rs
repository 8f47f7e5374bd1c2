//! Spacetime slice indexing.
//!
//! A spacetime vector of length `nx*nt` stores the spatial slice for time
//! `t` contiguously; the flat index of site `x` at time `t` is `t*nx + x`.
//! Matrices on spacetime are handled as `nt×nt` grids of `nx×nx` blocks.

use nalgebra::{DVectorView, DVectorViewMut, Scalar};
use num_traits::Zero;
use std::ops::AddAssign;

use crate::error::{MathError, Result};
use crate::{CD, CDMat, CDVec};

/// Flat spacetime index of site `x` at time `t`.
#[inline]
pub fn spacetime_coord(x: usize, t: usize, nx: usize) -> usize {
    t * nx + x
}

/// Periodic index wrap; the anti-periodic sign is applied by the caller.
#[inline]
pub fn loop_idx(i: usize, n: usize) -> usize {
    i % n
}

/// Number of time slices encoded in a spacetime vector.
///
/// Fails when the length is not an exact multiple of `nx`.
pub fn num_timeslices(len: usize, nx: usize) -> Result<usize> {
    if nx == 0 || len % nx != 0 {
        return Err(MathError::DimensionMismatch {
            left: len,
            right: nx,
        });
    }
    Ok(len / nx)
}

/// View of the spatial slice at time `t` of a spacetime vector.
#[inline]
pub fn spacevec(v: &CDVec, t: usize, nx: usize) -> DVectorView<'_, CD> {
    v.rows(t * nx, nx)
}

/// Mutable view of the spatial slice at time `t`.
#[inline]
pub fn spacevec_mut(v: &mut CDVec, t: usize, nx: usize) -> DVectorViewMut<'_, CD> {
    v.rows_mut(t * nx, nx)
}

/// Copy of the `nx×nx` block at block row `t1`, block column `t2`.
#[inline]
pub fn spacemat(m: &CDMat, t1: usize, t2: usize, nx: usize) -> CDMat {
    m.view((t1 * nx, t2 * nx), (nx, nx)).clone_owned()
}

/// Overwrite the block at block row `t1`, block column `t2`.
pub fn set_spacemat<T, S>(m: &mut nalgebra::DMatrix<T>, t1: usize, t2: usize, nx: usize, block: &S)
where
    T: Scalar + Zero,
    S: AsDenseBlock<T>,
{
    block.write_into(m, t1 * nx, t2 * nx);
}

/// Add `block` onto the block at block row `t1`, block column `t2`.
pub fn add_spacemat(m: &mut CDMat, t1: usize, t2: usize, nx: usize, block: &CDMat) {
    let mut view = m.view_mut((t1 * nx, t2 * nx), (nx, nx));
    view.add_assign(block);
}

/// Anything that can be written into a dense block; keeps the assembly
/// helpers agnostic of whether a block is stored dense or sparse.
pub trait AsDenseBlock<T: Scalar + Zero> {
    fn write_into(&self, target: &mut nalgebra::DMatrix<T>, row0: usize, col0: usize);
}

impl<T: Scalar + Zero> AsDenseBlock<T> for nalgebra::DMatrix<T> {
    fn write_into(&self, target: &mut nalgebra::DMatrix<T>, row0: usize, col0: usize) {
        target
            .view_mut((row0, col0), (self.nrows(), self.ncols()))
            .copy_from(self);
    }
}

impl<T: crate::sparse::Element> AsDenseBlock<T> for crate::SparseMat<T> {
    fn write_into(&self, target: &mut nalgebra::DMatrix<T>, row0: usize, col0: usize) {
        let mut view = target.view_mut((row0, col0), (self.nrows(), self.ncols()));
        view.fill(T::zero());
        for (i, j, v) in self.iter() {
            view[(i, j)] = v;
        }
    }
}
