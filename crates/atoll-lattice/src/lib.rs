//! Lattice geometry for the atoll engine.
//!
//! The numerical core only needs two things from a lattice: the spatial
//! hopping matrix and the number of time slices. [`Lattice`] bundles them
//! as a validated value object; [`is_bipartite`] answers the one graph
//! question the action layer asks.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

use atoll_math::DSMat;

/// Error type for lattice construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatticeError {
    /// The hopping matrix must be square.
    #[error("hopping matrix is not square: {rows}x{cols}")]
    NonSquareHopping {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
    },

    /// The hopping matrix must be symmetric.
    #[error("hopping matrix is not symmetric")]
    AsymmetricHopping,

    /// Hopping strengths live on edges; self-couplings are not allowed.
    #[error("hopping matrix has a non-zero diagonal entry")]
    NonZeroDiagonal,

    /// At least one time slice is required.
    #[error("invalid number of time slices: {nt}")]
    InvalidNt {
        /// The rejected value.
        nt: usize,
    },
}

pub type Result<T> = std::result::Result<T, LatticeError>;

/// Spatial lattice plus temporal extent.
///
/// The hopping matrix is a real symmetric adjacency weighting with zero
/// diagonal; its dimension is the number of spatial sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    hopping: DSMat,
    nt: usize,
}

impl Lattice {
    /// Validate and build a lattice.
    pub fn new(hopping: DSMat, nt: usize) -> Result<Self> {
        if !hopping.is_square() {
            return Err(LatticeError::NonSquareHopping {
                rows: hopping.nrows(),
                cols: hopping.ncols(),
            });
        }
        if !hopping.is_symmetric() {
            return Err(LatticeError::AsymmetricHopping);
        }
        if !hopping.has_zero_diagonal() {
            return Err(LatticeError::NonZeroDiagonal);
        }
        if nt == 0 {
            return Err(LatticeError::InvalidNt { nt });
        }
        Ok(Self { hopping, nt })
    }

    /// Hopping matrix.
    pub fn hopping(&self) -> &DSMat {
        &self.hopping
    }

    /// Number of time slices.
    pub fn nt(&self) -> usize {
        self.nt
    }

    /// Number of spatial sites.
    pub fn nx(&self) -> usize {
        self.hopping.nrows()
    }

    /// Open chain of `nx` sites with unit couplings.
    pub fn chain(nx: usize, nt: usize) -> Result<Self> {
        let mut triplets = Vec::with_capacity(2 * nx.saturating_sub(1));
        for i in 1..nx {
            triplets.push((i - 1, i, 1.0));
            triplets.push((i, i - 1, 1.0));
        }
        Self::new(DSMat::from_triplets(nx, nx, &triplets), nt)
    }

    /// Periodic ring of `nx` sites with unit couplings.
    ///
    /// Bipartite exactly when `nx` is even.
    pub fn ring(nx: usize, nt: usize) -> Result<Self> {
        let mut triplets = Vec::with_capacity(2 * nx);
        for i in 1..nx {
            triplets.push((i - 1, i, 1.0));
            triplets.push((i, i - 1, 1.0));
        }
        // The wrap bond; for nx ≤ 2 it would duplicate an existing one.
        if nx > 2 {
            triplets.push((nx - 1, 0, 1.0));
            triplets.push((0, nx - 1, 1.0));
        }
        Self::new(DSMat::from_triplets(nx, nx, &triplets), nt)
    }

    /// Triangle with unit couplings; the smallest non-bipartite lattice.
    pub fn triangle(nt: usize) -> Result<Self> {
        Self::ring(3, nt)
    }
}

/// Whether the support graph of a hopping matrix admits a 2-colouring
/// with no monochromatic edge.
///
/// Breadth-first colouring per connected component; isolated sites are
/// trivially bipartite.
pub fn is_bipartite(hopping: &DSMat) -> bool {
    let n = hopping.nrows();
    let mut adj = vec![Vec::new(); n];
    for (i, j, v) in hopping.iter() {
        if v != 0.0 && i != j {
            adj[i].push(j);
        }
    }

    let mut colour = vec![None::<bool>; n];
    let mut queue = VecDeque::new();
    for start in 0..n {
        if colour[start].is_some() {
            continue;
        }
        colour[start] = Some(false);
        queue.push_back(start);
        while let Some(i) = queue.pop_front() {
            let ci = colour[i].unwrap();
            for &j in &adj[i] {
                match colour[j] {
                    None => {
                        colour[j] = Some(!ci);
                        queue.push_back(j);
                    }
                    Some(cj) if cj == ci => return false,
                    Some(_) => {}
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_shape() {
        let lat = Lattice::chain(4, 8).unwrap();
        assert_eq!(lat.nx(), 4);
        assert_eq!(lat.nt(), 8);
        assert_eq!(lat.hopping().get(0, 1), 1.0);
        assert_eq!(lat.hopping().get(1, 0), 1.0);
        assert_eq!(lat.hopping().get(0, 2), 0.0);
    }

    #[test]
    fn rejects_invalid_hopping() {
        let non_square = DSMat::from_triplets(2, 3, &[(0, 1, 1.0)]);
        assert!(matches!(
            Lattice::new(non_square, 4),
            Err(LatticeError::NonSquareHopping { .. })
        ));

        let asym = DSMat::from_triplets(2, 2, &[(0, 1, 1.0)]);
        assert_eq!(Lattice::new(asym, 4), Err(LatticeError::AsymmetricHopping));

        let diag = DSMat::from_triplets(2, 2, &[(0, 0, 1.0)]);
        assert_eq!(Lattice::new(diag, 4), Err(LatticeError::NonZeroDiagonal));

        let ok = DSMat::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, 1.0)]);
        assert_eq!(Lattice::new(ok, 0), Err(LatticeError::InvalidNt { nt: 0 }));
    }

    #[test]
    fn chains_and_even_rings_are_bipartite() {
        assert!(is_bipartite(Lattice::chain(5, 2).unwrap().hopping()));
        assert!(is_bipartite(Lattice::ring(4, 2).unwrap().hopping()));
        assert!(is_bipartite(Lattice::ring(6, 2).unwrap().hopping()));
    }

    #[test]
    fn odd_cycles_are_not_bipartite() {
        assert!(!is_bipartite(Lattice::triangle(2).unwrap().hopping()));
        assert!(!is_bipartite(Lattice::ring(5, 2).unwrap().hopping()));
    }

    #[test]
    fn empty_hopping_is_bipartite() {
        assert!(is_bipartite(&DSMat::zeros(3, 3)));
    }

    #[test]
    fn disconnected_components_are_coloured_independently() {
        // Two disjoint edges plus an isolated site.
        let hopping = DSMat::from_triplets(
            5,
            5,
            &[(0, 1, 1.0), (1, 0, 1.0), (2, 3, 0.5), (3, 2, 0.5)],
        );
        assert!(is_bipartite(&hopping));
    }
}
