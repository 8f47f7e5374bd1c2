//! atoll — lattice Monte-Carlo engine for the Hubbard model.
//!
//! This is the umbrella crate: it re-exports the numerical core and adds
//! a minimal leapfrog HMC driver. The heavy lifting lives in the member
//! crates:
//!
//! - [`atoll_math`]: tensor aliases, sparse matrices, log-determinants
//! - [`atoll_lattice`]: lattice geometry and bipartiteness
//! - [`atoll_fermion`]: fermion matrices, the Schur form Q and its block LU
//! - [`atoll_action`]: the action layer and its composition algebra

pub mod hmc;

pub use atoll_action::{
    self, make_hubbard_fermi_action, make_hubbard_fermi_action_for, Action, ActionError,
    Algorithm, Basis, FermiActionConfig, HubbardFermiAction, HubbardGaugeAction, SumAction,
};
pub use atoll_fermion::{
    self, get_qlu, ilogdet_q, logdet_m, logdet_q, logdet_q_lu, solve_m, solve_q, solve_q_lu,
    FermiError, Hopping, HubbardFermiMatrix, QLu, Species,
};
pub use atoll_lattice::{self, is_bipartite, Lattice, LatticeError};
pub use atoll_math::{
    self, expm_sym, ilogdet, logdet, to_first_log_branch, CDMat, CDSMat, CDVec, CpuOps, DMat,
    DSMat, DVec, DenseOps, MathError, SparseMat, CD,
};

#[cfg(feature = "gpu")]
pub use atoll_gpu::{self, GpuError, GpuOps};

pub use hmc::{hmc_step, HmcParams, HmcStats};
