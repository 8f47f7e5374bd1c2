//! The Hubbard fermion matrix family.
//!
//! [`HubbardFermiMatrix`] owns the immutable parameters (hopping matrix κ,
//! chemical potential μ, hole hopping sign σκ) and builds every block the
//! determinant routes need: the diagonal block K, the field factors F, the
//! full matrix M, and the Schur blocks P, T⁺, T⁻ and Q. Inverse and
//! log-determinant of K are cached lazily per species and invalidated when
//! a parameter is updated.

use std::cell::RefCell;

use atoll_math::{expm_sym, logdet, spacevec, MathError, CD, CDMat, CDSMat, CDVec, DMat, DSMat, I};

use crate::error::{FermiError, Result};
use crate::{Hopping, Species};

/// Precomputed hopping exponentials for the exponential discretisation.
///
/// `particle = exp(κ − μ)` and `hole = exp(σκ·κ + μ)` are the per-slice
/// transfer factors; the first-order expansions reproduce the inverses of
/// the diagonal discretisation's K blocks.
#[derive(Debug, Clone)]
struct ExpFactors {
    particle: DMat,
    hole: DMat,
    particle_inv: DMat,
    hole_inv: DMat,
}

impl ExpFactors {
    fn new(kappa: &DSMat, mu: f64, sigma_kappa: i8) -> Result<Self> {
        let nx = kappa.nrows();
        let kd = kappa.to_dense();
        let sk = sigma_kappa as f64;
        let id = DMat::identity(nx, nx);
        Ok(Self {
            particle: expm_sym(&(&kd - &id * mu))?,
            particle_inv: expm_sym(&(&id * mu - &kd))?,
            hole: expm_sym(&(&kd * sk + &id * mu))?,
            hole_inv: expm_sym(&(&id * (-mu) - &kd * sk))?,
        })
    }

    fn forward(&self, species: Species) -> &DMat {
        match species {
            Species::Particle => &self.particle,
            Species::Hole => &self.hole,
        }
    }

    fn inverse(&self, species: Species) -> &DMat {
        match species {
            Species::Particle => &self.particle_inv,
            Species::Hole => &self.hole_inv,
        }
    }
}

/// Hopping kernel: the discretisation tag plus its precomputed factors.
#[derive(Debug, Clone)]
enum Kernel {
    Dia,
    Exp(ExpFactors),
}

/// Lazily computed per-species quantities.
#[derive(Debug, Default, Clone)]
struct Caches {
    kinv: [Option<CDMat>; 2],
    logdet_kinv: [Option<CD>; 2],
}

fn species_idx(species: Species) -> usize {
    match species {
        Species::Particle => 0,
        Species::Hole => 1,
    }
}

/// Per-site phases `exp(sign·i·φ[·, t])` for one time slice.
fn slice_phases(phi: &CDVec, t: usize, nx: usize, sign: f64) -> CDVec {
    let slice = spacevec(phi, t, nx);
    CDVec::from_fn(nx, |x, _| (I * sign * slice[x]).exp())
}

/// Fermion matrix for the Hubbard model.
///
/// Construct once per parameter set; evaluation methods take the auxiliary
/// field by reference and infer the number of time slices from its length.
#[derive(Debug, Clone)]
pub struct HubbardFermiMatrix {
    kappa: DSMat,
    mu: f64,
    sigma_kappa: i8,
    kernel: Kernel,
    caches: RefCell<Caches>,
}

impl HubbardFermiMatrix {
    /// Store the parameters for building fermion matrices later.
    pub fn new(kappa: DSMat, mu: f64, sigma_kappa: i8, hopping: Hopping) -> Result<Self> {
        if !kappa.is_square() {
            return Err(FermiError::NonSquareHopping {
                rows: kappa.nrows(),
                cols: kappa.ncols(),
            });
        }
        if sigma_kappa != 1 && sigma_kappa != -1 {
            return Err(FermiError::InvalidSigmaKappa(sigma_kappa));
        }
        let kernel = match hopping {
            Hopping::Dia => Kernel::Dia,
            Hopping::Exp => Kernel::Exp(ExpFactors::new(&kappa, mu, sigma_kappa)?),
        };
        Ok(Self {
            kappa,
            mu,
            sigma_kappa,
            kernel,
            caches: RefCell::new(Caches::default()),
        })
    }

    /// Hopping matrix.
    pub fn kappa(&self) -> &DSMat {
        &self.kappa
    }

    /// Chemical potential.
    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Sign of the hopping matrix in the hole matrix.
    pub fn sigma_kappa(&self) -> i8 {
        self.sigma_kappa
    }

    /// Discretisation of the hopping kernel.
    pub fn hopping(&self) -> Hopping {
        match self.kernel {
            Kernel::Dia => Hopping::Dia,
            Kernel::Exp(_) => Hopping::Exp,
        }
    }

    /// Number of spatial lattice sites.
    pub fn nx(&self) -> usize {
        self.kappa.nrows()
    }

    /// Number of time slices encoded in a field, validating its length.
    pub fn nt_of(&self, phi: &CDVec) -> Result<usize> {
        let nx = self.nx();
        if nx == 0 || phi.len() % nx != 0 || phi.is_empty() {
            return Err(FermiError::SizeMismatch {
                len: phi.len(),
                nx,
            });
        }
        Ok(phi.len() / nx)
    }

    /// Replace the hopping matrix and invalidate all caches.
    pub fn update_kappa(&mut self, kappa: DSMat) -> Result<()> {
        if !kappa.is_square() {
            return Err(FermiError::NonSquareHopping {
                rows: kappa.nrows(),
                cols: kappa.ncols(),
            });
        }
        self.kappa = kappa;
        self.refresh()
    }

    /// Replace the chemical potential and invalidate all caches.
    pub fn update_mu(&mut self, mu: f64) -> Result<()> {
        self.mu = mu;
        self.refresh()
    }

    fn refresh(&mut self) -> Result<()> {
        if let Kernel::Exp(_) = self.kernel {
            self.kernel = Kernel::Exp(ExpFactors::new(&self.kappa, self.mu, self.sigma_kappa)?);
        }
        *self.caches.borrow_mut() = Caches::default();
        Ok(())
    }

    /// Diagonal block K of the fermion matrix M.
    pub fn k(&self, species: Species) -> DSMat {
        let nx = self.nx();
        match &self.kernel {
            Kernel::Dia => match species {
                Species::Particle => {
                    DSMat::scaled_identity(nx, 1.0 + self.mu).sub(&self.kappa)
                }
                Species::Hole => DSMat::scaled_identity(nx, 1.0 - self.mu)
                    .sub(&self.kappa.scaled(self.sigma_kappa as f64)),
            },
            Kernel::Exp(_) => DSMat::identity(nx),
        }
    }

    /// Inverse of K as a dense complex matrix; cached per species.
    pub fn kinv(&self, species: Species) -> Result<CDMat> {
        let idx = species_idx(species);
        if let Some(cached) = self.caches.borrow().kinv[idx].as_ref() {
            return Ok(cached.clone());
        }
        let inv = self
            .k(species)
            .to_dense()
            .try_inverse()
            .ok_or(MathError::Singular)?;
        let kinv = inv.map(|v| CD::new(v, 0.0));
        self.caches.borrow_mut().kinv[idx] = Some(kinv.clone());
        Ok(kinv)
    }

    /// `log det K⁻¹`; cached per species.
    pub fn logdet_kinv(&self, species: Species) -> Result<CD> {
        let idx = species_idx(species);
        if let Some(cached) = self.caches.borrow().logdet_kinv[idx] {
            return Ok(cached);
        }
        let ld = logdet(&self.kinv(species)?)?;
        self.caches.borrow_mut().logdet_kinv[idx] = Some(ld);
        Ok(ld)
    }

    /// Field factor F on the lower subdiagonal of M.
    ///
    /// Diagonal phases are `exp(±i·φ[·, t−1])` with periodic wrap on `t`;
    /// the sign is `−i` iff `(inv ∧ particle) ∨ (¬inv ∧ hole)`. The
    /// exponential discretisation multiplies the hopping exponential on
    /// the left (or, for `inv`, its inverse on the right).
    pub fn f(&self, t: usize, phi: &CDVec, species: Species, inv: bool) -> Result<CDSMat> {
        let nx = self.nx();
        let nt = self.nt_of(phi)?;
        let tm1 = if t == 0 { nt - 1 } else { t - 1 };
        let negative =
            (inv && species == Species::Particle) || (!inv && species == Species::Hole);
        let phases = slice_phases(phi, tm1, nx, if negative { -1.0 } else { 1.0 });

        match &self.kernel {
            Kernel::Dia => Ok(CDSMat::from_diagonal(&phases)),
            Kernel::Exp(factors) => {
                let mut triplets = Vec::with_capacity(nx * nx);
                if inv {
                    let e = factors.inverse(species);
                    for i in 0..nx {
                        for j in 0..nx {
                            triplets.push((i, j, phases[i] * e[(i, j)]));
                        }
                    }
                } else {
                    let e = factors.forward(species);
                    for i in 0..nx {
                        for j in 0..nx {
                            triplets.push((i, j, e[(i, j)] * phases[j]));
                        }
                    }
                }
                Ok(CDSMat::from_triplets(nx, nx, &triplets))
            }
        }
    }

    /// The full fermion matrix M.
    ///
    /// Block diagonal K, sub-diagonal blocks `−F(t)`, and the
    /// anti-periodic corner `+F(0)` at block (0, Nt−1).
    pub fn m(&self, phi: &CDVec, species: Species) -> Result<CDSMat> {
        let nx = self.nx();
        let nt = self.nt_of(phi)?;
        let k = self.k(species).to_complex();

        let mut triplets = Vec::new();
        for t in 0..nt {
            for (i, j, v) in k.iter() {
                triplets.push((t * nx + i, t * nx + j, v));
            }
        }
        let f0 = self.f(0, phi, species, false)?;
        for (i, j, v) in f0.iter() {
            triplets.push((i, (nt - 1) * nx + j, v));
        }
        for t in 1..nt {
            let f = self.f(t, phi, species, false)?;
            for (i, j, v) in f.iter() {
                triplets.push((t * nx + i, (t - 1) * nx + j, -v));
            }
        }
        Ok(CDSMat::from_triplets(nx * nt, nx * nt, &triplets))
    }

    /// Diagonal block P of the Schur matrix Q.
    pub fn p(&self) -> DSMat {
        let nx = self.nx();
        match &self.kernel {
            Kernel::Dia => {
                let sk = self.sigma_kappa as f64;
                let mu = self.mu;
                DSMat::scaled_identity(nx, 2.0 - mu * mu)
                    .sub(&self.kappa.scaled(sk * (1.0 + mu) + 1.0 - mu))
                    .add(&self.kappa.matmul(&self.kappa).scaled(sk))
            }
            Kernel::Exp(factors) => {
                let prod = &factors.particle * &factors.hole;
                let mut triplets = Vec::with_capacity(nx * nx + nx);
                for i in 0..nx {
                    triplets.push((i, i, 1.0));
                    for j in 0..nx {
                        triplets.push((i, j, prod[(i, j)]));
                    }
                }
                DSMat::from_triplets(nx, nx, &triplets)
            }
        }
    }

    /// Block T⁺ of Q at block (t, (t−1) mod Nt).
    ///
    /// Carries the anti-periodic sign at `t = 0`.
    pub fn tplus(&self, t: usize, phi: &CDVec) -> Result<CDSMat> {
        let nx = self.nx();
        let nt = self.nt_of(phi)?;
        let tm1 = if t == 0 { nt - 1 } else { t - 1 };
        let anti_p = if t == 0 { -1.0 } else { 1.0 };
        let phases = slice_phases(phi, tm1, nx, 1.0);

        match &self.kernel {
            Kernel::Dia => {
                let base = self
                    .kappa
                    .scaled(self.sigma_kappa as f64)
                    .sub(&DSMat::scaled_identity(nx, 1.0 - self.mu))
                    .to_complex();
                Ok(base.scale_rows(&phases.map(|p| p * anti_p)))
            }
            Kernel::Exp(factors) => {
                let e = &factors.particle;
                let mut triplets = Vec::with_capacity(nx * nx);
                for i in 0..nx {
                    for j in 0..nx {
                        triplets.push((i, j, phases[j] * (-anti_p * e[(i, j)])));
                    }
                }
                Ok(CDSMat::from_triplets(nx, nx, &triplets))
            }
        }
    }

    /// Block T⁻ of Q at block (t, (t+1) mod Nt).
    ///
    /// Carries the anti-periodic sign at `t = Nt−1`.
    pub fn tminus(&self, t: usize, phi: &CDVec) -> Result<CDSMat> {
        let nx = self.nx();
        let nt = self.nt_of(phi)?;
        let anti_p = if t == nt - 1 { -1.0 } else { 1.0 };
        let phases = slice_phases(phi, t, nx, -1.0);

        match &self.kernel {
            Kernel::Dia => {
                let base = self
                    .kappa
                    .sub(&DSMat::scaled_identity(nx, 1.0 + self.mu))
                    .to_complex();
                Ok(base.scale_cols(&phases.map(|p| p * anti_p)))
            }
            Kernel::Exp(factors) => {
                let e = &factors.hole;
                let mut triplets = Vec::with_capacity(nx * nx);
                for i in 0..nx {
                    for j in 0..nx {
                        triplets.push((i, j, phases[i] * (-anti_p * e[(i, j)])));
                    }
                }
                Ok(CDSMat::from_triplets(nx, nx, &triplets))
            }
        }
    }

    /// The Schur matrix Q: block-cyclic tridiagonal with P on the diagonal
    /// and T⁺/T⁻ on the wrapped off-diagonals.
    pub fn q(&self, phi: &CDVec) -> Result<CDSMat> {
        let nx = self.nx();
        let nt = self.nt_of(phi)?;
        let p = self.p().to_complex();

        let mut triplets = Vec::new();
        for t in 0..nt {
            for (i, j, v) in p.iter() {
                triplets.push((t * nx + i, t * nx + j, v));
            }
            let tp = self.tplus(t, phi)?;
            let col0 = ((t + nt - 1) % nt) * nx;
            for (i, j, v) in tp.iter() {
                triplets.push((t * nx + i, col0 + j, v));
            }
            let tm = self.tminus(t, phi)?;
            let col0 = ((t + 1) % nt) * nx;
            for (i, j, v) in tm.iter() {
                triplets.push((t * nx + i, col0 + j, v));
            }
        }
        Ok(CDSMat::from_triplets(nx * nt, nx * nt, &triplets))
    }
}
