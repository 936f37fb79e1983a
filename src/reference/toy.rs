//! Seeded synthetic k-point references for exercising the TDRHF machinery without an
//! integral library.
//!
//! The two-electron integrals of a [`ToyDensityFitting`] backend are generated from random
//! three-index factors $`L^P_{\mu\nu}(\mathbf{k}_1, \mathbf{k}_2)`$ as
//! ```math
//!     (\mu \mathbf{k}_1 \nu \mathbf{k}_2 | \lambda \mathbf{k}_3 \sigma \mathbf{k}_4)
//!     = \sum_P L^P_{\mu\nu}(\mathbf{k}_1, \mathbf{k}_2) L^P_{\lambda\sigma}(\mathbf{k}_3, \mathbf{k}_4),
//! ```
//! with $`L^P(\mathbf{k}_2, \mathbf{k}_1) = L^P(\mathbf{k}_1, \mathbf{k}_2)^\dagger`$. The
//! resulting integrals therefore obey the four-fold permutational symmetry of complex Bloch
//! orbitals, and the eight-fold one when the factors and coefficients are real.

use std::collections::HashMap;

use anyhow::{self, ensure, format_err};
use itertools::iproduct;
use ndarray::{Array1, Array2, Array3, Array4, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::{Eigh, UPLO};
use num_complex::Complex;
use num_traits::ToPrimitive;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::reference::{Cell, DensityFittingIntegrals, KRHFReference, OrbitalScalar};

#[cfg(test)]
#[path = "toy_tests.rs"]
mod toy_tests;

const KPT_MATCH_THRESHOLD: f64 = 1e-10;

// ==================
// Struct definitions
// ==================

// -------
// Backend
// -------

/// A density-fitting backend built from seeded random three-index factors.
#[derive(Clone, Debug)]
pub struct ToyDensityFitting {
    /// The k-points the factors are defined on, one per row.
    kpts: Array2<f64>,

    /// The three-index factors, with shape `(naux, nao, nao)`, for every ordered pair of
    /// k-point indices.
    factors: HashMap<(usize, usize), Array3<Complex<f64>>>,
}

impl ToyDensityFitting {
    /// Generates a new backend.
    ///
    /// # Arguments
    ///
    /// * `kpts` - The k-points, one per row.
    /// * `nao` - The number of atomic orbitals per k-point.
    /// * `naux` - The number of auxiliary functions.
    /// * `scale` - The magnitude of the random factors.
    /// * `rng` - The random number generator.
    ///
    /// The factors are first drawn as complex numbers and then passed through
    /// [`OrbitalScalar::from_re_im`], so that a real `T` yields real factors.
    pub fn generate<T: OrbitalScalar>(
        kpts: ArrayView2<f64>,
        nao: usize,
        naux: usize,
        scale: f64,
        rng: &mut StdRng,
    ) -> Self {
        let nk = kpts.nrows();
        let draw = |rng: &mut StdRng| -> Complex<f64> {
            T::from_re_im(
                scale * rng.gen_range(-1.0..1.0),
                scale * rng.gen_range(-1.0..1.0),
            )
            .to_complex()
        };
        let mut factors = HashMap::new();
        for (k1, k2) in iproduct!(0..nk, 0..nk) {
            if k1 > k2 {
                continue;
            }
            let mut l12 = Array3::<Complex<f64>>::zeros((naux, nao, nao));
            l12.iter_mut().for_each(|v| *v = draw(rng));
            if k1 == k2 {
                // Hermitise every auxiliary slice.
                for mut slice in l12.axis_iter_mut(Axis(0)) {
                    let herm = (&slice + &slice.t().mapv(|v| v.conj())).mapv(|v| v * 0.5);
                    slice.assign(&herm);
                }
                factors.insert((k1, k2), l12);
            } else {
                let mut l21 = l12.clone();
                for (mut s21, s12) in l21.axis_iter_mut(Axis(0)).zip(l12.axis_iter(Axis(0))) {
                    s21.assign(&s12.t().mapv(|v| v.conj()));
                }
                factors.insert((k1, k2), l12);
                factors.insert((k2, k1), l21);
            }
        }
        Self {
            kpts: kpts.to_owned(),
            factors,
        }
    }

    /// Locates the index of a k-point given its absolute coordinates.
    fn kpt_index(&self, kpt: ArrayView1<f64>) -> Result<usize, anyhow::Error> {
        self.kpts
            .rows()
            .into_iter()
            .position(|row| {
                row.iter()
                    .zip(kpt.iter())
                    .all(|(a, b)| (a - b).abs() < KPT_MATCH_THRESHOLD)
            })
            .ok_or_else(|| format_err!("K-point {kpt} is unknown to this backend."))
    }

    /// Transforms the factors of one k-point pair into the molecular-orbital basis, giving a
    /// matrix of shape `(naux, n_p * n_q)`.
    fn half_transform<T: OrbitalScalar>(
        &self,
        k: (usize, usize),
        cp: ArrayView2<T>,
        cq: ArrayView2<T>,
    ) -> Result<Array2<Complex<f64>>, anyhow::Error> {
        let factor = self
            .factors
            .get(&k)
            .ok_or_else(|| format_err!("No density-fitting factors found for k-pair {k:?}."))?;
        let (naux, nao, _) = factor.dim();
        ensure!(
            cp.nrows() == nao && cq.nrows() == nao,
            "Coefficient matrices with {} and {} rows do not match {nao} atomic orbitals.",
            cp.nrows(),
            cq.nrows()
        );
        let cp_h = cp.t().mapv(|v| v.to_complex().conj());
        let cq = cq.mapv(|v| v.to_complex());
        let (np, nq) = (cp.ncols(), cq.ncols());
        let mut half = Array2::<Complex<f64>>::zeros((naux, np * nq));
        for (mut row, slice) in half.rows_mut().into_iter().zip(factor.axis_iter(Axis(0))) {
            let pq = cp_h.dot(&slice).dot(&cq);
            row.assign(&Array1::from_iter(pq.iter().cloned()));
        }
        Ok(half)
    }
}

impl<T: OrbitalScalar> DensityFittingIntegrals<T> for ToyDensityFitting {
    fn ao2mo(
        &self,
        mo_coeffs: [ArrayView2<'_, T>; 4],
        kpts: [ArrayView1<'_, f64>; 4],
    ) -> Result<Array4<Complex<f64>>, anyhow::Error> {
        let k = kpts
            .iter()
            .map(|kpt| self.kpt_index(kpt.view()))
            .collect::<Result<Vec<_>, _>>()?;
        let [c1, c2, c3, c4] = mo_coeffs;
        let shape = (c1.ncols(), c2.ncols(), c3.ncols(), c4.ncols());
        let b12 = self.half_transform((k[0], k[1]), c1, c2)?;
        let b34 = self.half_transform((k[2], k[3]), c3, c4)?;
        let eri = b12.t().dot(&b34);
        Ok(Array4::from_shape_vec(shape, eri.iter().cloned().collect())?)
    }
}

// ------
// System
// ------

/// A self-consistent synthetic k-point restricted system.
///
/// Each k-point carries a random Hermitian Fock-like matrix whose eigenvectors and
/// eigenvalues serve as molecular-orbital coefficients and energies. The lowest `nocc`
/// orbitals at every k-point are doubly occupied.
#[derive(Clone, Debug)]
pub struct ToySystem<T: OrbitalScalar> {
    /// The periodic lattice.
    pub cell: Cell,

    /// The k-points, one per row.
    pub kpts: Array2<f64>,

    /// The integral backend.
    pub with_df: ToyDensityFitting,

    /// The molecular-orbital coefficients at every k-point.
    pub mo_coeff: Vec<Array2<T>>,

    /// The molecular-orbital energies at every k-point.
    pub mo_energy: Vec<Array1<f64>>,

    /// The occupation numbers at every k-point.
    pub mo_occ: Vec<Array1<f64>>,
}

impl<T: OrbitalScalar> ToySystem<T> {
    /// Generates a toy system on a cubic lattice.
    ///
    /// # Arguments
    ///
    /// * `mesh` - The k-point mesh.
    /// * `nao` - The number of orbitals per k-point.
    /// * `nocc` - The number of doubly occupied orbitals per k-point.
    /// * `coupling` - The magnitude of the density-fitting factors. Values well below the
    ///   orbital gap (of order unity here) give a stable, real TDHF spectrum.
    /// * `seed` - The seed of the random number generator.
    pub fn generate(
        mesh: [usize; 3],
        nao: usize,
        nocc: usize,
        coupling: f64,
        seed: u64,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            nocc > 0 && nocc < nao,
            "The number of occupied orbitals must lie strictly between 0 and {nao}."
        );
        let mut rng = StdRng::seed_from_u64(seed);
        let cell = Cell::new(Array2::<f64>::eye(3) * 4.0)?;
        let kpts = cell.make_kpts(mesh)?;
        let nk = kpts.nrows();

        let mut mo_coeff = Vec::with_capacity(nk);
        let mut mo_energy = Vec::with_capacity(nk);
        for _ in 0..nk {
            let mut fock = Array2::<T>::zeros((nao, nao));
            for (i, j) in iproduct!(0..nao, 0..nao) {
                if i > j {
                    continue;
                }
                if i == j {
                    // Well-separated diagonal, with the occupied/virtual gap of about one unit.
                    let shift = if i < nocc { -1.0 } else { 0.5 };
                    let level = i
                        .to_f64()
                        .ok_or_else(|| format_err!("Unable to convert `{i}` to `f64`."))?;
                    fock[(i, i)] =
                        T::from_re_im(shift + 0.25 * level + 0.05 * rng.gen::<f64>(), 0.0);
                } else {
                    let re = 0.02 * rng.gen_range(-1.0..1.0);
                    let im = 0.02 * rng.gen_range(-1.0..1.0);
                    fock[(i, j)] = T::from_re_im(re, im);
                    fock[(j, i)] = T::from_re_im(re, -im);
                }
            }
            let (energies, coefficients) = fock.eigh(UPLO::Lower)?;
            mo_energy.push(energies);
            mo_coeff.push(coefficients);
        }
        let mo_occ = (0..nk)
            .map(|_| Array1::from_iter((0..nao).map(|i| if i < nocc { 2.0 } else { 0.0 })))
            .collect::<Vec<_>>();

        let with_df = ToyDensityFitting::generate::<T>(kpts.view(), nao, nao, coupling, &mut rng);

        Ok(Self {
            cell,
            kpts,
            with_df,
            mo_coeff,
            mo_energy,
            mo_occ,
        })
    }

    /// Builds a [`KRHFReference`] borrowing this system's integral backend.
    pub fn reference(&self) -> Result<KRHFReference<'_, T>, anyhow::Error> {
        Ok(KRHFReference::builder()
            .cell(self.cell.clone())
            .kpts(self.kpts.clone())
            .mo_coeff(&self.mo_coeff)
            .mo_energy(&self.mo_energy)
            .mo_occ(&self.mo_occ)
            .with_df(&self.with_df)
            .build()?)
    }
}
