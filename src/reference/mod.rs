//! Converged k-point restricted Hartree-Fock references and the integral backend contract.

use std::f64::consts::PI;
use std::fmt;

use anyhow::{self, ensure, format_err};
use derive_builder::Builder;
use duplicate::duplicate_item;
use itertools::iproduct;
use ndarray::{Array1, Array2, Array4, ArrayView1, ArrayView2};
use ndarray_linalg::{Inverse, Lapack, Scalar};
use num_complex::Complex;
use num_traits::ToPrimitive;

pub mod toy;

#[cfg(test)]
#[path = "reference_tests.rs"]
mod reference_tests;

// =================
// Trait definitions
// =================

/// Trait for the numerical types allowed for molecular-orbital coefficients.
///
/// Real coefficients give rise to real two-electron integrals and admit the eight-fold
/// permutational symmetry, whereas complex coefficients only admit the four-fold one.
pub trait OrbitalScalar: Scalar<Real = f64> + Lapack {
    /// Boolean indicating if this type carries an imaginary part.
    const IS_COMPLEX: bool;

    /// Converts the value into a complex number.
    fn to_complex(self) -> Complex<f64>;

    /// Constructs a value from a real part and an imaginary part. The imaginary part is
    /// discarded for real types.
    fn from_re_im(re: f64, im: f64) -> Self;
}

#[duplicate_item(
    [
        dtype_ [ f64 ]
        is_complex_ [ false ]
        to_complex_ [ Complex::new(self, 0.0) ]
        from_re_im_ [ re ]
    ]
    [
        dtype_ [ Complex<f64> ]
        is_complex_ [ true ]
        to_complex_ [ self ]
        from_re_im_ [ Complex::new(re, im) ]
    ]
)]
impl OrbitalScalar for dtype_ {
    const IS_COMPLEX: bool = is_complex_;

    fn to_complex(self) -> Complex<f64> {
        to_complex_
    }

    #[allow(unused_variables)]
    fn from_re_im(re: f64, im: f64) -> Self {
        from_re_im_
    }
}

/// Trait for density-fitting backends able to transform two-electron integrals from Bloch
/// atomic orbitals to Bloch molecular orbitals.
pub trait DensityFittingIntegrals<T> {
    /// Transforms the two-electron integrals into the molecular-orbital basis.
    ///
    /// # Arguments
    ///
    /// * `mo_coeffs` - Four coefficient matrices (atomic orbitals along rows) in chemist
    ///   ordering $`(pq|rs)`$.
    /// * `kpts` - The four k-points (absolute coordinates) the coefficient matrices belong to.
    ///
    /// # Returns
    ///
    /// The dense chemist-ordered tensor $`(pq|rs)`$ with shape
    /// `(n_p, n_q, n_r, n_s)`, where `n_x` is the number of columns of the corresponding
    /// coefficient matrix. No permutational symmetry is exploited in the layout.
    fn ao2mo(
        &self,
        mo_coeffs: [ArrayView2<'_, T>; 4],
        kpts: [ArrayView1<'_, f64>; 4],
    ) -> Result<Array4<Complex<f64>>, anyhow::Error>;
}

// ==================
// Struct definitions
// ==================

// ----
// Cell
// ----

/// Structure describing the periodic lattice of a crystal.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// The lattice vectors, one per row.
    lattice_vectors: Array2<f64>,
}

impl Cell {
    /// Creates a new cell from its lattice vectors.
    ///
    /// # Arguments
    ///
    /// * `lattice_vectors` - A $`3 \times 3`$ matrix whose rows are the lattice vectors.
    pub fn new(lattice_vectors: Array2<f64>) -> Result<Self, anyhow::Error> {
        ensure!(
            lattice_vectors.shape() == [3, 3],
            "Lattice vectors must form a 3 × 3 matrix, but a matrix of shape {:?} was given.",
            lattice_vectors.shape()
        );
        Ok(Self { lattice_vectors })
    }

    /// Returns the lattice vectors, one per row.
    pub fn lattice_vectors(&self) -> ArrayView2<f64> {
        self.lattice_vectors.view()
    }

    /// Returns the reciprocal lattice vectors $`\mathbf{b}_i`$, one per row, satisfying
    /// $`\mathbf{a}_i \cdot \mathbf{b}_j = 2\pi \delta_{ij}`$.
    pub fn reciprocal_vectors(&self) -> Result<Array2<f64>, anyhow::Error> {
        let inv = self.lattice_vectors.inv()?;
        Ok(inv.t().mapv(|v| 2.0 * PI * v))
    }

    /// Generates a uniform, $`\Gamma`$-including Monkhorst--Pack grid of k-points.
    ///
    /// The fractional coordinates along axis $`i`$ are $`0, 1/n_i, \ldots, (n_i - 1)/n_i`$, and
    /// the grid is enumerated with the last axis running fastest.
    ///
    /// # Arguments
    ///
    /// * `mesh` - The number of k-points along each reciprocal axis.
    ///
    /// # Returns
    ///
    /// An $`N_k \times 3`$ array of absolute k-point coordinates.
    pub fn make_kpts(&self, mesh: [usize; 3]) -> Result<Array2<f64>, anyhow::Error> {
        ensure!(
            mesh.iter().all(|n| *n > 0),
            "Every k-point mesh dimension must be positive, but {mesh:?} was given."
        );
        let b = self.reciprocal_vectors()?;
        let fraction = |i: usize, n: usize| -> Result<f64, anyhow::Error> {
            let i = i
                .to_f64()
                .ok_or_else(|| format_err!("Unable to convert `{i}` to `f64`."))?;
            let n = n
                .to_f64()
                .ok_or_else(|| format_err!("Unable to convert `{n}` to `f64`."))?;
            Ok(i / n)
        };
        let nk = mesh.iter().product::<usize>();
        let mut scaled = Array2::<f64>::zeros((nk, 3));
        for (row, (i, j, k)) in iproduct!(0..mesh[0], 0..mesh[1], 0..mesh[2]).enumerate() {
            scaled[(row, 0)] = fraction(i, mesh[0])?;
            scaled[(row, 1)] = fraction(j, mesh[1])?;
            scaled[(row, 2)] = fraction(k, mesh[2])?;
        }
        Ok(scaled.dot(&b))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lattice vectors (rows):")?;
        for row in self.lattice_vectors.rows() {
            writeln!(f, "  [{:+.7}, {:+.7}, {:+.7}]", row[0], row[1], row[2])?;
        }
        Ok(())
    }
}

// ---------
// Reference
// ---------

/// A structure to manage a converged k-point restricted Hartree--Fock reference.
#[derive(Builder, Clone)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct KRHFReference<'a, T>
where
    T: OrbitalScalar,
{
    /// The periodic lattice.
    cell: Cell,

    /// The k-points, one per row, in absolute coordinates.
    kpts: Array2<f64>,

    /// The molecular-orbital coefficients at every k-point. Atomic orbitals run along the rows,
    /// and every atomic-orbital basis is required to be linearly independent, so each matrix is
    /// square.
    #[builder(setter(custom))]
    mo_coeff: Vec<Array2<T>>,

    /// The molecular-orbital energies at every k-point.
    #[builder(setter(custom))]
    mo_energy: Vec<Array1<f64>>,

    /// The molecular-orbital occupation numbers at every k-point.
    #[builder(setter(custom))]
    mo_occ: Vec<Array1<f64>>,

    /// The density-fitting backend used for integral transformations.
    with_df: &'a dyn DensityFittingIntegrals<T>,
}

impl<'a, T> KRHFReferenceBuilder<'a, T>
where
    T: OrbitalScalar,
{
    pub fn mo_coeff(&mut self, cs: &[Array2<T>]) -> &mut Self {
        self.mo_coeff = Some(cs.to_vec());
        self
    }

    pub fn mo_energy(&mut self, es: &[Array1<f64>]) -> &mut Self {
        self.mo_energy = Some(es.to_vec());
        self
    }

    pub fn mo_occ(&mut self, occs: &[Array1<f64>]) -> &mut Self {
        self.mo_occ = Some(occs.to_vec());
        self
    }

    fn validate(&self) -> Result<(), String> {
        let kpts = self.kpts.as_ref().ok_or("No k-points found.".to_string())?;
        if kpts.ncols() != 3 {
            return Err(format!(
                "K-points must have three Cartesian components, but {} were found.",
                kpts.ncols()
            ));
        }
        let nk = kpts.nrows();
        if nk == 0 {
            return Err("At least one k-point is required.".to_string());
        }
        let mo_coeff = self
            .mo_coeff
            .as_ref()
            .ok_or("No MO coefficients found.".to_string())?;
        let mo_energy = self
            .mo_energy
            .as_ref()
            .ok_or("No MO energies found.".to_string())?;
        let mo_occ = self
            .mo_occ
            .as_ref()
            .ok_or("No MO occupations found.".to_string())?;

        let nks = mo_coeff.len() == nk && mo_energy.len() == nk && mo_occ.len() == nk;
        if !nks {
            log::error!(
                "Mismatched numbers of k-points: {nk} k-points, {} coefficient matrices, {} energy vectors, {} occupation vectors.",
                mo_coeff.len(),
                mo_energy.len(),
                mo_occ.len()
            );
            return Err("K-point reference validation failed.".to_string());
        }

        let shapes = mo_coeff
            .iter()
            .zip(mo_energy.iter())
            .zip(mo_occ.iter())
            .enumerate()
            .all(|(k, ((c, e), occ))| {
                let consistent =
                    c.is_square() && c.ncols() == e.len() && c.ncols() == occ.len();
                if !consistent {
                    log::error!(
                        "At k-point {k}, MO coefficients of shape {:?}, {} MO energies, and {} MO occupations are inconsistent.",
                        c.dim(),
                        e.len(),
                        occ.len()
                    );
                }
                consistent
            });
        if !shapes {
            return Err("K-point reference validation failed.".to_string());
        }

        // Doubly occupied orbitals must fit within the orbital space at every k-point.
        let occupations = mo_occ
            .iter()
            .zip(mo_coeff.iter())
            .enumerate()
            .all(|(k, (occ, c))| {
                let physical = occ.iter().all(|n| n.is_finite() && *n >= 0.0);
                let fits = (occ.sum() / 2.0)
                    .floor()
                    .to_usize()
                    .map(|ndocc| ndocc <= c.ncols())
                    .unwrap_or(false);
                if !physical || !fits {
                    log::error!(
                        "At k-point {k}, occupation numbers {occ} do not describe at most {} doubly occupied orbitals.",
                        c.ncols()
                    );
                }
                physical && fits
            });
        if occupations {
            Ok(())
        } else {
            Err("K-point reference validation failed.".to_string())
        }
    }
}

impl<'a, T> KRHFReference<'a, T>
where
    T: OrbitalScalar,
{
    /// Returns a builder to construct a new [`KRHFReference`].
    pub fn builder() -> KRHFReferenceBuilder<'a, T> {
        KRHFReferenceBuilder::default()
    }

    /// Returns the periodic lattice.
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    /// Returns the k-points, one per row.
    pub fn kpts(&self) -> ArrayView2<f64> {
        self.kpts.view()
    }

    /// Returns the number of k-points.
    pub fn nkpts(&self) -> usize {
        self.kpts.nrows()
    }

    /// Returns the molecular-orbital coefficients at every k-point.
    pub fn mo_coeff(&self) -> &Vec<Array2<T>> {
        &self.mo_coeff
    }

    /// Returns the molecular-orbital energies at every k-point.
    pub fn mo_energy(&self) -> &Vec<Array1<f64>> {
        &self.mo_energy
    }

    /// Returns the molecular-orbital occupation numbers at every k-point.
    pub fn mo_occ(&self) -> &Vec<Array1<f64>> {
        &self.mo_occ
    }

    /// Returns the density-fitting backend.
    pub fn with_df(&self) -> &'a dyn DensityFittingIntegrals<T> {
        self.with_df
    }

    /// Boolean indicating if the molecular-orbital coefficients are complex-valued.
    pub fn has_complex_orbitals(&self) -> bool {
        T::IS_COMPLEX
    }
}

// =========
// Functions
// =========

/// Retrieves the number of doubly occupied orbitals at every k-point.
///
/// The occupation numbers at each k-point are summed, halved, and truncated.
pub fn k_nocc<T: OrbitalScalar>(reference: &KRHFReference<'_, T>) -> Vec<usize> {
    reference
        .mo_occ
        .iter()
        .map(|occ| (occ.sum() / 2.0).floor().to_usize().unwrap_or(0))
        .collect()
}

/// Retrieves the number of atomic orbitals at every k-point.
pub fn k_nmo<T: OrbitalScalar>(reference: &KRHFReference<'_, T>) -> Vec<usize> {
    reference.mo_coeff.iter().map(|c| c.nrows()).collect()
}
