//! Diagonalisation of the non-Hermitian TDHF response matrix.

use std::fmt;
use std::str::FromStr;

use anyhow::{self, ensure, format_err};
use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::Eig;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "solver_tests.rs"]
mod solver_tests;

/// Enumerated type for the available dense eigensolvers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EigenDriver {
    /// Variant for LAPACK's general non-Hermitian eigensolver `?geev`.
    #[default]
    #[serde(rename = "eig")]
    Eig,
}

impl FromStr for EigenDriver {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eig" => Ok(EigenDriver::Eig),
            _ => Err(format_err!("Unknown eigensolver driver `{s}`.")),
        }
    }
}

impl fmt::Display for EigenDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EigenDriver::Eig => write!(f, "eig"),
        }
    }
}

/// Structure containing sorted eigenvalues and the corresponding eigenvectors (as columns).
#[derive(Clone, Debug)]
pub struct EigenSolution {
    /// The eigenvalues.
    eigenvalues: Array1<Complex<f64>>,

    /// The eigenvectors, one per column.
    eigenvectors: Array2<Complex<f64>>,
}

impl EigenSolution {
    /// Returns the eigenvalues.
    pub fn eigenvalues(&'_ self) -> ArrayView1<'_, Complex<f64>> {
        self.eigenvalues.view()
    }

    /// Returns the eigenvectors.
    pub fn eigenvectors(&'_ self) -> ArrayView2<'_, Complex<f64>> {
        self.eigenvectors.view()
    }

    /// Consumes the solution and returns the eigenvalues and eigenvectors.
    pub fn into_parts(self) -> (Array1<Complex<f64>>, Array2<Complex<f64>>) {
        (self.eigenvalues, self.eigenvectors)
    }

    /// Returns the number of eigenpairs.
    pub fn len(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Boolean indicating if there are no eigenpairs.
    pub fn is_empty(&self) -> bool {
        self.eigenvalues.is_empty()
    }
}

/// Fully diagonalises a square matrix.
///
/// # Arguments
///
/// * `matrix` - The matrix.
/// * `driver` - The eigensolver.
///
/// # Returns
///
/// All eigenpairs, sorted in ascending order of the real parts of the eigenvalues and then of
/// the imaginary parts.
pub fn diagonalise(
    matrix: ArrayView2<Complex<f64>>,
    driver: EigenDriver,
) -> Result<EigenSolution, anyhow::Error> {
    ensure!(
        matrix.is_square(),
        "Only square matrices can be diagonalised, but a matrix of shape {:?} was given.",
        matrix.dim()
    );
    let (eigvals, eigvecs) = match driver {
        EigenDriver::Eig => matrix.eig()?,
    };

    let mut indices = (0..eigvals.len()).collect_vec();
    indices.sort_by(|i, j| {
        eigvals[*i]
            .re
            .total_cmp(&eigvals[*j].re)
            .then_with(|| eigvals[*i].im.total_cmp(&eigvals[*j].im))
    });

    Ok(EigenSolution {
        eigenvalues: eigvals.select(Axis(0), &indices),
        eigenvectors: eigvecs.select(Axis(1), &indices),
    })
}

/// Solves the TDHF eigenvalue problem and keeps the physical roots.
///
/// The spectrum of the response matrix is symmetric about zero, so only the upper half of the
/// sorted eigenpairs is retained.
///
/// # Arguments
///
/// * `matrix` - The response matrix.
/// * `driver` - The eigensolver.
/// * `nroots` - The number of lowest physical roots to keep. All of them are kept if `None`
///   or if more roots than available are requested.
pub fn eig(
    matrix: ArrayView2<Complex<f64>>,
    driver: EigenDriver,
    nroots: Option<usize>,
) -> Result<EigenSolution, anyhow::Error> {
    let solution = diagonalise(matrix, driver)?;
    let n = solution.len();
    let start = n / 2;
    let end = nroots.map_or(n, |nroots| (start + nroots).min(n));
    let indices = (start..end).collect_vec();
    Ok(EigenSolution {
        eigenvalues: solution.eigenvalues.select(Axis(0), &indices),
        eigenvectors: solution.eigenvectors.select(Axis(1), &indices),
    })
}
