//! Reshaping and normalisation of TDHF eigenvectors into excitation amplitudes.

use std::error::Error;
use std::fmt;

use anyhow::{self, ensure};
use ndarray::{Array6, ArrayView2, Axis};
use num_complex::Complex;


/// Error arising from k-point references whose orbital spaces differ between k-points.
#[derive(Debug, Clone)]
pub struct UnsupportedConfigurationError(pub String);

impl fmt::Display for UnsupportedConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported configuration: {}", self.0)
    }
}

impl Error for UnsupportedConfigurationError {}

/// Reshapes TDHF eigenvectors into normalised amplitude tensors.
///
/// Every eigenvector is split into its $`\mathbf{X}`$ and $`\mathbf{Y}`$ components over the
/// ordered k-point pairs, and scaled such that
/// ```math
///     2 \left( \sum |X|^2 - \sum |Y|^2 \right) = 1,
/// ```
/// the factor of two accounting for the spin degeneracy of restricted references.
///
/// # Arguments
///
/// * `vectors` - The eigenvectors, one per column.
/// * `nocc` - The number of occupied orbitals at every k-point.
/// * `nmo` - The number of orbitals at every k-point.
///
/// # Returns
///
/// The amplitudes with axes `(root, x/y, k_occ, k_vir, occupied, virtual)`.
///
/// # Errors
///
/// Errors with an [`UnsupportedConfigurationError`] if the occupied or total orbital counts
/// vary between k-points, and with a plain error if the vectors have the wrong length or a
/// root has a non-positive norm.
pub fn vector_to_amplitudes(
    vectors: ArrayView2<Complex<f64>>,
    nocc: &[usize],
    nmo: &[usize],
) -> Result<Array6<Complex<f64>>, anyhow::Error> {
    ensure!(
        !nocc.is_empty() && nocc.len() == nmo.len(),
        "Orbital counts for {} and {} k-points cannot describe the same reference.",
        nocc.len(),
        nmo.len()
    );
    if nocc.iter().any(|n| *n != nocc[0]) {
        return Err(UnsupportedConfigurationError(format!(
            "varying occupation numbers across k-points ({nocc:?})"
        ))
        .into());
    }
    if nmo.iter().any(|n| *n != nmo[0]) {
        return Err(UnsupportedConfigurationError(format!(
            "varying AO spaces across k-points ({nmo:?})"
        ))
        .into());
    }

    let nk = nocc.len();
    let (nocc, nmo) = (nocc[0], nmo[0]);
    ensure!(nmo >= nocc, "{nocc} occupied orbitals exceed {nmo} orbitals.");
    let nvir = nmo - nocc;
    let nroots = vectors.ncols();
    ensure!(
        vectors.nrows() == 2 * nk * nk * nocc * nvir,
        "Eigenvectors of length {} do not match {nk} k-points with {nocc} occupied and {nvir} virtual orbitals.",
        vectors.nrows()
    );

    let mut amplitudes = Array6::from_shape_vec(
        [2, nk, nk, nocc, nvir, nroots],
        vectors.iter().cloned().collect(),
    )?;
    let squared = amplitudes
        .mapv(|v| v.norm_sqr())
        .sum_axis(Axis(4))
        .sum_axis(Axis(3))
        .sum_axis(Axis(2))
        .sum_axis(Axis(1));
    let norms = (&squared.row(0) - &squared.row(1)) * 2.0;
    if let Some((root, norm)) = norms.iter().enumerate().find(|(_, norm)| !(**norm > 0.0)) {
        anyhow::bail!(
            "Root {root} has a non-positive norm {norm:.3e} and cannot be normalised as an excitation."
        );
    }
    let scale = norms.mapv(|norm| Complex::new(norm.sqrt().recip(), 0.0));
    amplitudes *= &scale;

    Ok(amplitudes
        .permuted_axes([5, 0, 1, 2, 3, 4])
        .as_standard_layout()
        .into_owned())
}
