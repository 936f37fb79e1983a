//! Assembly of the full TDHF response matrix.

use anyhow;
use ndarray::{s, Array2};
use num_complex::Complex;

use crate::eri::blocks::TdhfMatrixBlocks;
use crate::eri::{MknjPattern, PhysEriBlocks};


/// Builds the full TDHF response matrix
/// ```math
///     \begin{pmatrix}
///         \mathbf{A} & \mathbf{B} \\
///         -\mathbf{B}^* & -\mathbf{A}^*
///     \end{pmatrix}
/// ```
/// over all ordered k-point pairs, where
/// ```math
///     A_{mk,nj} = \delta_{mn}\delta_{kj}(\varepsilon_k - \varepsilon_m)
///         + 2\langle kn|mj \rangle - \langle kn|jm \rangle,
///     \quad
///     B_{mk,nj} = 2\langle kj|mn \rangle - \langle kj|nm \rangle,
/// ```
/// with $`m, n`$ occupied and $`k, j`$ virtual, and all integrals divided by the number of
/// k-points. The lower blocks are assembled from their own integral patterns rather than by
/// conjugating the upper ones.
///
/// # Arguments
///
/// * `provider` - The integral provider.
///
/// # Returns
///
/// The square response matrix of dimension $`2 \sum_{\mathbf{k}_1 \mathbf{k}_2}
/// n_\mathrm{occ}(\mathbf{k}_1) n_\mathrm{vir}(\mathbf{k}_2)`$.
pub fn build_matrix<P: PhysEriBlocks + ?Sized>(
    provider: &P,
) -> Result<Array2<Complex<f64>>, anyhow::Error> {
    let mut blocks = TdhfMatrixBlocks::new(provider);
    let diag = blocks.tdhf_diag();
    let mut merged = |pattern: &str| -> Result<Array2<Complex<f64>>, anyhow::Error> {
        blocks.eri_mknj(&pattern.parse::<MknjPattern>()?)
    };
    let two = Complex::new(2.0, 0.0);

    let a_coulomb = merged("knmj")?;
    let a_exchange = merged("knjm")?;
    let b_coulomb = merged("kjmn")?;
    let b_exchange = merged("kjnm")?;
    let c_coulomb = merged("mnkj")?;
    let c_exchange = merged("mnjk")?;
    let d_coulomb = merged("mjkn")?;
    let d_exchange = merged("mjnk")?;

    let a = &diag + &(a_coulomb * two) - &a_exchange;
    let b = b_coulomb * two - &b_exchange;
    let c = c_exchange - &(c_coulomb * two);
    let d = d_exchange - &(d_coulomb * two) - &diag;

    let n = diag.nrows();
    let mut matrix = Array2::<Complex<f64>>::zeros((2 * n, 2 * n));
    matrix.slice_mut(s![..n, ..n]).assign(&a);
    matrix.slice_mut(s![..n, n..]).assign(&b);
    matrix.slice_mut(s![n.., ..n]).assign(&c);
    matrix.slice_mut(s![n.., n..]).assign(&d);
    Ok(matrix)
}
