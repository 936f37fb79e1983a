//! Memoised assembly of the integral and orbital-energy-difference blocks entering the TDHF
//! response matrix.

use std::collections::HashMap;

use anyhow::{self, format_err};
use itertools::Itertools;
use ndarray::{s, Array1, Array2, Array4};
use num_complex::Complex;
use num_traits::ToPrimitive;

use crate::eri::{permute, MknjPattern, OvPattern, PhysEriBlocks};
use crate::kpoints::loop_kk;

#[cfg(test)]
#[path = "blocks_tests.rs"]
mod blocks_tests;

/// Structure holding a memoisation session over an integral provider.
///
/// The memo is keyed by orbital-subspace pattern and k-point quadruple. Every freshly
/// calculated block is stored together with all blocks related to it by the provider's
/// declared permutational symmetries, so the provider itself stays immutable and can be shared
/// between sessions.
pub struct TdhfMatrixBlocks<'p, P: PhysEriBlocks + ?Sized> {
    provider: &'p P,
    memo: HashMap<(OvPattern, [usize; 4]), Array4<Complex<f64>>>,
}

impl<'p, P: PhysEriBlocks + ?Sized> TdhfMatrixBlocks<'p, P> {
    /// Starts a new session with an empty memo.
    pub fn new(provider: &'p P) -> Self {
        Self {
            provider,
            memo: HashMap::new(),
        }
    }

    /// Returns the underlying provider.
    pub fn provider(&self) -> &'p P {
        self.provider
    }

    /// Returns the number of blocks currently held in the memo.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Retrieves an integral block, calculating it only if neither it nor any block related to
    /// it by symmetry has been calculated before.
    ///
    /// # Arguments
    ///
    /// * `pattern` - The orbital subspaces of the four axes.
    /// * `k` - The k-point indices of the four axes.
    pub fn eri_ov(
        &mut self,
        pattern: &OvPattern,
        k: [usize; 4],
    ) -> Result<Array4<Complex<f64>>, anyhow::Error> {
        if let Some(block) = self.memo.get(&(*pattern, k)) {
            return Ok(block.clone());
        }
        let block = self.provider.calc_block(pattern, k)?;
        for symmetry in self.provider.symmetries() {
            let key = (
                pattern.permuted(&symmetry.permutation),
                permute(&k, &symmetry.permutation),
            );
            let related = block.view().permuted_axes(symmetry.permutation);
            let related = if symmetry.conjugate {
                related.mapv(|v| v.conj())
            } else {
                related.to_owned()
            };
            self.memo.insert(key, related);
        }
        Ok(block)
    }

    /// Retrieves an integral block for one k-point quadruple in `mknj` notation.
    ///
    /// # Arguments
    ///
    /// * `pattern` - The `mknj` pattern.
    /// * `k` - The k-point indices of `m`, `k`, `n`, and `j`, in this order.
    ///
    /// # Returns
    ///
    /// The block with rows running over `(m, k)` and columns over `(n, j)`.
    pub fn eri_mknj_k(
        &mut self,
        pattern: &MknjPattern,
        k: [usize; 4],
    ) -> Result<Array2<Complex<f64>>, anyhow::Error> {
        let block = self.eri_ov(&pattern.ov_pattern(), pattern.integral_kpoints(k))?;
        let ordered = block.permuted_axes(pattern.output_axes());
        let (m, kk, n, j) = ordered.dim();
        Ok(Array2::from_shape_vec(
            (m * kk, n * j),
            ordered.iter().cloned().collect(),
        )?)
    }

    /// Assembles the k-point-merged block of a pattern over all ordered k-point pairs, divided
    /// by the number of k-points.
    pub fn eri_mknj(
        &mut self,
        pattern: &MknjPattern,
    ) -> Result<Array2<Complex<f64>>, anyhow::Error> {
        let nk = self.provider.nkpts();
        self.eri_mknj_pairs(pattern, loop_kk(nk), loop_kk(nk))
    }

    /// Assembles the k-point-merged block of a pattern over chosen k-point pairs, divided by
    /// the number of k-points.
    ///
    /// # Arguments
    ///
    /// * `pattern` - The `mknj` pattern.
    /// * `pairs_row` - The `(k_m, k_k)` pairs along the rows.
    /// * `pairs_column` - The `(k_n, k_j)` pairs along the columns.
    pub fn eri_mknj_pairs(
        &mut self,
        pattern: &MknjPattern,
        pairs_row: impl IntoIterator<Item = (usize, usize)>,
        pairs_column: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Array2<Complex<f64>>, anyhow::Error> {
        let pairs_row = pairs_row.into_iter().collect_vec();
        let pairs_column = pairs_column.into_iter().collect_vec();
        let row_offsets = self.pair_offsets(&pairs_row);
        let column_offsets = self.pair_offsets(&pairs_column);
        let nrows = row_offsets.last().copied().unwrap_or(0);
        let ncols = column_offsets.last().copied().unwrap_or(0);

        let mut merged = Array2::<Complex<f64>>::zeros((nrows, ncols));
        for (r, (k1, k2)) in pairs_row.iter().enumerate() {
            for (c, (k3, k4)) in pairs_column.iter().enumerate() {
                let block = self.eri_mknj_k(pattern, [*k1, *k2, *k3, *k4])?;
                merged
                    .slice_mut(s![
                        row_offsets[r]..row_offsets[r + 1],
                        column_offsets[c]..column_offsets[c + 1]
                    ])
                    .assign(&block);
            }
        }
        let nk = self
            .provider
            .nkpts()
            .to_f64()
            .ok_or_else(|| format_err!("Unable to convert the number of k-points to `f64`."))?;
        merged.mapv_inplace(|v| v / nk);
        Ok(merged)
    }

    /// Returns the diagonal matrix of orbital-energy differences
    /// $`\varepsilon_a(\mathbf{k}_2) - \varepsilon_i(\mathbf{k}_1)`$, with the occupied index
    /// $`i`$ at `k1` running slowest and the virtual index $`a`$ at `k2` fastest.
    pub fn tdhf_diag_k(&self, k1: usize, k2: usize) -> Array2<Complex<f64>> {
        let (e_occ, e_vir) = self.provider.mo_energies(k1, k2);
        let differences = e_occ
            .iter()
            .flat_map(|ei| e_vir.iter().map(move |ea| Complex::new(ea - ei, 0.0)))
            .collect::<Array1<_>>();
        Array2::from_diag(&differences)
    }

    /// Returns the block-diagonal matrix of orbital-energy differences over all ordered
    /// k-point pairs.
    pub fn tdhf_diag(&self) -> Array2<Complex<f64>> {
        self.tdhf_diag_pairs(loop_kk(self.provider.nkpts()))
    }

    /// Returns the block-diagonal matrix of orbital-energy differences over chosen
    /// `(k_occ, k_vir)` pairs.
    pub fn tdhf_diag_pairs(
        &self,
        pairs: impl IntoIterator<Item = (usize, usize)>,
    ) -> Array2<Complex<f64>> {
        let differences = pairs
            .into_iter()
            .flat_map(|(k1, k2)| self.tdhf_diag_k(k1, k2).diag().to_vec())
            .collect::<Array1<_>>();
        Array2::from_diag(&differences)
    }

    /// Returns the cumulative row offsets of the blocks belonging to a list of k-point pairs,
    /// starting with zero.
    fn pair_offsets(&self, pairs: &[(usize, usize)]) -> Vec<usize> {
        let (nocc, nmo) = (self.provider.nocc(), self.provider.nmo());
        let mut offsets = Vec::with_capacity(pairs.len() + 1);
        offsets.push(0);
        pairs.iter().fold(0, |acc, (k_occ, k_vir)| {
            let next = acc + nocc[*k_occ] * (nmo[*k_vir] - nocc[*k_vir]);
            offsets.push(next);
            next
        });
        offsets
    }
}
