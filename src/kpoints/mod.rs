//! Momentum-conservation algebra over k-point indices.

use std::f64::consts::PI;

use anyhow::{self, ensure, format_err};
use itertools::iproduct;
use ndarray::{Array1, Array3, ArrayView2, ArrayView3};

use crate::reference::Cell;

#[cfg(test)]
#[path = "kpoints_tests.rs"]
mod kpoints_tests;

/// Default threshold for deciding whether a k-point combination is a reciprocal lattice vector.
pub const DEFAULT_KCONSERV_THRESHOLD: f64 = 1e-9;

// ==================
// Struct definitions
// ==================

/// Structure containing the momentum-conservation map of a set of k-points.
///
/// The map is stored in physicist ordering: for a two-electron integral
/// $`\langle \mathbf{k}_1 \mathbf{k}_2 | \mathbf{k}_3 \mathbf{k}_4 \rangle`$, the entry
/// `[k1, k2, k3]` holds the unique `k4` such that
/// $`\mathbf{k}_1 + \mathbf{k}_2 - \mathbf{k}_3 - \mathbf{k}_4`$ is a reciprocal lattice vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KConservation {
    map: Array3<usize>,
}

impl KConservation {
    /// Computes the momentum-conservation map.
    ///
    /// # Arguments
    ///
    /// * `cell` - The periodic lattice.
    /// * `kpts` - The k-points, one per row, in absolute coordinates.
    /// * `threshold` - Tolerance on the deviation of
    ///   $`\mathbf{a}_i \cdot \Delta\mathbf{k} / 2\pi`$ from an integer, summed over the three
    ///   lattice vectors.
    ///
    /// # Returns
    ///
    /// The conservation map, or an error if some triple has no conserving partner, which
    /// happens when the k-points do not form a group under addition modulo the reciprocal
    /// lattice.
    pub fn new(cell: &Cell, kpts: ArrayView2<f64>, threshold: f64) -> Result<Self, anyhow::Error> {
        ensure!(
            kpts.ncols() == 3,
            "K-points must have three Cartesian components, but {} were found.",
            kpts.ncols()
        );
        let nk = kpts.nrows();
        let a = cell.lattice_vectors();
        let mut map = Array3::<usize>::zeros((nk, nk, nk));
        for (k1, k2, k3) in loop_kkk(nk) {
            let partial = &kpts.row(k1) + &kpts.row(k2) - &kpts.row(k3);
            let k4 = (0..nk)
                .find(|&k4| {
                    let delta: Array1<f64> = &partial - &kpts.row(k4);
                    let projections = a.dot(&delta) / (2.0 * PI);
                    projections
                        .iter()
                        .map(|x| (x - x.round()).abs())
                        .sum::<f64>()
                        < threshold
                })
                .ok_or_else(|| {
                    format_err!(
                        "No k-point conserves momentum for the triple ({k1}, {k2}, {k3}). The k-point set is not closed under addition."
                    )
                })?;
            map[(k1, k2, k3)] = k4;
        }
        Ok(Self { map })
    }

    /// Returns the number of k-points.
    pub fn nkpts(&self) -> usize {
        self.map.dim().0
    }

    /// Returns the k-point index completing a conserving quadruple.
    pub fn get(&self, k1: usize, k2: usize, k3: usize) -> usize {
        self.map[(k1, k2, k3)]
    }

    /// Boolean indicating if a physicist-ordered quadruple conserves momentum.
    pub fn conserves(&self, k: [usize; 4]) -> bool {
        self.map[(k[0], k[1], k[2])] == k[3]
    }

    /// Returns the conservation map in physicist ordering.
    pub fn as_array(&self) -> ArrayView3<usize> {
        self.map.view()
    }

    /// Returns the conservation map in chemist ordering, *i.e.* entry `[k1, k2, k3]` holds
    /// `k4` such that $`\mathbf{k}_1 - \mathbf{k}_2 + \mathbf{k}_3 - \mathbf{k}_4`$ is a
    /// reciprocal lattice vector.
    pub fn to_chemist(&self) -> Array3<usize> {
        self.map.view().permuted_axes([0, 2, 1]).to_owned()
    }

    /// Iterates over all conserving quadruples in row-major order of the first three indices.
    pub fn quadruples(&self) -> impl Iterator<Item = [usize; 4]> + '_ {
        loop_kkk(self.nkpts()).map(|(k1, k2, k3)| [k1, k2, k3, self.get(k1, k2, k3)])
    }
}

// =========
// Functions
// =========

/// Enumerates all ordered k-point index triples, with the last index running fastest.
pub fn loop_kkk(nk: usize) -> impl Iterator<Item = (usize, usize, usize)> {
    iproduct!(0..nk, 0..nk, 0..nk)
}

/// Enumerates all ordered k-point index pairs, with the last index running fastest.
pub fn loop_kk(nk: usize) -> impl Iterator<Item = (usize, usize)> {
    iproduct!(0..nk, 0..nk)
}
