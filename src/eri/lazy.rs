//! Lazy integral providers transforming only the requested orbital subspaces.

use anyhow;
use duplicate::duplicate_item;
use ndarray::{s, Array4, ArrayView1};
use num_complex::Complex;

use crate::eri::{
    KEriCore, OvPattern, PermutationSymmetry, PhysEriBlocks, EIGHTFOLD_SYMMETRY,
    FOURFOLD_SYMMETRY,
};
use crate::kpoints::{KConservation, DEFAULT_KCONSERV_THRESHOLD};
use crate::reference::{KRHFReference, OrbitalScalar};

/// Lazy provider declaring the four-fold permutational symmetry
/// $`\langle pq|rs \rangle = \langle qp|sr \rangle = \langle rs|pq \rangle^* = \langle sr|qp \rangle^*`$
/// of integrals over complex Bloch orbitals.
#[derive(Clone)]
pub struct PhysEri4<'a, T: OrbitalScalar> {
    core: KEriCore<'a, T>,
}

/// Lazy provider declaring the eight-fold permutational symmetry of integrals over real
/// orbitals.
///
/// Real orbitals only arise at time-reversal-invariant k-points, so this provider is only
/// meaningful when every k-point is its own inverse modulo the reciprocal lattice.
#[derive(Clone)]
pub struct PhysEri8<'a, T: OrbitalScalar> {
    core: KEriCore<'a, T>,
}

#[duplicate_item(
    provider_;
    [ PhysEri4 ];
    [ PhysEri8 ];
)]
impl<'a, T: OrbitalScalar> provider_<'a, T> {
    /// Prepares a lazy provider for a reference. No integrals are transformed until blocks
    /// are requested.
    pub fn open_lazy(reference: &'a KRHFReference<'a, T>) -> Result<Self, anyhow::Error> {
        Self::open_lazy_with_threshold(reference, DEFAULT_KCONSERV_THRESHOLD)
    }

    /// Prepares a lazy provider for a reference, using a custom threshold for the
    /// momentum-conservation map.
    pub fn open_lazy_with_threshold(
        reference: &'a KRHFReference<'a, T>,
        kconserv_threshold: f64,
    ) -> Result<Self, anyhow::Error> {
        Ok(Self {
            core: KEriCore::new(reference, kconserv_threshold)?,
        })
    }

    /// Returns the reference this provider was built from.
    pub fn reference(&self) -> &'a KRHFReference<'a, T> {
        self.core.reference()
    }
}

#[duplicate_item(
    [
        provider_ [ PhysEri4 ]
        symmetries_ [ FOURFOLD_SYMMETRY ]
    ]
    [
        provider_ [ PhysEri8 ]
        symmetries_ [ EIGHTFOLD_SYMMETRY ]
    ]
)]
impl<'a, T: OrbitalScalar> PhysEriBlocks for provider_<'a, T> {
    fn nocc(&self) -> &[usize] {
        &self.core.nocc
    }

    fn nmo(&self) -> &[usize] {
        &self.core.nmo
    }

    fn nkpts(&self) -> usize {
        self.core.kconserv.nkpts()
    }

    fn kconserv(&self) -> &KConservation {
        &self.core.kconserv
    }

    fn symmetries(&self) -> &'static [PermutationSymmetry] {
        &symmetries_
    }

    fn mo_energies(&self, k_occ: usize, k_vir: usize) -> (ArrayView1<f64>, ArrayView1<f64>) {
        self.core.mo_energies(k_occ, k_vir)
    }

    fn calc_block(
        &self,
        pattern: &OvPattern,
        k: [usize; 4],
    ) -> Result<Array4<Complex<f64>>, anyhow::Error> {
        if !self.core.kconserv.conserves(k) {
            return Ok(self.zero_block(pattern, k));
        }
        let mo_coeff = self.core.reference.mo_coeff();
        let coeffs = [0, 1, 2, 3].map(|i| {
            let c = &mo_coeff[k[i]];
            let r = pattern.0[i].range(self.core.nocc[k[i]], c.ncols());
            c.slice(s![.., r])
        });
        self.core.ao2mo_k(coeffs, k)
    }
}
