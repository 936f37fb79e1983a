//! Eager integral provider holding every momentum-conserving block in full.

use std::collections::HashMap;

use anyhow;
use ndarray::{s, Array4, ArrayView1};
use num_complex::Complex;

use crate::eri::{KEriCore, OvPattern, PermutationSymmetry, PhysEriBlocks, NO_SYMMETRY};
use crate::kpoints::{KConservation, DEFAULT_KCONSERV_THRESHOLD};
use crate::reference::{KRHFReference, OrbitalScalar};

/// Structure holding the physicist-ordered integrals over all molecular orbitals for every
/// momentum-conserving k-point quadruple.
///
/// Construction transforms $`N_k^3`$ full blocks up front, so memory grows as
/// $`N_k^3 n_\mathrm{mo}^4`$.
#[derive(Clone)]
pub struct PhysEri<'a, T: OrbitalScalar> {
    core: KEriCore<'a, T>,

    /// The full integral tensors, keyed by the k-point indices of the four axes.
    full: HashMap<[usize; 4], Array4<Complex<f64>>>,
}

impl<'a, T: OrbitalScalar> PhysEri<'a, T> {
    /// Transforms the full integrals for a reference.
    pub fn open(reference: &'a KRHFReference<'a, T>) -> Result<Self, anyhow::Error> {
        Self::open_with_threshold(reference, DEFAULT_KCONSERV_THRESHOLD)
    }

    /// Transforms the full integrals for a reference, using a custom threshold for the
    /// momentum-conservation map.
    pub fn open_with_threshold(
        reference: &'a KRHFReference<'a, T>,
        kconserv_threshold: f64,
    ) -> Result<Self, anyhow::Error> {
        let core = KEriCore::new(reference, kconserv_threshold)?;
        let mut full = HashMap::new();
        for k in core.kconserv.quadruples() {
            let coeffs = k.map(|ki| reference.mo_coeff()[ki].view());
            full.insert(k, core.ao2mo_k(coeffs, k)?);
        }
        Ok(Self { core, full })
    }

    /// Returns the reference this provider was built from.
    pub fn reference(&self) -> &'a KRHFReference<'a, T> {
        self.core.reference()
    }
}

impl<'a, T: OrbitalScalar> PhysEriBlocks for PhysEri<'a, T> {
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
        &NO_SYMMETRY
    }

    fn mo_energies(&self, k_occ: usize, k_vir: usize) -> (ArrayView1<f64>, ArrayView1<f64>) {
        self.core.mo_energies(k_occ, k_vir)
    }

    fn calc_block(
        &self,
        pattern: &OvPattern,
        k: [usize; 4],
    ) -> Result<Array4<Complex<f64>>, anyhow::Error> {
        match self.full.get(&k) {
            Some(tensor) => {
                let r = [0, 1, 2, 3]
                    .map(|i| pattern.0[i].range(self.core.nocc[k[i]], self.core.nmo[k[i]]));
                Ok(tensor
                    .slice(s![r[0].clone(), r[1].clone(), r[2].clone(), r[3].clone()])
                    .to_owned())
            }
            None => Ok(self.zero_block(pattern, k)),
        }
    }
}
