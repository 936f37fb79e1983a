//! Two-electron integral blocks over Bloch molecular orbitals.
//!
//! Three interchangeable providers are available:
//! - [`full::PhysEri`] transforms every momentum-conserving k-point quadruple eagerly and
//!   serves blocks by slicing;
//! - [`lazy::PhysEri4`] transforms only the requested occupied/virtual slices on demand and
//!   declares the four-fold permutational symmetry of complex orbitals;
//! - [`lazy::PhysEri8`] does the same with the eight-fold symmetry of real orbitals.
//!
//! All integrals are kept in physicist ordering $`\langle pq|rs \rangle = (pr|qs)`$.

use std::error::Error;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use anyhow::{self, bail, ensure};
use log::Level;
use ndarray::{Array4, ArrayView1, ArrayView2, Axis};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::io::diagnostics::DiagnosticSink;
use crate::kpoints::KConservation;
use crate::reference::{k_nmo, k_nocc, KRHFReference, OrbitalScalar};

pub mod blocks;
pub mod full;
pub mod lazy;

use full::PhysEri;
use lazy::{PhysEri4, PhysEri8};


// ================
// Pattern handling
// ================

/// Error arising from malformed `ov` or `mknj` patterns.
#[derive(Debug, Clone)]
pub struct PatternParsingError(pub String);

impl fmt::Display for PatternParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern parsing error: {}.", self.0)
    }
}

impl Error for PatternParsingError {}

/// Enumerated type for the orbital subspace spanned by one axis of an integral block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrbitalSpace {
    /// Variant for the doubly occupied orbitals.
    Occupied,

    /// Variant for the virtual orbitals.
    Virtual,
}

impl OrbitalSpace {
    /// Returns the orbital index range of this subspace.
    ///
    /// # Arguments
    ///
    /// * `nocc` - The number of occupied orbitals.
    /// * `nmo` - The total number of orbitals.
    pub fn range(&self, nocc: usize, nmo: usize) -> Range<usize> {
        match self {
            OrbitalSpace::Occupied => 0..nocc,
            OrbitalSpace::Virtual => nocc..nmo,
        }
    }

    /// Returns the dimension of this subspace.
    pub fn size(&self, nocc: usize, nmo: usize) -> usize {
        self.range(nocc, nmo).len()
    }

    fn letter(&self) -> char {
        match self {
            OrbitalSpace::Occupied => 'o',
            OrbitalSpace::Virtual => 'v',
        }
    }
}

/// Structure labelling the orbital subspace of each of the four axes of a physicist-ordered
/// integral block, *e.g.* `"ovov"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OvPattern(pub [OrbitalSpace; 4]);

impl OvPattern {
    /// Returns the pattern obtained by reordering the axes, such that axis `i` of the result is
    /// axis `permutation[i]` of `self`.
    pub fn permuted(&self, permutation: &[usize; 4]) -> Self {
        Self(permute(&self.0, permutation))
    }

    /// Iterates over all sixteen patterns.
    pub fn all() -> impl Iterator<Item = OvPattern> {
        (0..16usize).map(|bits| {
            let space = |i: usize| {
                if (bits >> (3 - i)) & 1 == 0 {
                    OrbitalSpace::Occupied
                } else {
                    OrbitalSpace::Virtual
                }
            };
            OvPattern([space(0), space(1), space(2), space(3)])
        })
    }
}

impl FromStr for OvPattern {
    type Err = PatternParsingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spaces = s
            .chars()
            .map(|c| match c {
                'o' => Ok(OrbitalSpace::Occupied),
                'v' => Ok(OrbitalSpace::Virtual),
                _ => Err(PatternParsingError(format!(
                    "unknown orbital subspace `{c}` in `{s}`"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let spaces: [OrbitalSpace; 4] = spaces.try_into().map_err(|_| {
            PatternParsingError(format!("`{s}` does not contain exactly four letters"))
        })?;
        Ok(Self(spaces))
    }
}

impl fmt::Display for OvPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().map(|s| s.letter()).collect::<String>())
    }
}

const MKNJ: [char; 4] = ['m', 'k', 'n', 'j'];

/// Structure describing a block request in `mknj` notation.
///
/// Letter `i` of the pattern names the output index carried by axis `i` of the
/// physicist-ordered integral tensor. The indices `m` and `n` run over occupied orbitals, and
/// `k` and `j` over virtual orbitals. The requested block is laid out with rows `(m, k)` and
/// columns `(n, j)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MknjPattern([usize; 4]);

impl MknjPattern {
    /// Returns the output label (`0` for `m`, `1` for `k`, `2` for `n`, `3` for `j`) of every
    /// integral axis.
    pub fn labels(&self) -> [usize; 4] {
        self.0
    }

    /// Returns the orbital subspaces of the integral axes.
    pub fn ov_pattern(&self) -> OvPattern {
        OvPattern(self.0.map(|label| {
            if label % 2 == 0 {
                OrbitalSpace::Occupied
            } else {
                OrbitalSpace::Virtual
            }
        }))
    }

    /// Returns the axis permutation bringing the integral axes into `(m, k, n, j)` order.
    pub fn output_axes(&self) -> [usize; 4] {
        let mut axes = [0; 4];
        self.0
            .iter()
            .enumerate()
            .for_each(|(axis, label)| axes[*label] = axis);
        axes
    }

    /// Distributes a k-point quadruple given as `(k_m, k_k, k_n, k_j)` onto the integral axes.
    pub fn integral_kpoints(&self, k: [usize; 4]) -> [usize; 4] {
        self.0.map(|label| k[label])
    }
}

impl FromStr for MknjPattern {
    type Err = PatternParsingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let labels = s
            .chars()
            .map(|c| {
                MKNJ.iter().position(|l| *l == c).ok_or_else(|| {
                    PatternParsingError(format!("unknown `mknj` letter `{c}` in `{s}`"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let labels: [usize; 4] = labels.try_into().map_err(|_| {
            PatternParsingError(format!("`{s}` does not contain exactly four letters"))
        })?;
        let mut seen = [false; 4];
        labels.iter().for_each(|l| seen[*l] = true);
        if seen.iter().all(|x| *x) {
            Ok(Self(labels))
        } else {
            Err(PatternParsingError(format!(
                "`{s}` is not a permutation of `mknj`"
            )))
        }
    }
}

impl fmt::Display for MknjPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().map(|l| MKNJ[*l]).collect::<String>())
    }
}

// ==========
// Symmetries
// ==========

/// Structure describing a permutational symmetry of physicist-ordered integrals:
/// the tensor with axes reordered by `permutation` (and complex-conjugated if `conjugate`)
/// equals the tensor at the correspondingly reordered k-points and orbital subspaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermutationSymmetry {
    /// Axis `i` of the related block is axis `permutation[i]` of the original block.
    pub permutation: [usize; 4],

    /// Boolean indicating if the related block is the complex conjugate.
    pub conjugate: bool,
}

const fn sym(permutation: [usize; 4], conjugate: bool) -> PermutationSymmetry {
    PermutationSymmetry {
        permutation,
        conjugate,
    }
}

/// The identity only.
pub const NO_SYMMETRY: [PermutationSymmetry; 1] = [sym([0, 1, 2, 3], false)];

/// Symmetries of integrals over complex orbitals.
pub const FOURFOLD_SYMMETRY: [PermutationSymmetry; 4] = [
    sym([0, 1, 2, 3], false),
    sym([1, 0, 3, 2], false),
    sym([2, 3, 0, 1], true),
    sym([3, 2, 1, 0], true),
];

/// Symmetries of integrals over real orbitals.
pub const EIGHTFOLD_SYMMETRY: [PermutationSymmetry; 8] = [
    sym([0, 1, 2, 3], false),
    sym([1, 0, 3, 2], false),
    sym([2, 3, 0, 1], false),
    sym([3, 2, 1, 0], false),
    sym([2, 1, 0, 3], false),
    sym([3, 0, 1, 2], false),
    sym([0, 3, 2, 1], false),
    sym([1, 2, 3, 0], false),
];

/// Reorders a four-element array such that element `i` of the result is element
/// `permutation[i]` of the input.
pub(crate) fn permute<T: Copy>(x: &[T; 4], permutation: &[usize; 4]) -> [T; 4] {
    permutation.map(|p| x[p])
}

/// Enumerated type for the symmetry classes of the integral providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EriSymmetry {
    /// Variant for the eager provider without symmetry.
    None,

    /// Variant for the lazy provider with the four-fold symmetry of complex orbitals.
    FourFold,

    /// Variant for the lazy provider with the eight-fold symmetry of real orbitals.
    EightFold,
}

impl fmt::Display for EriSymmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EriSymmetry::None => write!(f, "none (eager full transformation)"),
            EriSymmetry::FourFold => write!(f, "4-fold (complex orbitals)"),
            EriSymmetry::EightFold => write!(f, "8-fold (real orbitals)"),
        }
    }
}

// =================
// Trait definitions
// =================

/// Trait for providers of physicist-ordered two-electron integral blocks over Bloch molecular
/// orbitals.
pub trait PhysEriBlocks {
    /// Returns the number of occupied orbitals at every k-point.
    fn nocc(&self) -> &[usize];

    /// Returns the number of orbitals at every k-point.
    fn nmo(&self) -> &[usize];

    /// Returns the number of k-points.
    fn nkpts(&self) -> usize;

    /// Returns the momentum-conservation map.
    fn kconserv(&self) -> &KConservation;

    /// Returns the permutational symmetries the provider's blocks are declared to obey.
    fn symmetries(&self) -> &'static [PermutationSymmetry];

    /// Returns the occupied orbital energies at `k_occ` and the virtual orbital energies at
    /// `k_vir`.
    fn mo_energies(&self, k_occ: usize, k_vir: usize) -> (ArrayView1<f64>, ArrayView1<f64>);

    /// Calculates an integral block.
    ///
    /// # Arguments
    ///
    /// * `pattern` - The orbital subspaces of the four axes.
    /// * `k` - The k-point indices of the four axes.
    ///
    /// # Returns
    ///
    /// The block, which is zero if `k` does not conserve momentum.
    fn calc_block(
        &self,
        pattern: &OvPattern,
        k: [usize; 4],
    ) -> Result<Array4<Complex<f64>>, anyhow::Error>;

    /// Returns the shape of an integral block.
    fn block_shape(&self, pattern: &OvPattern, k: [usize; 4]) -> [usize; 4] {
        let (nocc, nmo) = (self.nocc(), self.nmo());
        [0, 1, 2, 3].map(|i| pattern.0[i].size(nocc[k[i]], nmo[k[i]]))
    }

    /// Returns a zero block of the appropriate shape.
    fn zero_block(&self, pattern: &OvPattern, k: [usize; 4]) -> Array4<Complex<f64>> {
        Array4::zeros(self.block_shape(pattern, k))
    }
}

// ====================
// Shared provider data
// ====================

/// Structure holding the data shared by all integral providers.
#[derive(Clone)]
pub(crate) struct KEriCore<'a, T: OrbitalScalar> {
    reference: &'a KRHFReference<'a, T>,
    kconserv: KConservation,
    nocc: Vec<usize>,
    nmo: Vec<usize>,
}

impl<'a, T: OrbitalScalar> KEriCore<'a, T> {
    pub(crate) fn new(
        reference: &'a KRHFReference<'a, T>,
        kconserv_threshold: f64,
    ) -> Result<Self, anyhow::Error> {
        let kconserv =
            KConservation::new(reference.cell(), reference.kpts(), kconserv_threshold)?;
        Ok(Self {
            reference,
            kconserv,
            nocc: k_nocc(reference),
            nmo: k_nmo(reference),
        })
    }

    pub(crate) fn reference(&self) -> &'a KRHFReference<'a, T> {
        self.reference
    }

    pub(crate) fn mo_energies(
        &self,
        k_occ: usize,
        k_vir: usize,
    ) -> (ArrayView1<f64>, ArrayView1<f64>) {
        let e = self.reference.mo_energy();
        (
            e[k_occ].slice_axis(Axis(0), (..self.nocc[k_occ]).into()),
            e[k_vir].slice_axis(Axis(0), (self.nocc[k_vir]..).into()),
        )
    }

    /// Transforms integrals into a physicist-ordered molecular-orbital block.
    ///
    /// The backend works in chemist ordering, so the second and third coefficient matrices and
    /// k-points are swapped on the way in, and the middle axes on the way out.
    pub(crate) fn ao2mo_k(
        &self,
        coeffs: [ArrayView2<'_, T>; 4],
        k: [usize; 4],
    ) -> Result<Array4<Complex<f64>>, anyhow::Error> {
        let kpts = self.reference.kpts();
        let expected = (
            coeffs[0].ncols(),
            coeffs[2].ncols(),
            coeffs[1].ncols(),
            coeffs[3].ncols(),
        );
        let eri = self.reference.with_df().ao2mo(
            [coeffs[0], coeffs[2], coeffs[1], coeffs[3]],
            [kpts.row(k[0]), kpts.row(k[2]), kpts.row(k[1]), kpts.row(k[3])],
        )?;
        ensure!(
            eri.dim() == expected,
            "The integral backend returned a block of shape {:?}, but {expected:?} was expected.",
            eri.dim()
        );
        Ok(eri.permuted_axes([0, 2, 1, 3]))
    }
}

// ===============
// Tagged provider
// ===============

/// Enumerated type wrapping one of the three integral providers.
#[derive(Clone)]
pub enum KEri<'a, T: OrbitalScalar> {
    /// Variant for the eager provider without symmetry.
    NoSymmetry(PhysEri<'a, T>),

    /// Variant for the lazy four-fold-symmetric provider.
    FourFold(PhysEri4<'a, T>),

    /// Variant for the lazy eight-fold-symmetric provider.
    EightFold(PhysEri8<'a, T>),
}

impl<'a, T: OrbitalScalar> KEri<'a, T> {
    /// Constructs a provider of the requested symmetry class.
    ///
    /// # Arguments
    ///
    /// * `reference` - The k-point restricted reference.
    /// * `symmetry` - The symmetry class.
    /// * `kconserv_threshold` - The threshold for the momentum-conservation map.
    pub fn open(
        reference: &'a KRHFReference<'a, T>,
        symmetry: EriSymmetry,
        kconserv_threshold: f64,
    ) -> Result<Self, anyhow::Error> {
        match symmetry {
            EriSymmetry::None => Ok(KEri::NoSymmetry(PhysEri::open_with_threshold(
                reference,
                kconserv_threshold,
            )?)),
            EriSymmetry::FourFold => Ok(KEri::FourFold(PhysEri4::open_lazy_with_threshold(
                reference,
                kconserv_threshold,
            )?)),
            EriSymmetry::EightFold => Ok(KEri::EightFold(PhysEri8::open_lazy_with_threshold(
                reference,
                kconserv_threshold,
            )?)),
        }
    }

    /// Constructs the provider appropriate for the orbitals of a reference: four-fold for
    /// complex orbitals and eight-fold for real orbitals.
    pub fn select(
        reference: &'a KRHFReference<'a, T>,
        kconserv_threshold: f64,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self, anyhow::Error> {
        if reference.has_complex_orbitals() {
            sink.notice(Level::Debug, "4-fold symmetry used (complex orbitals)");
            Self::open(reference, EriSymmetry::FourFold, kconserv_threshold)
        } else {
            sink.notice(Level::Debug, "8-fold symmetry used (real orbitals)");
            Self::open(reference, EriSymmetry::EightFold, kconserv_threshold)
        }
    }

    /// Returns the symmetry class of the wrapped provider.
    pub fn symmetry(&self) -> EriSymmetry {
        match self {
            KEri::NoSymmetry(_) => EriSymmetry::None,
            KEri::FourFold(_) => EriSymmetry::FourFold,
            KEri::EightFold(_) => EriSymmetry::EightFold,
        }
    }

    /// Returns the reference the wrapped provider was built from.
    pub fn reference(&self) -> &'a KRHFReference<'a, T> {
        match self {
            KEri::NoSymmetry(eri) => eri.reference(),
            KEri::FourFold(eri) => eri.reference(),
            KEri::EightFold(eri) => eri.reference(),
        }
    }

    fn inner(&self) -> &dyn PhysEriBlocks {
        match self {
            KEri::NoSymmetry(eri) => eri,
            KEri::FourFold(eri) => eri,
            KEri::EightFold(eri) => eri,
        }
    }
}

impl<'a, T: OrbitalScalar> PhysEriBlocks for KEri<'a, T> {
    fn nocc(&self) -> &[usize] {
        self.inner().nocc()
    }

    fn nmo(&self) -> &[usize] {
        self.inner().nmo()
    }

    fn nkpts(&self) -> usize {
        self.inner().nkpts()
    }

    fn kconserv(&self) -> &KConservation {
        self.inner().kconserv()
    }

    fn symmetries(&self) -> &'static [PermutationSymmetry] {
        self.inner().symmetries()
    }

    fn mo_energies(&self, k_occ: usize, k_vir: usize) -> (ArrayView1<f64>, ArrayView1<f64>) {
        self.inner().mo_energies(k_occ, k_vir)
    }

    fn calc_block(
        &self,
        pattern: &OvPattern,
        k: [usize; 4],
    ) -> Result<Array4<Complex<f64>>, anyhow::Error> {
        self.inner().calc_block(pattern, k)
    }
}

// ============
// Verification
// ============

/// Verifies that a provider's blocks obey its declared permutational symmetries.
///
/// For every momentum-conserving quadruple and every orbital-subspace pattern, each declared
/// symmetry is checked by calculating the related block directly and comparing it with the
/// reordered (and, where declared, conjugated) original block. This costs as many block
/// calculations as there are symmetries, so it is only meant for validation runs.
///
/// # Arguments
///
/// * `provider` - The provider to verify.
/// * `threshold` - The maximum tolerated absolute deviation of any element.
pub fn verify_symmetries<P: PhysEriBlocks + ?Sized>(
    provider: &P,
    threshold: f64,
) -> Result<(), anyhow::Error> {
    for k in provider.kconserv().quadruples() {
        for pattern in OvPattern::all() {
            let block = provider.calc_block(&pattern, k)?;
            for symmetry in provider.symmetries() {
                let related_k = permute(&k, &symmetry.permutation);
                let related_pattern = pattern.permuted(&symmetry.permutation);
                let direct = provider.calc_block(&related_pattern, related_k)?;
                let reordered = block.view().permuted_axes(symmetry.permutation);
                let max_diff = direct
                    .iter()
                    .zip(reordered.iter())
                    .map(|(d, r)| {
                        let r = if symmetry.conjugate { r.conj() } else { *r };
                        (d - r).norm()
                    })
                    .fold(0.0, f64::max);
                if max_diff > threshold {
                    bail!(
                        "Block {pattern} at k-points {k:?} violates the declared symmetry {:?}{}: maximum deviation {max_diff:.3e} > {threshold:.3e}.",
                        symmetry.permutation,
                        if symmetry.conjugate { " (conjugated)" } else { "" }
                    );
                }
            }
        }
    }
    Ok(())
}
