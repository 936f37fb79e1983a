//! Driver for k-point time-dependent restricted Hartree--Fock calculations.

use std::fmt;

use anyhow::{self, format_err};
use derive_builder::Builder;
use ndarray::{Array1, Array6};
use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::amplitudes::vector_to_amplitudes;
use crate::drivers::KTdhfDriver;
use crate::eri::{verify_symmetries, EriSymmetry, KEri, PhysEriBlocks};
use crate::io::diagnostics::{DiagnosticSink, LogSink};
use crate::io::format::{
    ktdhf_output, ktdhf_warn, log_subtitle, log_title, nice_bool, KTdhfOutput,
};
use crate::kpoints::DEFAULT_KCONSERV_THRESHOLD;
use crate::matrix::build_matrix;
use crate::reference::{KRHFReference, OrbitalScalar};
use crate::solver::{eig, EigenDriver};


const HARTREE_TO_EV: f64 = 27.211386245988;

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

fn default_symmetry_threshold() -> f64 {
    1e-8
}
fn default_kconserv_threshold() -> f64 {
    DEFAULT_KCONSERV_THRESHOLD
}

/// Structure containing control parameters for k-point TDRHF calculations.
#[derive(Clone, Builder, Debug, PartialEq, Serialize, Deserialize)]
pub struct TdrhfParams {
    /// The dense eigensolver.
    #[builder(default)]
    #[serde(default)]
    pub driver: EigenDriver,

    /// The number of lowest excitations to keep. If `None`, all excitations are kept.
    #[builder(default = "None")]
    #[serde(default)]
    pub nroots: Option<usize>,

    /// Boolean indicating if the permutational symmetries declared by the integral provider are
    /// checked against directly calculated blocks before the response matrix is built.
    #[builder(default = "false")]
    #[serde(default)]
    pub verify_eri_symmetry: bool,

    /// The maximum tolerated deviation when verifying integral symmetries.
    #[builder(default = "default_symmetry_threshold()")]
    #[serde(default = "default_symmetry_threshold")]
    pub symmetry_threshold: f64,

    /// The threshold for deciding if a k-point combination is a reciprocal lattice vector.
    #[builder(default = "default_kconserv_threshold()")]
    #[serde(default = "default_kconserv_threshold")]
    pub kconserv_threshold: f64,
}

impl TdrhfParams {
    /// Returns a builder to construct a [`TdrhfParams`] structure.
    pub fn builder() -> TdrhfParamsBuilder {
        TdrhfParamsBuilder::default()
    }
}

impl Default for TdrhfParams {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("Unable to construct a default `TdrhfParams`.")
    }
}

impl fmt::Display for TdrhfParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Eigensolver driver: {}", self.driver)?;
        writeln!(
            f,
            "Number of roots: {}",
            self.nroots
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string())
        )?;
        writeln!(
            f,
            "Momentum conservation threshold: {:.3e}",
            self.kconserv_threshold
        )?;
        writeln!(
            f,
            "Verify integral symmetries: {}",
            nice_bool(self.verify_eri_symmetry)
        )?;
        if self.verify_eri_symmetry {
            writeln!(
                f,
                "Integral symmetry threshold: {:.3e}",
                self.symmetry_threshold
            )?;
        }
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Kernel
// ------

/// Enumerated type for the inputs accepted by [`kernel`].
pub enum KernelInput<'a, T: OrbitalScalar> {
    /// Variant for a reference, from which an integral provider is selected by orbital type.
    Model(&'a KRHFReference<'a, T>),

    /// Variant for an already-built integral provider, used as is.
    Eri(KEri<'a, T>),
}

/// Structure containing the outcome of [`kernel`].
pub struct TdrhfSolution<'a, T: OrbitalScalar> {
    /// The excitation energies, in ascending order.
    pub eigenvalues: Array1<Complex<f64>>,

    /// The normalised amplitudes with axes `(root, x/y, k_occ, k_vir, occupied, virtual)`.
    pub amplitudes: Array6<Complex<f64>>,

    /// The integral provider, if requested.
    pub eri: Option<KEri<'a, T>>,
}

/// Calculates TDRHF excitation energies and amplitudes.
///
/// # Arguments
///
/// * `input` - Either a reference or an already-built integral provider.
/// * `driver` - The eigensolver, or `None` for the default.
/// * `nroots` - The number of lowest excitations to keep, or `None` for all.
/// * `return_eri` - Boolean indicating if the integral provider is returned for reuse.
/// * `sink` - The receiver of diagnostic notices.
pub fn kernel<'a, T: OrbitalScalar>(
    input: KernelInput<'a, T>,
    driver: Option<EigenDriver>,
    nroots: Option<usize>,
    return_eri: bool,
    sink: &dyn DiagnosticSink,
) -> Result<TdrhfSolution<'a, T>, anyhow::Error> {
    let eri = match input {
        KernelInput::Model(reference) => {
            KEri::select(reference, DEFAULT_KCONSERV_THRESHOLD, sink)?
        }
        KernelInput::Eri(eri) => eri,
    };
    let (eigenvalues, amplitudes) = solve(&eri, driver.unwrap_or_default(), nroots)?;
    Ok(TdrhfSolution {
        eigenvalues,
        amplitudes,
        eri: if return_eri { Some(eri) } else { None },
    })
}

/// Builds the response matrix of a provider, diagonalises it, and reshapes the eigenvectors.
fn solve<P: PhysEriBlocks + ?Sized>(
    eri: &P,
    driver: EigenDriver,
    nroots: Option<usize>,
) -> Result<(Array1<Complex<f64>>, Array6<Complex<f64>>), anyhow::Error> {
    let matrix = build_matrix(eri)?;
    let (eigenvalues, eigenvectors) = eig(matrix.view(), driver, nroots)?.into_parts();
    let amplitudes = vector_to_amplitudes(eigenvectors.view(), eri.nocc(), eri.nmo())?;
    Ok((eigenvalues, amplitudes))
}

// ------
// Result
// ------

/// Structure to contain k-point TDRHF results.
#[derive(Clone, Builder, Debug)]
pub struct TdrhfResult {
    /// The control parameters used to obtain this set of results.
    parameters: TdrhfParams,

    /// The symmetry class of the integral provider used.
    eri_symmetry: EriSymmetry,

    /// The excitation energies, in ascending order.
    eigenvalues: Array1<Complex<f64>>,

    /// The normalised amplitudes with axes `(root, x/y, k_occ, k_vir, occupied, virtual)`.
    amplitudes: Array6<Complex<f64>>,
}

impl TdrhfResult {
    fn builder() -> TdrhfResultBuilder {
        TdrhfResultBuilder::default()
    }

    /// Returns the control parameters used to obtain this set of results.
    pub fn parameters(&self) -> &TdrhfParams {
        &self.parameters
    }

    /// Returns the symmetry class of the integral provider used.
    pub fn eri_symmetry(&self) -> EriSymmetry {
        self.eri_symmetry
    }

    /// Returns the excitation energies.
    pub fn eigenvalues(&self) -> &Array1<Complex<f64>> {
        &self.eigenvalues
    }

    /// Returns the normalised amplitudes.
    pub fn amplitudes(&self) -> &Array6<Complex<f64>> {
        &self.amplitudes
    }
}

impl fmt::Display for TdrhfResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Integral symmetry: {}", self.eri_symmetry)?;
        writeln!(f, "Number of roots: {}", self.eigenvalues.len())?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>6}  {:>16}  {:>16}  {:>12}",
            "Root", "Energy (Eh)", "Energy (eV)", "Im (Eh)"
        )?;
        for (i, value) in self.eigenvalues.iter().enumerate() {
            writeln!(
                f,
                "{i:>6}  {:>+16.10}  {:>+16.8}  {:>+12.3e}",
                value.re,
                value.re * HARTREE_TO_EV,
                value.im
            )?;
        }
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// Driver for k-point TDRHF calculations with an explicitly constructed response matrix.
///
/// The integral provider is selected on the first run and cached in the driver, so that
/// subsequent runs only repeat the matrix assembly and diagonalisation.
#[derive(Clone, Builder)]
pub struct TdrhfDriver<'a, T: OrbitalScalar> {
    /// The control parameters.
    #[builder(default)]
    parameters: TdrhfParams,

    /// The converged k-point reference.
    reference: &'a KRHFReference<'a, T>,

    /// The integral provider. If `None`, one is selected by orbital type on the next run.
    #[builder(default = "None")]
    eri: Option<KEri<'a, T>>,

    /// The receiver of diagnostic notices from the numerical routines.
    #[builder(default = "&LogSink as &dyn DiagnosticSink")]
    sink: &'a dyn DiagnosticSink,

    /// The result of the calculation.
    #[builder(setter(skip), default = "None")]
    result: Option<TdrhfResult>,
}

impl<'a, T: OrbitalScalar> TdrhfDriver<'a, T> {
    /// Returns a builder to construct a [`TdrhfDriver`] structure.
    pub fn builder() -> TdrhfDriverBuilder<'a, T> {
        TdrhfDriverBuilder::default()
    }

    /// Returns the control parameters.
    pub fn parameters(&self) -> &TdrhfParams {
        &self.parameters
    }

    /// Returns a mutable reference to the control parameters. Changes take effect on the next
    /// run.
    pub fn parameters_mut(&mut self) -> &mut TdrhfParams {
        &mut self.parameters
    }

    /// Returns the cached integral provider, if any.
    pub fn eri(&self) -> Option<&KEri<'a, T>> {
        self.eri.as_ref()
    }

    /// Replaces the cached integral provider. Passing `None` makes the next run select a new
    /// provider by orbital type.
    pub fn set_eri(&mut self, eri: Option<KEri<'a, T>>) {
        self.eri = eri;
    }

    /// Runs the calculation and returns copies of the excitation energies and amplitudes.
    ///
    /// Every call redoes the matrix assembly and diagonalisation, reusing the cached integral
    /// provider.
    pub fn compute(
        &mut self,
    ) -> Result<(Array1<Complex<f64>>, Array6<Complex<f64>>), anyhow::Error> {
        self.run()?;
        let result = self.result()?;
        Ok((result.eigenvalues.clone(), result.amplitudes.clone()))
    }

    fn calculate_excitations(&mut self) -> Result<(), anyhow::Error> {
        self.result = None;

        log_title("k-point TDRHF (explicit response matrix)");
        ktdhf_output!("");
        self.parameters.log_output_display();

        let eri = match self.eri.take() {
            Some(eri) => eri,
            None => KEri::select(
                self.reference,
                self.parameters.kconserv_threshold,
                self.sink,
            )?,
        };
        ktdhf_output!("Integral provider: {}", eri.symmetry());
        ktdhf_output!("Number of k-points: {}", eri.nkpts());
        ktdhf_output!("");

        let outcome = self.solve_with(&eri);
        let eri_symmetry = eri.symmetry();
        self.eri = Some(eri);
        let (eigenvalues, amplitudes) = outcome?;

        if let Some(nroots) = self.parameters.nroots {
            if nroots > eigenvalues.len() {
                ktdhf_warn!(
                    "{nroots} roots were requested, but only {} are available.",
                    eigenvalues.len()
                );
            }
        }
        let unstable = eigenvalues
            .iter()
            .filter(|v| v.im.abs() > self.parameters.symmetry_threshold)
            .count();
        if unstable > 0 {
            ktdhf_warn!(
                "{unstable} root(s) have complex excitation energies. The reference may be unstable."
            );
        }

        let result = TdrhfResult::builder()
            .parameters(self.parameters.clone())
            .eri_symmetry(eri_symmetry)
            .eigenvalues(eigenvalues)
            .amplitudes(amplitudes)
            .build()?;
        log_subtitle("Excitation energies");
        ktdhf_output!("");
        result.log_output_display();
        self.result = Some(result);
        Ok(())
    }

    fn solve_with(
        &self,
        eri: &KEri<'a, T>,
    ) -> Result<(Array1<Complex<f64>>, Array6<Complex<f64>>), anyhow::Error> {
        if self.parameters.verify_eri_symmetry {
            verify_symmetries(eri, self.parameters.symmetry_threshold)?;
            ktdhf_output!("Declared integral symmetries verified.");
            ktdhf_output!("");
        }
        solve(eri, self.parameters.driver, self.parameters.nroots)
    }
}

impl<'a, T: OrbitalScalar> KTdhfDriver for TdrhfDriver<'a, T> {
    type Params = TdrhfParams;

    type Outcome = TdrhfResult;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No k-point TDRHF results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.calculate_excitations()
    }
}
