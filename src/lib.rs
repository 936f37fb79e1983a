//! # ktdhf: Time-Dependent Hartree--Fock for Periodic Systems
//!
//! `ktdhf` solves the linear-response time-dependent restricted Hartree--Fock (TDRHF) equations
//! for periodic systems sampled on a k-point grid, by explicitly constructing and fully
//! diagonalising the response matrix
//! ```math
//!     \begin{pmatrix}
//!         \mathbf{A} & \mathbf{B} \\
//!         -\mathbf{B}^* & -\mathbf{A}^*
//!     \end{pmatrix}
//!     \begin{pmatrix} \mathbf{X} \\ \mathbf{Y} \end{pmatrix}
//!     = \omega
//!     \begin{pmatrix} \mathbf{X} \\ \mathbf{Y} \end{pmatrix}
//! ```
//! over all ordered pairs of k-points. The crate provides:
//! - a momentum-conservation map over k-point quadruples ([`kpoints`]),
//! - the contract for converged k-point references and their density-fitting integral
//!   backends, together with a seeded synthetic system for testing ([`reference`]),
//! - three interchangeable providers of two-electron integral blocks in the Bloch
//!   molecular-orbital basis, without symmetry, with the four-fold symmetry of complex orbitals,
//!   and with the eight-fold symmetry of real orbitals ([`eri`]),
//! - assembly of the response matrix ([`matrix`]), its diagonalisation ([`solver`]), and the
//!   normalisation of the resulting amplitudes ([`amplitudes`]), and
//! - a one-shot [`kernel`](drivers::tdrhf::kernel) and a stateful
//!   [`TdrhfDriver`](drivers::tdrhf::TdrhfDriver) ([`drivers`]).
//!
//! Self-consistent-field solvers and integral libraries are not part of this crate. A converged
//! reference is consumed through [`reference::KRHFReference`], and integrals are obtained through
//! any implementation of [`reference::DensityFittingIntegrals`].
//!
//! ## Getting started
//!
//! To use `ktdhf` in your Rust project, simply add this crate to your project's `Cargo.toml`.
//!
//! ### Linear algebra backend
//!
//! There are six features defining six different ways a linear algebra backend can be configured.
//! These are inherited from the
//! [`ndarray-linalg`](https://docs.rs/ndarray-linalg/latest/ndarray_linalg/) crate. One
//! (and only one) of these must be enabled:
//! - `openblas-static`: Downloads, builds OpenBLAS, and links statically
//! - `openblas-system`: Finds and links existing OpenBLAS in the system
//! - `netlib-static`: Downloads, builds LAPACK, and links statically
//! - `netlib-system`: Finds and links existing LAPACK in the system
//! - `intel-mkl-static`: Finds and links existing static Intel MKL in the system, or downloads and
//!   links statically if not found
//! - `intel-mkl-system`: Finds and links existing shared Intel MKL in the system
//!
//! ### Composite
//! - `standard`: Enables the `openblas-static` feature (default)
//!
//! ## Logging
//!
//! Drivers write their main output to the `ktdhf-output` log target through the [`log`] facade.
//! Numerical routines never log directly. They report through an injected
//! [`DiagnosticSink`](io::diagnostics::DiagnosticSink) instead.
//!
//! ## License
//!
//! GNU Lesser General Public License v3.0.

pub mod amplitudes;
pub mod drivers;
pub mod eri;
pub mod io;
pub mod kpoints;
pub mod matrix;
pub mod reference;
pub mod solver;
