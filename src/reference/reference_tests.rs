use std::f64::consts::PI;

use ndarray::{array, Array1, Array2, Array4, ArrayView1, ArrayView2};
// Local equivalent of `ndarray_linalg::assert_close_l2!`, whose `$crate::$close` expansion
// no longer parses on current rustc.
macro_rules! assert_close_l2 {
    ($test:expr, $truth:expr, $tol:expr) => {
        ndarray_linalg::close_l2($test, $truth, $tol);
    };
}
use num_complex::Complex;

use crate::reference::{k_nmo, k_nocc, Cell, DensityFittingIntegrals, KRHFReference};

struct ZeroIntegrals;

impl<T> DensityFittingIntegrals<T> for ZeroIntegrals {
    fn ao2mo(
        &self,
        mo_coeffs: [ArrayView2<'_, T>; 4],
        _: [ArrayView1<'_, f64>; 4],
    ) -> Result<Array4<Complex<f64>>, anyhow::Error> {
        Ok(Array4::zeros(mo_coeffs.map(|c| c.ncols())))
    }
}

fn gamma_only() -> (Cell, Array2<f64>) {
    let cell = Cell::new(Array2::<f64>::eye(3) * 4.0).unwrap();
    let kpts = cell.make_kpts([1, 1, 1]).unwrap();
    (cell, kpts)
}

#[test]
fn test_reference_cell_reciprocal_vectors() {
    let cell = Cell::new(array![[3.0, 0.0, 0.0], [1.0, 2.0, 0.0], [0.0, 0.5, 5.0]]).unwrap();
    let b = cell.reciprocal_vectors().unwrap();
    let ab = cell.lattice_vectors().dot(&b.t());
    assert_close_l2!(&ab, &(Array2::<f64>::eye(3) * (2.0 * PI)), 1e-12);

    assert!(Cell::new(Array2::<f64>::eye(2)).is_err());
}

#[test]
fn test_reference_cell_make_kpts() {
    let cell = Cell::new(Array2::<f64>::eye(3) * 4.0).unwrap();

    let kpts = cell.make_kpts([2, 1, 1]).unwrap();
    assert_eq!(kpts.dim(), (2, 3));
    assert_close_l2!(&kpts, &array![[0.0, 0.0, 0.0], [PI / 4.0, 0.0, 0.0]], 1e-14);

    // The last mesh axis runs fastest.
    let kpts = cell.make_kpts([2, 1, 2]).unwrap();
    let q = PI / 4.0;
    assert_close_l2!(
        &kpts,
        &array![[0.0, 0.0, 0.0], [0.0, 0.0, q], [q, 0.0, 0.0], [q, 0.0, q]],
        1e-14
    );

    assert!(cell.make_kpts([2, 0, 1]).is_err());
}

#[test]
fn test_reference_builder_validation() {
    let (cell, kpts) = gamma_only();
    let backend = ZeroIntegrals;
    let c = Array2::<f64>::eye(3);
    let e = array![-1.0, 0.5, 1.0];
    let occ = array![2.0, 0.0, 0.0];

    let reference = KRHFReference::<f64>::builder()
        .cell(cell.clone())
        .kpts(kpts.clone())
        .mo_coeff(&[c.clone()])
        .mo_energy(&[e.clone()])
        .mo_occ(&[occ.clone()])
        .with_df(&backend)
        .build()
        .unwrap();
    assert_eq!(reference.nkpts(), 1);
    assert!(!reference.has_complex_orbitals());

    // Two coefficient matrices for one k-point.
    assert!(KRHFReference::<f64>::builder()
        .cell(cell.clone())
        .kpts(kpts.clone())
        .mo_coeff(&[c.clone(), c.clone()])
        .mo_energy(&[e.clone()])
        .mo_occ(&[occ.clone()])
        .with_df(&backend)
        .build()
        .is_err());

    // Energies inconsistent with the coefficient columns.
    assert!(KRHFReference::<f64>::builder()
        .cell(cell.clone())
        .kpts(kpts.clone())
        .mo_coeff(&[c.clone()])
        .mo_energy(&[array![-1.0, 0.5]])
        .mo_occ(&[occ.clone()])
        .with_df(&backend)
        .build()
        .is_err());

    // Fewer orbitals than basis functions.
    assert!(KRHFReference::<f64>::builder()
        .cell(cell.clone())
        .kpts(kpts.clone())
        .mo_coeff(&[Array2::<f64>::zeros((4, 3))])
        .mo_energy(&[e.clone()])
        .mo_occ(&[occ.clone()])
        .with_df(&backend)
        .build()
        .is_err());

    // More doubly occupied orbitals than orbitals.
    assert!(KRHFReference::<f64>::builder()
        .cell(cell.clone())
        .kpts(kpts.clone())
        .mo_coeff(&[c.clone()])
        .mo_energy(&[e.clone()])
        .mo_occ(&[array![4.0, 4.0, 0.0]])
        .with_df(&backend)
        .build()
        .is_err());

    // Negative occupation numbers.
    assert!(KRHFReference::<f64>::builder()
        .cell(cell.clone())
        .kpts(kpts.clone())
        .mo_coeff(&[c.clone()])
        .mo_energy(&[e.clone()])
        .mo_occ(&[array![2.0, -2.0, 2.0]])
        .with_df(&backend)
        .build()
        .is_err());

    // Every orbital doubly occupied is still a valid reference.
    assert!(KRHFReference::<f64>::builder()
        .cell(cell.clone())
        .kpts(kpts.clone())
        .mo_coeff(&[c.clone()])
        .mo_energy(&[e.clone()])
        .mo_occ(&[array![2.0, 2.0, 2.0]])
        .with_df(&backend)
        .build()
        .is_ok());

    // K-points with two components.
    assert!(KRHFReference::<f64>::builder()
        .cell(cell.clone())
        .kpts(Array2::zeros((1, 2)))
        .mo_coeff(&[c.clone()])
        .mo_energy(&[e.clone()])
        .mo_occ(&[occ.clone()])
        .with_df(&backend)
        .build()
        .is_err());

    // Missing backend.
    assert!(KRHFReference::<f64>::builder()
        .cell(cell)
        .kpts(kpts)
        .mo_coeff(&[c])
        .mo_energy(&[e])
        .mo_occ(&[occ])
        .build()
        .is_err());
}

#[test]
fn test_reference_nocc_nmo() {
    let cell = Cell::new(Array2::<f64>::eye(3) * 4.0).unwrap();
    let kpts = cell.make_kpts([2, 1, 1]).unwrap();
    let backend = ZeroIntegrals;
    let c = Array2::<Complex<f64>>::eye(4);
    let e = Array1::linspace(-1.0, 1.0, 4);

    let reference = KRHFReference::<Complex<f64>>::builder()
        .cell(cell)
        .kpts(kpts)
        .mo_coeff(&[c.clone(), c])
        .mo_energy(&[e.clone(), e])
        .mo_occ(&[array![2.0, 2.0, 0.0, 0.0], array![2.0, 1.0, 0.0, 0.0]])
        .with_df(&backend)
        .build()
        .unwrap();
    assert!(reference.has_complex_orbitals());
    assert_eq!(k_nocc(&reference), vec![2, 1]);
    assert_eq!(k_nmo(&reference), vec![4, 4]);
}
