use itertools::iproduct;
use ndarray::{array, Array2, ArrayView2};
// Local equivalent of `ndarray_linalg::assert_close_l2!`, whose `$crate::$close` expansion
// no longer parses on current rustc.
macro_rules! assert_close_l2 {
    ($test:expr, $truth:expr, $tol:expr) => {
        ndarray_linalg::close_l2($test, $truth, $tol);
    };
}
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::reference::toy::{ToyDensityFitting, ToySystem};
use crate::reference::{k_nmo, k_nocc, DensityFittingIntegrals, OrbitalScalar};

fn max_abs_diff(a: ArrayView2<Complex<f64>>, b: ArrayView2<Complex<f64>>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).norm())
        .fold(0.0, f64::max)
}

#[test]
fn test_toy_system_orthonormal_orbitals() {
    let system = ToySystem::<Complex<f64>>::generate([3, 1, 1], 4, 2, 0.05, 1).unwrap();
    assert_eq!(system.kpts.nrows(), 3);
    for (c, e) in system.mo_coeff.iter().zip(system.mo_energy.iter()) {
        let c_h = c.t().mapv(|v| v.conj());
        assert_close_l2!(&c_h.dot(c), &Array2::<Complex<f64>>::eye(4), 1e-10);
        // Ascending energies with the occupied/virtual gap between indices 1 and 2.
        assert!(e.windows(2).into_iter().all(|w| w[0] <= w[1]));
        assert!(e[1] < 0.0 && e[2] > 0.0);
    }

    let reference = system.reference().unwrap();
    assert_eq!(k_nocc(&reference), vec![2, 2, 2]);
    assert_eq!(k_nmo(&reference), vec![4, 4, 4]);
    assert!(reference.has_complex_orbitals());
}

#[test]
fn test_toy_system_is_reproducible() {
    let a = ToySystem::<f64>::generate([2, 1, 1], 3, 1, 0.05, 7).unwrap();
    let b = ToySystem::<f64>::generate([2, 1, 1], 3, 1, 0.05, 7).unwrap();
    assert_eq!(a.mo_coeff, b.mo_coeff);
    assert_eq!(a.mo_energy, b.mo_energy);

    assert!(ToySystem::<f64>::generate([2, 1, 1], 3, 3, 0.05, 7).is_err());
    assert!(ToySystem::<f64>::generate([2, 1, 1], 3, 0, 0.05, 7).is_err());
}

fn check_chemist_symmetries<T: OrbitalScalar>(system: &ToySystem<T>) {
    let nk = system.kpts.nrows();
    let c = &system.mo_coeff;
    let kpt = |k: usize| system.kpts.row(k);
    for (k1, k2, k3, k4) in iproduct!(0..nk, 0..nk, 0..nk, 0..nk) {
        let eri = system
            .with_df
            .ao2mo(
                [c[k1].view(), c[k2].view(), c[k3].view(), c[k4].view()],
                [kpt(k1), kpt(k2), kpt(k3), kpt(k4)],
            )
            .unwrap();
        // (pq|rs) = (rs|pq)
        let swapped = system
            .with_df
            .ao2mo(
                [c[k3].view(), c[k4].view(), c[k1].view(), c[k2].view()],
                [kpt(k3), kpt(k4), kpt(k1), kpt(k2)],
            )
            .unwrap();
        // (pq|rs) = (qp|sr)*
        let transposed = system
            .with_df
            .ao2mo(
                [c[k2].view(), c[k1].view(), c[k4].view(), c[k3].view()],
                [kpt(k2), kpt(k1), kpt(k4), kpt(k3)],
            )
            .unwrap();
        let (n1, n2, n3, n4) = eri.dim();
        for (p, q, r, s) in iproduct!(0..n1, 0..n2, 0..n3, 0..n4) {
            assert!((eri[(p, q, r, s)] - swapped[(r, s, p, q)]).norm() < 1e-12);
            assert!((eri[(p, q, r, s)] - transposed[(q, p, s, r)].conj()).norm() < 1e-12);
        }
    }
}

#[test]
fn test_toy_density_fitting_complex_symmetries() {
    let system = ToySystem::<Complex<f64>>::generate([3, 1, 1], 3, 1, 0.1, 11).unwrap();
    check_chemist_symmetries(&system);
}

#[test]
fn test_toy_density_fitting_real_symmetries() {
    let system = ToySystem::<f64>::generate([2, 1, 1], 3, 1, 0.1, 13).unwrap();
    check_chemist_symmetries(&system);

    // Real factors and coefficients additionally give (pq|rs) = (qp|rs).
    let c = &system.mo_coeff;
    let kpt = |k: usize| system.kpts.row(k);
    let eri = system
        .with_df
        .ao2mo(
            [c[0].view(), c[1].view(), c[1].view(), c[0].view()],
            [kpt(0), kpt(1), kpt(1), kpt(0)],
        )
        .unwrap();
    let flipped = system
        .with_df
        .ao2mo(
            [c[1].view(), c[0].view(), c[1].view(), c[0].view()],
            [kpt(1), kpt(0), kpt(1), kpt(0)],
        )
        .unwrap();
    let n = eri.dim().0;
    for (p, q) in iproduct!(0..n, 0..n) {
        assert!(eri[(p, q, 0, 1)].im.abs() < 1e-14);
        let lhs = eri.slice(ndarray::s![p, q, .., ..]);
        let rhs = flipped.slice(ndarray::s![q, p, .., ..]);
        assert!(max_abs_diff(lhs, rhs) < 1e-12);
    }
}

#[test]
fn test_toy_density_fitting_unknown_kpoint() {
    let kpts = array![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]];
    let mut rng = StdRng::seed_from_u64(3);
    let backend = ToyDensityFitting::generate::<f64>(kpts.view(), 2, 2, 0.1, &mut rng);
    let c = Array2::<f64>::eye(2);
    let stray = array![0.25, 0.0, 0.0];
    let result = backend.ao2mo(
        [c.view(), c.view(), c.view(), c.view()],
        [kpts.row(0), stray.view(), kpts.row(0), kpts.row(1)],
    );
    assert!(result.is_err());

    // Coefficients over the wrong number of atomic orbitals.
    let c3 = Array2::<f64>::eye(3);
    let result = backend.ao2mo(
        [c3.view(), c.view(), c.view(), c.view()],
        [kpts.row(0), kpts.row(1), kpts.row(0), kpts.row(1)],
    );
    assert!(result.is_err());
}
