use ndarray::{array, s, Array1, Array2};
// Local equivalent of `ndarray_linalg::assert_close_l2!`, whose `$crate::$close` expansion
// no longer parses on current rustc.
macro_rules! assert_close_l2 {
    ($test:expr, $truth:expr, $tol:expr) => {
        ndarray_linalg::close_l2($test, $truth, $tol);
    };
}
use num_complex::Complex;

use crate::solver::{diagonalise, eig, EigenDriver};

fn c(re: f64, im: f64) -> Complex<f64> {
    Complex::new(re, im)
}

/// Builds a stable response-like matrix `[[A, B], [-B*, -A*]]` with Hermitian `A` and symmetric
/// `B`.
fn response_matrix() -> Array2<Complex<f64>> {
    let a = array![
        [c(1.0, 0.0), c(0.05, 0.02), c(0.01, -0.03)],
        [c(0.05, -0.02), c(1.5, 0.0), c(0.04, 0.01)],
        [c(0.01, 0.03), c(0.04, -0.01), c(2.2, 0.0)]
    ];
    let b = array![
        [c(0.10, 0.01), c(0.02, 0.03), c(0.00, 0.01)],
        [c(0.02, 0.03), c(0.08, -0.02), c(0.03, 0.00)],
        [c(0.00, 0.01), c(0.03, 0.00), c(0.05, 0.02)]
    ];
    let mut m = Array2::<Complex<f64>>::zeros((6, 6));
    m.slice_mut(s![..3, ..3]).assign(&a);
    m.slice_mut(s![..3, 3..]).assign(&b);
    m.slice_mut(s![3.., ..3]).assign(&b.mapv(|v| -v.conj()));
    m.slice_mut(s![3.., 3..]).assign(&a.mapv(|v| -v.conj()));
    m
}

#[test]
fn test_solver_diagonalise_sorts_eigenpairs() {
    let m = Array2::from_diag(&array![c(3.0, 0.0), c(-1.0, 0.0), c(2.0, 0.0)]);
    let solution = diagonalise(m.view(), EigenDriver::Eig).unwrap();
    assert_close_l2!(
        &solution.eigenvalues().to_owned(),
        &array![c(-1.0, 0.0), c(2.0, 0.0), c(3.0, 0.0)],
        1e-12
    );

    // Eigenvalues with equal real parts are ordered by their imaginary parts.
    let rotation = array![[c(0.0, 0.0), c(1.0, 0.0)], [c(-1.0, 0.0), c(0.0, 0.0)]];
    let solution = diagonalise(rotation.view(), EigenDriver::Eig).unwrap();
    assert!((solution.eigenvalues()[0] - c(0.0, -1.0)).norm() < 1e-12);
    assert!((solution.eigenvalues()[1] - c(0.0, 1.0)).norm() < 1e-12);

    assert!(diagonalise(Array2::zeros((2, 3)).view(), EigenDriver::Eig).is_err());
}

#[test]
fn test_solver_eig_keeps_upper_half() {
    let m = response_matrix();
    let all = diagonalise(m.view(), EigenDriver::Eig).unwrap();
    let vals = all.eigenvalues();

    // The spectrum is symmetric about zero.
    for i in 0..3 {
        assert!((vals[i] + vals[5 - i]).norm() < 1e-10);
    }

    let solution = eig(m.view(), EigenDriver::Eig, None).unwrap();
    assert_eq!(solution.len(), 3);
    let roots = solution.eigenvalues();
    assert!(roots.iter().all(|v| v.re > 0.0 && v.im.abs() < 1e-10));
    assert!(roots[0].re <= roots[1].re && roots[1].re <= roots[2].re);

    for (root, vector) in roots.iter().zip(solution.eigenvectors().columns()) {
        let lhs = m.dot(&vector);
        let rhs = vector.mapv(|v| v * root);
        assert_close_l2!(&lhs, &rhs, 1e-10);
    }
}

#[test]
fn test_solver_eig_truncates_roots() {
    let m = response_matrix();
    let full = eig(m.view(), EigenDriver::Eig, None).unwrap();

    let two = eig(m.view(), EigenDriver::Eig, Some(2)).unwrap();
    assert_eq!(two.len(), 2);
    assert_eq!(two.eigenvectors().dim(), (6, 2));
    assert_close_l2!(
        &two.eigenvalues().to_owned(),
        &full.eigenvalues().slice(s![..2]).to_owned(),
        1e-12
    );

    let excess = eig(m.view(), EigenDriver::Eig, Some(10)).unwrap();
    assert_eq!(excess.len(), 3);

    let none = eig(m.view(), EigenDriver::Eig, Some(0)).unwrap();
    assert!(none.is_empty());
    let (values, vectors) = none.into_parts();
    assert_eq!(values, Array1::<Complex<f64>>::zeros(0));
    assert_eq!(vectors.dim(), (6, 0));
}

#[test]
fn test_solver_driver_parsing() {
    assert_eq!("eig".parse::<EigenDriver>().unwrap(), EigenDriver::Eig);
    assert_eq!("EIG".parse::<EigenDriver>().unwrap(), EigenDriver::Eig);
    assert!("davidson".parse::<EigenDriver>().is_err());
    assert_eq!(EigenDriver::default(), EigenDriver::Eig);
    assert_eq!(EigenDriver::Eig.to_string(), "eig");

    let driver: EigenDriver = serde_yaml::from_str("eig").unwrap();
    assert_eq!(driver, EigenDriver::Eig);
    assert!(serde_yaml::from_str::<EigenDriver>("lobpcg").is_err());
}
