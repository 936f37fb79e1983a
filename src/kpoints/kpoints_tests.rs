use std::f64::consts::PI;

use ndarray::{array, Array2};
use proptest::prelude::*;

use crate::kpoints::{loop_kk, loop_kkk, KConservation, DEFAULT_KCONSERV_THRESHOLD};
use crate::reference::Cell;

fn cubic_cell(a: f64) -> Cell {
    Cell::new(Array2::<f64>::eye(3) * a).unwrap()
}

#[test]
fn test_kpoints_loops_order() {
    let kk = loop_kk(2).collect::<Vec<_>>();
    assert_eq!(kk, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);

    let kkk = loop_kkk(2).collect::<Vec<_>>();
    assert_eq!(kkk.len(), 8);
    assert_eq!(kkk[0], (0, 0, 0));
    assert_eq!(kkk[1], (0, 0, 1));
    assert_eq!(kkk[2], (0, 1, 0));
    assert_eq!(kkk[7], (1, 1, 1));
}

#[test]
fn test_kpoints_kconserv_2x1x1() {
    let cell = cubic_cell(3.0);
    let kpts = cell.make_kpts([2, 1, 1]).unwrap();
    let kconserv = KConservation::new(&cell, kpts.view(), DEFAULT_KCONSERV_THRESHOLD).unwrap();
    assert_eq!(kconserv.nkpts(), 2);
    for (k1, k2, k3) in loop_kkk(2) {
        assert_eq!(kconserv.get(k1, k2, k3), (k1 + k2 + k3) % 2);
    }
}

#[test]
fn test_kpoints_kconserv_3x1x1_phys_and_chemist() {
    let cell = cubic_cell(5.0);
    let kpts = cell.make_kpts([3, 1, 1]).unwrap();
    let kconserv = KConservation::new(&cell, kpts.view(), DEFAULT_KCONSERV_THRESHOLD).unwrap();
    let chemist = kconserv.to_chemist();
    for (k1, k2, k3) in loop_kkk(3) {
        // k1 + k2 - k3 - k4 = 0 (mod 3)
        assert_eq!(kconserv.get(k1, k2, k3), (k1 + k2 + 3 - k3) % 3);
        // k1 - k2 + k3 - k4 = 0 (mod 3)
        assert_eq!(chemist[(k1, k2, k3)], (k1 + 3 - k2 + k3) % 3);
    }
    assert!(kconserv.conserves([1, 1, 0, 2]));
    assert!(!kconserv.conserves([1, 1, 0, 1]));
    assert_eq!(kconserv.quadruples().count(), 27);
}

#[test]
fn test_kpoints_kconserv_rejects_unclosed_set() {
    let cell = cubic_cell(2.0);
    let kpts = array![[0.0, 0.0, 0.0], [0.3 * PI, 0.0, 0.0]];
    let res = KConservation::new(&cell, kpts.view(), DEFAULT_KCONSERV_THRESHOLD);
    assert!(res.is_err());
}

#[test]
fn test_kpoints_kconserv_rejects_bad_shape() {
    let cell = cubic_cell(2.0);
    let kpts = array![[0.0, 0.0], [0.5, 0.0]];
    assert!(KConservation::new(&cell, kpts.view(), DEFAULT_KCONSERV_THRESHOLD).is_err());
}

proptest! {
    #[test]
    fn test_kpoints_kconserv_sum_is_reciprocal_lattice_vector(
        n1 in 1usize..4,
        n2 in 1usize..3,
        n3 in 1usize..3,
        a in 1.5f64..6.0,
    ) {
        let cell = Cell::new(array![
            [a, 0.0, 0.0],
            [0.0, 1.1 * a, 0.0],
            [0.3, 0.0, 0.9 * a]
        ])
        .unwrap();
        let kpts = cell.make_kpts([n1, n2, n3]).unwrap();
        let kconserv = KConservation::new(&cell, kpts.view(), DEFAULT_KCONSERV_THRESHOLD).unwrap();
        let lattice = cell.lattice_vectors();
        for k in kconserv.quadruples() {
            let delta = &kpts.row(k[0]) + &kpts.row(k[1]) - &kpts.row(k[2]) - &kpts.row(k[3]);
            let projections = lattice.dot(&delta) / (2.0 * PI);
            for x in projections.iter() {
                prop_assert!((x - x.round()).abs() < 1e-8);
            }
            prop_assert!(k.iter().all(|ki| *ki < kconserv.nkpts()));
        }
    }
}
