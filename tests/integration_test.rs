use ktdhf::drivers::tdrhf::{kernel, KernelInput, TdrhfDriver, TdrhfParams};
use ktdhf::drivers::KTdhfDriver;
use ktdhf::eri::{EriSymmetry, KEri, PhysEriBlocks};
use ktdhf::io::diagnostics::NullSink;
use ktdhf::kpoints::DEFAULT_KCONSERV_THRESHOLD;
use ktdhf::reference::toy::ToySystem;
use num_complex::Complex;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_tdrhf_complex_mesh_end_to_end() {
    init_logger();
    let system = ToySystem::<Complex<f64>>::generate([3, 1, 1], 4, 2, 0.08, 2023).unwrap();
    let reference = system.reference().unwrap();

    let params = TdrhfParams::builder()
        .nroots(Some(5))
        .verify_eri_symmetry(true)
        .build()
        .unwrap();
    let mut driver = TdrhfDriver::builder()
        .parameters(params)
        .reference(&reference)
        .build()
        .unwrap();
    driver.run().unwrap();
    let result = driver.result().unwrap();
    assert_eq!(result.eri_symmetry(), EriSymmetry::FourFold);
    assert_eq!(result.eigenvalues().len(), 5);
    assert_eq!(result.amplitudes().shape(), &[5, 2, 3, 3, 2, 2]);
    assert!(result
        .eigenvalues()
        .iter()
        .all(|v| v.re > 0.0 && v.im.abs() < 1e-8));

    // The eager provider reproduces the lazy four-fold spectrum.
    let eager = KEri::open(&reference, EriSymmetry::None, DEFAULT_KCONSERV_THRESHOLD).unwrap();
    assert_eq!(eager.nocc(), &[2, 2, 2]);
    let solution = kernel(KernelInput::Eri(eager), None, Some(5), false, &NullSink).unwrap();
    for (a, b) in solution.eigenvalues.iter().zip(result.eigenvalues().iter()) {
        assert!((a - b).norm() < 1e-8);
    }
}

#[test]
fn test_tdrhf_real_trim_mesh_end_to_end() {
    init_logger();
    let system = ToySystem::<f64>::generate([2, 1, 1], 4, 1, 0.08, 2024).unwrap();
    let reference = system.reference().unwrap();

    let mut driver = TdrhfDriver::builder()
        .reference(&reference)
        .build()
        .unwrap();
    let (eigenvalues, amplitudes) = driver.compute().unwrap();
    assert_eq!(driver.result().unwrap().eri_symmetry(), EriSymmetry::EightFold);
    assert_eq!(eigenvalues.len(), 2 * 2 * 3);
    assert_eq!(amplitudes.shape(), &[12, 2, 2, 2, 1, 3]);

    let (again, _) = driver.compute().unwrap();
    assert_eq!(eigenvalues, again);
}
