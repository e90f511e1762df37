use ndarray as nd;
use peps_ite::{
    hamiltonian::{ Coupling, Hamiltonian, SpinOps, spin_ops },
    trotter::Trotter,
};

fn kron(a: &nd::Array2<f64>, b: &nd::Array2<f64>) -> nd::Array2<f64> {
    let (n, m) = (a.nrows(), b.nrows());
    nd::Array2::from_shape_fn((n * m, n * m), |(i, j)| {
        a[[i / m, j / m]] * b[[i % m, j % m]]
    })
}

#[test]
fn heisenberg_gate_from_projectors() {
    // exp(-τ S·S) = e^{-τ/4} P_t + e^{3τ/4} P_s with P_s = I/4 - S·S
    let tau: f64 = 0.01;
    let SpinOps { sz, sp, sm } = spin_ops(2);
    let ss = kron(&sz, &sz) + 0.5 * (kron(&sp, &sm) + kron(&sm, &sp));
    let eye: nd::Array2<f64> = nd::Array2::eye(4);
    let p_s = &eye * 0.25 - &ss;
    let p_t = &eye - &p_s;
    let expected = p_t * (-tau / 4.0).exp() + p_s * (3.0 * tau / 4.0).exp();

    let ham = Hamiltonian::j1j2(2, 0.0);
    let trotter = Trotter::new(&ham, tau).unwrap();
    let gate = trotter.gate(Coupling::Nearest);
    let err = gate.iter().zip(expected.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    assert!(err < 1e-12, "max deviation {}", err);
}

#[test]
fn next_nearest_gate_scales_with_j2() {
    // a J2 = 0.5 diagonal gate over τ equals the J1 gate over τ/2
    let ham = Hamiltonian::j1j2(2, 0.5);
    let nn = Trotter::new(&ham, 0.02).unwrap().gate(Coupling::NextNearest);
    let n = Trotter::new(&ham, 0.01).unwrap().gate(Coupling::Nearest);
    let err = nn.iter().zip(n.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    assert!(err < 1e-12);
}
