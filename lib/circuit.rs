//! Gate-level description of state-preparation programs.
//!
//! A [`GateProgram`] is an ordered sequence of [`UnitaryLayer`]s over a
//! register of `n` qubits, to be applied to ∣0…0⟩. Qubits are ordered
//! least-significant-bit first: qubit `q` is bit `q` of a basis index. A
//! [`Gate`] acting on qubits `[q0, q1, …]` uses `q0` as the least significant
//! bit of its matrix index.
//!
//! ```
//! use mps_encode::circuit::{ CXMAT, Gate, GateProgram, HMAT, UnitaryLayer };
//!
//! let program =
//!     GateProgram::new(2, vec![
//!         UnitaryLayer::new(vec![Gate::new(vec![0], HMAT.clone())]),
//!         UnitaryLayer::new(vec![Gate::new(vec![0, 1], CXMAT.clone())]),
//!     ]);
//! let state = program.simulate();
//! let h = std::f64::consts::FRAC_1_SQRT_2;
//! assert!((state[0].re - h).abs() < 1e-12);
//! assert!((state[3].re - h).abs() < 1e-12);
//! assert_eq!(program.num_gates(), 2);
//! ```

use std::fmt;
use nalgebra as na;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use once_cell::sync::Lazy;
use rand::{
    Rng,
    distributions::Distribution,
};
use serde::{ Deserialize, Serialize };
use statrs::distribution::Normal;

/// A unitary acting on an ordered set of qubits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    qubits: Vec<usize>,
    mat: na::DMatrix<C64>,
}

impl Gate {
    /// Create a new gate.
    ///
    /// *Panics* if `mat` is not `2^k × 2^k` for `k = qubits.len()`.
    pub fn new(qubits: Vec<usize>, mat: na::DMatrix<C64>) -> Self {
        let dim = 1_usize << qubits.len();
        if mat.shape() != (dim, dim) {
            panic!(
                "Gate::new: expected a {dim}×{dim} matrix for {} qubit(s), got {}×{}",
                qubits.len(), mat.nrows(), mat.ncols(),
            );
        }
        Self { qubits, mat }
    }

    /// Return the qubits the gate acts on.
    pub fn qubits(&self) -> &[usize] { &self.qubits }

    /// Return the gate's matrix.
    pub fn mat(&self) -> &na::DMatrix<C64> { &self.mat }

    /// Return the number of qubits the gate acts on.
    pub fn arity(&self) -> usize { self.qubits.len() }

    /// Return `true` if the gate acts on a single qubit.
    pub fn is_q1(&self) -> bool { self.qubits.len() == 1 }

    /// Return `true` if the gate acts on two qubits.
    pub fn is_q2(&self) -> bool { self.qubits.len() == 2 }

    /// Return the inverse gate, assuming the matrix is unitary.
    pub fn adjoint(&self) -> Self {
        Self { qubits: self.qubits.clone(), mat: self.mat.adjoint() }
    }

    /// Apply the gate to a dense state vector in place.
    ///
    /// *Panics* if any of the gate's qubits is out of range for `state`.
    pub fn apply_dense(&self, state: &mut na::DVector<C64>) {
        let dim = self.mat.nrows();
        let qubit_mask: usize = self.qubits.iter().fold(0, |acc, q| acc | (1_usize << q));
        if state.len() <= qubit_mask {
            panic!("Gate::apply_dense: qubits {:?} out of range", self.qubits);
        }
        // offset of each gate basis index within the register
        let offsets: Vec<usize> =
            (0 .. dim)
            .map(|j| {
                self.qubits.iter().enumerate()
                    .filter(|(t, _)| (j >> *t) & 1 == 1)
                    .fold(0, |acc, (_, q)| acc | (1_usize << q))
            })
            .collect();
        let mut amps: Vec<C64> = vec![C64::zero(); dim];
        for base in (0 .. state.len()).filter(|b| (b & qubit_mask) == 0) {
            amps.iter_mut().zip(&offsets)
                .for_each(|(a, off)| { *a = state[base | off]; });
            for (i, off) in offsets.iter().enumerate() {
                state[base | off] =
                    amps.iter().enumerate()
                    .map(|(j, a)| self.mat[(i, j)] * a)
                    .sum();
            }
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U{:?} ({}×{})", self.qubits, self.mat.nrows(), self.mat.ncols())
    }
}

/// Make a Hadamard gate matrix.
pub fn make_h() -> na::DMatrix<C64> {
    let h = C64::from(std::f64::consts::FRAC_1_SQRT_2);
    na::dmatrix!(
        h,  h;
        h, -h;
    )
}

/// Lazy-static version of [`make_h`].
pub static HMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_h);

/// Make an X gate matrix.
pub fn make_x() -> na::DMatrix<C64> {
    let (o, z) = (C64::one(), C64::zero());
    na::dmatrix!(
        z, o;
        o, z;
    )
}

/// Lazy-static version of [`make_x`].
pub static XMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_x);

/// Make a CX gate matrix, with the control on the first of the gate's two
/// qubits and the target on the second.
pub fn make_cx() -> na::DMatrix<C64> {
    let (o, z) = (C64::one(), C64::zero());
    na::dmatrix!(
        o, z, z, z;
        z, z, z, o;
        z, z, o, z;
        z, o, z, z;
    )
}

/// Lazy-static version of [`make_cx`].
pub static CXMAT: Lazy<na::DMatrix<C64>> = Lazy::new(make_cx);

/// Sample a Haar-random unitary on `n` qubits.
pub fn haar_unitary<R>(n: usize, rng: &mut R) -> na::DMatrix<C64>
where R: Rng + ?Sized
{
    let normal = Normal::standard();
    let dim = 1_usize << n;
    let z: na::DMatrix<C64> =
        na::DMatrix::from_fn(dim, dim, |_, _| {
            C64::new(normal.sample(rng), normal.sample(rng))
        });
    phase_fixed_q(z)
}

// unitary factor of `z = QR`, with column phases chosen so that `R` has a real,
// positive diagonal
fn phase_fixed_q(z: na::DMatrix<C64>) -> na::DMatrix<C64> {
    let qr = z.qr();
    let (mut q, r) = (qr.q(), qr.r());
    q.column_iter_mut().zip(r.diagonal().iter())
        .for_each(|(mut q_j, rjj)| {
            let renorm = *rjj / rjj.norm();
            q_j.iter_mut().for_each(|qij| { *qij *= renorm; });
        });
    q
}

/// A single layer of gates.
///
/// Layers produced by the encoder have gates whose qubit sets partition the
/// register; within a layer, gates are applied in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitaryLayer {
    gates: Vec<Gate>,
}

impl UnitaryLayer {
    /// Create a new layer from gates listed in application order.
    pub fn new(gates: Vec<Gate>) -> Self { Self { gates } }

    /// Return the gates in application order.
    pub fn gates(&self) -> &[Gate] { &self.gates }

    /// Return the number of gates.
    pub fn len(&self) -> usize { self.gates.len() }

    /// Return `true` if the layer holds no gates.
    pub fn is_empty(&self) -> bool { self.gates.is_empty() }

    /// Return an iterator over the gates in application order.
    pub fn iter(&self) -> std::slice::Iter<'_, Gate> { self.gates.iter() }

    /// Return the gates that undo this layer, in application order.
    pub fn inverse(&self) -> Vec<Gate> {
        self.gates.iter().rev().map(Gate::adjoint).collect()
    }
}

impl<'a> IntoIterator for &'a UnitaryLayer {
    type Item = &'a Gate;
    type IntoIter = std::slice::Iter<'a, Gate>;

    fn into_iter(self) -> Self::IntoIter { self.gates.iter() }
}

/// A sequence of unitary layers that prepares a state from ∣0…0⟩.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateProgram {
    num_qubits: usize,
    layers: Vec<UnitaryLayer>,
}

impl GateProgram {
    /// Create a new program from layers listed in application order.
    pub fn new(num_qubits: usize, layers: Vec<UnitaryLayer>) -> Self {
        Self { num_qubits, layers }
    }

    /// Return the number of qubits in the register.
    pub fn num_qubits(&self) -> usize { self.num_qubits }

    /// Return the layers in application order.
    pub fn layers(&self) -> &[UnitaryLayer] { &self.layers }

    /// Return the number of layers.
    pub fn depth(&self) -> usize { self.layers.len() }

    /// Return the total number of gates over all layers.
    pub fn num_gates(&self) -> usize { self.layers.iter().map(UnitaryLayer::len).sum() }

    /// Return an iterator over all gates in application order.
    pub fn gates(&self) -> impl Iterator<Item = &Gate> + '_ {
        self.layers.iter().flat_map(|layer| layer.iter())
    }

    /// Apply every gate in order to a dense state vector.
    ///
    /// *Panics* if `state` has fewer than `2^num_qubits` amplitudes.
    pub fn apply_dense(&self, state: &mut na::DVector<C64>) {
        self.gates().for_each(|gate| { gate.apply_dense(state); });
    }

    /// Simulate the program on ∣0…0⟩, returning the dense output state.
    pub fn simulate(&self) -> na::DVector<C64> {
        let mut state: na::DVector<C64> = na::DVector::zeros(1 << self.num_qubits);
        state[0] = C64::one();
        self.apply_dense(&mut state);
        state
    }

    /// Compute ⟨target∣ψ⟩ for the program's output state ∣ψ⟩.
    ///
    /// Only the first `min(target.len(), 2^num_qubits)` amplitudes take part.
    pub fn overlap(&self, target: &[C64]) -> C64 {
        let state = self.simulate();
        target.iter().zip(state.iter())
            .map(|(t, a)| t.conj() * a)
            .sum()
    }

    /// Compute |⟨target∣ψ⟩| for the program's output state ∣ψ⟩.
    pub fn fidelity(&self, target: &[C64]) -> f64 { self.overlap(target).norm() }
}

impl fmt::Display for GateProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GateProgram {{ qubits: {}, layers: {} }}", self.num_qubits, self.depth())?;
        for (k, layer) in self.layers.iter().enumerate() {
            write!(f, "\n  [{}]", k)?;
            for gate in layer.iter() { write!(f, " {}", gate)?; }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{ SeedableRng, rngs::StdRng };
    use crate::{ mps::MPS, states };

    #[test]
    fn lsb_qubit_ordering() {
        let mut state: na::DVector<C64> = na::DVector::zeros(8);
        state[0] = C64::one();
        Gate::new(vec![1], XMAT.clone()).apply_dense(&mut state);
        assert_abs_diff_eq!((state[2] - C64::one()).norm(), 0.0, epsilon = 1e-12);
        // control on qubit 1, target on qubit 2
        Gate::new(vec![1, 2], CXMAT.clone()).apply_dense(&mut state);
        assert_abs_diff_eq!((state[6] - C64::one()).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn reversed_qubit_order_swaps_roles() {
        let mut state: na::DVector<C64> = na::DVector::zeros(4);
        state[2] = C64::one();
        // control on qubit 1, target on qubit 0
        Gate::new(vec![1, 0], CXMAT.clone()).apply_dense(&mut state);
        assert_abs_diff_eq!((state[3] - C64::one()).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn haar_phase_fix_leaves_positive_diagonal() {
        let mut rng = StdRng::seed_from_u64(7);
        let normal = Normal::standard();
        let z: na::DMatrix<C64> =
            na::DMatrix::from_fn(4, 4, |_, _| {
                C64::new(normal.sample(&mut rng), normal.sample(&mut rng))
            });
        let q = phase_fixed_q(z.clone());
        let r = q.adjoint() * &z;
        for j in 0..4 {
            assert!(r[(j, j)].re > 0.0);
            assert_abs_diff_eq!(r[(j, j)].im, 0.0, epsilon = 1e-10);
            for i in j + 1 .. 4 {
                assert_abs_diff_eq!(r[(i, j)].norm(), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn haar_unitary_is_unitary() {
        let mut rng = StdRng::seed_from_u64(10546);
        for n in 1..=3 {
            let u = haar_unitary(n, &mut rng);
            let id = u.adjoint() * &u;
            assert_abs_diff_eq!(
                (id - na::DMatrix::<C64>::identity(1 << n, 1 << n)).norm(),
                0.0,
                epsilon = 1e-10,
            );
        }
    }

    #[test]
    fn layer_inverse_undoes_layer() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer =
            UnitaryLayer::new(vec![
                Gate::new(vec![0, 1], haar_unitary(2, &mut rng)),
                Gate::new(vec![2], haar_unitary(1, &mut rng)),
                Gate::new(vec![1, 2], haar_unitary(2, &mut rng)),
            ]);
        let program = GateProgram::new(3, vec![layer.clone()]);
        let mut state = program.simulate();
        layer.inverse().iter().for_each(|g| { g.apply_dense(&mut state); });
        assert_abs_diff_eq!((state[0] - C64::one()).norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn dense_simulation_agrees_with_mps() {
        let mut rng = StdRng::seed_from_u64(99);
        let gates = vec![
            Gate::new(vec![0], haar_unitary(1, &mut rng)),
            Gate::new(vec![2, 3], haar_unitary(2, &mut rng)),
            Gate::new(vec![1, 2], haar_unitary(2, &mut rng)),
            Gate::new(vec![3], haar_unitary(1, &mut rng)),
            Gate::new(vec![0, 1], haar_unitary(2, &mut rng)),
        ];
        let program = GateProgram::new(4, vec![UnitaryLayer::new(gates)]);
        let mut mps = MPS::from_dense(&states::zero_state(4)).unwrap();
        for gate in program.gates() { mps.apply_gate(gate).unwrap(); }
        let from_mps = mps.to_dense();
        let from_dense = program.simulate();
        assert_abs_diff_eq!((from_mps - from_dense).norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn overlap_and_fidelity() {
        let program =
            GateProgram::new(2, vec![
                UnitaryLayer::new(vec![Gate::new(vec![1], HMAT.clone())]),
            ]);
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let plus = [C64::from(h), C64::zero(), C64::from(h), C64::zero()];
        assert_abs_diff_eq!(program.fidelity(&plus), 1.0, epsilon = 1e-12);
        let minus = [C64::from(h), C64::zero(), C64::from(-h), C64::zero()];
        assert_abs_diff_eq!(program.fidelity(&minus), 0.0, epsilon = 1e-12);
        assert_eq!(program.depth(), 1);
        assert_eq!(program.num_qubits(), 2);
    }

    #[test]
    fn program_round_trips_through_json() {
        let program =
            GateProgram::new(2, vec![
                UnitaryLayer::new(vec![Gate::new(vec![0], HMAT.clone())]),
                UnitaryLayer::new(vec![Gate::new(vec![0, 1], CXMAT.clone())]),
            ]);
        let json = serde_json::to_string(&program).unwrap();
        let back: GateProgram = serde_json::from_str(&json).unwrap();
        assert_eq!(back.num_qubits(), 2);
        assert_eq!(back.depth(), 2);
        for (a, b) in back.gates().zip(program.gates()) {
            assert_eq!(a.qubits(), b.qubits());
            assert_abs_diff_eq!((a.mat() - b.mat()).norm(), 0.0, epsilon = 1e-15);
        }
    }
}
