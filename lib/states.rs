//! Common reference states, as dense vectors in least-significant-bit qubit
//! order.
//!
//! Each constructor returns the `2^n` amplitudes of an `n`-qubit state, so
//! `n = 0` gives the single amplitude `[1]` and `n` must stay below the width
//! of `usize`.

use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use rand::{
    Rng,
    distributions::Distribution,
};
use statrs::distribution::Normal;
use crate::circuit::{ CXMAT, Gate, GateProgram, HMAT, UnitaryLayer };

/// ∣0…0⟩ on `n` qubits.
pub fn zero_state(n: usize) -> Vec<C64> {
    let mut state = vec![C64::zero(); 1 << n];
    state[0] = C64::one();
    state
}

/// (∣0…0⟩ + ∣1…1⟩) / √2 on `n` qubits, prepared by a Hadamard followed by a
/// ladder of CX gates.
pub fn ghz(n: usize) -> Vec<C64> {
    if n == 0 { return zero_state(0); }
    let mut layers = vec![UnitaryLayer::new(vec![Gate::new(vec![0], HMAT.clone())])];
    layers.extend(
        (0 .. n.saturating_sub(1))
            .map(|q| UnitaryLayer::new(vec![Gate::new(vec![q, q + 1], CXMAT.clone())]))
    );
    GateProgram::new(n, layers).simulate().iter().copied().collect()
}

/// Equal superposition of all `n` single-excitation basis states.
pub fn w_state(n: usize) -> Vec<C64> {
    let amp = C64::from((n as f64).recip().sqrt());
    let mut state = vec![C64::zero(); 1 << n];
    (0 .. n).for_each(|q| { state[1 << q] = amp; });
    state
}

/// Sample a Haar-random pure state on `n` qubits.
pub fn haar_state<R>(n: usize, rng: &mut R) -> Vec<C64>
where R: Rng + ?Sized
{
    let normal = Normal::standard();
    let mut state: Vec<C64> =
        (0 .. 1_usize << n)
        .map(|_| C64::new(normal.sample(rng), normal.sample(rng)))
        .collect();
    let norm: f64 = state.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
    state.iter_mut().for_each(|a| { *a /= norm; });
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{ SeedableRng, rngs::StdRng };

    fn norm(state: &[C64]) -> f64 {
        state.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt()
    }

    #[test]
    fn ghz_amplitudes() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        for n in 1..=5 {
            let state = ghz(n);
            assert_eq!(state.len(), 1 << n);
            assert_abs_diff_eq!((state[0] - h).norm(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!((state[(1 << n) - 1] - h).norm(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(norm(&state), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn empty_register() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(ghz(0), vec![C64::one()]);
        assert_eq!(zero_state(0), vec![C64::one()]);
        assert_eq!(haar_state(0, &mut rng).len(), 1);
        assert_eq!(w_state(0).len(), 1);
    }

    #[test]
    fn w_state_amplitudes() {
        let state = w_state(4);
        assert_abs_diff_eq!(norm(&state), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(state[4].re, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(state[3].norm(), 0.0);
    }

    #[test]
    fn haar_state_is_normalized() {
        let mut rng = StdRng::seed_from_u64(10546);
        let state = haar_state(7, &mut rng);
        assert_eq!(state.len(), 128);
        assert_abs_diff_eq!(norm(&state), 1.0, epsilon = 1e-12);
    }
}
