#![allow(non_snake_case)]

//! Approximate encoding of qubit statevectors into shallow gate programs via
//! sequentially disentangled matrix product states.
//!
//! A dense state is factored into a bond-limited [`MPS`][mps::MPS]. The MPS is
//! then repeatedly truncated to bond dimension 2, converted into a single layer
//! of one- and two-qubit unitaries that would prepare the truncated state from
//! ∣0…0⟩, and "disentangled" by applying the inverse of that layer. Once the
//! remainder is close enough to ∣0…0⟩, the recorded layers are reversed into a
//! [`GateProgram`][circuit::GateProgram] that prepares (an approximation of)
//! the original state.
//!
//! # Example
//!
//! ```
//! use num_complex::Complex64 as C64;
//! use rand::{ SeedableRng, rngs::StdRng };
//! use mps_encode::encoder::{ EncoderConfig, Termination, encode };
//!
//! // (∣00⟩ + ∣11⟩) / √2
//! let h = std::f64::consts::FRAC_1_SQRT_2;
//! let bell = [C64::from(h), C64::from(0.0), C64::from(0.0), C64::from(h)];
//!
//! let config = EncoderConfig::default().with_max_num_layers(1);
//! let mut rng = StdRng::seed_from_u64(10546);
//! let encoding = encode(&bell, &config, &mut rng, ()).unwrap();
//!
//! assert_eq!(encoding.termination, Termination::Converged);
//! assert!(encoding.program.fidelity(&bell) > 1.0 - 1e-9);
//! ```

pub mod mps;
pub mod isometry;
pub mod circuit;
pub mod layer;
pub mod entropy;
pub mod encoder;
pub mod states;

/// Absolute tolerance below which a vector is considered numerically zero.
pub const ZERO_TOL: f64 = 1e-12;

/// Return `⌈log2(x)⌉` for `x ≥ 1`, and 0 for `x == 0`.
pub(crate) fn ceil_log2(x: usize) -> usize {
    if x <= 1 { 0 } else { (usize::BITS - (x - 1).leading_zeros()) as usize }
}

/// Return `Some(n)` if `len == 2^n` for some `n ≥ 1`.
pub(crate) fn qubit_count(len: usize) -> Option<usize> {
    (len >= 2 && len.is_power_of_two()).then(|| len.trailing_zeros() as usize)
}
