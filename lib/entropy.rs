//! Bipartite entanglement analysis of dense states.
//!
//! The entanglement entropy across a cut after the first `k` qubits (in
//! least-significant-bit order) is computed from the Schmidt values of the
//! amplitudes reshaped into a `2^k × 2^(n - k)` matrix. How fast it grows with
//! `k` distinguishes states that are cheap to disentangle (area law, saturating
//! entropy) from ones that are not (volume law, entropy growing by about one
//! bit per qubit), and sets the suggested effort in [`LayerBudget`].

use std::fmt;
use nalgebra as na;
use num_complex::Complex64 as C64;
use serde::{ Deserialize, Serialize };
use thiserror::Error;
use crate::{ ZERO_TOL, qubit_count };

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EntropyError {
    /// Returned when the state's length is not a power of two of at least 2.
    #[error("error in entropy calculation: state length {0} is not a power of two ≥ 2")]
    InvalidLength(usize),

    /// Returned when a cut does not split the register into two non-empty
    /// parts.
    #[error("error in entropy calculation: cut {cut} out of range for {n} qubits")]
    InvalidCut { cut: usize, n: usize },
}
use EntropyError::*;
pub type EntropyResult<T> = Result<T, EntropyError>;

/// Volume-law states have an entropy slope within this distance of 1.
pub const VOLUME_LAW_TOL: f64 = 0.1;

/// Compute the Schmidt values across the cut between qubits `0..cut` and
/// `cut..n`.
pub fn schmidt_values(state: &[C64], cut: usize) -> EntropyResult<na::DVector<f64>> {
    let n = qubit_count(state.len()).ok_or(InvalidLength(state.len()))?;
    if cut == 0 || cut >= n { return Err(InvalidCut { cut, n }); }
    let m: na::DMatrix<C64> =
        na::DMatrix::from_fn(1 << cut, 1 << (n - cut), |a, b| state[a + (b << cut)]);
    Ok(m.singular_values())
}

/// Compute the base-2 von Neumann entropy of the reduced state of qubits
/// `0..cut`.
///
/// The state does not need to be normalized.
pub fn entanglement_entropy(state: &[C64], cut: usize) -> EntropyResult<f64> {
    let svals = schmidt_values(state, cut)?;
    let total: f64 = svals.iter().map(|s| s * s).sum();
    if total <= ZERO_TOL { return Ok(0.0); }
    let entropy: f64 =
        svals.iter()
        .map(|s| s * s / total)
        .filter(|p| *p > ZERO_TOL)
        .map(|p| -p * p.log2())
        .sum();
    Ok(entropy.max(0.0))
}

/// Entanglement entropies over all cuts `k = 1, …, ⌊n/2⌋`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntropyProfile {
    entropies: Vec<(usize, f64)>,
}

impl EntropyProfile {
    /// Return `(cut, entropy)` pairs in increasing order of cut.
    pub fn entropies(&self) -> &[(usize, f64)] { &self.entropies }

    /// Return `true` if there are no cuts (single-qubit states).
    pub fn is_empty(&self) -> bool { self.entropies.is_empty() }

    /// Least-squares slope of the second half of the profile against `x = 1, 2,
    /// …`.
    ///
    /// Returns 0 when the fit is degenerate, i.e. the second half holds fewer
    /// than two points.
    pub fn slope(&self) -> f64 {
        let tail: &[(usize, f64)] = &self.entropies[self.entropies.len() / 2 ..];
        let m = tail.len() as f64;
        if tail.is_empty() { return 0.0; }
        let x_mean = (m + 1.0) / 2.0;
        let y_mean = tail.iter().map(|(_, y)| y).sum::<f64>() / m;
        let (num, den) =
            tail.iter().enumerate()
            .fold((0.0, 0.0), |(num, den), (j, (_, y))| {
                let dx = (j + 1) as f64 - x_mean;
                (num + dx * (y - y_mean), den + dx * dx)
            });
        if den == 0.0 { 0.0 } else { num / den }
    }

    /// Classify the profile by its slope.
    pub fn kind(&self) -> EntanglementKind { EntanglementKind::from_slope(self.slope()) }
}

/// Compute the entropy profile of a state.
pub fn entropy_profile(state: &[C64]) -> EntropyResult<EntropyProfile> {
    let n = qubit_count(state.len()).ok_or(InvalidLength(state.len()))?;
    let entropies: Vec<(usize, f64)> =
        (1 ..= n / 2)
        .map(|k| entanglement_entropy(state, k).map(|s| (k, s)))
        .collect::<EntropyResult<_>>()?;
    Ok(EntropyProfile { entropies })
}

/// Shortcut for `entropy_profile(state)?.slope()`.
pub fn entanglement_slope(state: &[C64]) -> EntropyResult<f64> {
    entropy_profile(state).map(|profile| profile.slope())
}

/// Shortcut for `entropy_profile(state)?.kind()`.
pub fn classify(state: &[C64]) -> EntropyResult<EntanglementKind> {
    entropy_profile(state).map(|profile| profile.kind())
}

/// Scaling class of a state's entanglement entropy.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntanglementKind {
    /// Entropy saturates with cut size.
    AreaLaw,
    /// Entropy grows by about one bit per qubit.
    VolumeLaw,
}

impl EntanglementKind {
    /// Classify by entropy slope: volume law iff `|slope - 1| ≤ 0.1`.
    pub fn from_slope(slope: f64) -> Self {
        if (slope - 1.0).abs() <= VOLUME_LAW_TOL { Self::VolumeLaw } else { Self::AreaLaw }
    }

    /// Return `true` if `self` is `AreaLaw`.
    pub fn is_area_law(&self) -> bool { matches!(self, Self::AreaLaw) }

    /// Return `true` if `self` is `VolumeLaw`.
    pub fn is_volume_law(&self) -> bool { matches!(self, Self::VolumeLaw) }
}

impl fmt::Display for EntanglementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AreaLaw => write!(f, "area law"),
            Self::VolumeLaw => write!(f, "volume law"),
        }
    }
}

/// Suggested encoding effort for a state, scaling with its size and entropy
/// slope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerBudget {
    /// Number of disentangling layers; at least 1.
    pub layers: usize,
    /// Number of variational sweeps, for refinement passes run downstream.
    pub sweeps: usize,
}

impl LayerBudget {
    /// `layers = ⌊(2 + 2·slope)·n / 1.5⌋` (at least 1) and
    /// `sweeps = ⌊(10 + 20·slope)·n⌋`.
    pub fn suggest(num_qubits: usize, slope: f64) -> Self {
        let n = num_qubits as f64;
        let layers = ((2.0 + 2.0 * slope) * n / 1.5).floor().max(1.0) as usize;
        let sweeps = ((10.0 + 20.0 * slope) * n).floor().max(0.0) as usize;
        Self { layers, sweeps }
    }

    /// Compute the suggestion for a dense state.
    pub fn for_state(state: &[C64]) -> EntropyResult<Self> {
        let n = qubit_count(state.len()).ok_or(InvalidLength(state.len()))?;
        entanglement_slope(state).map(|slope| Self::suggest(n, slope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::states;

    // Bell pairs between qubits `j` and `j + n/2`
    fn paired_state(n: usize) -> Vec<C64> {
        let half = n / 2;
        let amp = C64::from((1.0 / (1_usize << half) as f64).sqrt());
        let mut state = vec![C64::from(0.0); 1 << n];
        (0 .. 1_usize << half).for_each(|a| { state[a | (a << half)] = amp; });
        state
    }

    #[test]
    fn product_state_has_no_entropy() {
        let profile = entropy_profile(&states::zero_state(6)).unwrap();
        assert_eq!(profile.entropies().len(), 3);
        profile.entropies().iter()
            .for_each(|(_, s)| { assert_abs_diff_eq!(*s, 0.0, epsilon = 1e-12); });
        assert_abs_diff_eq!(profile.slope(), 0.0, epsilon = 1e-12);
        assert_eq!(profile.kind(), EntanglementKind::AreaLaw);
    }

    #[test]
    fn ghz_is_area_law() {
        let ghz = states::ghz(8);
        let profile = entropy_profile(&ghz).unwrap();
        profile.entropies().iter()
            .for_each(|(_, s)| { assert_abs_diff_eq!(*s, 1.0, epsilon = 1e-10); });
        assert_abs_diff_eq!(profile.slope(), 0.0, epsilon = 1e-10);
        assert_eq!(classify(&ghz).unwrap(), EntanglementKind::AreaLaw);
    }

    #[test]
    fn paired_state_is_volume_law() {
        let state = paired_state(8);
        let profile = entropy_profile(&state).unwrap();
        for (k, s) in profile.entropies() {
            assert_abs_diff_eq!(*s, *k as f64, epsilon = 1e-10);
        }
        assert_abs_diff_eq!(profile.slope(), 1.0, epsilon = 1e-10);
        assert!(classify(&state).unwrap().is_volume_law());
    }

    #[test]
    fn degenerate_fit_has_zero_slope() {
        // a single cut leaves a single point in the fit
        let state = paired_state(2);
        assert_abs_diff_eq!(entanglement_entropy(&state, 1).unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(entanglement_slope(&state).unwrap(), 0.0);
        let single = [C64::from(1.0), C64::from(0.0)];
        assert!(entropy_profile(&single).unwrap().is_empty());
        assert_eq!(entanglement_slope(&single).unwrap(), 0.0);
    }

    #[test]
    fn rejects_bad_input() {
        let state = [C64::from(1.0); 3];
        assert_eq!(entropy_profile(&state).unwrap_err(), InvalidLength(3));
        let state = states::zero_state(3);
        assert_eq!(entanglement_entropy(&state, 3).unwrap_err(), InvalidCut { cut: 3, n: 3 });
        assert_eq!(entanglement_entropy(&state, 0).unwrap_err(), InvalidCut { cut: 0, n: 3 });
    }

    #[test]
    fn budget_formula() {
        assert_eq!(LayerBudget::suggest(10, 0.0), LayerBudget { layers: 13, sweeps: 100 });
        assert_eq!(LayerBudget::suggest(10, 1.0), LayerBudget { layers: 26, sweeps: 300 });
        assert_eq!(LayerBudget::suggest(1, 0.0).layers, 1);
        assert_eq!(LayerBudget::suggest(3, -2.0), LayerBudget { layers: 1, sweeps: 0 });
        let budget = LayerBudget::for_state(&paired_state(8)).unwrap();
        assert_eq!(budget.layers, 21);
    }
}
