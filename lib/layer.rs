//! Conversion of a low-bond matrix product state into a single layer of local
//! unitaries.
//!
//! For a left-canonical MPS, every site tensor `A[i]` is an isometry from its
//! right bond into its (left bond, physical index) pair. Embedding each one in
//! a unitary acting on qubit `n - 1 - i` (the physical index) and the
//! `⌈log2(dim(left))⌉` qubits above it (the left bond) yields a sequence of
//! gates that, applied to ∣0…0⟩ from the last site to the first, prepares the
//! state. With every bond at most 2, each gate acts on at most two adjacent
//! qubits.

use nalgebra as na;
use num_complex::Complex64 as C64;
use rand::{ Rng, SeedableRng, rngs::StdRng };
use rayon::prelude::*;
use thiserror::Error;
use crate::{
    ceil_log2,
    circuit::{ Gate, UnitaryLayer },
    isometry::{ IsometryError, complete_unitary },
    mps::{ Direction, MPS, Site, SiteKind },
};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LayerError {
    /// Returned when a site tensor has more columns than can be embedded in the
    /// unitary acting on its qubits.
    #[error("error in layer generation: site {site} has right bond {right} exceeding {rows} rows")]
    NotIsometric { site: usize, right: usize, rows: usize },

    /// Returned when unitary completion fails.
    #[error("error in layer generation: {0}")]
    Isometry(#[from] IsometryError),
}
use LayerError::*;
pub type LayerResult<T> = Result<T, LayerError>;

// rows `s + 2·l`, padded to `2^(k + 1)` rows and columns
fn embed_site(site: &Site, k: usize) -> na::DMatrix<C64> {
    let (left, _, right) = site.dims();
    let dim = 1_usize << (k + 1);
    let mut iso: na::DMatrix<C64> = na::DMatrix::zeros(dim, dim);
    for s in 0..2 {
        let slice = site.slice(s);
        for l in 0 .. left {
            for r in 0 .. right {
                iso[(s + 2 * l, r)] = slice[(l, r)];
            }
        }
    }
    iso
}

fn site_gate(mps: &MPS, i: usize, seed: u64) -> LayerResult<Gate> {
    let n = mps.n();
    let (Some(site), Some(kind)) = (mps.site(i), mps.site_kind(i))
        else { unreachable!() };
    let (left, _, right) = site.dims();
    // number of qubits carrying the left bond
    let k =
        match kind {
            SiteKind::Only | SiteKind::First => 0,
            SiteKind::Bulk | SiteKind::Last => ceil_log2(left),
        };
    let rows = 1_usize << (k + 1);
    if right > rows { return Err(NotIsometric { site: i, right, rows }); }
    let iso = embed_site(site, k);
    let mut rng = StdRng::seed_from_u64(seed);
    let unitary = complete_unitary(&iso, &mut rng)?;
    let qubits: Vec<usize> = (0 ..= k).map(|j| n - 1 - i + j).collect();
    Ok(Gate::new(qubits, unitary))
}

/// Generate the layer of unitaries that prepares `mps` from ∣0…0⟩.
///
/// Sites are visited from last to first, and gates are listed in that order,
/// which is also their application order. If `mps` is not already
/// left-canonical, a left-canonicalized copy is used instead. Each site's
/// completion is independent and runs in parallel; per-site random seeds are
/// drawn from `rng` in visiting order, so the result depends only on the state
/// of `rng` and not on thread scheduling.
pub fn generate_layer<R>(mps: &MPS, rng: &mut R) -> LayerResult<UnitaryLayer>
where R: Rng + ?Sized
{
    let n = mps.n();
    let canon: MPS;
    let mps: &MPS =
        if mps.center() == Some(n - 1) {
            mps
        } else {
            let mut c = mps.clone();
            c.canonicalize(Direction::Left);
            canon = c;
            &canon
        };
    let jobs: Vec<(usize, u64)> =
        (0 .. n).rev()
        .map(|i| (i, rng.gen::<u64>()))
        .collect();
    let gates: Vec<Gate> =
        jobs.into_par_iter()
        .map(|(i, seed)| site_gate(mps, i, seed))
        .collect::<LayerResult<Vec<Gate>>>()?;
    Ok(UnitaryLayer::new(gates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::{ circuit::GateProgram, states };

    #[test]
    fn bell_layer_has_one_two_qubit_gate() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let bell = [C64::from(h), C64::from(0.0), C64::from(0.0), C64::from(h)];
        let mps = MPS::from_dense(&bell).unwrap();
        let mut rng = StdRng::seed_from_u64(10546);
        let layer = generate_layer(&mps, &mut rng).unwrap();
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.gates()[0].qubits(), &[0, 1]);
        assert_eq!(layer.gates()[1].qubits(), &[1]);
        let program = GateProgram::new(2, vec![layer]);
        assert_abs_diff_eq!(program.fidelity(&bell), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn layer_gates_are_unitary() {
        let mut rng = StdRng::seed_from_u64(2718);
        let state = states::haar_state(6, &mut rng);
        let mut mps = MPS::from_dense(&state).unwrap();
        mps.compress(2).normalize();
        let layer = generate_layer(&mps, &mut rng).unwrap();
        assert_eq!(layer.len(), 6);
        for gate in layer.iter() {
            assert!(gate.arity() <= 2);
            let d = gate.mat().nrows();
            let id = gate.mat().adjoint() * gate.mat();
            assert_abs_diff_eq!(
                (id - na::DMatrix::<C64>::identity(d, d)).norm(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn layer_prepares_bond_two_state_exactly() {
        let mut rng = StdRng::seed_from_u64(577);
        let state = states::haar_state(5, &mut rng);
        let mut mps = MPS::from_dense(&state).unwrap();
        mps.compress(2).normalize();
        let target: Vec<C64> = mps.to_dense().iter().copied().collect();
        let layer = generate_layer(&mps, &mut rng).unwrap();
        let program = GateProgram::new(5, vec![layer]);
        assert_abs_diff_eq!(program.fidelity(&target), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn non_canonical_input_is_handled() {
        let mut rng = StdRng::seed_from_u64(31);
        let state = states::haar_state(4, &mut rng);
        let mut mps = MPS::from_dense(&state).unwrap();
        mps.compress(2).normalize();
        mps.canonicalize(Direction::Right);
        let target: Vec<C64> = mps.to_dense().iter().copied().collect();
        let layer = generate_layer(&mps, &mut rng).unwrap();
        let program = GateProgram::new(4, vec![layer]);
        assert_abs_diff_eq!(program.fidelity(&target), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn gate_width_follows_site_kind() {
        let mut rng = StdRng::seed_from_u64(4242);
        let state = states::haar_state(5, &mut rng);
        let mut mps = MPS::from_dense(&state).unwrap();
        mps.compress(2).normalize();
        let layer = generate_layer(&mps, &mut rng).unwrap();
        // gates are listed from the last site to the first
        for (gate, i) in layer.iter().zip((0 .. 5).rev()) {
            let kind = mps.site_kind(i).unwrap();
            let (left, _, _) = mps.site(i).unwrap().dims();
            if kind.implicit_left() {
                assert_eq!(gate.qubits(), &[4]);
            } else {
                assert_eq!(gate.arity(), 1 + ceil_log2(left));
                assert_eq!(gate.qubits()[0], 4 - i);
            }
        }
    }

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let mut rng = StdRng::seed_from_u64(8);
        let state = states::haar_state(6, &mut rng);
        let mut mps = MPS::from_dense(&state).unwrap();
        mps.compress(2).normalize();
        let a = generate_layer(&mps, &mut StdRng::seed_from_u64(100)).unwrap();
        let b = generate_layer(&mps, &mut StdRng::seed_from_u64(100)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_qubit_layer() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let minus = [C64::from(h), C64::from(-h)];
        let mps = MPS::from_dense(&minus).unwrap();
        let layer = generate_layer(&mps, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(layer.len(), 1);
        let program = GateProgram::new(1, vec![layer]);
        assert_abs_diff_eq!(program.fidelity(&minus), 1.0, epsilon = 1e-12);
    }
}
