//! Sequential disentangling of a state into a [`GateProgram`].
//!
//! Starting from the MPS of the target state, each iteration
//!
//! 1. truncates a copy of the current state to bond dimension 2,
//! 2. generates the [`UnitaryLayer`] that prepares the truncated copy from
//!    ∣0…0⟩,
//! 3. applies the inverse of that layer to the current state and re-compresses
//!    it to the configured maximum bond dimension, and
//! 4. measures the fidelity |⟨0…0∣ψ⟩| of what remains.
//!
//! Iteration stops once the fidelity reaches the target or the layer budget is
//! exhausted. Since the inverse layers map the target to (approximately)
//! ∣0…0⟩, the recorded layers in reverse order prepare the target from ∣0…0⟩.
//!
//! ```
//! use rand::{ SeedableRng, rngs::StdRng };
//! use mps_encode::{ encoder::{ EncoderConfig, Sequential }, states };
//!
//! let ghz = states::ghz(6);
//! let encoder =
//!     Sequential::new(
//!         EncoderConfig::default()
//!             .with_target_fidelity(0.999)
//!             .with_max_num_layers(4)
//!             .with_chi_max(8)
//!     ).unwrap();
//! let mut rng = StdRng::seed_from_u64(10546);
//! let encoding = encoder.encode(&ghz, &mut rng).unwrap();
//! assert!(encoding.accept(&ghz, 0.99).is_accepted());
//! ```

use std::fmt;
use num_complex::Complex64 as C64;
use rand::Rng;
use serde::{ Deserialize, Serialize };
use thiserror::Error;
use crate::{
    circuit::{ GateProgram, UnitaryLayer },
    entropy::{ self, EntropyError },
    layer::{ LayerError, generate_layer },
    mps::{ MPSError, MPS },
};

#[derive(Clone, Debug, PartialEq, Error)]
pub enum EncodeError {
    /// Returned when an [`EncoderConfig`] fails validation.
    #[error("invalid encoder configuration: {0}")]
    InvalidConfig(String),

    /// Returned when the input state cannot be converted to an MPS.
    #[error("invalid input state: {0}")]
    InvalidInput(#[from] MPSError),

    /// Returned when applying an inverse layer to the working state fails.
    #[error("error while disentangling: {0}")]
    Disentangle(MPSError),

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Entropy(#[from] EntropyError),
}
use EncodeError::*;
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Programs whose output fidelity falls below this value should be discarded
/// in favor of an exact representation.
pub const DEFAULT_ACCEPT_FIDELITY: f64 = 0.8;

/// Parameters of the disentangling loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Stop once |⟨0…0∣ψ⟩| reaches this value. Must lie in (0, 1].
    pub target_fidelity: f64,
    /// Maximum number of layers to generate. Must be at least 1.
    pub max_num_layers: usize,
    /// Maximum bond dimension of the working state. Must be at least 2.
    pub chi_max: usize,
    /// Report a summary when finished.
    pub verbose: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            target_fidelity: 0.99,
            max_num_layers: 10,
            chi_max: 64,
            verbose: false,
        }
    }
}

impl EncoderConfig {
    /// Set the target fidelity.
    pub fn with_target_fidelity(mut self, target_fidelity: f64) -> Self {
        self.target_fidelity = target_fidelity;
        self
    }

    /// Set the maximum number of layers.
    pub fn with_max_num_layers(mut self, max_num_layers: usize) -> Self {
        self.max_num_layers = max_num_layers;
        self
    }

    /// Set the maximum bond dimension.
    pub fn with_chi_max(mut self, chi_max: usize) -> Self {
        self.chi_max = chi_max;
        self
    }

    /// Set the verbosity flag.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check that all parameters lie in their allowed ranges.
    pub fn validate(&self) -> EncodeResult<()> {
        if !(self.target_fidelity > 0.0 && self.target_fidelity <= 1.0) {
            return Err(InvalidConfig(format!(
                "target fidelity must lie in (0, 1], got {}", self.target_fidelity)));
        }
        if self.max_num_layers < 1 {
            return Err(InvalidConfig(
                "maximum number of layers must be at least 1".to_string()));
        }
        if self.chi_max < 2 {
            return Err(InvalidConfig(format!(
                "maximum bond dimension must be at least 2, got {}", self.chi_max)));
        }
        Ok(())
    }
}

/// Reason the disentangling loop stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Termination {
    /// The target fidelity was reached.
    Converged,
    /// The layer budget ran out first.
    Exhausted,
}

impl Termination {
    /// Return `true` if `self` is `Converged`.
    pub fn is_converged(&self) -> bool { matches!(self, Self::Converged) }

    /// Return `true` if `self` is `Exhausted`.
    pub fn is_exhausted(&self) -> bool { matches!(self, Self::Exhausted) }
}

// the loop is either generating a layer with the given index or finished
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Iterate(usize),
    Done(Termination),
}

/// Verdict of comparing an encoding's output against its target.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Acceptance {
    /// Output fidelity met the threshold.
    Accepted(f64),
    /// Output fidelity fell short of the threshold.
    Rejected(f64),
}

impl Acceptance {
    /// Return `true` if `self` is `Accepted`.
    pub fn is_accepted(&self) -> bool { matches!(self, Self::Accepted(..)) }

    /// Return the measured fidelity.
    pub fn fidelity(&self) -> f64 {
        match self {
            Self::Accepted(f) | Self::Rejected(f) => *f,
        }
    }
}

/// Output of the disentangling loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Encoding {
    /// Program preparing the approximation from ∣0…0⟩.
    pub program: GateProgram,
    /// |⟨0…0∣ψ⟩| of the working state after the last layer.
    pub fidelity: f64,
    /// Largest fidelity seen after any layer.
    pub best_fidelity: f64,
    /// Fidelity after each layer, in generation order.
    pub fidelities: Vec<f64>,
    /// Number of layers generated.
    pub layers_used: usize,
    pub termination: Termination,
}

impl Encoding {
    /// Simulate the program and compare its output to `target`.
    ///
    /// The result is `Accepted` if |⟨target∣program⟩| ≥ `threshold`.
    pub fn accept(&self, target: &[C64], threshold: f64) -> Acceptance {
        let fidelity = self.program.fidelity(target);
        if fidelity >= threshold {
            Acceptance::Accepted(fidelity)
        } else {
            Acceptance::Rejected(fidelity)
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Encoding {{ fidelity: {:.6}, layers: {}, gates: {}, termination: {:?} }}",
            self.fidelity, self.layers_used, self.program.num_gates(), self.termination,
        )
    }
}

/// Receives progress reports from the disentangling loop.
pub trait Observer {
    /// Called after each layer with its index, the resulting fidelity, and the
    /// number of gates in the layer.
    fn on_layer(&mut self, layer: usize, fidelity: f64, num_gates: usize);

    /// Called once with the final result.
    fn on_finish(&mut self, _encoding: &Encoding) { }
}

impl Observer for () {
    fn on_layer(&mut self, _layer: usize, _fidelity: f64, _num_gates: usize) { }
}

impl<F> Observer for F
where F: FnMut(usize, f64, usize)
{
    fn on_layer(&mut self, layer: usize, fidelity: f64, num_gates: usize) {
        self(layer, fidelity, num_gates)
    }
}

/// Emits a `tracing` event for every layer and for the final result.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_layer(&mut self, layer: usize, fidelity: f64, num_gates: usize) {
        tracing::debug!(layer, fidelity, num_gates, "generated disentangling layer");
    }

    fn on_finish(&mut self, encoding: &Encoding) {
        tracing::debug!(
            fidelity = encoding.fidelity,
            best_fidelity = encoding.best_fidelity,
            layers = encoding.layers_used,
            gates = encoding.program.num_gates(),
            termination = ?encoding.termination,
            "finished disentangling"
        );
    }
}

/// Encode `state` into a [`GateProgram`].
///
/// `rng` drives the random completion of degenerate unitary columns; for a
/// fixed seed the result is deterministic. Running out of layers before
/// reaching `config.target_fidelity` is not an error: the result is returned
/// with [`Termination::Exhausted`] and should be checked with
/// [`Encoding::accept`].
pub fn encode<R, O>(
    state: &[C64],
    config: &EncoderConfig,
    rng: &mut R,
    mut observer: O,
) -> EncodeResult<Encoding>
where
    R: Rng + ?Sized,
    O: Observer,
{
    config.validate()?;
    let mut disentangled = MPS::from_dense(state)?;
    disentangled.compress(config.chi_max).normalize();
    let n = disentangled.n();

    let mut layers: Vec<UnitaryLayer> = Vec::with_capacity(config.max_num_layers);
    let mut fidelities: Vec<f64> = Vec::with_capacity(config.max_num_layers);
    let mut phase = Phase::Iterate(0);
    let termination =
        loop {
            let layer_index =
                match phase {
                    Phase::Iterate(k) => k,
                    Phase::Done(termination) => break termination,
                };

            let mut snapshot = disentangled.clone();
            snapshot.compress(2).normalize();
            let layer = generate_layer(&snapshot, rng)?;
            for gate in layer.inverse().iter() {
                disentangled.apply_gate(gate).map_err(Disentangle)?;
            }
            disentangled.compress(config.chi_max);
            let fidelity = disentangled.overlap_zero().norm();

            observer.on_layer(layer_index, fidelity, layer.len());
            fidelities.push(fidelity);
            layers.push(layer);

            phase =
                if fidelity >= config.target_fidelity {
                    Phase::Done(Termination::Converged)
                } else if layer_index + 1 >= config.max_num_layers {
                    Phase::Done(Termination::Exhausted)
                } else {
                    Phase::Iterate(layer_index + 1)
                };
        };

    layers.reverse();
    let encoding =
        Encoding {
            program: GateProgram::new(n, layers),
            fidelity: fidelities.last().copied().unwrap_or(0.0),
            best_fidelity: fidelities.iter().copied().fold(0.0, f64::max),
            layers_used: fidelities.len(),
            fidelities,
            termination,
        };

    if config.verbose {
        let kind = entropy::classify(state)?;
        match termination {
            Termination::Converged => tracing::info!(
                fidelity = encoding.fidelity,
                layers = encoding.layers_used,
                entanglement = %kind,
                "reached target fidelity"
            ),
            Termination::Exhausted => tracing::info!(
                fidelity = encoding.fidelity,
                layers = encoding.layers_used,
                entanglement = %kind,
                "reached maximum number of layers"
            ),
        }
    }
    observer.on_finish(&encoding);
    Ok(encoding)
}

/// A validated [`EncoderConfig`], for encoding several states with the same
/// parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequential {
    config: EncoderConfig,
}

impl Sequential {
    /// Create a new encoder, validating `config`.
    pub fn new(config: EncoderConfig) -> EncodeResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Return the configuration.
    pub fn config(&self) -> &EncoderConfig { &self.config }

    /// Encode `state`, reporting progress through [`TracingObserver`] if the
    /// configuration is verbose.
    pub fn encode<R>(&self, state: &[C64], rng: &mut R) -> EncodeResult<Encoding>
    where R: Rng + ?Sized
    {
        if self.config.verbose {
            encode(state, &self.config, rng, TracingObserver)
        } else {
            encode(state, &self.config, rng, ())
        }
    }

    /// Encode `state`, reporting progress to `observer`.
    pub fn encode_with<R, O>(&self, state: &[C64], rng: &mut R, observer: O)
        -> EncodeResult<Encoding>
    where
        R: Rng + ?Sized,
        O: Observer,
    {
        encode(state, &self.config, rng, observer)
    }
}
