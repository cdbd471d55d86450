//! Encode a dense statevector into a layered gate program.
//!
//! The state is read from a JSON file holding an array of `[re, im]` pairs in
//! least-significant-bit qubit order, or generated from one of the built-in
//! reference states. The layer budget defaults to the suggestion derived from
//! the state's entanglement entropy slope.
//!
//! # Exit codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0    | encoding reached the acceptance threshold |
//! | 1    | encoding fell short of the acceptance threshold |
//! | 2    | invalid input or configuration |
//!
//! # Usage
//!
//! ```bash
//! encode --demo ghz --qubits 8
//! encode --input state.json --chi-max 32 --output program.json --verbose
//! ```

use std::{ fs, path::PathBuf, process::ExitCode };
use clap::{ Parser, ValueEnum };
use num_complex::Complex64 as C64;
use rand::{ SeedableRng, rngs::StdRng };
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;
use mps_encode::{
    circuit::GateProgram,
    encoder::{
        Acceptance,
        DEFAULT_ACCEPT_FIDELITY,
        EncodeError,
        EncoderConfig,
        Sequential,
        Termination,
        TracingObserver,
    },
    entropy::{ self, EntanglementKind, EntropyError, LayerBudget },
    states,
};

/// Largest register accepted for built-in states.
const MAX_DEMO_QUBITS: usize = 30;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Demo {
    /// (∣0…0⟩ + ∣1…1⟩) / √2
    Ghz,
    /// Equal superposition of single excitations.
    W,
    /// ∣0…0⟩
    Zero,
    /// Haar-random state.
    Haar,
}

#[derive(Parser, Debug)]
#[command(
    name = "encode",
    version,
    about = "Approximate a statevector by a shallow layered gate program",
    long_about = None,
)]
struct Args {
    /// JSON file holding the state as an array of `[re, im]` pairs.
    #[arg(long, short = 'i', conflicts_with = "demo")]
    input: Option<PathBuf>,

    /// Built-in state to encode when no input file is given.
    #[arg(long, value_enum, default_value_t = Demo::Ghz)]
    demo: Demo,

    /// Number of qubits for built-in states, from 1 to 30.
    #[arg(long, short = 'n', default_value_t = 6)]
    qubits: usize,

    /// Seed for all random number generation.
    #[arg(long, default_value_t = 10546)]
    seed: u64,

    /// Stop disentangling once |⟨0…0∣ψ⟩| reaches this value.
    #[arg(long, default_value_t = 0.99)]
    target_fidelity: f64,

    /// Maximum number of layers (default: suggested from the entropy slope).
    #[arg(long)]
    max_layers: Option<usize>,

    /// Maximum bond dimension of the working state.
    #[arg(long, default_value_t = 64)]
    chi_max: usize,

    /// Minimum output fidelity for the program to be accepted.
    #[arg(long, default_value_t = DEFAULT_ACCEPT_FIDELITY)]
    accept: f64,

    /// Report per-layer progress and a summary.
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write the program and a summary as JSON to this file.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("could not access file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not process JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Entropy(#[from] EntropyError),

    #[error("number of qubits must lie in 1..={}, got {0}", MAX_DEMO_QUBITS)]
    InvalidQubits(usize),
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    num_qubits: usize,
    fidelity: f64,
    accepted: bool,
    disentangled_fidelity: f64,
    layers_used: usize,
    num_gates: usize,
    termination: Termination,
    entanglement: EntanglementKind,
    entropy_slope: f64,
    program: &'a GateProgram,
}

fn load_state(args: &Args, rng: &mut StdRng) -> Result<Vec<C64>, CliError> {
    if let Some(path) = &args.input {
        let pairs: Vec<[f64; 2]> = serde_json::from_str(&fs::read_to_string(path)?)?;
        return Ok(pairs.into_iter().map(|[re, im]| C64::new(re, im)).collect());
    }
    if !(1 ..= MAX_DEMO_QUBITS).contains(&args.qubits) {
        return Err(CliError::InvalidQubits(args.qubits));
    }
    let state =
        match args.demo {
            Demo::Ghz => states::ghz(args.qubits),
            Demo::W => states::w_state(args.qubits),
            Demo::Zero => states::zero_state(args.qubits),
            Demo::Haar => states::haar_state(args.qubits, rng),
        };
    Ok(state)
}

// verbose reporting happens in `run`, which already holds the classification
fn build_config(args: &Args, budget: LayerBudget) -> EncoderConfig {
    EncoderConfig::default()
        .with_target_fidelity(args.target_fidelity)
        .with_max_num_layers(args.max_layers.unwrap_or(budget.layers))
        .with_chi_max(args.chi_max)
        .with_verbose(false)
}

fn run(args: &Args) -> Result<bool, CliError> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let state = load_state(args, &mut rng)?;
    let profile = entropy::entropy_profile(&state)?;
    let slope = profile.slope();
    let kind = profile.kind();
    let num_qubits = state.len().trailing_zeros() as usize;
    let budget = LayerBudget::suggest(num_qubits, slope);

    let config = build_config(args, budget);
    tracing::info!(
        num_qubits,
        entropy_slope = slope,
        max_layers = config.max_num_layers,
        chi_max = config.chi_max,
        "encoding state"
    );

    let encoder = Sequential::new(config)?;
    let encoding =
        if args.verbose {
            encoder.encode_with(&state, &mut rng, TracingObserver)?
        } else {
            encoder.encode(&state, &mut rng)?
        };
    if args.verbose {
        tracing::info!(
            fidelity = encoding.fidelity,
            layers = encoding.layers_used,
            entanglement = %kind,
            termination = ?encoding.termination,
            "finished encoding"
        );
    }
    println!("{}", encoding);

    let acceptance = encoding.accept(&state, args.accept);
    match acceptance {
        Acceptance::Accepted(fidelity) =>
            tracing::info!(fidelity, gates = encoding.program.num_gates(), "accepted encoding"),
        Acceptance::Rejected(fidelity) =>
            tracing::warn!(
                fidelity,
                threshold = args.accept,
                "fidelity too low; discard the encoding in favor of an exact representation"
            ),
    }

    if let Some(path) = &args.output {
        let report =
            Report {
                num_qubits,
                fidelity: acceptance.fidelity(),
                accepted: acceptance.is_accepted(),
                disentangled_fidelity: encoding.fidelity,
                layers_used: encoding.layers_used,
                num_gates: encoding.program.num_gates(),
                termination: encoding.termination,
                entanglement: kind,
                entropy_slope: slope,
                program: &encoding.program,
            };
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        tracing::info!(path = %path.display(), "wrote report");
    }
    Ok(acceptance.is_accepted())
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(
            args.log_level
                .parse::<LevelFilter>()
                .unwrap_or(LevelFilter::INFO),
        )
        .with_target(false)
        .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            tracing::error!(error = %err, "encoding failed");
            ExitCode::from(2)
        },
    }
}
