use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use loudness_profiler::audio::{AudioOutput, CpalOutput, NullOutput};
use loudness_profiler::config::{AcquisitionMode, AppConfig};
use loudness_profiler::http::{run_http_server, AppState};
use loudness_profiler::testing::{run_simulation, SimulatedListener};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "loudness_cli",
    about = "Adaptive loudness-matching test server and tools"
)]
struct Cli {
    /// Configuration file (defaults to $LOUDNESS_CONFIG or config/loudness.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    Single,
    Stratified,
}

impl From<ModeArg> for AcquisitionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => AcquisitionMode::Single,
            ModeArg::Stratified => AcquisitionMode::Stratified,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP/WebSocket server
    Serve {
        #[arg(long)]
        bind: Option<String>,
        /// Record tones instead of playing them
        #[arg(long)]
        null_audio: bool,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Default number of seed frequencies per test
        #[arg(long)]
        seed_count: Option<usize>,
    },
    /// List output devices as JSON
    Devices,
    /// Run a full session against a synthetic listener and print the curve
    Simulate {
        #[arg(long, default_value_t = 5)]
        seed_count: usize,
        #[arg(long, default_value_t = 10)]
        rounds: usize,
        #[arg(long, value_enum, default_value = "single")]
        mode: ModeArg,
        /// Standard deviation of the listener's answers in dB
        #[arg(long, default_value_t = 1.5)]
        noise: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Serve {
            bind,
            null_audio,
            mode,
            seed_count,
        } => run_serve(config, bind, null_audio, mode, seed_count),
        Commands::Devices => run_devices(&config),
        Commands::Simulate {
            seed_count,
            rounds,
            mode,
            noise,
            seed,
        } => run_simulate(config, seed_count, rounds, mode, noise, seed),
    }
}

fn run_serve(
    mut config: AppConfig,
    bind: Option<String>,
    null_audio: bool,
    mode: Option<ModeArg>,
    seed_count: Option<usize>,
) -> Result<ExitCode> {
    if let Some(bind) = bind {
        config.server.bind_addr = bind;
    }
    if let Some(mode) = mode {
        config.model.mode = mode.into();
    }
    if let Some(count) = seed_count {
        config.session.default_seed_count = count;
    }
    config.validate().context("validating configuration")?;

    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("parsing bind address {}", config.server.bind_addr))?;

    let audio: Arc<dyn AudioOutput> = if null_audio {
        Arc::new(NullOutput::new(&config.audio))
    } else {
        Arc::new(CpalOutput::new(&config.audio))
    };
    let state = AppState::new(Arc::new(config), audio);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run_http_server(state, addr))?;
    Ok(ExitCode::from(0))
}

fn run_devices(config: &AppConfig) -> Result<ExitCode> {
    let output = CpalOutput::new(&config.audio);
    let devices = output
        .list_output_devices()
        .context("listing output devices")?;
    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(ExitCode::from(0))
}

fn run_simulate(
    mut config: AppConfig,
    seed_count: usize,
    rounds: usize,
    mode: ModeArg,
    noise: f64,
    seed: u64,
) -> Result<ExitCode> {
    config.model.mode = mode.into();
    if config.model.seed_rng_seed.is_none() {
        config.model.seed_rng_seed = Some(seed);
    }
    config.validate().context("validating configuration")?;

    let mut listener = SimulatedListener::new(seed, noise);
    let report = run_simulation(Arc::new(config), &mut listener, seed_count, rounds)
        .context("running simulated session")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}
