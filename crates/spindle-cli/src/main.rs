use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use spindle_core::app::StatusTracker;
use spindle_core::domain::job::read_log_summary;
use spindle_core::impls::InMemoryProvider;
use spindle_core::ports::{
    DEFAULT_JOB_NAME, DigestAlgorithm, ExecutionProvider, IdGenerator, ProviderConfig,
    SystemClock, UlidGenerator,
};
use spindle_core::{Checkpoint, MemoConfig, MemoValue, Memoizer, TaskDescriptor};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "spindle", about = "Task memoization and execution-provider tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the memo hash of a JSON task descriptor.
    Hash {
        descriptor: PathBuf,
        #[arg(long, value_enum, default_value = "sha256")]
        digest: DigestArg,
    },

    /// Print the bounded summary of a log file.
    Summary { path: PathBuf },

    /// Run check -> submit -> poll -> update -> check against the in-memory provider.
    Demo {
        /// Seed the memo table from this JSON checkpoint.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        #[arg(long)]
        disable_memo: bool,
        #[arg(long, default_value_t = 1)]
        interval_secs: u64,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DigestArg {
    Sha256,
    Sha512,
}

impl From<DigestArg> for DigestAlgorithm {
    fn from(arg: DigestArg) -> Self {
        match arg {
            DigestArg::Sha256 => DigestAlgorithm::Sha256,
            DigestArg::Sha512 => DigestAlgorithm::Sha512,
        }
    }
}

/// JSON 形式の記述子。値は素の JSON で書けるようにする。
#[derive(Debug, Deserialize)]
struct DescriptorFile {
    func_name: String,
    fn_hash: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
    #[serde(default)]
    kwargs: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    env: serde_json::Value,
    #[serde(default = "default_memoize")]
    memoize: bool,
}

fn default_memoize() -> bool {
    true
}

impl DescriptorFile {
    fn into_descriptor(self, ids: &impl IdGenerator) -> TaskDescriptor {
        let mut task = TaskDescriptor::new(
            ids.generate_task_id(),
            self.func_name,
            self.fn_hash,
            MemoValue::from(self.env),
        )
        .with_args(self.args.into_iter().map(MemoValue::from))
        .with_memoize(self.memoize);
        for (name, value) in self.kwargs {
            task = task.with_kwarg(name, MemoValue::from(value));
        }
        task
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn hash(descriptor: &Path, digest: DigestArg) -> Result<()> {
    let ids = UlidGenerator::new(SystemClock);
    let task = read_json::<DescriptorFile>(descriptor)?.into_descriptor(&ids);
    let config = MemoConfig {
        enabled: true,
        digest: digest.into(),
    };
    let memo: Memoizer = Memoizer::from_config(&config, Checkpoint::new());
    println!("{}", memo.make_hash(&task)?);
    Ok(())
}

fn summary(path: &Path) -> Result<()> {
    match read_log_summary(path) {
        Some(text) => {
            print!("{text}");
            Ok(())
        }
        None => bail!("{} is not readable", path.display()),
    }
}

async fn demo(checkpoint: Option<PathBuf>, disable_memo: bool, interval_secs: u64) -> Result<()> {
    let seed: Checkpoint = match &checkpoint {
        Some(path) => read_json(path)?,
        None => Checkpoint::new(),
    };
    let memo: Memoizer = Memoizer::new(!disable_memo, seed);
    let provider = InMemoryProvider::new(ProviderConfig::new(
        "inmem",
        Duration::from_secs(interval_secs),
    ));
    let ids = UlidGenerator::new(SystemClock);

    for round in 1..=2 {
        let mut task = TaskDescriptor::new(ids.generate_task_id(), "f", "h1", "e")
            .with_args([MemoValue::Int(1), MemoValue::Int(2)]);

        if let Some(result) = memo.check_memo(&mut task)? {
            tracing::info!(round, task_id = %task.task_id, %result, "cache hit");
            continue;
        }

        let job_id = provider.submit("f(1, 2)", 1, DEFAULT_JOB_NAME).await?;
        let mut tracker = StatusTracker::new();
        tracker.track(job_id.clone());
        tracker.poll_until_terminal(&provider).await?;

        let status = tracker
            .get(&job_id)
            .and_then(|job| job.status.clone())
            .context("tracked job has no status")?;
        tracing::info!(round, task_id = %task.task_id, job_id = %job_id, %status, "task ran");
        memo.update_memo(&task, serde_json::json!(42));
    }

    println!("{}", serde_json::to_string_pretty(&memo.checkpoint())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Hash { descriptor, digest } => hash(&descriptor, digest),
        Command::Summary { path } => summary(&path),
        Command::Demo {
            checkpoint,
            disable_memo,
            interval_secs,
        } => demo(checkpoint, disable_memo, interval_secs).await,
    }
}
