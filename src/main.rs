/*!
 * io-dispatch - Main Entry Point
 *
 * Runs the named scenarios through one backend:
 * - Queued (io_uring) with descriptors, the default
 * - Queued with registered file indexes (--use-file-indexes)
 * - Blocking system calls (--use-syscalls)
 */

use clap::Parser;
use io_dispatch::scenarios;
use io_dispatch::{init_tracing, DispatchConfig, Dispatcher, Scenario, ScenarioContext};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "io-dispatch")]
#[command(about = "Exercise file and socket operations through io_uring or plain system calls")]
struct Args {
    /// Use blocking system calls instead of io_uring
    #[arg(long, conflicts_with = "use_file_indexes")]
    use_syscalls: bool,

    /// Address resources through the ring's registered file table
    #[arg(long)]
    use_file_indexes: bool,

    /// Submission queue entries (default: 8)
    #[arg(long, value_name = "N")]
    queue_depth: Option<u32>,

    /// Registered file table slots (default: 10)
    #[arg(long, value_name = "N")]
    file_table_size: Option<u32>,

    /// Run only these scenarios, in the order given
    #[arg(long = "only", value_name = "NAME")]
    only: Vec<Scenario>,

    /// Directory scenario files are created in
    #[arg(long, default_value = "/tmp")]
    root: PathBuf,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Exit with status 1 if any scenario fails
    #[arg(long)]
    strict: bool,
}

impl Args {
    fn config(&self) -> Result<DispatchConfig> {
        let base = if self.use_syscalls {
            DispatchConfig::direct()
        } else if self.use_file_indexes {
            DispatchConfig::indexed()
        } else {
            DispatchConfig::queued()
        };

        let mut config = base.with_env_overrides()?;
        if let Some(depth) = self.queue_depth {
            config = config.with_queue_depth(depth);
        }
        if let Some(size) = self.file_table_size {
            config = config.with_file_table_size(size);
        }
        Ok(config)
    }

    fn scenarios(&self) -> Vec<Scenario> {
        if self.only.is_empty() {
            Scenario::ALL.to_vec()
        } else {
            self.only.clone()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = init_tracing() {
        eprintln!("tracing already initialized: {e}");
    }

    let config = args.config()?;
    info!(
        backend = %config.backend,
        addressing = %config.addressing,
        queue_depth = config.queue_depth,
        file_table_size = config.file_table_size,
        "io-dispatch starting"
    );

    let mut dispatcher = Dispatcher::from_config(&config)?;
    let ctx = ScenarioContext::new(&args.root);
    let report = scenarios::run(&mut dispatcher, &ctx, &args.scenarios());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    }

    if !report.all_passed() {
        warn!(failed = report.failed(), "some scenarios failed");
        if args.strict {
            std::process::exit(1);
        }
    }

    Ok(())
}
