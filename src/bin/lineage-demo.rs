use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use lineage::{exit_code_for_sink_error, CancelError, Context, SinkConfig, SinkError};

#[derive(Parser, Debug)]
#[command(
    name = "lineage-demo",
    version,
    about = "Spawn a tree of workers and watch their lineage-named log lines."
)]
struct Cli {
    /// Log level: debug|info|warn|error|panic|fatal (overrides LINEAGE_LOG_LEVEL)
    #[arg(long)]
    level: Option<String>,

    /// Log destination: stderr, stdout or a file path
    #[arg(long)]
    output: Option<String>,

    /// Log encoding: console|json
    #[arg(long)]
    encoding: Option<String>,

    /// Record the caller's file:line on every line
    #[arg(long)]
    show_caller: bool,

    /// YAML sink config; command-line flags win over it
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug, Clone)]
enum Cmd {
    /// Run a worker tree under a shared deadline
    Run {
        /// Workers forked from the root
        #[arg(long, default_value_t = 3)]
        workers: usize,
        /// Levels of sub-workers under each worker
        #[arg(long, default_value_t = 2)]
        depth: usize,
        /// Deadline for the whole tree, e.g. "750ms" or "2s"
        #[arg(long, value_parser = humantime::parse_duration, default_value = "750ms")]
        timeout: Duration,
        /// Simulated work per task, e.g. "100ms"
        #[arg(long, value_parser = humantime::parse_duration, default_value = "100ms")]
        step: Duration,
    },
    /// Print session names from the process-wide generator
    Names {
        #[arg(long, default_value_t = 3)]
        count: usize,
        /// Header prefix installed before generating
        #[arg(long)]
        prefix: Option<String>,
    },
}

fn sink_config(cli: &Cli) -> Result<SinkConfig, SinkError> {
    let mut cfg = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            SinkConfig::from_yaml_str(&text)?
        }
        None => SinkConfig::default(),
    }
    .overlay_env()?;
    if let Some(level) = &cli.level {
        cfg.level = level.parse()?;
    }
    if let Some(output) = &cli.output {
        cfg.output = output.clone();
    }
    if let Some(encoding) = &cli.encoding {
        cfg.encoding = encoding.parse()?;
    }
    cfg.show_caller |= cli.show_caller;
    Ok(cfg)
}

fn spawn_worker(ctx: Context, depth: usize, step: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        // "tree.depth" is set once on the root and read here through the env overlay.
        let level = ctx
            .env()
            .get_usize("tree.depth")
            .map_or(0, |total| total.saturating_sub(depth));
        ctx.info("started", &[("level", &level), ("remaining", &depth)]);
        let mut children = Vec::new();
        if depth > 0 {
            for _ in 0..2 {
                children.push(spawn_worker(ctx.fork_at("sub"), depth - 1, step));
            }
        }
        tokio::select! {
            _ = ctx.done() => {
                let cause = ctx.err().unwrap_or(CancelError::Canceled);
                ctx.warn("stopped early", &[("cause", &cause)]);
            }
            _ = tokio::time::sleep(step * (depth as u32 + 1)) => {
                ctx.info("finished", &[]);
            }
        }
        for child in children {
            let _ = child.await;
        }
    })
}

async fn run_tree(workers: usize, depth: usize, timeout: Duration, step: Duration) -> Result<()> {
    let root = Context::session();
    root.env().set("tree.depth", depth);
    lineage::set_session(&root, root.name());

    let (scoped, cancel) = root.with_timeout(timeout);
    scoped.info("tree starting", &[("workers", &workers)]);

    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        handles.push(spawn_worker(scoped.fork_at("worker"), depth, step));
    }
    for h in handles {
        h.await.context("worker task panicked")?;
    }

    // Cleanup must outlive the tree's deadline.
    let cleanup = scoped.reborn().at("cleanup");
    cleanup.info(
        "tree done",
        &[
            ("cause", &scoped.err().map(|e| e.to_string()).unwrap_or_else(|| "none".into())),
            ("cleanup_active", &!cleanup.is_done()),
            ("session", &lineage::session::session(&cleanup)),
        ],
    );
    cancel.cancel();
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let cfg = match sink_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("lineage-demo: {e}");
            return ExitCode::from(exit_code_for_sink_error(&e));
        }
    };
    let restore = match lineage::use_simple_sink(&cfg) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("lineage-demo: {e}");
            return ExitCode::from(exit_code_for_sink_error(&e));
        }
    };

    let result = match cli.command.clone().unwrap_or(Cmd::Run {
        workers: 3,
        depth: 2,
        timeout: Duration::from_millis(750),
        step: Duration::from_millis(100),
    }) {
        Cmd::Run {
            workers,
            depth,
            timeout,
            step,
        } => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("lineage-worker")
            .build()
            .context("failed to start runtime")
            .and_then(|rt| rt.block_on(run_tree(workers, depth, timeout, step))),
        Cmd::Names { count, prefix } => {
            if let Some(p) = prefix {
                lineage::use_prefixed_session_name(&p);
            }
            for _ in 0..count {
                println!("{}", lineage::session_name(None));
            }
            Ok(())
        }
    };

    restore();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("lineage-demo: {e:#}");
            ExitCode::from(1)
        }
    }
}
