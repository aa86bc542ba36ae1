use std::{net::SocketAddr, path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use commsemu::{
    bus::{BusOptions, TcpBus, TcpPublisher},
    tc::{command::Runner, setup::install_prio, RecordingShaper, Shaper, TcShaper},
    wire::sample,
    Config, Coordinator, InputPolicy, Overrides,
};

/// Directives kept in memory by `--dry-run`.
const DRY_RUN_HISTORY: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "commsemu", author, version, about = "Robot-to-robot link impairment emulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen for impairment samples and apply them with tc netem
    Run(RunArgs),
    /// Replace the root qdisc of an interface with a prio qdisc
    Setup(SetupArgs),
    /// Publish one sample to a running emulator
    Publish(PublishArgs),
}

#[derive(Args, Debug)]
#[command(override_usage = "commsemu run [OPTIONS] [SOURCE TARGET | SOURCE SOURCE_IFACE TARGET TARGET_IFACE]")]
struct RunArgs {
    /// Link endpoints. Interfaces default to veth-<name>
    endpoints: Vec<String>,

    /// TOML configuration file
    #[arg(long, short = 'c', env = "COMMSEMU_CONFIG")]
    config: Option<PathBuf>,
    /// Address to accept publishers on
    #[arg(long)]
    listen: Option<SocketAddr>,
    /// Topic prefix links are scoped under
    #[arg(long)]
    prefix: Option<String>,
    /// What to do with samples outside their valid range
    #[arg(long, value_enum)]
    out_of_range: Option<InputPolicy>,
    /// Deadline for a single tc invocation, 0 disables it
    #[arg(long)]
    command_timeout_ms: Option<u64>,
    #[command(flatten)]
    exec: ExecArgs,
}

#[derive(Args, Debug)]
struct SetupArgs {
    interface: String,
    /// Number of prio bands (2 to 16)
    bands: u32,
    #[command(flatten)]
    exec: ExecArgs,
}

#[derive(Args, Debug)]
struct PublishArgs {
    /// Address of the emulator's bus
    addr: SocketAddr,
    topic: String,
    #[arg(allow_negative_numbers = true)]
    value: f64,
}

#[derive(Args, Debug)]
struct ExecArgs {
    /// Run tc directly instead of through `sudo -n`
    #[arg(long)]
    no_sudo: bool,
    /// Log tc commands instead of running them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Setup(args) => setup(args).await,
        Command::Publish(args) => publish(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn shaper(dry_run: bool, runner: Runner) -> Arc<dyn Shaper> {
    if dry_run {
        Arc::new(RecordingShaper::new().with_history(DRY_RUN_HISTORY))
    } else {
        Arc::new(TcShaper::new(runner))
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply(Overrides {
        endpoints: args.endpoints,
        listen: args.listen,
        prefix: args.prefix,
        out_of_range: args.out_of_range,
        command_timeout_ms: args.command_timeout_ms,
        no_sudo: args.exec.no_sudo,
        dry_run: args.exec.dry_run,
    })?;
    let links = config.links()?;

    let runner = Runner::new().with_sudo(config.sudo).with_timeout(config.command_timeout());
    let shaper = shaper(config.dry_run, runner);

    let bus = TcpBus::with_options(config.listen, BusOptions::default())
        .await
        .with_context(|| format!("failed to listen on {}", config.listen))?;

    let mut coordinators = Vec::with_capacity(links.len());
    for link in links {
        let coordinator = Arc::new(Coordinator::new(link, Arc::clone(&shaper)).with_policy(config.out_of_range));
        // Start from a known state rather than whatever the interfaces had.
        let _ = coordinator.reapply().await;

        commsemu::subscribe_link(&bus, Arc::clone(&coordinator), &config.prefix)
            .await
            .with_context(|| format!("failed to subscribe link {}", coordinator.link().name()))?;
        info!(
            link = %coordinator.link(),
            scope = %coordinator.link().scope(&config.prefix),
            policy = ?coordinator.policy(),
            "link ready"
        );

        coordinators.push(coordinator);
    }

    info!(addr = %bus.local_addr(), links = coordinators.len(), dry_run = config.dry_run, "emulator running");
    shutdown_signal().await.context("failed to wait for shutdown signal")?;
    info!("shutting down");

    Ok(())
}

async fn setup(args: SetupArgs) -> Result<()> {
    let shaper = shaper(args.exec.dry_run, Runner::new().with_sudo(!args.exec.no_sudo));
    install_prio(&*shaper, &args.interface, args.bands)
        .await
        .with_context(|| format!("setup of {} failed", args.interface))
}

async fn publish(args: PublishArgs) -> Result<()> {
    let mut publisher =
        TcpPublisher::connect(args.addr).await.with_context(|| format!("failed to connect to {}", args.addr))?;
    publisher.publish(&args.topic, sample::encode(args.value)).await?;
    publisher.close().await?;

    info!(topic = %args.topic, value = args.value, "sample published");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
