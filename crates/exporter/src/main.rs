mod metrics_server;
mod telemetry;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tibber_exporter_core::config::Config;
use tibber_exporter_core::field::Field;
use tibber_exporter_core::time::format_duration;
use tibber_exporter_ingest::StreamIngestor;
use tibber_exporter_ingest::replay::{ReplayOptions, ReplaySource};
use tibber_exporter_ingest::tibber::TibberSource;
use tibber_exporter_store::{MeasurementStore, MetricProjector};

use crate::telemetry::{LogFormat, init_cli_tracing, init_run_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "tibber-exporter")]
#[command(about = "Prometheus exporter for Tibber live power measurements")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Subscribe to the live feed and serve metrics (default)")]
    Run(RunArgs),
    #[command(about = "Print the effective configuration")]
    Config,
    #[command(about = "List exported fields with metric names and update policies")]
    Fields {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[arg(long)]
    listen_addr: Option<String>,
    #[arg(long)]
    metrics_path: Option<String>,
    #[arg(long, value_parser = humantime::parse_duration)]
    staleness: Option<Duration>,
    #[arg(long, help = "Feed samples from a JSON-lines file")]
    replay: Option<PathBuf>,
    #[arg(long, value_parser = humantime::parse_duration, requires = "replay")]
    replay_interval: Option<Duration>,
    #[arg(long, requires = "replay", help = "Restamp samples at send time")]
    replay_restamp: bool,
}

enum Feed {
    Live(TibberSource),
    Replay(ReplaySource),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run_server(args).await,
        Commands::Config => {
            init_cli_tracing();
            let cfg = Config::load().context("load configuration")?;
            println!("{}", serde_json::to_string_pretty(&config_view(&cfg))?);
            Ok(())
        }
        Commands::Fields { json } => {
            init_cli_tracing();
            let cfg = Config::load().context("load configuration")?;
            print_fields(&cfg, json)
        }
    }
}

async fn run_server(args: RunArgs) -> anyhow::Result<()> {
    let mut cfg = Config::load().context("load configuration")?;
    apply_run_args(&mut cfg, &args);
    cfg.validate().context("validate configuration")?;

    init_run_tracing(LogFormat::from_env());

    let feed = match &args.replay {
        Some(path) => Feed::Replay(ReplaySource::new(
            path,
            ReplayOptions {
                interval: args.replay_interval,
                restamp: args.replay_restamp,
                hold_open: true,
            },
        )),
        None => {
            let source = TibberSource::from_config(&cfg).context("configure live feed")?;
            Feed::Live(source)
        }
    };

    let store = MeasurementStore::new(cfg.policy_table());
    let projector = MetricProjector::new(store.clone(), cfg.staleness_threshold);
    let ingestor = StreamIngestor::new(store, cfg.channel_capacity);

    let addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", cfg.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind metrics listener on {addr}"))?;
    let router = metrics_server::router(projector, &cfg.metrics_path)
        .context("register metrics collector")?;

    eprintln!("tibber-exporter run");
    eprintln!("  listen: http://{addr}{}", cfg.metrics_path);
    eprintln!("  staleness: {}", format_duration(cfg.staleness_threshold));
    match &feed {
        Feed::Live(source) => eprintln!("  feed: tibber home {}", source.home_id()),
        Feed::Replay(source) => eprintln!("  feed: replay {}", source.path().display()),
    }

    let server_task = tokio::spawn(async move { axum::serve(listener, router).await });
    let ingest_task = tokio::spawn(async move {
        match feed {
            Feed::Live(source) => ingestor.run(source).await,
            Feed::Replay(source) => ingestor.run(source).await,
        }
    });

    let result = tokio::select! {
        res = ingest_task => {
            res.context("ingest task join failed")?.context("live feed failed")
        }
        res = server_task => {
            res.context("metrics server join failed")?.context("metrics server failed")
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
            Ok(())
        }
    };

    if let Err(err) = &result {
        tracing::error!(error = ?err, "exporter stopped");
    }
    shutdown_tracing();
    result
}

fn apply_run_args(cfg: &mut Config, args: &RunArgs) {
    if let Some(v) = &args.listen_addr {
        cfg.listen_addr = v.clone();
    }
    if let Some(v) = &args.metrics_path {
        cfg.metrics_path = v.clone();
    }
    if let Some(v) = args.staleness {
        cfg.staleness_threshold = v;
    }
}

fn config_view(cfg: &Config) -> serde_json::Value {
    let cfg = cfg.redacted();
    json!({
        "access_token": cfg.access_token,
        "home_id": cfg.home_id,
        "api_endpoint": cfg.api_endpoint,
        "listen_addr": cfg.listen_addr,
        "metrics_path": cfg.metrics_path,
        "staleness_threshold": format_duration(cfg.staleness_threshold),
        "sparse_fields": cfg.sparse_fields,
        "reconnect_initial": format_duration(cfg.reconnect_initial),
        "reconnect_max": format_duration(cfg.reconnect_max),
        "max_reconnect_attempts": cfg.max_reconnect_attempts,
        "idle_timeout": format_duration(cfg.idle_timeout),
        "channel_capacity": cfg.channel_capacity,
        "user_agent": cfg.user_agent,
    })
}

fn print_fields(cfg: &Config, json: bool) -> anyhow::Result<()> {
    let policies = cfg.policy_table();
    if json {
        let rows: Vec<_> = Field::EXPORT_ORDER
            .iter()
            .map(|field| {
                json!({
                    "field": field,
                    "metric": field.metric_name(),
                    "group": field.group(),
                    "policy": policies.policy(*field),
                    "help": field.help(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for field in Field::EXPORT_ORDER {
        println!(
            "{:<32} {:<44} {:<8} {:?}",
            field.name(),
            field.metric_name(),
            format!("{:?}", field.group()),
            policies.policy(field)
        );
    }
    Ok(())
}
