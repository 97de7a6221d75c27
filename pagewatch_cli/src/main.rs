pub mod options;

use clap::Parser;
use options::{Cli, Commands};
use pagewatch_core::{
    CaptureOptions, Competitor, CompetitorRepository, HttpRendererGateway, InMemoryStore,
    ListOrder, Orchestrator, PageWatchConfig, RendererGateway, SimulateRendererGateway,
    SnapshotRepository, Telemetry,
};
use std::sync::Arc;

#[cfg(feature = "sqlite")]
async fn open_sqlite(
    path: &str,
) -> pagewatch_core::PageWatchResult<(
    Arc<dyn CompetitorRepository>,
    Arc<dyn SnapshotRepository>,
)> {
    let store = Arc::new(pagewatch_core::SqliteStore::connect(path).await?);
    Ok((
        store.clone() as Arc<dyn CompetitorRepository>,
        store as Arc<dyn SnapshotRepository>,
    ))
}

async fn build_store(cli: &Cli) -> (Arc<dyn CompetitorRepository>, Arc<dyn SnapshotRepository>) {
    if let Some(path) = &cli.sqlite {
        #[cfg(feature = "sqlite")]
        {
            return match open_sqlite(path).await {
                Ok(pair) => pair,
                Err(e) => {
                    eprintln!("failed to open sqlite store at {}: {}", path, e);
                    std::process::exit(1);
                }
            };
        }
        #[cfg(not(feature = "sqlite"))]
        {
            eprintln!(
                "built without the `sqlite` feature; rebuild with --features sqlite to use --sqlite {}",
                path
            );
            std::process::exit(1);
        }
    }

    let store = Arc::new(InMemoryStore::new());
    (
        store.clone() as Arc<dyn CompetitorRepository>,
        store as Arc<dyn SnapshotRepository>,
    )
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize result: {}", e),
    }
}

async fn register_if_requested(cli: &Cli, competitors: &Arc<dyn CompetitorRepository>) {
    let Some(pair) = &cli.register else { return };
    let [id, url] = pair.as_slice() else {
        eprintln!("--register expects exactly two values: <id> <url>");
        std::process::exit(1);
    };

    match competitors.get(id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let url = pagewatch_core::renderer::normalize_url(url);
            let competitor = Competitor::new(id.clone(), url);
            if let Err(e) = competitors.save(&competitor).await {
                eprintln!("failed to register competitor {}: {}", id, e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("failed to look up competitor {}: {}", id, e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        use env_logger::Env;
        let env = Env::default()
            .filter_or("RUST_LOG", "info")
            .write_style_or("RUST_LOG_STYLE", "always");
        env_logger::init_from_env(env);
    }

    let (competitors, snapshots) = build_store(&cli).await;
    register_if_requested(&cli, &competitors).await;

    let mut config = PageWatchConfig::new().merge_env();
    if let Some(base_url) = &cli.renderer_base_url {
        config = config.with_renderer_base_url(base_url.clone());
    }
    if let Some(token) = &cli.renderer_token {
        config = config.with_renderer_bearer_token(token.clone());
    }

    match cli.command {
        Commands::Capture {
            competitor_id,
            simulate_file,
            manual,
            initial,
        } => {
            let simulate = simulate_file.is_some();
            let renderer: Arc<dyn RendererGateway> = match &simulate_file {
                Some(path) => {
                    let html = match tokio::fs::read_to_string(path).await {
                        Ok(html) => html,
                        Err(e) => {
                            eprintln!("failed to read {}: {}", path, e);
                            std::process::exit(1);
                        }
                    };
                    let competitor = match competitors.get(&competitor_id).await {
                        Ok(Some(c)) => c,
                        Ok(None) => {
                            eprintln!(
                                "unknown competitor {}; pass --register <id> <url> first",
                                competitor_id
                            );
                            std::process::exit(1);
                        }
                        Err(e) => {
                            eprintln!("failed to look up competitor {}: {}", competitor_id, e);
                            std::process::exit(1);
                        }
                    };
                    let gateway = SimulateRendererGateway::new();
                    gateway.set_page(competitor.url.clone(), html).await;
                    Arc::new(gateway)
                }
                None => Arc::new(HttpRendererGateway::new(
                    config.renderer_base_url.clone(),
                    config.renderer_bearer_token.clone(),
                )),
            };

            let orchestrator = Orchestrator::new(
                competitors,
                snapshots,
                renderer,
                config,
                Arc::new(Telemetry::new()),
            );

            let options = CaptureOptions {
                simulate: Some(simulate),
                is_manual_check: manual,
                is_initial_capture: initial,
                ..Default::default()
            };

            match orchestrator.capture(&competitor_id, options).await {
                Ok(result) => print_json(&result),
                Err(e) => {
                    eprintln!("capture failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::History { competitor_id } => {
            match snapshots.list(&competitor_id, ListOrder::Ascending).await {
                Ok(snaps) => print_json(&snaps),
                Err(e) => {
                    eprintln!("failed to list history for {}: {}", competitor_id, e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Reconstruct {
            competitor_id,
            version,
        } => {
            match pagewatch_core::version_engine::reconstruct(&snapshots, &competitor_id, version).await {
                Ok(html) => println!("{}", html),
                Err(e) => {
                    eprintln!("reconstruction failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Retain => {
            let orchestrator = Orchestrator::new(
                competitors,
                snapshots,
                Arc::new(SimulateRendererGateway::new()),
                config,
                Arc::new(Telemetry::new()),
            );
            match orchestrator.run_global_retention_sweep().await {
                Ok(deleted) => print_json(&serde_json::json!({ "deleted": deleted })),
                Err(e) => {
                    eprintln!("retention sweep failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Stats => {
            let orchestrator = Orchestrator::new(
                competitors,
                snapshots,
                Arc::new(SimulateRendererGateway::new()),
                config,
                Arc::new(Telemetry::new()),
            );
            print_json(&orchestrator.telemetry().snapshot());
        }
    }
}
