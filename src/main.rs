use anyhow::Context;
use reach::{
    AppState, ReachConfig, ReachConfigManager,
    api::routes,
    cli::{
        Cli, Commands,
        output::{Output, OutputSink},
    },
    research::{ConfiguredDeps, launch},
    transport::{Edits, SessionStart},
};
use std::{net::SocketAddr, path::Path, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(config: &ReachConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.server.log_format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Load the configuration file, falling back to defaults when it is absent.
fn load_config(path: &Path, output: &Output) -> anyhow::Result<(Arc<ReachConfigManager>, bool)> {
    if path.exists() {
        let manager = ReachConfigManager::new(path)
            .with_context(|| format!("loading {}", path.display()))?;
        Ok((Arc::new(manager), true))
    } else {
        output.warning(&format!(
            "{} not found, using built-in defaults",
            path.display()
        ));
        Ok((
            Arc::new(ReachConfigManager::from_config(ReachConfig::default())),
            false,
        ))
    }
}

async fn serve(manager: Arc<ReachConfigManager>, from_file: bool) -> anyhow::Result<()> {
    if from_file && let Err(e) = manager.start_watching() {
        warn!("Config hot reload disabled: {}", e);
    }

    let config = manager.config();
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host / server.port")?;

    let app = routes::app(AppState::new(manager.clone()));
    info!(%addr, version = env!("CARGO_PKG_VERSION"), "reach-server listening");

    let server = axum::serve(tokio::net::TcpListener::bind(addr).await?, app);
    let graceful = server.with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("ctrl-c received; shutting down");
    });

    if let Err(e) = graceful.await {
        error!(error = %e, "server error");
    }
    if from_file {
        manager.stop_watching();
    }
    Ok(())
}

fn show_config(manager: &ReachConfigManager, full: bool, validate: bool, output: &Output) -> anyhow::Result<()> {
    let config = manager.config();

    if validate {
        match config.validate() {
            Ok(()) => output.success("Configuration is valid"),
            Err(e) => {
                output.error(&e.to_string());
                anyhow::bail!("invalid configuration");
            }
        }
    }

    output.header("Configuration");
    output.kv("file", &manager.path().display().to_string());
    output.kv("server", &format!("{}:{}", config.server.host, config.server.port));
    output.kv("llm", &format!("{} ({} / {})", config.llm.provider, config.llm.fast_model, config.llm.smart_model));
    output.kv("embeddings", &format!("{} ({})", config.embeddings.provider, config.embeddings.model));
    output.kv("retriever", &config.research.retriever);
    output.kv("scraper", &config.scraper.strategy);

    if full {
        output.header("Full configuration");
        println!("{}", toml::to_string_pretty(config.as_ref())?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let (manager, from_file) = load_config(&cli.config, &output)?;
    init_tracing(&manager.config(), cli.verbose);

    match cli.command {
        None | Some(Commands::Serve) => {
            output.banner();
            serve(manager, from_file).await
        }
        Some(Commands::Research {
            task,
            report_type,
            sources,
            urls,
            files,
            cadence,
        }) => {
            let start = SessionStart {
                task,
                report_kind: report_type,
                sources,
                edits: Edits::default(),
                cadence,
                source_urls: urls,
                file_urls: files,
                subtopics: Vec::new(),
            };
            let sink = OutputSink::new(output);
            let outcome = launch(&ConfiguredDeps, manager.config(), start, &sink).await?;
            output.hint(&format!(
                "{} sub-queries, {} sources consulted",
                outcome.queries.len(),
                outcome.sources.len()
            ));
            Ok(())
        }
        Some(Commands::Config { full, validate }) => show_config(&manager, full, validate, &output),
    }
}
