//! draftcheck - writing feedback from the command line
//!
//! Each input file is treated as one editable surface. All surfaces share a
//! single request budget; when the API is unavailable the built-in basic
//! checks run instead.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use draftcheck_adapters::config::{self, Config, ConfigStore};
use draftcheck_adapters::keyring;
use draftcheck_core::{
    Affordance, AnalysisError, AnalysisMode, AnalysisOutcome, RateLimiter, SettingsStore,
    SuggestionType, SurfaceRequest, SurfaceResponse,
};
use draftcheck_engine::{
    EngineConfig, RemoteSuggestionClient, Scheduler, SuggestionBackend, SuggestionEngine, SurfaceId,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "draftcheck",
    about = "Writing suggestions for grammar, clarity, engagement and delivery",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check one or more files (stdin when none are given)
    Check {
        files: Vec<PathBuf>,
        /// Only run the built-in basic checks
        #[arg(long)]
        offline: bool,
        /// Use popup tuning: no budget trip, no temporary offline window
        #[arg(long)]
        popup: bool,
        /// Print each text with every suggestion applied
        #[arg(long)]
        apply: bool,
        /// Print outcomes as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rewrite text in a different tone
    Improve {
        #[arg(long, default_value = "professional")]
        tone: String,
        file: Option<PathBuf>,
    },
    /// Treat each stdin line as the current text of one field being edited
    Compose,
    /// Store an API key
    Setup {
        /// Remove the stored key instead
        #[arg(long)]
        clear: bool,
    },
    /// Turn offline mode on or off
    Offline { state: Toggle },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    match args.command {
        Command::Check {
            files,
            offline,
            popup,
            apply,
            json,
        } => check(files, offline, popup, apply, json).await,
        Command::Improve { tone, file } => improve(&tone, file).await,
        Command::Compose => compose().await,
        Command::Setup { clear } => setup(clear),
        Command::Offline { state } => set_offline(state),
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("DRAFTCHECK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Err(err) = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("logging bootstrap failed: {err}");
    }
}

fn build_backend(config: &Config, engine: &EngineConfig) -> Result<Arc<dyn SuggestionBackend>> {
    let client_config = engine
        .client
        .clone()
        .with_overrides(config.model.as_deref(), config.api_endpoint.as_deref());
    let client = RemoteSuggestionClient::new(client_config)?;
    Ok(Arc::new(client))
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

async fn check(
    files: Vec<PathBuf>,
    offline: bool,
    popup: bool,
    apply: bool,
    json: bool,
) -> Result<()> {
    let engine_config = if popup {
        EngineConfig::popup()
    } else {
        EngineConfig::in_page()
    };
    let store = Arc::new(ConfigStore::load());
    let backend = build_backend(&store.config(), &engine_config)?;
    let limiter = RateLimiter::shared(engine_config.rate_limit);

    let inputs: Vec<(String, String)> = if files.is_empty() {
        vec![("<stdin>".to_string(), read_input(None)?)]
    } else {
        files
            .iter()
            .map(|path| -> Result<(String, String)> {
                Ok((path.display().to_string(), read_input(Some(path))?))
            })
            .collect::<Result<_>>()?
    };

    tracing::debug!(surfaces = inputs.len(), popup, "checking surfaces");

    let engines: Vec<SuggestionEngine> = inputs
        .iter()
        .map(|_| {
            SuggestionEngine::with_shared_limiter(
                Arc::clone(&backend),
                store.clone(),
                Arc::clone(&limiter),
                engine_config.clone(),
            )
        })
        .collect();

    let mode = if offline {
        AnalysisMode::offline()
    } else {
        AnalysisMode::online()
    };
    let outcomes = futures::future::join_all(
        engines
            .iter()
            .zip(&inputs)
            .map(|(engine, (_, text))| engine.analyze(text, mode)),
    )
    .await;

    let mut reports = Vec::new();
    for ((engine, (name, text)), outcome) in engines.iter().zip(&inputs).zip(outcomes) {
        let Some(outcome) = outcome else {
            if json {
                reports.push(serde_json::json!({ "surface": name, "skipped": true }));
            } else {
                println!("{name}: too short to check");
            }
            continue;
        };

        let status = engine.status();
        let patched = apply.then(|| engine.apply_all(text));
        if json {
            let mut report = outcome_json(name, &outcome);
            if let Some(patched) = &patched {
                report["applied_text"] = serde_json::Value::String(patched.text.clone());
            }
            reports.push(report);
            continue;
        }

        print_outcome(name, &outcome);
        println!("  {}", status.label());
        if let Some(patched) = patched {
            println!();
            println!("  Applied {} suggestion(s), {} stale:", patched.applied, patched.stale);
            println!("{}", patched.text);
        }
        println!();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}

fn outcome_json(name: &str, outcome: &AnalysisOutcome) -> serde_json::Value {
    serde_json::json!({
        "surface": name,
        "used_local": outcome.used_local,
        "fallback": outcome.fallback.as_ref().map(|err| err.to_string()),
        "suggestions": outcome.suggestions,
        "statistics": outcome.statistics,
    })
}

fn print_outcome(name: &str, outcome: &AnalysisOutcome) {
    println!("{name}");
    if let Some(err) = &outcome.fallback {
        print_fallback(err);
    }
    if outcome.suggestions.is_empty() {
        return;
    }
    for kind in SuggestionType::ALL {
        let group: Vec<_> = outcome.suggestions.iter().filter(|s| s.kind == kind).collect();
        if group.is_empty() {
            continue;
        }
        println!("  {} ({})", kind, group.len());
        for suggestion in group {
            if suggestion.is_informational() {
                println!("    \"{}\"", suggestion.original);
            } else {
                println!("    \"{}\" -> \"{}\"", suggestion.original, suggestion.replacement);
            }
            if !suggestion.explanation.is_empty() {
                println!("      {}", suggestion.explanation);
            }
        }
    }
}

fn print_fallback(err: &AnalysisError) {
    println!("  ! {}", err);
    match err.affordance() {
        Affordance::ConfigureApiKey => println!("    Run `draftcheck setup` to add an API key."),
        Affordance::RetryOrGoOffline => {
            println!("    Try again later, or run `draftcheck offline on` to stay local.")
        }
        Affordance::None => {}
    }
}

async fn improve(tone: &str, file: Option<PathBuf>) -> Result<()> {
    let engine_config = EngineConfig::popup();
    let store = Arc::new(ConfigStore::load());
    let backend = build_backend(&store.config(), &engine_config)?;
    let engine = SuggestionEngine::new(backend, store, engine_config);

    let text = read_input(file.as_ref())?;
    match engine.improve(text.trim(), tone).await {
        Ok(rewrite) => {
            println!("{rewrite}");
            Ok(())
        }
        Err(err) => {
            print_fallback(&err);
            Err(anyhow::anyhow!("Could not improve the text"))
        }
    }
}

async fn compose() -> Result<()> {
    let engine_config = EngineConfig::in_page();
    let store = Arc::new(ConfigStore::load());
    let backend = build_backend(&store.config(), &engine_config)?;
    let wait_for_last = engine_config.debounce + engine_config.client.timeout;
    let min_len = engine_config.min_text_len;
    let (scheduler, mut events) = Scheduler::new(backend, store, engine_config);
    let surface = SurfaceId::new("compose");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut inputs = 0u64;
    let mut awaiting: Option<u64> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                inputs += 1;
                awaiting = (line.chars().count() >= min_len).then_some(inputs);
                scheduler.input(surface.clone(), line);
            }
            Some(event) = events.recv() => {
                if awaiting == Some(event.sequence) {
                    awaiting = None;
                }
                print_outcome(&format!("[{}] {}", event.sequence, event.text), &event.outcome);
                println!("  {}", scheduler.engine(&event.surface).status().label());
            }
        }
    }

    if awaiting.is_some() {
        if let Ok(Some(event)) = tokio::time::timeout(wait_for_last, events.recv()).await {
            print_outcome(&format!("[{}] {}", event.sequence, event.text), &event.outcome);
        }
    }
    Ok(())
}

fn setup(clear: bool) -> Result<()> {
    if clear {
        keyring::clear_api_key().map_err(anyhow::Error::msg)?;
        println!("  + API key removed from {}", keyring::credentials_store_label());
        return Ok(());
    }
    config::setup_api_key_interactive().map_err(anyhow::Error::msg)?;
    Ok(())
}

fn set_offline(state: Toggle) -> Result<()> {
    let value = matches!(state, Toggle::On);
    let store: Arc<dyn SettingsStore> = Arc::new(ConfigStore::load());
    let engine_config = EngineConfig::in_page();
    let backend = build_backend(&Config::load(), &engine_config)?;
    let engine = SuggestionEngine::new(backend, store, engine_config);

    match engine.handle_request(SurfaceRequest::SetOfflineMode { value }) {
        SurfaceResponse::Ack { success: true } => {
            println!(
                "  + Offline mode {} ({})",
                if value { "on" } else { "off" },
                Config::config_location()
            );
            Ok(())
        }
        _ => Err(anyhow::anyhow!("Failed to save offline mode")),
    }
}
