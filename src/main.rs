#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::{Level as TraceLevel, info, warn};
use tracing_subscriber::FmtSubscriber;

use viewer_state::constants::{events, logging};
use viewer_state::{AppContext, ConfigValue, Handler, ViewerConfig};

/// Drive the viewer state from the command line and print the result
#[derive(Parser, Debug)]
#[command(name = "viewer-state", version, about)]
struct Cli {
    /// Assign a value; VALUE is JSON, bare words are taken as text
    #[arg(long = "set", value_name = "PATH=VALUE", value_parser = parse_assignment)]
    assignments: Vec<(String, ConfigValue)>,

    /// Apply every --set as one change with a single notification
    #[arg(long)]
    batch: bool,

    /// Emit an event after the assignments; payload is optional JSON
    #[arg(long = "emit", value_name = "EVENT[=JSON]", value_parser = parse_emit)]
    emits: Vec<(String, Value)>,

    /// Reset everything to defaults before printing
    #[arg(long)]
    reset: bool,

    /// Print only the subtree at this path
    #[arg(long)]
    path: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn parse_assignment(raw: &str) -> Result<(String, ConfigValue), String> {
    let (path, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=VALUE, got '{raw}'"))?;
    let json = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    let value = ConfigValue::from_json(json).map_err(|e| e.to_string())?;
    Ok((path.to_string(), value))
}

fn parse_emit(raw: &str) -> Result<(String, Value), String> {
    match raw.split_once('=') {
        Some((event, payload)) => serde_json::from_str(payload)
            .map(|payload| (event.to_string(), payload))
            .map_err(|e| format!("invalid JSON payload for '{event}': {e}")),
        None => Ok((raw.to_string(), Value::Null)),
    }
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var(logging::LEVEL_ENV)
        .unwrap_or_else(|_| logging::DEFAULT_LEVEL.to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

/// Stand-in for the render layer: re-derive the typed config on every change
fn attach_renderer(ctx: &AppContext) -> viewer_state::Subscription {
    ctx.store.subscribe(|snapshot| {
        let config = ViewerConfig::from_snapshot(snapshot);
        let [red, green, blue, _] = config.lights.key.color.to_rgba_f32();
        info!(
            fov = config.camera.fov,
            exposure = config.camera.exposure,
            key_light = config.lights.key.intensity,
            key_rgb = ?[red, green, blue],
            bloom = config.bloom.enabled,
            tone_mapping = %config.tone_mapping.mode,
            "render settings applied"
        );
        Ok(())
    })
}

fn attach_signal_log(ctx: &AppContext) -> Vec<viewer_state::Subscription> {
    [events::ASSET_LOADED, events::EXPORT_REQUESTED]
        .into_iter()
        .map(|event| {
            ctx.bus.on(
                event,
                Handler::new(move |payload: &Value| {
                    info!(event, %payload, "signal received");
                    Ok(())
                }),
            )
        })
        .collect()
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let ctx = AppContext::new();
    let _renderer = attach_renderer(&ctx);
    let _signals = attach_signal_log(&ctx);
    let _reset = ctx.wire_reset_requests();

    if cli.batch {
        ctx.store
            .set_many(cli.assignments.iter().map(|(path, value)| (path, value.clone())))
            .context("Failed to apply batched assignments")?;
    } else {
        for (path, value) in &cli.assignments {
            ctx.store
                .set(path, value.clone())
                .with_context(|| format!("Failed to set '{path}'"))?;
        }
    }

    for (event, payload) in &cli.emits {
        if ctx.bus.emit(event, payload) == 0 {
            warn!(event = %event, "no listeners for event");
        }
    }

    if cli.reset {
        ctx.store.reset();
    }

    let output = match &cli.path {
        Some(path) => ctx
            .store
            .get(path)
            .with_context(|| format!("Nothing at '{path}'"))?
            .to_json(),
        None => ctx.store.get_state().to_json(),
    };

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }
    .context("Failed to serialize config")?;
    println!("{rendered}");
    Ok(())
}
