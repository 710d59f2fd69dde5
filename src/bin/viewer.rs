//! fgcanvas binary.
//!
//! Without arguments it asks the configured simulator which canvases exist and
//! prints them. Given a layout file it runs headless: every canvas in the layout is
//! mirrored and re-rendered to an SVG file whenever it changes, until Ctrl+C.

use std::path::{Path, PathBuf};

use clap::Parser;
use fgcanvas::layout::{LayoutStore, sanitize_name};
use fgcanvas::{QueryStatus, ViewerApp, ViewerConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Remote viewer for FlightGear canvases.
#[derive(Parser)]
#[command(name = "fgcanvas", version, about)]
struct Cli {
    /// Saved layout to open in headless mode.
    config: Option<PathBuf>,

    /// Render without the border and title.
    #[arg(long)]
    frameless: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.config.is_some())?;

    let config = ViewerConfig::load_or_default(&ViewerConfig::default_config_path())?;
    let app = ViewerApp::new(config, LayoutStore::default())?;

    match cli.config {
        Some(path) => run_daemon(app, &path, cli.frameless).await,
        None => list_canvases(app).await,
    }
}

/// Stderr logging, plus a daily log file in headless mode.
fn init_tracing(
    to_file: bool,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fgcanvas=info"));

    let (file_layer, guard) = if to_file {
        let dir = fgcanvas::app_dirs::logs_dir();
        std::fs::create_dir_all(&dir)?;
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "fgcanvas.log"));
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}

async fn list_canvases(mut app: ViewerApp) -> anyhow::Result<()> {
    println!("fgcanvas v{}", env!("CARGO_PKG_VERSION"));
    println!("Querying {}:{} ...", app.host(), app.port());

    match app.query().await {
        QueryStatus::SuccessfulQuery => {
            if app.canvases().is_empty() {
                println!("No canvases.");
            }
            for canvas in app.canvases() {
                println!("  {:<32} {}", canvas.name, canvas.path);
            }
            Ok(())
        }
        status => anyhow::bail!("canvas query did not succeed: {status}"),
    }
}

async fn run_daemon(mut app: ViewerApp, layout: &Path, frameless: bool) -> anyhow::Result<()> {
    app.restore_layout(layout)?;
    let out_dir = app.config().display.snapshot_dir();
    std::fs::create_dir_all(&out_dir)?;
    tracing::info!(
        layout = %layout.display(),
        canvases = app.connections().len(),
        out = %out_dir.display(),
        "fgcanvas daemon started"
    );

    write_snapshots(&mut app, &out_dir, frameless);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                break;
            }
            event = app.pump() => {
                tracing::trace!(?event, "pumped");
                write_snapshots(&mut app, &out_dir, frameless);
            }
        }
    }

    for key in app.connections().keys() {
        app.close_canvas(key);
    }
    Ok(())
}

/// Render every canvas with a pending paint request.
fn write_snapshots(app: &mut ViewerApp, out_dir: &Path, frameless: bool) {
    for key in app.take_paint_requests() {
        let Some(name) = app.connections().get(key).map(|c| sanitize_name(c.name())) else {
            continue;
        };
        let Some(svg) = app.render_svg(key, frameless) else {
            continue;
        };
        let path = out_dir.join(format!("{key}-{name}.svg"));
        if let Err(e) = std::fs::write(&path, svg) {
            tracing::warn!(path = %path.display(), error = %e, "cannot write snapshot");
        }
    }
}
