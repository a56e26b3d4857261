//! 🚀 tonstream-cli: the front door, the bouncer, the maitre d' of tonstream.
//!
//! 📦 Thin wrapper: set up logging, load config from the environment, run the
//! pipeline, and turn whatever happened into an exit code an external process
//! supervisor can act on. The real work happens in the library. Like a manager. 🦆

use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_BORDERS_ONLY};
use tonstream::{PipelineError, RunReport};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 🚀 main(): where it all begins.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Load config (the moment of truth, and before any socket is opened)
/// 3. Run until the stream closes, fails, or Ctrl-C
/// 4. Exit zero with a summary, or nonzero with the failing stage
#[tokio::main]
async fn main() {
    // 📡 RUST_LOG wins; otherwise info, because a silent daemon is a scary daemon
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app_config = match tonstream::app_config::load_config() {
        Ok(app_config) => app_config,
        Err(err) => exit_with(PipelineError::Configuration(err)),
    };
    info!(config = ?app_config, "🔧 Configuration loaded");

    // 🛑 Ctrl-C drains and flushes. If we can't even listen for it, we just never stop.
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Could not install the Ctrl-C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    match tonstream::run(app_config, shutdown).await {
        Ok(report) => {
            info!("✅ Run finished cleanly");
            println!("{}", summary_table(&report));
        }
        Err(err) => exit_with(err),
    }
}

/// 💀 Error handling: the part where we find out what went wrong and print it in a way
/// that's helpful at 3am. Then leave, with a code that says which stage did it.
fn exit_with(err: PipelineError) -> ! {
    error!(stage = err.stage(), "{err}");

    // -- 🕵️ sniff the cause chain like a truffle pig hunting for connection problems
    let smells_like_the_network = err.cause().chain().any(|cause| {
        let cause_str = cause.to_string();
        cause_str.contains("error sending request")
            || cause_str.contains("onnection refused")
            || cause_str.contains("tcp connect error")
            || cause_str.contains("dns error")
    });
    if smells_like_the_network {
        error!(
            "🔧 hint: looks like a service isn't reachable. Check that ClickHouse is running at \
             STORE_URL and that the SSE endpoint at STREAM_URL resolves from this host."
        );
    }

    std::process::exit(err.exit_code());
}

/// 🍽️ A table so comfy it should come with a throw pillow.
fn summary_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY).set_header(vec!["📊 tonstream", "count"]);
    for (label, value) in [
        ("events received", report.events_received),
        ("decode failures", report.decode_failures),
        ("records written", report.records_written),
        ("batches written", report.batches_written),
    ] {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
