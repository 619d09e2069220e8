//! Single-client MCP stdio binary: speaks the MCP
//! wire format on stdin/stdout. Grounded on this repo's existing
//! `bin/mcp-stdio.rs` version/help probing (hosts like VS Code probe stdio
//! servers with `--version`/`--help` before starting a session).

use pulse_crawl::mcp::stdio;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("pulse-crawl-mcp (MCP stdio server); usage: pulse-crawl-mcp [--version|--help]");
        return Ok(());
    }

    if let Err(e) = stdio::run().await {
        tracing::error!("pulse-crawl-mcp exited with error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
