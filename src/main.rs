use clap::Parser;
use plaza_traffic::cli::{init_tracing, run, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::info!("CLI arguments parsed, invoking run");

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "CLI exited with error");
        eprintln!("[ERROR] {e:#}");
        std::process::exit(1);
    }
}
