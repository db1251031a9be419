use audit_sweep_cli::run_cli;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        error!(error = %e, exit_code = e.exit_code(), "CLI error");

        // Logging may not be initialised yet when configuration fails
        eprintln!("error: {}", e);

        std::process::exit(e.exit_code());
    }
}
