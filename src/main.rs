use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = biolink_mcp::cli::Cli::parse();
    init_tracing(cli.verbose);

    match biolink_mcp::cli::run(cli).await {
        Ok(biolink_mcp::cli::CommandOutput::Served) => std::process::ExitCode::SUCCESS,
        Ok(biolink_mcp::cli::CommandOutput::Report { text, healthy }) => {
            println!("{text}");
            if healthy {
                std::process::ExitCode::SUCCESS
            } else {
                std::process::ExitCode::from(1)
            }
        }
        Err(err) => {
            if let Some(biolink_err) = err.downcast_ref::<biolink_mcp::error::BiolinkMcpError>() {
                eprintln!("Error: {biolink_err}");
            } else {
                eprintln!("Error: {err:#}");
            }
            std::process::ExitCode::from(1)
        }
    }
}
