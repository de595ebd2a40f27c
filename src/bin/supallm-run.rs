use color_eyre::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use supallm::cli::{parse_args, run_cli_command, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Logs go to stderr so stdout only carries the flow output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("supallm=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let command = match parse_args(std::env::args()) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("Error: {}\n\n{}", err, USAGE);
            std::process::exit(2);
        }
    };

    run_cli_command(command).await
}
