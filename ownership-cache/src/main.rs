use std::io::Write;

use anyhow::Result;
use clap::Parser;

use ownership_cache::{
    cli::{Cli, Command, OutputFormat},
    demo,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs stay on stderr so stdout carries only the walkthrough.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Demo(args) => {
            let mut stdout = std::io::stdout();
            if args.format == OutputFormat::Text {
                writeln!(stdout, "=== Demo start ===")?;
            }
            demo::run(&args, |line| {
                match args.format {
                    OutputFormat::Text => writeln!(stdout, "{line}")?,
                    OutputFormat::Json => writeln!(stdout, "{}", serde_json::to_string(line)?)?,
                }
                stdout.flush()?;
                Ok(())
            })
            .await?;
            if args.format == OutputFormat::Text {
                writeln!(stdout, "=== Demo end ===")?;
            }
        }
    }

    Ok(())
}
