use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the two-client ownership transfer walkthrough against one store.
    Demo(DemoArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Value client1 writes after its first read.
    #[arg(allow_negative_numbers = true)]
    pub first: i64,

    /// Value client2 writes while client1 is parked on the same key.
    #[arg(allow_negative_numbers = true)]
    pub second: i64,

    /// How each step is printed.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Capacity of the store and client request queues.
    #[arg(long, default_value_t = crate::config::DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per step.
    Json,
}
