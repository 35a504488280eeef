mod decimate;
mod io;
mod list;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "decima",
    about = "Reduces large ordered series to one value per pixel for plotting"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run JSON-lines decimation requests and print one response per line
    Decimate(decimate::Opts),
    /// List the registered decimators
    List(list::Opts),
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Decimate(opts) => decimate::decimate(&opts).await,
        Command::List(opts) => list::list(&opts).await,
    }
}
