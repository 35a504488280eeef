use clap::Args;
use decima::DecimatorRegistry;
use eyre::Result;
use tokio::io::AsyncWriteExt;

use crate::io::open_output;

#[derive(Args, Debug)]
pub struct Opts {
    /// Print registry keys only
    #[clap(long, short)]
    quiet: bool,
}

pub async fn list(opts: &Opts) -> Result<()> {
    let registry = DecimatorRegistry::with_builtins();
    let mut output = open_output("stdout").await?;

    for strategy in registry.iter() {
        let line = if opts.quiet {
            format!("{}\n", strategy.key())
        } else {
            format!(
                "{:<30} {:<12} {}\n",
                strategy.key(),
                strategy.input_kind().to_string(),
                strategy.name()
            )
        };
        output.write_all(line.as_bytes()).await?;
    }
    output.flush().await?;
    Ok(())
}
