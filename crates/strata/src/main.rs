//! # strata
//!
//! ```bash
//! strata bernoulli.stan                  # builds dist/bin/bernoulli
//! strata *.stan -o out --overwrite       # replace an existing output directory
//! strata model.stan --cross-compile      # x86_64 host -> arm64 binaries
//! strata model.stan --debug              # stream make output
//! ```

use anyhow::Result;
use clap::Parser;
use strata::cli::Cli;
use strata::config::Config;
use strata::exec::SystemRunner;
use strata::fetch::HttpDownloader;
use strata::platform::Host;
use strata::{logger, Build};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = logger::level_for(cli.debug, std::env::var("STRATA_LOG").ok().as_deref());
    logger::init(level)?;

    let config = Config::load()?;
    let options = cli.into_options();
    let host = Host::detect();

    let runner = SystemRunner::new(options.debug);
    let downloader = HttpDownloader;

    Build::new(&options, &runner, &downloader, config.workspace_dir()?)
        .host(host.clone())
        .archive(config.archive(&host))
        .run()?;

    Ok(())
}
