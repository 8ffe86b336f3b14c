use crate::build::BuildOptions;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "strata", version, about = "The easy way to ship Stan models")]
#[command(override_usage = "strata [FILES] [OPTIONS]")]
#[command(disable_version_flag = true)]
#[allow(clippy::struct_excessive_bools)] // one per flag
pub struct Cli {
    /// Stan files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Print version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,

    /// Output directory
    #[arg(short, long, default_value = "dist")]
    pub output: PathBuf,

    /// Overwrite the output directory
    #[arg(long)]
    pub overwrite: bool,

    /// Cross-compile
    #[arg(long)]
    pub cross_compile: bool,

    /// Show build output
    #[arg(long)]
    pub debug: bool,

    #[arg(long, hide = true)]
    pub clean: bool,

    #[arg(long = "static", hide = true)]
    pub static_link: bool,
}

impl Cli {
    pub fn into_options(self) -> BuildOptions {
        BuildOptions {
            files: self.files,
            output: self.output,
            overwrite: self.overwrite,
            cross_compile: self.cross_compile,
            debug: self.debug,
            clean: self.clean,
            static_link: self.static_link,
        }
    }
}
