//! # strata
//!
//! Ship Stan models as standalone executables.
//!
//! Given model files, strata provisions a pinned cmdstan toolchain in a shared
//! workspace (`~/.cmdstan`), builds a bundled TBB runtime, compiles each model,
//! and assembles a distributable directory:
//!
//! ```text
//! dist/
//!   bin/bernoulli
//!   lib/libtbb.so.2
//!   licenses/...
//! ```
//!
//! Structure:
//! - `build` - orchestration of the whole sequence
//! - `platform` - host detection and target decision matrix
//! - `toolchain` - pinned release and workspace layout
//! - `fetch` - download with sha256 verification
//! - `tbb` / `cmdstan` - make invocations
//! - `dist` - output directory assembly
//! - `exec` - process execution seam

pub mod build;
pub mod cli;
pub mod cmdstan;
pub mod config;
pub mod dist;
pub mod exec;
pub mod fetch;
pub mod logger;
pub mod platform;
pub mod preflight;
pub mod tbb;
pub mod toolchain;

pub use build::{Build, BuildOptions, Report, Step};
