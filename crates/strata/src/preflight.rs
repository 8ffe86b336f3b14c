//! Checks that run before anything touches the workspace.

use crate::cmdstan;
use crate::platform::{Target, TargetOs, LINUX_CROSS_CC, LINUX_CROSS_CXX};
use anyhow::{bail, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Verify every model file exists and has a distinct binary name.
///
/// Returns the binary names in input order.
pub fn check_inputs(files: &[PathBuf]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut bins = Vec::with_capacity(files.len());

    for file in files {
        if !file.is_file() {
            bail!("File does not exist: {}", file.display());
        }
        let bin = cmdstan::bin_name(file)?;
        if !seen.insert(bin.clone()) {
            bail!("Duplicate binary name: {bin} ({})", file.display());
        }
        bins.push(bin);
    }

    Ok(bins)
}

pub fn check_output(output: &Path, overwrite: bool) -> Result<()> {
    if output.exists() && !overwrite {
        bail!(
            "File exists: {}. Use --overwrite to overwrite.",
            output.display()
        );
    }
    Ok(())
}

/// Verify the cross toolchain is installed. Only Linux needs one; Darwin
/// cross builds go through the host compiler with `-target`.
pub fn check_cross_compile(target: &Target, tool_exists: &dyn Fn(&str) -> bool) -> Result<()> {
    if !target.cross || target.os != TargetOs::Linux {
        return Ok(());
    }

    if ![LINUX_CROSS_CC, LINUX_CROSS_CXX]
        .into_iter()
        .all(tool_exists)
    {
        bail!(
            "Cross-compiler not found. Run:\n\
             sudo apt update\n\
             sudo apt install gcc-aarch64-linux-gnu g++-aarch64-linux-gnu"
        );
    }
    Ok(())
}
