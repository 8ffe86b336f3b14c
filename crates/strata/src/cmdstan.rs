//! Model compilation against the `cmdstan` tree.

use crate::exec::{utf8_path, Cmd, CommandRunner};
use crate::platform::{BuildEnv, Target, TargetOs};
use crate::toolchain::Layout;
use anyhow::{Context, Result};
use log::debug;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

/// Executable name for a model file: its stem.
pub fn bin_name(file: &Path) -> Result<String> {
    file.file_stem()
        .and_then(OsStr::to_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .with_context(|| format!("Invalid model file name: {}", file.display()))
}

/// Arguments shared by every `make <bin>` invocation.
pub fn make_args(layout: &Layout, target: &Target, static_link: bool) -> Result<Vec<String>> {
    let mut args = vec![
        "-C".to_string(),
        utf8_path(&layout.cmdstan)?.to_string(),
        // precompiled TBB
        format!("TBB_INC={}", utf8_path(&layout.tbb.join("include"))?),
        format!("TBB_LIB={}", utf8_path(&layout.tbb_lib)?),
        // only MPL2 or BSD code (see COPYING.README in Eigen)
        "CXXFLAGS_EIGEN=-DEIGEN_MPL2_ONLY".to_string(),
        "PRECOMPILED_HEADERS=false".to_string(),
        format!("LDFLAGS_TBB={}", tbb_ldflags(layout, target, static_link)?),
    ];

    if let Some((cc, cxx)) = target.compilers() {
        args.push(format!("CC={cc}"));
        args.push(format!("CXX={cxx}"));
        args.push(format!("OS={}", target.make_os()));
    }

    Ok(args)
}

fn tbb_ldflags(layout: &Layout, target: &Target, static_link: bool) -> Result<String> {
    Ok(match (target.os, static_link) {
        (TargetOs::Darwin, true) => "-L$(TBB_LIB) -ltbb".to_string(),
        // -L keeps a Homebrew tbb from being picked up
        (TargetOs::Darwin, false) => {
            r#"-L$(TBB_LIB) -Wl,-rpath,"@executable_path/../lib" -ltbb"#.to_string()
        }
        (TargetOs::Linux, true) => static_archives(layout)?.join(" "),
        (TargetOs::Linux, false) => {
            r#"-Wl,-L,"$(TBB_LIB)" -Wl,-rpath,'$$ORIGIN/../lib' -Wl,--disable-new-dtags -ltbb"#
                .to_string()
        }
    })
}

/// `*.a` files in the TBB build directory, sorted.
fn static_archives(layout: &Layout) -> Result<Vec<String>> {
    let entries = fs::read_dir(&layout.tbb_lib)
        .with_context(|| format!("Failed to read {}", layout.tbb_lib.display()))?;

    let mut archives = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("a")) {
            archives.push(utf8_path(&path)?.to_string());
        }
    }
    archives.sort();
    Ok(archives)
}

/// Whether the tree must be cleaned before building for `target`.
///
/// `main.o` is the last file a build produces. If it is missing, unreadable,
/// or built for the other architecture, the tree is stale.
pub fn requires_clean(layout: &Layout, target: &Target, runner: &dyn CommandRunner) -> Result<bool> {
    let main = layout.main_object();
    if !main.exists() {
        debug!("{} missing, cleaning", main.display());
        return Ok(true);
    }

    let captured = runner.capture(&Cmd::new("file").path_arg(&main)?)?;
    if !captured.success {
        return Ok(true);
    }

    // x86_64 on Mac, x86-64 on Linux
    let built_arm = !captured.output.contains("x86");
    debug!("existing build is {}", if built_arm { "arm" } else { "x86" });
    Ok(built_arm != target.is_arm())
}

pub fn clean(layout: &Layout, runner: &dyn CommandRunner) -> Result<()> {
    runner.run(
        &Cmd::new("make")
            .arg("clean-all")
            .arg("-C")
            .path_arg(&layout.cmdstan)?,
    )
}

/// Copy a model into the tree and build its executable.
pub fn compile(
    layout: &Layout,
    file: &Path,
    bin: &str,
    args: &[String],
    env: &BuildEnv,
    runner: &dyn CommandRunner,
) -> Result<()> {
    let dest = layout.cmdstan.join(format!("{bin}.stan"));
    fs::copy(file, &dest)
        .with_context(|| format!("Failed to copy {} to {}", file.display(), dest.display()))?;

    runner.run(
        &Cmd::new("make")
            .arg(bin)
            .args(args.iter().cloned())
            .build_env(env),
    )
}
