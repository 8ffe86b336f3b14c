//! Intel TBB runtime build.
//!
//! TBB is built out of tree into `Layout::tbb_lib`, one directory per build
//! flavour, so native and cross builds never share objects.

use crate::exec::{utf8_path, Cmd, CommandRunner};
use crate::platform::{BuildEnv, Target};
use crate::toolchain::Layout;
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;

/// Makefile, plus the make target when it is not the default one.
const MAKEFILES: &[(&str, Option<&str>)] = &[
    ("build/Makefile.tbb", None),
    ("build/Makefile.tbbmalloc", Some("malloc")),
    ("build/Makefile.tbbproxy", Some("tbbproxy")),
];

pub fn make_args(layout: &Layout, target: &Target, static_link: bool) -> Result<Vec<String>> {
    let mut args = vec![
        format!("tbb_root={}", utf8_path(&layout.tbb)?),
        "cfg=release".to_string(),
        "-C".to_string(),
        utf8_path(&layout.tbb_lib)?.to_string(),
    ];

    if let Some(arch) = target.tbb_arch() {
        args.push(format!("arch={arch}"));
    }
    if let Some((cc, cxx)) = target.compilers() {
        args.push(format!("CONLY={cc}"));
        args.push(format!("CPLUS={cxx}"));
    }

    if static_link {
        args.push("extra_inc=big_iron.inc".to_string());
    }

    Ok(args)
}

/// Build TBB and strip debug info from the resulting shared libraries.
pub fn build(
    layout: &Layout,
    target: &Target,
    static_link: bool,
    env: &BuildEnv,
    runner: &dyn CommandRunner,
) -> Result<()> {
    fs::create_dir_all(&layout.tbb_lib)
        .with_context(|| format!("Failed to create {}", layout.tbb_lib.display()))?;

    let args = make_args(layout, target, static_link)?;
    for (makefile, make_target) in MAKEFILES {
        let mut cmd = Cmd::new("make")
            .arg("-f")
            .path_arg(&layout.tbb.join(makefile))?;
        if let Some(make_target) = make_target {
            cmd = cmd.arg(*make_target);
        }
        runner.run(&cmd.args(args.iter().cloned()).build_env(env))?;
    }

    for lib in stripped_libraries(layout)? {
        runner.run(
            &Cmd::new(target.strip_tool())
                .arg("--strip-debug")
                .path_arg(&lib)?,
        )?;
    }

    Ok(())
}

/// `*.so.2` files in the TBB build directory, sorted.
fn stripped_libraries(layout: &Layout) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(&layout.tbb_lib)
        .with_context(|| format!("Failed to read {}", layout.tbb_lib.display()))?;

    let mut libs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_match = path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|n| n.ends_with(".so.2"));
        if is_match {
            libs.push(path);
        }
    }
    libs.sort();
    Ok(libs)
}
