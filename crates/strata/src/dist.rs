//! Output directory assembly.
//!
//! ```text
//! <output>/
//!   bin/        one executable per model
//!   lib/        TBB shared libraries (absent for static builds)
//!   licenses/   third-party license files
//! ```
//!
//! The tree is assembled in a hidden sibling directory and renamed into place,
//! so a failed copy never leaves a partial output behind.

use crate::platform::Target;
use crate::preflight;
use crate::toolchain::{Layout, LicenseSource, LICENSES};
use anyhow::{Context, Result};
use log::debug;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything needed to assemble an output directory.
pub struct Bundle<'a> {
    pub layout: &'a Layout,
    pub target: &'a Target,
    pub static_link: bool,
    pub bins: &'a [String],
}

impl Bundle<'_> {
    /// Write the bundle to `output`, replacing it when `overwrite` is set.
    pub fn write(&self, output: &Path, overwrite: bool) -> Result<()> {
        let staging = staging_dir(output)?;
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .with_context(|| format!("Failed to remove {}", staging.display()))?;
        }

        if let Err(err) = self.populate(&staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }

        if output.exists() && overwrite {
            fs::remove_dir_all(output)
                .with_context(|| format!("Failed to remove {}", output.display()))?;
        }

        // something may have been created there during the build
        if let Err(err) = preflight::check_output(output, false) {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }

        fs::rename(&staging, output).with_context(|| {
            format!(
                "Failed to move {} to {}",
                staging.display(),
                output.display()
            )
        })
    }

    fn populate(&self, root: &Path) -> Result<()> {
        fs::create_dir(root).with_context(|| format!("Failed to create {}", root.display()))?;

        let bin_dir = create_subdir(root, "bin")?;
        for bin in self.bins {
            copy(&self.layout.cmdstan.join(bin), &bin_dir.join(bin))?;
        }

        if !self.static_link {
            let lib_dir = create_subdir(root, "lib")?;
            for lib in self.shared_libraries()? {
                if let Some(name) = lib.file_name() {
                    copy(&lib, &lib_dir.join(name))?;
                }
            }
        }

        let licenses_dir = create_subdir(root, "licenses")?;
        for (source, name) in LICENSES {
            let dest = licenses_dir.join(name);
            match (source, self.layout.source_path(source)) {
                (LicenseSource::Bundled(text), _) => fs::write(&dest, text)
                    .with_context(|| format!("Failed to write {}", dest.display()))?,
                (_, Some(src)) => copy(&src, &dest)?,
                (_, None) => {}
            }
        }

        Ok(())
    }

    fn shared_libraries(&self) -> Result<Vec<PathBuf>> {
        let dir = &self.layout.tbb_lib;
        let entries =
            fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

        let mut libs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_lib = path
                .file_name()
                .and_then(OsStr::to_str)
                .is_some_and(|n| self.target.is_shared_lib(n));
            if is_lib && path.is_file() {
                libs.push(path);
            }
        }
        libs.sort();
        Ok(libs)
    }
}

fn staging_dir(output: &Path) -> Result<PathBuf> {
    let name = output
        .file_name()
        .with_context(|| format!("Invalid output directory: {}", output.display()))?;
    Ok(output.with_file_name(format!(".{}.partial", name.to_string_lossy())))
}

fn create_subdir(root: &Path, name: &str) -> Result<PathBuf> {
    let dir = root.join(name);
    fs::create_dir(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}

fn copy(src: &Path, dst: &Path) -> Result<()> {
    debug!("copy {} -> {}", src.display(), dst.display());
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::platform::{resolve_target, Arch, Host, HostOs};

    /// A fake built toolchain: one binary, a few TBB files, every license source.
    fn built_layout(root: &Path) -> Layout {
        let layout = Layout::new(root, "strata-tbb");
        fs::create_dir_all(&layout.tbb_lib).unwrap();
        fs::write(layout.cmdstan.join("bernoulli"), "ELF").unwrap();
        for name in ["libtbb.so.2", "libtbb.so", "libtbb.a", "libtbb.dylib"] {
            fs::write(layout.tbb_lib.join(name), name).unwrap();
        }
        for (source, _) in LICENSES {
            if let Some(path) = layout.source_path(source) {
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, "license").unwrap();
            }
        }
        layout
    }

    fn linux() -> Target {
        resolve_target(&Host::new(HostOs::Linux, Arch::X86_64), false).unwrap()
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_write_shared_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let layout = built_layout(&dir.path().join("ws"));
        let target = linux();
        let bins = vec!["bernoulli".to_string()];
        let out = dir.path().join("dist");

        Bundle {
            layout: &layout,
            target: &target,
            static_link: false,
            bins: &bins,
        }
        .write(&out, false)
        .unwrap();

        assert_eq!(names(&out), vec!["bin", "lib", "licenses"]);
        assert_eq!(names(&out.join("bin")), vec!["bernoulli"]);
        assert_eq!(names(&out.join("lib")), vec!["libtbb.so", "libtbb.so.2"]);
        assert_eq!(names(&out.join("licenses")).len(), LICENSES.len());
        assert!(fs::read_to_string(out.join("licenses/cli11-license.txt"))
            .unwrap()
            .contains("CLI11"));
        assert!(!dir.path().join(".dist.partial").exists());
    }

    #[test]
    fn test_static_bundle_has_no_lib() {
        let dir = tempfile::tempdir().unwrap();
        let layout = built_layout(&dir.path().join("ws"));
        let target = linux();
        let bins = vec!["bernoulli".to_string()];
        let out = dir.path().join("dist");

        Bundle {
            layout: &layout,
            target: &target,
            static_link: true,
            bins: &bins,
        }
        .write(&out, false)
        .unwrap();

        assert_eq!(names(&out), vec!["bin", "licenses"]);
    }

    #[test]
    fn test_overwrite_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let layout = built_layout(&dir.path().join("ws"));
        let target = linux();
        let bins = vec!["bernoulli".to_string()];
        let out = dir.path().join("dist");
        fs::create_dir(&out).unwrap();
        fs::write(out.join("stale.txt"), "old").unwrap();

        let bundle = Bundle {
            layout: &layout,
            target: &target,
            static_link: false,
            bins: &bins,
        };
        assert!(bundle.write(&out, false).is_err());
        assert!(out.join("stale.txt").exists());

        bundle.write(&out, true).unwrap();
        assert!(!out.join("stale.txt").exists());
        assert!(out.join("bin/bernoulli").is_file());
    }

    #[test]
    fn test_failed_copy_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = built_layout(&dir.path().join("ws"));
        let target = linux();
        let bins = vec!["missing".to_string()];
        let out = dir.path().join("dist");

        let result = Bundle {
            layout: &layout,
            target: &target,
            static_link: false,
            bins: &bins,
        }
        .write(&out, false);

        assert!(result.is_err());
        assert!(!out.exists());
        assert!(!dir.path().join(".dist.partial").exists());
    }
}
