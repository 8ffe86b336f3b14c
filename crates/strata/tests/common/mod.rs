//! Fake toolchain for orchestration tests.
//!
//! `FakeToolchain` stands in for tar, make, strip and file. It records every
//! command and reproduces the filesystem effects the build relies on.

#![allow(dead_code, clippy::unwrap_used)]

use anyhow::{bail, Result};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use strata::exec::{Captured, Cmd, CommandRunner};
use strata::fetch::{sha256_file, Downloader};
use strata::platform::{Arch, Host, HostOs};
use strata::toolchain::{Archive, Layout, CMDSTAN_VERSION, LICENSES};
use strata::{Build, BuildOptions, Report};
use tempfile::TempDir;

pub const ARCHIVE_BYTES: &[u8] = b"cmdstan-2.30.0.tar.gz";

#[derive(Default)]
pub struct FakeToolchain {
    pub commands: RefCell<Vec<Cmd>>,
    /// Any command whose rendered line contains one of these fails.
    pub fail_on: Vec<String>,
}

impl FakeToolchain {
    pub fn failing_on(needles: &[&str]) -> Self {
        Self {
            fail_on: needles.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.commands.borrow().iter().map(ToString::to_string).collect()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(needle)).count()
    }

    fn value_after<'a>(cmd: &'a Cmd, flag: &str) -> Option<&'a str> {
        let argv = cmd.argv();
        argv.iter()
            .position(|a| a == flag)
            .and_then(|i| argv.get(i + 1))
            .map(String::as_str)
    }

    fn extract(&self, cmd: &Cmd) -> Result<()> {
        let Some(dest) = Self::value_after(cmd, "-C") else {
            bail!("tar without -C");
        };
        let cmdstan = Path::new(dest).join(format!("cmdstan-{CMDSTAN_VERSION}"));
        let layout = Layout::new(Path::new(dest), "unused");
        fs::create_dir_all(&cmdstan)?;
        for (source, _) in LICENSES {
            if let Some(path) = layout.source_path(source) {
                fs::create_dir_all(path.parent().unwrap())?;
                fs::write(&path, "license text")?;
            }
        }
        Ok(())
    }

    fn make(&self, cmd: &Cmd) -> Result<()> {
        let argv = cmd.argv();
        let dir = PathBuf::from(Self::value_after(cmd, "-C").unwrap_or("."));

        match argv.first().map(String::as_str) {
            Some("clean-all") => {
                let main = dir.join("src/cmdstan/main.o");
                if main.exists() {
                    fs::remove_file(main)?;
                }
            }
            Some("-f") if argv[1].ends_with("Makefile.tbb") => {
                fs::write(dir.join("libtbb.so.2"), "tbb")?;
                fs::write(dir.join("libtbb.so"), "tbb")?;
                fs::write(dir.join("libtbb.a"), "tbb")?;
            }
            Some("-f") => {}
            Some(bin) => {
                let arm = argv.iter().any(|a| a == "CC=aarch64-linux-gnu-gcc");
                fs::write(dir.join(bin), if arm { "arm binary" } else { "x86 binary" })?;
                let main = dir.join("src/cmdstan/main.o");
                fs::create_dir_all(main.parent().unwrap())?;
                fs::write(main, if arm { "ARM aarch64" } else { "x86-64" })?;
            }
            None => bail!("make without arguments"),
        }
        Ok(())
    }
}

impl CommandRunner for FakeToolchain {
    fn run(&self, cmd: &Cmd) -> Result<()> {
        self.commands.borrow_mut().push(cmd.clone());
        let line = cmd.to_string();
        if self.fail_on.iter().any(|needle| line.contains(needle.as_str())) {
            bail!("Command failed: {cmd}");
        }
        match cmd.program() {
            "tar" => self.extract(cmd),
            "make" => self.make(cmd),
            _ => Ok(()),
        }
    }

    fn capture(&self, cmd: &Cmd) -> Result<Captured> {
        self.commands.borrow_mut().push(cmd.clone());
        let path = &cmd.argv()[0];
        let content = fs::read_to_string(path)?;
        Ok(Captured {
            success: true,
            output: format!("main.o: ELF 64-bit LSB relocatable, {content}"),
        })
    }
}

/// Serves the same bytes for every URL and counts calls.
#[derive(Default)]
pub struct FakeDownloader {
    pub calls: RefCell<Vec<String>>,
}

impl Downloader for FakeDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.calls.borrow_mut().push(url.to_string());
        fs::write(dest, ARCHIVE_BYTES)?;
        Ok(())
    }
}

/// A scratch project: model files, an output location and a workspace.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn model(&self, rel: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "data { int N; } parameters { real theta; }").unwrap();
        path
    }

    pub fn workspace(&self) -> PathBuf {
        self.dir.path().join("ws")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("dist")
    }

    pub fn layout(&self, tbb_target: &str) -> Layout {
        Layout::new(&self.workspace(), tbb_target)
    }

    pub fn options(&self, files: Vec<PathBuf>) -> BuildOptions {
        BuildOptions {
            files,
            output: self.output(),
            ..BuildOptions::default()
        }
    }

    /// Archive whose checksum matches `ARCHIVE_BYTES`.
    pub fn archive(&self) -> Archive {
        let path = self.dir.path().join("archive-checksum");
        fs::write(&path, ARCHIVE_BYTES).unwrap();
        let sha256 = sha256_file(&path).unwrap();
        fs::remove_file(&path).unwrap();
        Archive {
            url: "https://example.com/cmdstan-2.30.0.tar.gz".to_string(),
            sha256,
        }
    }

    pub fn build(
        &self,
        options: &BuildOptions,
        runner: &FakeToolchain,
        downloader: &FakeDownloader,
        host: Host,
    ) -> Result<Report> {
        let all_tools = |_: &str| true;
        Build::new(options, runner, downloader, self.workspace())
            .host(host)
            .archive(self.archive())
            .tool_lookup(&all_tools)
            .inherited_deployment_target(None)
            .run()
    }
}

pub fn linux_x86() -> Host {
    Host::new(HostOs::Linux, Arch::X86_64)
}
