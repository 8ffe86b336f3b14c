//! Build orchestration.
//!
//! A build is a fixed sequence of steps against the shared workspace:
//!
//! 1. validate inputs, the output path and the workspace path
//! 2. resolve the target (refuse unsupported hosts, check the cross toolchain)
//! 3. create the workspace
//! 4. clean the toolchain tree (`--clean` only)
//! 5. download and verify the toolchain if it is missing
//! 6. clean the tree if it was last built for another architecture
//! 7. build TBB, then each model
//! 8. clean again after a cross build, even when step 7 failed
//! 9. assemble the output directory
//!
//! Provisioning steps are idempotent: a second run with the same flags skips
//! the download and the stale-tree clean. The workspace is global and
//! unlocked; concurrent builds against it are not supported.

use crate::cmdstan;
use crate::dist::Bundle;
use crate::exec::{tool_exists, utf8_path, CommandRunner};
use crate::fetch::{self, Downloader};
use crate::platform::{resolve_target, BuildEnv, Host, Target};
use crate::preflight;
use crate::tbb;
use crate::toolchain::{tbb_target_name, Archive, Layout};
use anyhow::{Context, Result};
use log::{debug, info};
use std::fs;
use std::path::PathBuf;

/// What to build and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct BuildOptions {
    pub files: Vec<PathBuf>,
    pub output: PathBuf,
    pub overwrite: bool,
    pub cross_compile: bool,
    pub debug: bool,
    pub clean: bool,
    pub static_link: bool,
}

/// Steps actually executed, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Validate,
    ResolveTarget,
    PrepareWorkspace,
    Clean,
    DownloadToolchain,
    CleanStale,
    BuildTbb,
    Compile(usize),
    CrossCleanup,
    Assemble,
}

/// Outcome of a successful build.
#[derive(Debug)]
pub struct Report {
    pub target: Target,
    pub binaries: Vec<String>,
    pub steps: Vec<Step>,
}

/// A configured build. Collaborators are injected; defaults come from the host.
pub struct Build<'a> {
    options: &'a BuildOptions,
    runner: &'a dyn CommandRunner,
    downloader: &'a dyn Downloader,
    host: Host,
    workspace: PathBuf,
    archive: Archive,
    tool_exists: &'a dyn Fn(&str) -> bool,
    inherited_deployment_target: Option<String>,
    steps: Vec<Step>,
}

impl<'a> Build<'a> {
    pub fn new(
        options: &'a BuildOptions,
        runner: &'a dyn CommandRunner,
        downloader: &'a dyn Downloader,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        let host = Host::detect();
        let archive = Archive::for_host(&host);
        Self {
            options,
            runner,
            downloader,
            host,
            workspace: workspace.into(),
            archive,
            tool_exists: &tool_exists,
            inherited_deployment_target: std::env::var("MACOSX_DEPLOYMENT_TARGET").ok(),
            steps: Vec::new(),
        }
    }

    /// Override the detected host. Also re-selects the default archive.
    #[must_use]
    pub fn host(mut self, host: Host) -> Self {
        self.archive = Archive::for_host(&host);
        self.host = host;
        self
    }

    #[must_use]
    pub fn archive(mut self, archive: Archive) -> Self {
        self.archive = archive;
        self
    }

    #[must_use]
    pub fn tool_lookup(mut self, lookup: &'a dyn Fn(&str) -> bool) -> Self {
        self.tool_exists = lookup;
        self
    }

    #[must_use]
    pub fn inherited_deployment_target(mut self, value: Option<String>) -> Self {
        self.inherited_deployment_target = value;
        self
    }

    pub fn run(mut self) -> Result<Report> {
        let opts = self.options;

        let bins = preflight::check_inputs(&opts.files)?;
        preflight::check_output(&opts.output, opts.overwrite)?;
        utf8_path(&self.workspace)?;
        self.steps.push(Step::Validate);

        let target = resolve_target(&self.host, opts.cross_compile)?;
        preflight::check_cross_compile(&target, self.tool_exists)?;
        debug!("host {:?}, target {:?}", self.host, target);
        self.steps.push(Step::ResolveTarget);

        let env = BuildEnv::for_target(&target, self.inherited_deployment_target.as_deref());
        let layout = Layout::new(
            &self.workspace,
            &tbb_target_name(opts.cross_compile, opts.static_link),
        );

        fs::create_dir_all(&layout.workspace)
            .with_context(|| format!("Failed to create {}", layout.workspace.display()))?;
        self.steps.push(Step::PrepareWorkspace);

        if opts.clean && layout.cmdstan.exists() {
            cmdstan::clean(&layout, self.runner)?;
            if layout.tbb_lib.exists() {
                fs::remove_dir_all(&layout.tbb_lib)
                    .with_context(|| format!("Failed to remove {}", layout.tbb_lib.display()))?;
            }
            self.steps.push(Step::Clean);
        }

        if !layout.cmdstan.exists() {
            info!("Downloading CmdStan...");
            fetch::download_archive(&self.archive, &layout.workspace, self.downloader, self.runner)?;
            self.steps.push(Step::DownloadToolchain);
        }

        if cmdstan::requires_clean(&layout, &target, self.runner)? {
            cmdstan::clean(&layout, self.runner)?;
            self.steps.push(Step::CleanStale);
        }

        let compiled = self.compile_all(&layout, &target, &env, &bins);

        // not perfect: objects are built in-tree, so undo a cross build here
        if target.cross {
            let cleaned = cmdstan::clean(&layout, self.runner);
            self.steps.push(Step::CrossCleanup);
            compiled?;
            cleaned?;
        } else {
            compiled?;
        }

        Bundle {
            layout: &layout,
            target: &target,
            static_link: opts.static_link,
            bins: &bins,
        }
        .write(&opts.output, opts.overwrite)?;
        self.steps.push(Step::Assemble);

        info!("Success!");

        Ok(Report {
            target,
            binaries: bins,
            steps: self.steps,
        })
    }

    fn compile_all(
        &mut self,
        layout: &Layout,
        target: &Target,
        env: &BuildEnv,
        bins: &[String],
    ) -> Result<()> {
        let opts = self.options;
        let mut make_args: Option<Vec<String>> = None;

        for (i, (file, bin)) in opts.files.iter().zip(bins).enumerate() {
            info!("Building {}...", file.display());

            if make_args.is_none() {
                tbb::build(layout, target, opts.static_link, env, self.runner)?;
                self.steps.push(Step::BuildTbb);
                make_args = Some(cmdstan::make_args(layout, target, opts.static_link)?);
            }
            let args = make_args.as_deref().unwrap_or_default();

            cmdstan::compile(layout, file, bin, args, env, self.runner)?;
            self.steps.push(Step::Compile(i));
        }

        Ok(())
    }
}
