//! Toolchain download with integrity check.

use crate::exec::{Cmd, CommandRunner};
use crate::toolchain::Archive;
use anyhow::{bail, Context, Result};
use log::debug;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Transport for fetching an archive to a local file.
pub trait Downloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Plain HTTPS download.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpDownloader;

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = ureq::get(url)
            .call()
            .with_context(|| format!("Failed to download {url}"))?;

        let mut reader = response.into_reader();
        let mut file =
            File::create(dest).with_context(|| format!("Failed to create {}", dest.display()))?;
        io::copy(&mut reader, &mut file)
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        Ok(())
    }
}

/// Hex-encoded sha256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 256];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Download `archive` into a scratch directory, verify it, and unpack it into `dest_dir`.
///
/// Nothing is extracted unless the checksum matches. The scratch directory is
/// removed on every path.
pub fn download_archive(
    archive: &Archive,
    dest_dir: &Path,
    downloader: &dyn Downloader,
    runner: &dyn CommandRunner,
) -> Result<()> {
    let tmp = tempfile::tempdir().context("Failed to create temporary directory")?;
    let file = tmp.path().join("file.tar.gz");

    debug!("fetching {}", archive.url);
    downloader.download(&archive.url, &file)?;

    let actual = sha256_file(&file)?;
    if !actual.eq_ignore_ascii_case(&archive.sha256) {
        bail!("Bad checksum: {actual}");
    }
    debug!("checksum verified: {}", &actual[..16]);

    runner.run(
        &Cmd::new("tar")
            .arg("xzf")
            .path_arg(&file)?
            .arg("-C")
            .path_arg(dest_dir)?,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exec::fake::RecordingRunner;
    use std::fs;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    /// Serves fixed bytes for any URL.
    struct StaticDownloader(&'static [u8]);

    impl Downloader for StaticDownloader {
        fn download(&self, _url: &str, dest: &Path) -> Result<()> {
            fs::write(dest, self.0)?;
            Ok(())
        }
    }

    fn archive(sha256: &str) -> Archive {
        Archive {
            url: "https://example.com/cmdstan.tar.gz".to_string(),
            sha256: sha256.to_string(),
        }
    }

    #[test]
    fn test_sha256_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc");
        fs::write(&path, "abc").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), ABC_SHA256);
    }

    #[test]
    fn test_good_checksum_extracts() {
        let dest = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::default();

        download_archive(&archive(ABC_SHA256), dest.path(), &StaticDownloader(b"abc"), &runner)
            .unwrap();

        let commands = runner.commands.borrow();
        assert_eq!(commands.len(), 1);
        let tar = &commands[0];
        assert_eq!(tar.program(), "tar");
        assert_eq!(tar.argv()[0], "xzf");
        assert!(tar.argv()[1].ends_with("file.tar.gz"));
        assert_eq!(tar.argv()[2], "-C");
        assert_eq!(tar.argv()[3], dest.path().to_string_lossy());
    }

    #[test]
    fn test_bad_checksum_extracts_nothing() {
        let dest = tempfile::tempdir().unwrap();
        let runner = RecordingRunner::default();

        let err = download_archive(
            &archive(ABC_SHA256),
            dest.path(),
            &StaticDownloader(b"tampered"),
            &runner,
        )
        .unwrap_err();

        assert!(err.to_string().starts_with("Bad checksum: "));
        assert!(!err.to_string().contains(ABC_SHA256));
        assert!(runner.commands.borrow().is_empty());
    }
}
