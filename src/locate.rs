//! Locating the cwebp/dwebp executables.

use crate::args::CommandLine;
use crate::cancel::Stop;
use crate::config::ToolConfig;
use crate::error::{Error, Result};
use crate::process;
use alloc::string::String;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use whereat::*;

/// The external tools this crate drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// The `cwebp` encoder.
    Cwebp,
    /// The `dwebp` decoder.
    Dwebp,
}

impl ToolKind {
    /// Tool name as invoked on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ToolKind::Cwebp => "cwebp",
            ToolKind::Dwebp => "dwebp",
        }
    }

    /// Executable file name on this platform.
    #[must_use]
    pub fn file_name(self) -> String {
        alloc::format!("{}{}", self.name(), std::env::consts::EXE_SUFFIX)
    }
}

/// A named tool plus the configuration used to find it.
///
/// The executable path is resolved on first use and cached; it survives
/// controller resets.
#[derive(Debug, Clone)]
pub struct Tool {
    kind: ToolKind,
    config: ToolConfig,
    path: Option<PathBuf>,
}

impl Tool {
    /// Describe `kind` under `config`. Nothing is resolved yet.
    #[must_use]
    pub fn new(kind: ToolKind, config: ToolConfig) -> Self {
        Self {
            kind,
            config,
            path: None,
        }
    }

    /// Which tool this is.
    #[must_use]
    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Resolve the executable path.
    ///
    /// Order: vendored binary; otherwise fetch into the vendor directory when
    /// downloading is enabled and a fetcher is configured; otherwise search
    /// `PATH`.
    pub fn resolve(&mut self) -> Result<&Path> {
        if self.path.is_none() {
            let search_path = std::env::var_os("PATH");
            let path = self.locate(search_path.as_deref())?;
            log::debug!("resolved {} to {}", self.kind.name(), path.display());
            self.path = Some(path);
        }
        match &self.path {
            Some(path) => Ok(path),
            None => Err(at!(Error::Resolution(alloc::format!(
                "{} path was not cached",
                self.kind.name()
            )))),
        }
    }

    fn locate(&self, search_path: Option<&OsStr>) -> Result<PathBuf> {
        let file_name = self.kind.file_name();
        let vendored = self.config.vendor_dir.join(&file_name);
        if vendored.is_file() {
            return Ok(absolute(vendored));
        }

        let fetch = match (self.config.source(), self.config.fetcher.as_ref()) {
            (Some(source), Some(fetcher)) => Some((source, fetcher)),
            _ => None,
        };
        let Some((source, fetcher)) = fetch else {
            return find_in(search_path, &file_name).ok_or_else(|| {
                at!(Error::Resolution(alloc::format!(
                    "{} not found in {} or on PATH",
                    file_name,
                    self.config.vendor_dir.display()
                )))
            });
        };

        log::debug!(
            "fetching {} into {}",
            source.url,
            self.config.vendor_dir.display()
        );
        fetcher
            .fetch(&source, &self.config.vendor_dir)
            .map_err(|e| {
                at!(Error::Resolution(alloc::format!(
                    "fetching {} failed: {}",
                    source.url,
                    e
                )))
            })?;

        if vendored.is_file() {
            Ok(absolute(vendored))
        } else {
            Err(at!(Error::Resolution(alloc::format!(
                "{} missing from {} after fetching {}",
                file_name,
                self.config.vendor_dir.display(),
                source.url
            ))))
        }
    }

    /// Run `<tool> -version` and return its output without line breaks.
    pub fn version(&mut self, stop: &dyn Stop) -> Result<String> {
        let program = self.resolve()?.to_path_buf();
        let mut command = CommandLine::new();
        command.flag("-version");
        let execution = process::execute(&program, command.into_request(None), stop)?;
        let text = String::from_utf8_lossy(&execution.stdout);
        Ok(text.replace(['\n', '\r'], ""))
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

fn find_in(search_path: Option<&OsStr>, file_name: &str) -> Option<PathBuf> {
    std::env::split_paths(search_path?)
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
        .map(absolute)
}
