//! Tool configuration: where binaries live and how they are acquired.

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default vendor directory for downloaded binaries.
pub const DEFAULT_VENDOR_DIR: &str = ".bin/webp";

/// Default pinned libwebp release.
pub const DEFAULT_LIBWEBP_VERSION: &str = "1.5.0";

/// Release archive host.
pub const RELEASE_BASE_URL: &str =
    "https://storage.googleapis.com/downloads.webmproject.org/releases/webp/";

/// Leading path components dropped when extracting a release archive
/// (`libwebp-<version>-<platform>/bin/cwebp` becomes `cwebp`).
pub const ARCHIVE_STRIP: usize = 2;

const ENV_SKIP_DOWNLOAD: &str = "SKIP_DOWNLOAD";
const ENV_VENDOR_PATH: &str = "VENDOR_PATH";
const ENV_LIBWEBP_VERSION: &str = "LIBWEBP_VERSION";

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Os {
    /// macOS.
    MacOs,
    /// Linux.
    Linux,
    /// Windows.
    Windows,
    /// Anything else.
    Other,
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Arch {
    /// 32-bit x86.
    X86,
    /// x86-64.
    X86_64,
    /// 64-bit ARM.
    Aarch64,
    /// 32-bit ARM.
    Arm,
    /// Anything else.
    Other,
}

/// An OS/architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// Architecture.
    pub arch: Arch,
}

impl Platform {
    /// The platform this process runs on.
    #[must_use]
    pub fn current() -> Self {
        let os = match std::env::consts::OS {
            "macos" => Os::MacOs,
            "linux" => Os::Linux,
            "windows" => Os::Windows,
            _ => Os::Other,
        };
        let arch = match std::env::consts::ARCH {
            "x86" => Arch::X86,
            "x86_64" => Arch::X86_64,
            "aarch64" => Arch::Aarch64,
            "arm" => Arch::Arm,
            _ => Arch::Other,
        };
        Self { os, arch }
    }

    /// Release archive suffix for this platform, if libwebp publishes one.
    #[must_use]
    pub fn archive_suffix(self) -> Option<&'static str> {
        match (self.os, self.arch) {
            (Os::MacOs, Arch::Aarch64) => Some("mac-arm64.tar.gz"),
            (Os::MacOs, Arch::X86_64) => Some("mac-x86-64.tar.gz"),
            (Os::Linux, Arch::X86) => Some("linux-x86-32.tar.gz"),
            (Os::Linux, Arch::X86_64) => Some("linux-x86-64.tar.gz"),
            (Os::Linux, Arch::Aarch64) => Some("linux-aarch64.tar.gz"),
            (Os::Windows, Arch::X86_64) => Some("windows-x64.zip"),
            (Os::Windows, Arch::X86) => Some("windows-x86.zip"),
            _ => None,
        }
    }
}

/// Where to obtain a prebuilt tool bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Archive URL.
    pub url: String,
    /// Leading path components to strip on extraction.
    pub strip: usize,
}

/// Acquires a tool bundle into the vendor directory.
///
/// The crate ships no network code; hosts that want automatic installation
/// supply an implementation.
pub trait Fetch: Send + Sync {
    /// Download `source` and extract it into `dest`, stripping
    /// `source.strip` leading path components.
    fn fetch(&self, source: &Source, dest: &Path) -> io::Result<()>;
}

/// Configuration shared by tool controllers. Immutable once built.
///
/// # Example
///
/// ```rust
/// use webpbin::ToolConfig;
///
/// let config = ToolConfig::new()
///     .vendor_dir("/opt/webp/bin")
///     .skip_download(true);
/// assert!(config.is_skip_download());
/// ```
#[derive(Clone)]
pub struct ToolConfig {
    pub(crate) skip_download: bool,
    pub(crate) vendor_dir: PathBuf,
    pub(crate) version: String,
    pub(crate) platform: Platform,
    pub(crate) fetcher: Option<Arc<dyn Fetch>>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            skip_download: false,
            vendor_dir: PathBuf::from(DEFAULT_VENDOR_DIR),
            version: DEFAULT_LIBWEBP_VERSION.into(),
            platform: Platform::current(),
            fetcher: None,
        }
    }
}

impl fmt::Debug for ToolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolConfig")
            .field("skip_download", &self.skip_download)
            .field("vendor_dir", &self.vendor_dir)
            .field("version", &self.version)
            .field("platform", &self.platform)
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl ToolConfig {
    // === Constructors ===

    /// Built-in defaults, ignoring the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults merged with `SKIP_DOWNLOAD`, `VENDOR_PATH` and
    /// `LIBWEBP_VERSION`, then adjusted for unsupported platforms.
    ///
    /// Builder calls made on the result override the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok()).detect_unsupported_platform()
    }

    /// Defaults merged with variables supplied by `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if lookup(ENV_SKIP_DOWNLOAD).as_deref() == Some("true") {
            config.skip_download = true;
        }
        if let Some(path) = lookup(ENV_VENDOR_PATH).filter(|p| !p.is_empty()) {
            config.vendor_dir = PathBuf::from(path);
        }
        if let Some(version) = lookup(ENV_LIBWEBP_VERSION).filter(|v| !v.is_empty()) {
            config.version = version;
        }
        config
    }

    /// Process-wide configuration from [`from_env`](Self::from_env),
    /// resolved on first use.
    pub fn shared() -> &'static ToolConfig {
        static SHARED: OnceLock<ToolConfig> = OnceLock::new();
        SHARED.get_or_init(Self::from_env)
    }

    // === Builder ===

    /// Never download; use a vendored binary if present, else search `PATH`.
    #[must_use]
    pub fn skip_download(mut self, skip: bool) -> Self {
        self.skip_download = skip;
        self
    }

    /// Directory holding (or receiving) the tool binaries.
    #[must_use]
    pub fn vendor_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.vendor_dir = dir.into();
        self
    }

    /// Pin the libwebp release to download.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Override the detected platform.
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Install a bundle fetcher.
    #[must_use]
    pub fn fetcher(mut self, fetcher: impl Fetch + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Force skip-download where no usable prebuilt bundle exists:
    /// 32-bit ARM, Alpine Linux (musl), and unpublished OS/arch pairs.
    #[must_use]
    pub fn detect_unsupported_platform(self) -> Self {
        let issue = if self.platform.os == Os::Linux {
            std::fs::read("/etc/issue").ok()
        } else {
            None
        };
        self.detect_unsupported_with(issue.as_deref())
    }

    pub(crate) fn detect_unsupported_with(mut self, etc_issue: Option<&[u8]>) -> Self {
        let alpine = etc_issue
            .map(|issue| issue.to_ascii_lowercase())
            .is_some_and(|issue| issue.windows(6).any(|w| w == b"alpine"));

        if self.platform.arch == Arch::Arm
            || alpine
            || self.platform.archive_suffix().is_none()
        {
            log::debug!(
                "no prebuilt libwebp for {:?}; using system binaries",
                self.platform
            );
            self.skip_download = true;
        }
        self
    }

    // === Accessors ===

    /// Whether downloading is disabled.
    #[must_use]
    pub fn is_skip_download(&self) -> bool {
        self.skip_download
    }

    /// Vendor directory.
    #[must_use]
    pub fn vendor_dir_path(&self) -> &Path {
        &self.vendor_dir
    }

    /// Pinned libwebp version.
    #[must_use]
    pub fn libwebp_version(&self) -> &str {
        &self.version
    }

    /// Platform used to pick a release archive.
    #[must_use]
    pub fn target_platform(&self) -> Platform {
        self.platform
    }

    /// Release archive for the configured platform and version, or `None`
    /// when downloading is disabled or the platform has no bundle.
    #[must_use]
    pub fn source(&self) -> Option<Source> {
        if self.skip_download {
            return None;
        }
        let suffix = self.platform.archive_suffix()?;
        Some(Source {
            url: alloc::format!("{}libwebp-{}-{}", RELEASE_BASE_URL, self.version, suffix),
            strip: ARCHIVE_STRIP,
        })
    }
}
