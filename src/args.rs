//! Command-line construction for cwebp/dwebp.
//!
//! Both tools share a positional convention: option flags first, then
//! `-o <target>`, then the input. Reading from stdin is spelled `-- -` so a
//! lone dash cannot be taken for an option.

use crate::process::ExecutionRequest;
use crate::types::CropBox;
use alloc::boxed::Box;
use alloc::vec::Vec;
use std::ffi::{OsStr, OsString};
use std::io::{Read, Write};
use std::path::Path;

/// Marker used by both tools for stdin/stdout.
pub const STDIO_MARKER: &str = "-";

/// End-of-options marker.
pub const END_OF_OPTIONS: &str = "--";

/// Accumulates arguments and an optional stdin stream for one execution.
#[derive(Default)]
pub struct CommandLine<'a> {
    args: Vec<OsString>,
    stdin: Option<Box<dyn Read + Send + 'a>>,
}

impl<'a> CommandLine<'a> {
    /// Empty command line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bare flag.
    pub fn flag(&mut self, name: &str) -> &mut Self {
        self.args.push(name.into());
        self
    }

    /// Append a flag followed by its values.
    pub fn option<V: ToString>(&mut self, name: &str, values: &[V]) -> &mut Self {
        self.args.push(name.into());
        self.args
            .extend(values.iter().map(|v| OsString::from(v.to_string())));
        self
    }

    /// Append a flag only when `enabled`.
    pub fn switch(&mut self, name: &str, enabled: bool) -> &mut Self {
        if enabled {
            self.flag(name);
        }
        self
    }

    /// `-q <quality>`, omitted when unset so the tool default applies.
    pub fn quality(&mut self, quality: Option<u8>) -> &mut Self {
        if let Some(q) = quality {
            self.option("-q", &[q]);
        }
        self
    }

    /// `-crop <x> <y> <w> <h>`.
    pub fn crop(&mut self, crop: Option<CropBox>) -> &mut Self {
        if let Some(c) = crop {
            self.option("-crop", &[c.x, c.y, c.width, c.height]);
        }
        self
    }

    /// `-o <path>`.
    pub fn output_file(&mut self, path: &Path) -> &mut Self {
        self.args.push("-o".into());
        self.args.push(path.as_os_str().to_owned());
        self
    }

    /// `-o -`: write the result to stdout.
    pub fn output_stdout(&mut self) -> &mut Self {
        self.args.push("-o".into());
        self.args.push(STDIO_MARKER.into());
        self
    }

    /// Positional input file, appended last.
    pub fn input_file(&mut self, path: &Path) -> &mut Self {
        self.args.push(path.as_os_str().to_owned());
        self
    }

    /// `-- -` and pipe `reader` into stdin.
    pub fn input_stream(&mut self, reader: Box<dyn Read + Send + 'a>) -> &mut Self {
        self.args.push(END_OF_OPTIONS.into());
        self.args.push(STDIO_MARKER.into());
        self.stdin = Some(reader);
        self
    }

    /// Arguments accumulated so far.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Finish into an execution request, optionally streaming stdout into
    /// `stdout` instead of capturing it.
    #[must_use]
    pub fn into_request(self, stdout: Option<&'a mut (dyn Write + Send)>) -> ExecutionRequest<'a> {
        ExecutionRequest {
            args: self.args,
            stdin: self.stdin,
            stdout,
        }
    }
}

impl core::fmt::Debug for CommandLine<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandLine")
            .field("args", &self.args)
            .field("stdin", &self.stdin.is_some())
            .finish()
    }
}

/// Render arguments for log output.
pub(crate) fn display_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.as_os_str())
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}
