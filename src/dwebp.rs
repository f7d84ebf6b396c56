//! `dwebp` controller: decode WebP files or streams to PNG, or straight into
//! an in-memory RGBA image.

use crate::args::CommandLine;
use crate::bridge;
use crate::cancel::{Stop, Unstoppable};
use crate::config::ToolConfig;
use crate::error::{Error, Result};
use crate::locate::{Tool, ToolKind};
use crate::process;
use crate::types::{CropBox, Output};
use alloc::boxed::Box;
use alloc::string::String;
use imgref::ImgVec;
use rgb::RGBA8;
use std::io::{Read, Write};
use std::path::PathBuf;
use whereat::*;

/// Decoding options passed to dwebp as flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// `-nofilter`: skip in-loop filtering.
    pub bypass_filtering: bool,
    /// `-nofancy`: plain upsampling of the chroma planes.
    pub no_fancy_upsampling: bool,
    /// `-mt`.
    pub multithreaded: bool,
    /// `-flip`: flip the output vertically.
    pub flip: bool,
    /// `-crop`, applied before scaling.
    pub crop: Option<CropBox>,
    /// `-resize <w> <h>`. A zero dimension keeps the aspect ratio.
    pub scale: Option<(u32, u32)>,
}

impl DecodeOptions {
    fn apply(&self, cmd: &mut CommandLine<'_>) {
        cmd.switch("-nofilter", self.bypass_filtering)
            .switch("-nofancy", self.no_fancy_upsampling)
            .switch("-mt", self.multithreaded)
            .switch("-flip", self.flip)
            .crop(self.crop);
        if let Some((width, height)) = self.scale {
            cmd.option("-resize", &[width, height]);
        }
    }
}

enum DecoderInput<'a> {
    File(PathBuf),
    Stream(Box<dyn Read + Send + 'a>),
}

impl DecoderInput<'_> {
    fn retained(&self) -> Option<Self> {
        match self {
            DecoderInput::File(path) => Some(DecoderInput::File(path.clone())),
            DecoderInput::Stream(_) => None,
        }
    }
}

/// Wrapper around the `dwebp` command-line decoder.
///
/// Select an input and, optionally, an output. Without an output the PNG
/// produced by the tool is decoded and returned from [`run`]; with one, the
/// PNG goes there and `run` returns `None`. Like [`CWebP`](crate::CWebP),
/// each run resets the options, keeps file selections, and drops any reader
/// or writer it was given.
///
/// See <https://developers.google.com/speed/webp/docs/dwebp>.
///
/// # Example
///
/// ```rust,no_run
/// use webpbin::{DWebP, ToolConfig};
///
/// let image = DWebP::new(ToolConfig::from_env())
///     .input_file("photo.webp")
///     .run()?
///     .expect("no output was set, so an image is returned");
/// println!("{}x{}", image.width(), image.height());
/// # Ok::<(), whereat::At<webpbin::Error>>(())
/// ```
///
/// [`run`]: DWebP::run
pub struct DWebP<'a> {
    tool: Tool,
    input: Option<DecoderInput<'a>>,
    output: Option<Output<'a>>,
    options: DecodeOptions,
}

impl Default for DWebP<'_> {
    fn default() -> Self {
        Self::new(ToolConfig::shared().clone())
    }
}

impl<'a> DWebP<'a> {
    /// Create a controller. The binary is located on first use.
    #[must_use]
    pub fn new(config: ToolConfig) -> Self {
        Self {
            tool: Tool::new(ToolKind::Dwebp, config),
            input: None,
            output: None,
            options: DecodeOptions::default(),
        }
    }

    /// Version reported by the dwebp binary.
    pub fn version(&mut self) -> Result<String> {
        self.tool.version(&Unstoppable)
    }

    /// Underlying tool descriptor.
    #[must_use]
    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    /// Options for the next run.
    #[must_use]
    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode the WebP file at `path`. Replaces any other input.
    pub fn input_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.input = Some(DecoderInput::File(path.into()));
        self
    }

    /// Decode WebP bytes read from `reader`. Replaces any other input.
    pub fn input(&mut self, reader: impl Read + Send + 'a) -> &mut Self {
        self.input = Some(DecoderInput::Stream(Box::new(reader)));
        self
    }

    /// Write the PNG to `path`. Replaces any other output.
    pub fn output_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.output = Some(Output::File(path.into()));
        self
    }

    /// Stream the PNG bytes into `writer`. Replaces any other output.
    pub fn output(&mut self, writer: &'a mut (dyn Write + Send)) -> &mut Self {
        self.output = Some(Output::Stream(writer));
        self
    }

    /// Crop the decoded picture. The rectangle must lie within the image.
    pub fn crop(&mut self, x: u32, y: u32, width: u32, height: u32) -> &mut Self {
        self.options.crop = Some(CropBox::new(x, y, width, height));
        self
    }

    /// Rescale after cropping. Pass 0 for one dimension to keep the aspect
    /// ratio.
    pub fn scale(&mut self, width: u32, height: u32) -> &mut Self {
        self.options.scale = Some((width, height));
        self
    }

    /// Skip in-loop filtering. Faster, lower quality.
    pub fn bypass_filtering(&mut self, enable: bool) -> &mut Self {
        self.options.bypass_filtering = enable;
        self
    }

    /// Disable fancy upsampling.
    pub fn no_fancy_upsampling(&mut self, enable: bool) -> &mut Self {
        self.options.no_fancy_upsampling = enable;
        self
    }

    /// Let the tool use multiple threads.
    pub fn multithreaded(&mut self, enable: bool) -> &mut Self {
        self.options.multithreaded = enable;
        self
    }

    /// Flip the output vertically.
    pub fn flip(&mut self, enable: bool) -> &mut Self {
        self.options.flip = enable;
        self
    }

    /// Restore all options to their defaults. The resolved binary is kept.
    pub fn reset(&mut self) -> &mut Self {
        self.options = DecodeOptions::default();
        self
    }

    /// Run dwebp with the current settings.
    ///
    /// Returns the decoded image only when no output was selected.
    pub fn run(&mut self) -> Result<Option<ImgVec<RGBA8>>> {
        self.run_with_stop(Unstoppable)
    }

    /// Run dwebp, killing it if `stop` fires before it exits.
    pub fn run_with_stop(&mut self, stop: impl Stop) -> Result<Option<ImgVec<RGBA8>>> {
        let input = self.input.take();
        self.input = input.as_ref().and_then(DecoderInput::retained);
        let output = self.output.take();
        self.output = output.as_ref().and_then(Output::retained);
        let options = core::mem::take(&mut self.options);

        let input = input.ok_or_else(|| at!(Error::Configuration("undefined input".into())))?;

        let mut cmd = CommandLine::new();
        options.apply(&mut cmd);

        let (sink, capture) = match output {
            Some(Output::File(path)) => {
                cmd.output_file(&path);
                (None, false)
            }
            Some(Output::Stream(writer)) => {
                cmd.output_stdout();
                (Some(writer), false)
            }
            None => {
                cmd.output_stdout();
                (None, true)
            }
        };

        match input {
            DecoderInput::File(path) => {
                cmd.input_file(&path);
            }
            DecoderInput::Stream(reader) => {
                cmd.input_stream(reader);
            }
        }

        let program = self.tool.resolve()?.to_path_buf();
        let execution = process::execute(&program, cmd.into_request(sink), &stop)?;

        if capture {
            log::trace!("decoding {} bytes of PNG from dwebp", execution.stdout.len());
            bridge::from_png(&execution.stdout).map(Some)
        } else {
            Ok(None)
        }
    }
}
