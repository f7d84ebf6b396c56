//! Integration tests for webpbin crate.
//!
//! Most tests drive small shell scripts standing in for cwebp/dwebp so the
//! argument contract and process plumbing can be checked anywhere. The
//! `real_tools` tests run only when both binaries are on `PATH`.

#![cfg(all(unix, feature = "encode", feature = "decode"))]

use imgref::ImgVec;
use rgb::RGBA8;
use std::fs;
use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use webpbin::*;

/// Writing an executable while another test forks can leave the file busy
/// (ETXTBSY); every test in this binary runs under this lock.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Records its arguments next to itself, then copies the input (last
/// argument, `-` for stdin) to the `-o` target (`-` for stdout).
const COPY_TOOL: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "$0.args"
out=""
prev=""
last=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
  last="$a"
done
copy() { if [ "$last" = "-" ]; then cat; else cat "$last"; fi; }
if [ "$out" = "-" ]; then copy; else copy > "$out"; fi
"#;

const FAILING_TOOL: &str = "#!/bin/sh\necho 'unsupported crop region' >&2\nexit 1\n";

const SLOW_TOOL: &str = "#!/bin/sh\nexec sleep 30\n";

const VERSION_TOOL: &str = "#!/bin/sh\nprintf '1.5.0\\r\\n'\n";

fn install(dir: &Path, kind: ToolKind, script: &str) -> PathBuf {
    let path = dir.join(kind.file_name());
    fs::write(&path, script).expect("write script failed");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod failed");
    path
}

fn recorded_args(tool: &Path) -> Vec<String> {
    let log = PathBuf::from(format!("{}.args", tool.display()));
    fs::read_to_string(log)
        .expect("args log missing")
        .lines()
        .map(str::to_owned)
        .collect()
}

fn vendored(dir: &TempDir) -> ToolConfig {
    ToolConfig::new().vendor_dir(dir.path()).skip_download(true)
}

/// Generate a gradient RGBA image.
fn generate_gradient(width: usize, height: usize) -> ImgVec<RGBA8> {
    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            pixels.push(RGBA8::new(
                ((x * 255) / width.max(1)) as u8,
                ((y * 255) / height.max(1)) as u8,
                128,
                255,
            ));
        }
    }
    ImgVec::new(pixels, width, height)
}

mod encode {
    use super::*;

    #[test]
    fn test_file_input_argument_order() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let tool = install(dir.path(), ToolKind::Cwebp, COPY_TOOL);
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.webp");
        fs::write(&input, b"source bytes").expect("write input failed");

        CWebP::new(vendored(&dir))
            .input_file(&input)
            .quality(80)
            .crop(1, 2, 3, 4)
            .output_file(&output)
            .run()
            .expect("encode failed");

        let out = output.display().to_string();
        let inp = input.display().to_string();
        assert_eq!(
            recorded_args(&tool),
            ["-q", "80", "-crop", "1", "2", "3", "4", "-o", out.as_str(), inp.as_str()]
        );
        assert_eq!(fs::read(&output).expect("read output failed"), b"source bytes");
    }

    #[test]
    fn test_stream_input_to_writer() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let tool = install(dir.path(), ToolKind::Cwebp, COPY_TOOL);

        let mut sink: Vec<u8> = Vec::new();
        CWebP::new(vendored(&dir))
            .input(Cursor::new(b"streamed".to_vec()))
            .output(&mut sink)
            .run()
            .expect("encode failed");

        assert_eq!(sink, b"streamed");
        assert_eq!(recorded_args(&tool), ["-o", "-", "--", "-"]);
    }

    #[test]
    fn test_last_input_wins() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        install(dir.path(), ToolKind::Cwebp, COPY_TOOL);
        let image = generate_gradient(5, 3);

        let mut sink: Vec<u8> = Vec::new();
        CWebP::new(vendored(&dir))
            .input_file(dir.path().join("missing.png"))
            .input(Cursor::new(b"not this".to_vec()))
            .input_image(image.as_ref())
            .output(&mut sink)
            .run()
            .expect("encode failed");

        // The tool echoed the bridged PNG back.
        let echoed = bridge::from_png(&sink).expect("not a PNG");
        assert_eq!((echoed.width(), echoed.height()), (5, 3));
        assert_eq!(echoed.buf(), image.buf());
    }

    #[test]
    fn test_tool_failure_carries_stderr() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        install(dir.path(), ToolKind::Cwebp, FAILING_TOOL);

        let mut sink: Vec<u8> = Vec::new();
        let err = CWebP::new(vendored(&dir))
            .input(Cursor::new(vec![0u8; 16]))
            .crop(0, 0, 9999, 9999)
            .output(&mut sink)
            .run()
            .unwrap_err();

        match err.error() {
            Error::Execution(failure) => {
                assert_eq!(failure.status, Some(1));
                assert!(failure.stderr.contains("unsupported crop region"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.error().to_string().contains("unsupported crop region"));
    }

    #[test]
    fn test_sequential_runs_reset_options() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let tool = install(dir.path(), ToolKind::Cwebp, COPY_TOOL);
        let input = dir.path().join("in.png");
        let first = dir.path().join("first.webp");
        fs::write(&input, b"first").expect("write input failed");

        let mut sink: Vec<u8> = Vec::new();
        {
            let mut cwebp = CWebP::new(vendored(&dir));
            cwebp
                .input_file(&input)
                .crop(0, 0, 2, 2)
                .quality(10)
                .output_file(&first)
                .run()
                .expect("first run failed");
            assert!(recorded_args(&tool).contains(&"-crop".to_owned()));

            // Only the output changes; the file input carries over and the
            // options do not.
            cwebp.output(&mut sink).run().expect("second run failed");
            let inp = input.display().to_string();
            assert_eq!(recorded_args(&tool), ["-o", "-", inp.as_str()]);

            // The writer was used up; the input is still selected.
            let err = cwebp.run().unwrap_err();
            assert!(matches!(err.error(), Error::Configuration(msg) if msg == "undefined output"));
        }
        assert_eq!(sink, b"first");
        assert_eq!(fs::read(&first).expect("read output failed"), b"first");
    }

    #[test]
    fn test_file_selection_reused() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let tool = install(dir.path(), ToolKind::Cwebp, COPY_TOOL);
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.webp");
        fs::write(&input, b"again").expect("write input failed");

        let mut cwebp = CWebP::new(vendored(&dir));
        cwebp.input_file(&input).output_file(&output).run().expect("first run failed");
        fs::remove_file(&output).expect("remove output failed");

        cwebp.quality(50).run().expect("second run failed");
        assert_eq!(fs::read(&output).expect("read output failed"), b"again");
        assert_eq!(recorded_args(&tool)[..2], ["-q", "50"]);
    }

    #[test]
    fn test_missing_input_spawns_nothing() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let tool = install(dir.path(), ToolKind::Cwebp, COPY_TOOL);
        let args_log = PathBuf::from(format!("{}.args", tool.display()));

        let mut sink: Vec<u8> = Vec::new();
        let err = CWebP::new(vendored(&dir))
            .quality(90)
            .output(&mut sink)
            .run()
            .unwrap_err();
        assert!(matches!(err.error(), Error::Configuration(msg) if msg == "undefined input"));
        assert!(!args_log.exists());

        let err = DWebP::new(vendored(&dir)).run().unwrap_err();
        assert!(matches!(err.error(), Error::Configuration(_)));
    }

    #[test]
    fn test_version_strips_line_breaks() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        install(dir.path(), ToolKind::Cwebp, VERSION_TOOL);

        let version = CWebP::new(vendored(&dir)).version().expect("version failed");
        assert_eq!(version, "1.5.0");
    }

    #[test]
    fn test_encoder_convenience_quality() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let tool = install(dir.path(), ToolKind::Cwebp, COPY_TOOL);
        let image = generate_gradient(2, 2);

        // Controller with the same shape the convenience API builds.
        let mut sink: Vec<u8> = Vec::new();
        CWebP::new(vendored(&dir))
            .quality(Encoder::default().quality)
            .input_image(image.as_ref())
            .output(&mut sink)
            .run()
            .expect("encode failed");
        assert_eq!(recorded_args(&tool), ["-q", "75", "-o", "-", "--", "-"]);
    }
}

mod decode {
    use super::*;

    #[test]
    fn test_decode_without_output_returns_image() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let tool = install(dir.path(), ToolKind::Dwebp, COPY_TOOL);
        let image = generate_gradient(3, 2);
        let png = bridge::to_png(image.as_ref().into()).expect("bridge failed");

        let decoded = DWebP::new(vendored(&dir))
            .input(Cursor::new(png))
            .run()
            .expect("decode failed")
            .expect("no output was set, so an image is returned");

        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        assert_eq!(decoded.buf(), image.buf());
        assert_eq!(recorded_args(&tool), ["-o", "-", "--", "-"]);
    }

    #[test]
    fn test_decode_to_file_returns_none() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let tool = install(dir.path(), ToolKind::Dwebp, COPY_TOOL);
        let input = dir.path().join("in.webp");
        let output = dir.path().join("out.png");
        fs::write(&input, b"webp bytes").expect("write input failed");

        let result = DWebP::new(vendored(&dir))
            .input_file(&input)
            .flip(true)
            .output_file(&output)
            .run()
            .expect("decode failed");

        assert!(result.is_none());
        assert_eq!(fs::read(&output).expect("read output failed"), b"webp bytes");
        assert_eq!(recorded_args(&tool)[0], "-flip");
    }

    #[test]
    fn test_decode_to_writer_returns_none() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        install(dir.path(), ToolKind::Dwebp, COPY_TOOL);

        let mut sink: Vec<u8> = Vec::new();
        let result = DWebP::new(vendored(&dir))
            .input(Cursor::new(b"raw".to_vec()))
            .output(&mut sink)
            .run()
            .expect("decode failed");
        assert!(result.is_none());
        assert_eq!(sink, b"raw");
    }

    #[test]
    fn test_garbage_output_is_codec_error() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        install(dir.path(), ToolKind::Dwebp, COPY_TOOL);

        let err = DWebP::new(vendored(&dir))
            .input(Cursor::new(b"definitely not a png".to_vec()))
            .run()
            .unwrap_err();
        assert!(matches!(err.error(), Error::Codec(_)));
    }
}

mod cancel {
    use super::*;

    #[test]
    fn test_cancel_kills_running_tool() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        install(dir.path(), ToolKind::Dwebp, SLOW_TOOL);

        let token = CancelToken::new();
        let trigger = token.clone();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });

        let started = Instant::now();
        let err = DWebP::new(vendored(&dir))
            .input(Cursor::new(vec![0u8; 8]))
            .run_with_stop(token)
            .unwrap_err();
        canceller.join().expect("canceller panicked");

        assert!(err.error().is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_cancelled_token_prevents_launch() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let tool = install(dir.path(), ToolKind::Cwebp, COPY_TOOL);

        let token = CancelToken::new();
        token.cancel();
        let mut sink: Vec<u8> = Vec::new();
        let err = CWebP::new(vendored(&dir))
            .input(Cursor::new(b"x".to_vec()))
            .output(&mut sink)
            .run_with_stop(token)
            .unwrap_err();

        assert!(err.error().is_cancelled());
        assert!(!PathBuf::from(format!("{}.args", tool.display())).exists());
    }
}

mod real_tools {
    use super::*;

    /// Configuration that finds both tools on `PATH`, if they are there.
    fn path_config(dir: &TempDir) -> Option<ToolConfig> {
        let config = vendored(dir);
        let found = Tool::new(ToolKind::Cwebp, config.clone()).resolve().is_ok()
            && Tool::new(ToolKind::Dwebp, config.clone()).resolve().is_ok();
        found.then_some(config)
    }

    #[test]
    fn test_roundtrip_through_streams() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let Some(config) = path_config(&dir) else {
            return;
        };
        let image = generate_gradient(4, 4);

        let mut webp: Vec<u8> = Vec::new();
        CWebP::new(config.clone())
            .input_image(image.as_ref())
            .quality(80)
            .output(&mut webp)
            .run()
            .expect("encode failed");
        assert_eq!(&webp[..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");

        let decoded = DWebP::new(config)
            .input(webp.as_slice())
            .run()
            .expect("decode failed")
            .expect("image expected");
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }

    #[test]
    fn test_quality_grid_preserves_dimensions() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let Some(config) = path_config(&dir) else {
            return;
        };
        let image = generate_gradient(16, 8);

        for quality in [0, 50, 100] {
            let mut webp: Vec<u8> = Vec::new();
            CWebP::new(config.clone())
                .input_image(image.as_ref())
                .quality(quality)
                .output(&mut webp)
                .run()
                .expect("encode failed");
            let decoded = DWebP::new(config.clone())
                .input(webp.as_slice())
                .run()
                .expect("decode failed")
                .expect("image expected");
            assert_eq!((decoded.width(), decoded.height()), (16, 8));
        }
    }

    #[test]
    fn test_crop_outside_image_fails() {
        let _guard = serial();
        let dir = TempDir::new().expect("tempdir failed");
        let Some(config) = path_config(&dir) else {
            return;
        };
        let image = generate_gradient(4, 4);

        let mut webp: Vec<u8> = Vec::new();
        let err = CWebP::new(config)
            .input_image(image.as_ref())
            .crop(2, 2, 64, 64)
            .output(&mut webp)
            .run()
            .unwrap_err();
        match err.error() {
            Error::Execution(failure) => assert!(!failure.stderr.is_empty()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
