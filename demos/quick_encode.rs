use imgref::ImgVec;
use rgb::RGBA8;
use std::env;
use std::fs::File;
use webpbin::{CWebP, Preset, ToolConfig};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: quick_encode <input.png> <output.webp>");
        return;
    }
    let img = image::open(&args[1]).unwrap().to_rgba8();
    let pixels: Vec<RGBA8> = img
        .as_raw()
        .chunks_exact(4)
        .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
        .collect();
    let img = ImgVec::new(pixels, img.width() as usize, img.height() as usize);

    let mut out = File::create(&args[2]).unwrap();
    CWebP::new(ToolConfig::from_env())
        .preset(Preset::Picture)
        .quality(85)
        .method(4)
        .input_image(img.as_ref())
        .output(&mut out)
        .run()
        .unwrap();
    eprintln!("Wrote {} bytes to {}", out.metadata().unwrap().len(), args[2]);
}
