use std::io::Cursor;

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// JPEG quality used for uploaded frames.
pub const FRAME_QUALITY: u8 = 60;

/// Encodes a packed RGB8 image as a JPEG data URL.
pub fn encode_jpeg(width: u32, height: u32, rgb: &[u8], quality: u8) -> anyhow::Result<String> {
    let expected = width as usize * height as usize * 3;
    if rgb.len() != expected {
        return Err(anyhow::anyhow!(
            "frame buffer is {} bytes, expected {} for {}x{}",
            rgb.len(),
            expected,
            width,
            height
        ));
    }
    let mut jpeg = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode(rgb, width, height, ExtendedColorType::Rgb8)?;
    Ok(format!(
        "{}{}",
        JPEG_DATA_URL_PREFIX,
        base64::engine::general_purpose::STANDARD.encode(jpeg.into_inner())
    ))
}
