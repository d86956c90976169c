//! # Image Loading and Decoding
//!
//! Decodes the logo and signature bytes handed to the composer. Signatures
//! are captured as PNG by the mobile client and logos are uploaded by hand,
//! so the loader tries PNG first and falls back to JPEG. JPEG bytes pass
//! through without re-encoding (the PDF supports DCTDecode natively); PNG is
//! decoded to RGB pixels with a separate alpha channel for SMask
//! transparency.

use std::io::Cursor;

/// A decoded image ready for PDF embedding.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixel_data: ImagePixelData,
    pub width_px: u32,
    pub height_px: u32,
}

impl LoadedImage {
    /// Intrinsic aspect ratio (width over height).
    pub fn aspect(&self) -> f64 {
        self.width_px as f64 / self.height_px as f64
    }
}

/// Pixel data in a form the PDF serializer consumes directly.
#[derive(Debug, Clone)]
pub enum ImagePixelData {
    /// Raw JPEG bytes — embedded as-is with DCTDecode.
    Jpeg {
        data: Vec<u8>,
        color_space: JpegColorSpace,
    },
    /// Decoded RGB pixels + optional alpha channel.
    Decoded {
        /// width * height * 3 bytes (RGB)
        rgb: Vec<u8>,
        /// width * height bytes (grayscale alpha). None if fully opaque.
        alpha: Option<Vec<u8>>,
    },
}

/// JPEG color space for the PDF /ColorSpace entry.
#[derive(Debug, Clone, Copy)]
pub enum JpegColorSpace {
    DeviceRGB,
    DeviceGray,
}

/// Decode raw image bytes: PNG first, JPEG as the fallback.
///
/// Failure of both decoders is reported back so the caller can degrade the
/// rendering (drop the logo, substitute the signature placeholder).
pub fn decode_image(data: &[u8]) -> Result<LoadedImage, String> {
    if data.len() < 4 {
        return Err("image data too short".to_string());
    }
    decode_png(data).or_else(|_| decode_jpeg(data))
}

/// PNG: decode to RGBA, split into RGB + alpha.
fn decode_png(data: &[u8]) -> Result<LoadedImage, String> {
    let mut reader = image::io::Reader::new(Cursor::new(data));
    reader.set_format(image::ImageFormat::Png);
    let img = reader
        .decode()
        .map_err(|e| format!("failed to decode PNG: {}", e))?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();

    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    let mut has_transparency = false;

    for pixel in rgba.pixels() {
        rgb.push(pixel[0]);
        rgb.push(pixel[1]);
        rgb.push(pixel[2]);
        let a = pixel[3];
        alpha.push(a);
        if a != 255 {
            has_transparency = true;
        }
    }

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Decoded {
            rgb,
            alpha: if has_transparency { Some(alpha) } else { None },
        },
        width_px: width,
        height_px: height,
    })
}

/// JPEG: read dimensions and color space without decoding pixels.
/// The raw bytes are passed through to the PDF (DCTDecode).
fn decode_jpeg(data: &[u8]) -> Result<LoadedImage, String> {
    let mut reader = image::io::Reader::new(Cursor::new(data));
    reader.set_format(image::ImageFormat::Jpeg);
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| format!("failed to read JPEG dimensions: {}", e))?;

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Jpeg {
            data: data.to_vec(),
            color_space: detect_jpeg_color_space(data),
        },
        width_px: width,
        height_px: height,
    })
}

/// Scan JPEG markers for the SOF segment and read the component count to
/// determine the color space.
fn detect_jpeg_color_space(data: &[u8]) -> JpegColorSpace {
    let mut i = 2; // skip SOI marker (FF D8)
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            break;
        }
        let marker = data[i + 1];
        // SOF markers: C0-C3, C5-C7, C9-CB, CD-CF
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof {
            // SOF segment: length(2) + precision(1) + height(2) + width(2) + num_components(1)
            if i + 9 < data.len() {
                let num_components = data[i + 9];
                return if num_components == 1 {
                    JpegColorSpace::DeviceGray
                } else {
                    JpegColorSpace::DeviceRGB
                };
            }
        }
        if i + 3 < data.len() {
            let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            i += 2 + seg_len;
        } else {
            break;
        }
    }
    JpegColorSpace::DeviceRGB
}
