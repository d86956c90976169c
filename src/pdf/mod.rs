//! # PDF Serializer
//!
//! Takes the composer's draw list and writes a valid single-page PDF 1.7
//! file. This is a from-scratch writer: the subset needed here — one page,
//! the standard Helvetica faces, rectangles, lines, text and raster images —
//! is small enough that owning the bytes beats carrying a PDF library.
//!
//! ## Structure
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- objects (catalog, page tree, fonts, images, content)
//! ...
//! xref                <- byte offsets of each object
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! Fonts are Type1 references with WinAnsiEncoding — nothing is embedded.
//! Text is escaped into the WinAnsi byte range with octal escapes for the
//! upper half. JPEG images embed their original bytes under DCTDecode; PNG
//! images embed Flate-compressed RGB with an optional SMask alpha channel.
//! The draw list is already in PDF coordinates, so no axis flip happens here.

use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>

use crate::compose::{DrawOp, PAGE_HEIGHT, PAGE_WIDTH};
use crate::font::Face;
use crate::image_loader::{ImagePixelData, JpegColorSpace, LoadedImage};
use miniz_oxide::deflate::compress_to_vec_zlib;

/// Document metadata for the Info dictionary.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

struct PdfObject {
    data: Vec<u8>,
}

/// Serialize a draw list to PDF bytes.
pub fn write_document(ops: &[DrawOp], metadata: &Metadata) -> Vec<u8> {
    // Object 0 is the xref placeholder; 1 = Catalog, 2 = Pages.
    let mut objects: Vec<PdfObject> = vec![
        PdfObject { data: vec![] },
        PdfObject { data: vec![] },
        PdfObject { data: vec![] },
    ];

    let faces = register_fonts(&mut objects, ops);
    let image_ids = register_images(&mut objects, ops);

    let content = build_content_stream(ops, &faces);
    let compressed = compress_to_vec_zlib(content.as_bytes(), 6);
    let content_obj_id = objects.len();
    let mut content_data: Vec<u8> = Vec::new();
    let _ = write!(
        content_data,
        "<< /Length {} /Filter /FlateDecode >>\nstream\n",
        compressed.len()
    );
    content_data.extend_from_slice(&compressed);
    content_data.extend_from_slice(b"\nendstream");
    objects.push(PdfObject { data: content_data });

    let page_obj_id = objects.len();
    let font_resources = faces
        .iter()
        .enumerate()
        .map(|(i, (_, obj_id))| format!("/F{} {} 0 R", i, obj_id))
        .collect::<Vec<_>>()
        .join(" ");
    let xobject_resources = image_ids
        .iter()
        .enumerate()
        .map(|(i, obj_id)| format!("/Im{} {} 0 R", i, obj_id))
        .collect::<Vec<_>>()
        .join(" ");
    let resources = if xobject_resources.is_empty() {
        format!("/Font << {} >>", font_resources)
    } else {
        format!(
            "/Font << {} >> /XObject << {} >>",
            font_resources, xobject_resources
        )
    };
    let page_dict = format!(
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
         /Contents {} 0 R /Resources << {} >> >>",
        PAGE_WIDTH, PAGE_HEIGHT, content_obj_id, resources
    );
    objects.push(PdfObject {
        data: page_dict.into_bytes(),
    });

    objects[1].data = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
    objects[2].data = format!("<< /Type /Pages /Kids [{} 0 R] /Count 1 >>", page_obj_id)
        .into_bytes();

    let info_obj_id = if metadata.title.is_some() || metadata.author.is_some() {
        let id = objects.len();
        let mut info = String::from("<< ");
        if let Some(ref title) = metadata.title {
            let _ = write!(info, "/Title ({}) ", escape_pdf_string(title));
        }
        if let Some(ref author) = metadata.author {
            let _ = write!(info, "/Author ({}) ", escape_pdf_string(author));
        }
        let _ = write!(info, "/Producer (Bordereau 0.3) /Creator (Bordereau) >>");
        objects.push(PdfObject {
            data: info.into_bytes(),
        });
        Some(id)
    } else {
        None
    };

    serialize(&objects, info_obj_id)
}

/// Register one Type1 font object per face used by the draw list, in a
/// deterministic order. Returns (face, object id) pairs; index = /F index.
fn register_fonts(objects: &mut Vec<PdfObject>, ops: &[DrawOp]) -> Vec<(Face, usize)> {
    let mut faces: Vec<Face> = ops
        .iter()
        .filter_map(|op| match op {
            DrawOp::Text { face, .. } => Some(*face),
            _ => None,
        })
        .collect();
    faces.sort();
    faces.dedup();
    if faces.is_empty() {
        faces.push(Face::Regular);
    }

    faces
        .into_iter()
        .map(|face| {
            let obj_id = objects.len();
            let font_dict = format!(
                "<< /Type /Font /Subtype /Type1 /BaseFont /{} \
                 /Encoding /WinAnsiEncoding >>",
                face.pdf_name()
            );
            objects.push(PdfObject {
                data: font_dict.into_bytes(),
            });
            (face, obj_id)
        })
        .collect()
}

/// Write each image in the draw list as XObject(s), in op order. The i-th
/// image op is referenced as /Im{i} in the content stream.
fn register_images(objects: &mut Vec<PdfObject>, ops: &[DrawOp]) -> Vec<usize> {
    ops.iter()
        .filter_map(|op| match op {
            DrawOp::Image { image, .. } => Some(write_image_xobject(objects, image)),
            _ => None,
        })
        .collect()
}

/// Write a single image as one or two XObject objects (main + SMask).
/// Returns the main XObject id.
fn write_image_xobject(objects: &mut Vec<PdfObject>, image: &LoadedImage) -> usize {
    match &image.pixel_data {
        ImagePixelData::Jpeg { data, color_space } => {
            let color_space_str = match color_space {
                JpegColorSpace::DeviceRGB => "/DeviceRGB",
                JpegColorSpace::DeviceGray => "/DeviceGray",
            };

            let obj_id = objects.len();
            let mut obj_data: Vec<u8> = Vec::new();
            let _ = write!(
                obj_data,
                "<< /Type /XObject /Subtype /Image \
                 /Width {} /Height {} \
                 /ColorSpace {} \
                 /BitsPerComponent 8 \
                 /Filter /DCTDecode \
                 /Length {} >>\nstream\n",
                image.width_px,
                image.height_px,
                color_space_str,
                data.len()
            );
            obj_data.extend_from_slice(data);
            obj_data.extend_from_slice(b"\nendstream");
            objects.push(PdfObject { data: obj_data });
            obj_id
        }

        ImagePixelData::Decoded { rgb, alpha } => {
            // SMask first if an alpha channel exists, so the main object can
            // reference it.
            let smask_id = alpha.as_ref().map(|alpha_data| {
                let compressed_alpha = compress_to_vec_zlib(alpha_data, 6);
                let smask_obj_id = objects.len();
                let mut smask_data: Vec<u8> = Vec::new();
                let _ = write!(
                    smask_data,
                    "<< /Type /XObject /Subtype /Image \
                     /Width {} /Height {} \
                     /ColorSpace /DeviceGray \
                     /BitsPerComponent 8 \
                     /Filter /FlateDecode \
                     /Length {} >>\nstream\n",
                    image.width_px,
                    image.height_px,
                    compressed_alpha.len()
                );
                smask_data.extend_from_slice(&compressed_alpha);
                smask_data.extend_from_slice(b"\nendstream");
                objects.push(PdfObject { data: smask_data });
                smask_obj_id
            });

            let compressed_rgb = compress_to_vec_zlib(rgb, 6);
            let obj_id = objects.len();
            let mut obj_data: Vec<u8> = Vec::new();

            let smask_ref = smask_id
                .map(|id| format!(" /SMask {} 0 R", id))
                .unwrap_or_default();

            let _ = write!(
                obj_data,
                "<< /Type /XObject /Subtype /Image \
                 /Width {} /Height {} \
                 /ColorSpace /DeviceRGB \
                 /BitsPerComponent 8 \
                 /Filter /FlateDecode \
                 /Length {}{} >>\nstream\n",
                image.width_px,
                image.height_px,
                compressed_rgb.len(),
                smask_ref
            );
            obj_data.extend_from_slice(&compressed_rgb);
            obj_data.extend_from_slice(b"\nendstream");
            objects.push(PdfObject { data: obj_data });
            obj_id
        }
    }
}

/// Translate the draw list into PDF content-stream operators.
fn build_content_stream(ops: &[DrawOp], faces: &[(Face, usize)]) -> String {
    let mut stream = String::new();
    let mut image_counter = 0usize;

    for op in ops {
        match op {
            DrawOp::Rect {
                x,
                y,
                w,
                h,
                fill,
                border,
            } => {
                if let Some(c) = fill {
                    let _ = write!(
                        stream,
                        "q\n{:.3} {:.3} {:.3} rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ\n",
                        c.r, c.g, c.b, x, y, w, h
                    );
                }
                if let Some((c, bw)) = border {
                    let _ = write!(
                        stream,
                        "q\n{:.3} {:.3} {:.3} RG\n{:.2} w\n{:.2} {:.2} {:.2} {:.2} re\nS\nQ\n",
                        c.r, c.g, c.b, bw, x, y, w, h
                    );
                }
            }

            DrawOp::Line {
                from,
                to,
                width,
                color,
            } => {
                let _ = write!(
                    stream,
                    "q\n{:.3} {:.3} {:.3} RG\n{:.2} w\n{:.2} {:.2} m\n{:.2} {:.2} l\nS\nQ\n",
                    color.r, color.g, color.b, width, from.0, from.1, to.0, to.1
                );
            }

            DrawOp::Text {
                x,
                y,
                size,
                face,
                color,
                content,
            } => {
                let _ = write!(
                    stream,
                    "BT\n{:.3} {:.3} {:.3} rg\n/F{} {:.1} Tf\n{:.2} {:.2} Td\n({}) Tj\nET\n",
                    color.r,
                    color.g,
                    color.b,
                    face_index(*face, faces),
                    size,
                    x,
                    y,
                    encode_winansi(content)
                );
            }

            DrawOp::Image { x, y, w, h, .. } => {
                let _ = write!(
                    stream,
                    "q\n{:.4} 0 0 {:.4} {:.2} {:.2} cm\n/Im{} Do\nQ\n",
                    w, h, x, y, image_counter
                );
                image_counter += 1;
            }
        }
    }

    stream
}

/// Look up the /F index for a face.
fn face_index(face: Face, faces: &[(Face, usize)]) -> usize {
    faces.iter().position(|(f, _)| *f == face).unwrap_or(0)
}

/// Escape special characters in a PDF string.
fn escape_pdf_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Encode a string as a WinAnsi PDF string literal body: delimiters escaped,
/// printable ASCII verbatim, everything else as octal escapes (with `?` for
/// characters WinAnsi cannot represent).
fn encode_winansi(text: &str) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        let b = unicode_to_winansi(ch).unwrap_or(b'?');
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:03o}", b);
            }
        }
    }
    out
}

/// Map a Unicode codepoint to a WinAnsiEncoding byte value.
///
/// WinAnsiEncoding is based on Windows-1252: 0x20..=0x7E and 0xA0..=0xFF map
/// directly, and 0x80..=0x9F holds the special mappings for smart quotes,
/// dashes, the euro sign and friends.
fn unicode_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    match cp {
        0x20AC => Some(0x80), // Euro sign
        0x201A => Some(0x82), // Single low-9 quotation mark
        0x0192 => Some(0x83), // Latin small letter f with hook
        0x201E => Some(0x84), // Double low-9 quotation mark
        0x2026 => Some(0x85), // Horizontal ellipsis
        0x2020 => Some(0x86), // Dagger
        0x2021 => Some(0x87), // Double dagger
        0x02C6 => Some(0x88), // Modifier letter circumflex accent
        0x2030 => Some(0x89), // Per mille sign
        0x0160 => Some(0x8A), // Latin capital letter S with caron
        0x2039 => Some(0x8B), // Single left-pointing angle quotation
        0x0152 => Some(0x8C), // Latin capital ligature OE
        0x017D => Some(0x8E), // Latin capital letter Z with caron
        0x2018 => Some(0x91), // Left single quotation mark
        0x2019 => Some(0x92), // Right single quotation mark
        0x201C => Some(0x93), // Left double quotation mark
        0x201D => Some(0x94), // Right double quotation mark
        0x2022 => Some(0x95), // Bullet
        0x2013 => Some(0x96), // En dash
        0x2014 => Some(0x97), // Em dash
        0x02DC => Some(0x98), // Small tilde
        0x2122 => Some(0x99), // Trade mark sign
        0x0161 => Some(0x9A), // Latin small letter s with caron
        0x203A => Some(0x9B), // Single right-pointing angle quotation
        0x0153 => Some(0x9C), // Latin small ligature oe
        0x017E => Some(0x9E), // Latin small letter z with caron
        0x0178 => Some(0x9F), // Latin capital letter Y with diaeresis
        _ => None,
    }
}

/// Serialize all objects into the final PDF byte stream.
fn serialize(objects: &[PdfObject], info_obj_id: Option<usize>) -> Vec<u8> {
    let mut output: Vec<u8> = Vec::new();
    let mut offsets: Vec<usize> = vec![0; objects.len()];

    output.extend_from_slice(b"%PDF-1.7\n");
    output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

    for (i, obj) in objects.iter().enumerate().skip(1) {
        offsets[i] = output.len();
        let header = format!("{} 0 obj\n", i);
        output.extend_from_slice(header.as_bytes());
        output.extend_from_slice(&obj.data);
        output.extend_from_slice(b"\nendobj\n\n");
    }

    let xref_offset = output.len();
    let _ = write!(output, "xref\n0 {}\n", objects.len());
    let _ = write!(output, "0000000000 65535 f \n");
    for offset in offsets.iter().skip(1) {
        let _ = write!(output, "{:010} 00000 n \n", offset);
    }

    let _ = write!(output, "trailer\n<< /Size {} /Root 1 0 R", objects.len());
    if let Some(info_id) = info_obj_id {
        let _ = write!(output, " /Info {} 0 R", info_id);
    }
    let _ = write!(output, " >>\nstartxref\n{}\n%%EOF\n", xref_offset);

    output
}
