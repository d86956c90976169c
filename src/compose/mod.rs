//! # Document Composer
//!
//! Lays out the delivery-note document: a fixed, single-page vertical flow of
//! header, rule, title, measured content sections, signature block and
//! footer. One top-down pass threads an explicit cursor (in PDF coordinates,
//! decreasing from near the top margin) through each section and accumulates
//! a draw list, which the [`crate::pdf`] writer serializes to bytes.
//!
//! Every section box is sized from its wrapped line count *before* it is
//! drawn, so a box is always exactly tall enough for its text. There is no
//! multi-page overflow handling: a note with pathological amounts of text
//! will clip into the footer band. Known limitation, kept as-is.

use crate::font::Face;
use crate::image_loader::{decode_image, LoadedImage};
use crate::pdf;
use crate::text::{clean_text, wrap_text};

/// An opaque RGB color, components in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

/// Document palette.
pub const BLUE: Color = Color::new(0.12, 0.25, 0.68);
pub const BLUE_ACCENT: Color = Color::new(0.15, 0.39, 0.92);
pub const DARK_TEXT: Color = Color::new(0.2, 0.2, 0.2);
pub const GRAY_TEXT: Color = Color::new(0.42, 0.45, 0.50);
pub const BG_GRAY: Color = Color::new(0.97, 0.98, 0.99);
pub const BG_BLUE: Color = Color::new(0.94, 0.96, 1.0);
pub const BORDER_BLUE: Color = Color::new(0.75, 0.86, 0.99);
pub const BORDER_GRAY: Color = Color::new(0.9, 0.91, 0.92);
pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);

/// A4 portrait, in points.
pub const PAGE_WIDTH: f64 = 595.28;
pub const PAGE_HEIGHT: f64 = 841.89;

const MARGIN: f64 = 40.0;
const CONTENT_WIDTH: f64 = PAGE_WIDTH - MARGIN * 2.0;
const CURSOR_START: f64 = 800.0;
const LOGO_HEIGHT: f64 = 50.0;
const COLUMN_GUTTER: f64 = 15.0;
const SECTION_GAP: f64 = 12.0;
const LINE_PITCH: f64 = 16.0;
const SECTION_TEXT_INSET: f64 = 12.0;
/// Horizontal padding subtracted from a section's width before wrapping.
const SECTION_WRAP_PADDING: f64 = 24.0;
const BODY_SIZE: f64 = 11.0;
const LABEL_SIZE: f64 = 9.0;
const SIGNATURE_MAX_WIDTH: f64 = 250.0;
const SIGNATURE_MAX_HEIGHT: f64 = 120.0;
const FOOTER_RULE_Y: f64 = 55.0;
const FOOTER_TEXT_Y: f64 = 40.0;

const TITLE: &str = "BON DE LIVRAISON";
const NOT_PROVIDED: &str = "Non renseigne";
const NO_DETAILS: &str = "Aucun detail";
const NO_SIGNATURE: &str = "Aucune signature";
const SIGNATURE_UNAVAILABLE: &str = "Signature non disponible";
const ACKNOWLEDGMENT: &str = "Lu et approuve";

/// The immutable inputs of one rendered document. Everything is already
/// resolved to display form: the driver is a name, the date is formatted,
/// the images are raw bytes straight from the blob store.
#[derive(Debug, Clone, Default)]
pub struct NoteDocument {
    pub bdl_number: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub address: String,
    pub details: String,
    pub driver_name: String,
    pub company_name: String,
    /// Validation timestamp in display form; also stamped into the footer.
    pub validated_at_text: String,
    pub logo: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
}

/// One drawing instruction, in PDF coordinates (origin bottom-left, y up).
#[derive(Debug, Clone)]
pub enum DrawOp {
    Rect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        fill: Option<Color>,
        /// Stroke color and line width.
        border: Option<(Color, f64)>,
    },
    Line {
        from: (f64, f64),
        to: (f64, f64),
        width: f64,
        color: Color,
    },
    Text {
        x: f64,
        y: f64,
        size: f64,
        face: Face,
        color: Color,
        content: String,
    },
    Image {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        image: LoadedImage,
    },
}

/// Visual treatment of a content section.
#[derive(Debug, Clone, Copy)]
enum SectionStyle {
    /// Light gray fill with the accent bar on the left.
    Plain,
    /// Light blue fill with a border; marks the operative delivery details.
    Highlight,
}

impl SectionStyle {
    fn fill(&self) -> Color {
        match self {
            SectionStyle::Plain => BG_GRAY,
            SectionStyle::Highlight => BG_BLUE,
        }
    }

    fn border(&self) -> Option<(Color, f64)> {
        match self {
            SectionStyle::Plain => None,
            SectionStyle::Highlight => Some((BORDER_BLUE, 1.0)),
        }
    }

    fn accent_bar(&self) -> bool {
        matches!(self, SectionStyle::Plain)
    }
}

/// Height of a section box holding `line_count` wrapped lines: label band,
/// the lines at a fixed pitch, bottom padding.
fn section_height(line_count: usize) -> f64 {
    22.0 + line_count as f64 * LINE_PITCH + 8.0
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

/// Render a note document to PDF bytes.
pub fn compose_note(doc: &NoteDocument) -> Vec<u8> {
    let ops = layout(doc);
    let metadata = pdf::Metadata {
        title: Some(format!("Bon de Livraison {}", doc.bdl_number)),
        author: Some(doc.company_name.clone()),
    };
    pdf::write_document(&ops, &metadata)
}

/// Lay the document out into a draw list. Exposed separately from
/// [`compose_note`] so the flow can be inspected without parsing PDF output.
pub fn layout(doc: &NoteDocument) -> Vec<DrawOp> {
    let mut page = Page::new();
    let mut y = CURSOR_START;

    y = page.header(doc, y);
    y = page.title_band(y);

    let half_width = (CONTENT_WIDTH - COLUMN_GUTTER) / 2.0;
    let y1 = page.section(
        MARGIN,
        y,
        half_width,
        "CLIENT / SOCIETE",
        or_placeholder(&doc.client_name, NOT_PROVIDED),
        SectionStyle::Plain,
    );
    let y2 = page.section(
        MARGIN + half_width + COLUMN_GUTTER,
        y,
        half_width,
        "EMAIL CLIENT",
        or_placeholder(doc.client_email.as_deref().unwrap_or(""), NOT_PROVIDED),
        SectionStyle::Plain,
    );
    y = y1.min(y2);

    y = page.section(
        MARGIN,
        y,
        CONTENT_WIDTH,
        "ADRESSE DE LIVRAISON",
        or_placeholder(&doc.address, NOT_PROVIDED),
        SectionStyle::Plain,
    );
    y = page.section(
        MARGIN,
        y,
        CONTENT_WIDTH,
        "DETAILS DE LA LIVRAISON",
        or_placeholder(&doc.details, NO_DETAILS),
        SectionStyle::Highlight,
    );
    y = page.section(
        MARGIN,
        y,
        CONTENT_WIDTH,
        "LIVREUR",
        or_placeholder(&doc.driver_name, NOT_PROVIDED),
        SectionStyle::Plain,
    );

    page.signature_block(doc, y);
    page.footer(doc);

    page.ops
}

struct Page {
    ops: Vec<DrawOp>,
}

impl Page {
    fn new() -> Self {
        Self { ops: Vec::new() }
    }

    fn text(&mut self, x: f64, y: f64, size: f64, face: Face, color: Color, content: &str) {
        self.ops.push(DrawOp::Text {
            x,
            y,
            size,
            face,
            color,
            content: content.to_string(),
        });
    }

    fn centered_text(&mut self, y: f64, size: f64, face: Face, color: Color, content: &str) {
        let x = (PAGE_WIDTH - face.text_width(content, size)) / 2.0;
        self.text(x, y, size, face, color, content);
    }

    fn right_aligned_text(&mut self, y: f64, size: f64, face: Face, color: Color, content: &str) {
        let x = PAGE_WIDTH - MARGIN - face.text_width(content, size);
        self.text(x, y, size, face, color, content);
    }

    /// Header band: logo (if it decodes), company name, then the business
    /// number and the validation date right-aligned. Returns the cursor
    /// below the band.
    fn header(&mut self, doc: &NoteDocument, y: f64) -> f64 {
        // An undecodable logo degrades to a text-only header.
        let mut name_x = MARGIN;
        if let Some(logo) = doc.logo.as_deref() {
            if let Ok(image) = decode_image(logo) {
                let width = LOGO_HEIGHT * image.aspect();
                self.ops.push(DrawOp::Image {
                    x: MARGIN,
                    y: y - 40.0,
                    w: width,
                    h: LOGO_HEIGHT,
                    image,
                });
                name_x = MARGIN + width + 12.0;
            }
        }

        self.text(
            name_x,
            y - 8.0,
            20.0,
            Face::Bold,
            BLUE,
            &clean_text(&doc.company_name),
        );
        self.right_aligned_text(
            y - 5.0,
            13.0,
            Face::Bold,
            GRAY_TEXT,
            &clean_text(&doc.bdl_number),
        );
        self.right_aligned_text(
            y - 22.0,
            10.0,
            Face::Regular,
            GRAY_TEXT,
            &clean_text(&doc.validated_at_text),
        );

        y - 55.0
    }

    /// Separator rule and centered document title.
    fn title_band(&mut self, y: f64) -> f64 {
        self.ops.push(DrawOp::Line {
            from: (MARGIN, y),
            to: (PAGE_WIDTH - MARGIN, y),
            width: 2.5,
            color: BLUE_ACCENT,
        });
        let y = y - 35.0;
        self.centered_text(y, 18.0, Face::Bold, BLUE, TITLE);
        y - 40.0
    }

    /// One content section: background box sized from the wrapped line
    /// count, label, then the lines. Returns the cursor below the box and
    /// its trailing gap.
    fn section(
        &mut self,
        x: f64,
        top: f64,
        width: f64,
        label: &str,
        content: &str,
        style: SectionStyle,
    ) -> f64 {
        let content = clean_text(content);
        let lines = wrap_text(
            &content,
            |t, s| Face::Regular.text_width(t, s),
            BODY_SIZE,
            width - SECTION_WRAP_PADDING,
        );
        let box_h = section_height(lines.len());

        self.ops.push(DrawOp::Rect {
            x,
            y: top - box_h,
            w: width,
            h: box_h,
            fill: Some(style.fill()),
            border: style.border(),
        });
        if style.accent_bar() {
            self.ops.push(DrawOp::Rect {
                x,
                y: top - box_h,
                w: 3.0,
                h: box_h,
                fill: Some(BLUE_ACCENT),
                border: None,
            });
        }

        self.text(
            x + SECTION_TEXT_INSET,
            top - 16.0,
            LABEL_SIZE,
            Face::Bold,
            BLUE,
            label,
        );

        let mut line_y = top - 34.0;
        for line in &lines {
            self.text(
                x + SECTION_TEXT_INSET,
                line_y,
                BODY_SIZE,
                Face::Regular,
                DARK_TEXT,
                line,
            );
            line_y -= LINE_PITCH;
        }

        top - box_h - SECTION_GAP
    }

    /// Signature label, then the scaled signature image in a bordered white
    /// backing, a text placeholder when absent or undecodable, and the
    /// acknowledgment phrase.
    fn signature_block(&mut self, doc: &NoteDocument, y: f64) {
        let mut y = y - 5.0;
        self.centered_text(y, LABEL_SIZE, Face::Bold, BLUE, "SIGNATURE DU CLIENT");
        y -= 15.0;

        match doc.signature.as_deref().map(decode_image) {
            Some(Ok(image)) => {
                let scale = (SIGNATURE_MAX_WIDTH / image.width_px as f64)
                    .min(SIGNATURE_MAX_HEIGHT / image.height_px as f64);
                let w = image.width_px as f64 * scale;
                let h = image.height_px as f64 * scale;

                self.ops.push(DrawOp::Rect {
                    x: (PAGE_WIDTH - w - 8.0) / 2.0,
                    y: y - h - 4.0,
                    w: w + 8.0,
                    h: h + 8.0,
                    fill: Some(WHITE),
                    border: Some((BORDER_GRAY, 1.0)),
                });
                self.ops.push(DrawOp::Image {
                    x: (PAGE_WIDTH - w) / 2.0,
                    y: y - h,
                    w,
                    h,
                    image,
                });
                y -= h + 18.0;
            }
            Some(Err(_)) => {
                self.centered_text(y, BODY_SIZE, Face::Regular, GRAY_TEXT, SIGNATURE_UNAVAILABLE);
                y -= 20.0;
            }
            None => {
                self.centered_text(y, BODY_SIZE, Face::Regular, GRAY_TEXT, NO_SIGNATURE);
                y -= 20.0;
            }
        }

        self.centered_text(y - 3.0, 10.0, Face::Oblique, GRAY_TEXT, ACKNOWLEDGMENT);
    }

    /// Footer rule and caption, at a fixed offset from the page bottom
    /// regardless of how far the content cursor got.
    fn footer(&mut self, doc: &NoteDocument) {
        self.ops.push(DrawOp::Line {
            from: (MARGIN, FOOTER_RULE_Y),
            to: (PAGE_WIDTH - MARGIN, FOOTER_RULE_Y),
            width: 0.5,
            color: BORDER_GRAY,
        });
        let caption = clean_text(&format!(
            "{} - Document genere automatiquement le {}",
            doc.company_name, doc.validated_at_text
        ));
        self.centered_text(FOOTER_TEXT_Y, 9.0, Face::Regular, GRAY_TEXT, &caption);
    }
}
