//! # Fonts
//!
//! The document uses the standard PDF Helvetica family only, so no font data
//! is ever embedded: each face maps to a Type1 reference with WinAnsi
//! encoding, and measurement runs off the built-in AFM advance tables in
//! [`metrics`].

pub mod metrics;

use metrics::{FaceMetrics, HELVETICA, HELVETICA_BOLD};

/// One of the built-in faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Face {
    Regular,
    Bold,
    Oblique,
}

impl Face {
    /// The /BaseFont name for the PDF font dictionary.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Face::Regular => "Helvetica",
            Face::Bold => "Helvetica-Bold",
            Face::Oblique => "Helvetica-Oblique",
        }
    }

    /// Advance-width table for this face. Oblique shares the regular
    /// metrics, as in the AFM data.
    pub fn metrics(&self) -> &'static FaceMetrics {
        match self {
            Face::Regular | Face::Oblique => &HELVETICA,
            Face::Bold => &HELVETICA_BOLD,
        }
    }

    /// Measure a string in points at `size`.
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        self.metrics().measure_string(text, size)
    }
}
