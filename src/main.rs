//! # Bordereau CLI
//!
//! Renders a delivery note described as JSON into a PDF, without touching
//! storage or email. Useful for eyeballing template changes.
//!
//! Usage:
//!   bordereau note.json -o bdl.pdf
//!   echo '{ ... }' | bordereau -o bdl.pdf
//!   bordereau --example > note.json

use std::env;
use std::fs;
use std::io::{self, Read};

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use bordereau::compose::{compose_note, NoteDocument};
use bordereau::model::{format_validated_at, DEFAULT_COMPANY_NAME, UNKNOWN_DRIVER};

/// The JSON shape accepted on the command line. Images come in as base64.
#[derive(Deserialize)]
struct NoteInput {
    bdl_number: String,
    client_name: String,
    #[serde(default)]
    client_email: Option<String>,
    address: String,
    #[serde(default)]
    details: String,
    #[serde(default)]
    driver_name: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    validated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    logo: Option<String>,
    #[serde(default)]
    signature: Option<String>,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_note_json());
        return;
    }

    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1]).expect("Failed to read input file")
    } else {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .expect("Failed to read stdin");
        buf
    };

    let output_path = args
        .windows(2)
        .find(|w| w[0] == "-o")
        .map(|w| w[1].clone())
        .unwrap_or_else(|| "bdl.pdf".to_string());

    let note: NoteInput = match serde_json::from_str(&input) {
        Ok(note) => note,
        Err(e) => {
            eprintln!("✗ Failed to parse note: {}", e);
            std::process::exit(1);
        }
    };

    let validated_at = note.validated_at.unwrap_or_else(Utc::now);
    let document = NoteDocument {
        bdl_number: note.bdl_number,
        client_name: note.client_name,
        client_email: note.client_email,
        address: note.address,
        details: note.details,
        driver_name: note.driver_name.unwrap_or_else(|| UNKNOWN_DRIVER.to_string()),
        company_name: note
            .company_name
            .unwrap_or_else(|| DEFAULT_COMPANY_NAME.to_string()),
        validated_at_text: format_validated_at(validated_at),
        logo: note.logo.as_deref().and_then(decode_base64),
        signature: note.signature.as_deref().and_then(decode_base64),
    };

    let pdf_bytes = compose_note(&document);
    fs::write(&output_path, &pdf_bytes).expect("Failed to write PDF");
    eprintln!("✓ Written {} bytes to {}", pdf_bytes.len(), output_path);
}

/// Invalid base64 degrades like an undecodable image would: the document is
/// rendered without the asset.
fn decode_base64(input: &str) -> Option<Vec<u8>> {
    match base64::engine::general_purpose::STANDARD.decode(input) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            eprintln!("⚠ Ignoring undecodable image input: {}", e);
            None
        }
    }
}

fn example_note_json() -> &'static str {
    r#"{
  "bdl_number": "BDL-20250101-00001",
  "client_name": "Boulangerie Martin",
  "client_email": "contact@boulangerie-martin.fr",
  "address": "12 rue des Lilas, 75011 Paris",
  "details": "3 palettes de farine T65\n2 cartons de levure",
  "driver_name": "Karim B.",
  "company_name": "JOJA DISTRIBUTION",
  "validated_at": "2025-01-05T14:30:00Z"
}
"#
}
