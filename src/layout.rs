//! Human-readable description of a built fixture.

use memchr::memmem;

use crate::fixture::{Fixture, MARKERS};

const PREVIEW_LEN: usize = 16;

/// Where a marker landed in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerHit<'a> {
    pub marker: &'a [u8],
    pub offset: Option<usize>,
}

// Converts a slice of bytes to a formatted hex dump
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}

fn preview(bytes: &[u8]) -> String {
    if bytes.len() > PREVIEW_LEN {
        format!("{} ..", bytes_to_hex(&bytes[..PREVIEW_LEN]))
    } else {
        bytes_to_hex(bytes)
    }
}

/// First occurrence of each marker in `haystack`.
pub fn locate_markers<'a>(haystack: &[u8], markers: &[&'a [u8]]) -> Vec<MarkerHit<'a>> {
    markers
        .iter()
        .map(|&marker| MarkerHit {
            marker,
            offset: memmem::find(haystack, marker),
        })
        .collect()
}

/// Table of sections and marker offsets, one entry per line.
pub fn render(fixture: &Fixture) -> String {
    let mut out = String::new();
    out.push_str(&format!("Fixture: {} bytes\n", fixture.len()));

    for section in fixture.sections() {
        let bytes = &fixture.bytes()[section.range.clone()];
        out.push_str(&format!(
            "  0x{:04X} {:<10} {:>4} bytes  {}\n",
            section.range.start,
            section.name,
            bytes.len(),
            preview(bytes)
        ));
    }

    for hit in locate_markers(fixture.bytes(), MARKERS) {
        let text = String::from_utf8_lossy(hit.marker);
        let label = if text.len() > 24 {
            format!("{}.. ({} chars)", &text[..24], text.len())
        } else {
            text.into_owned()
        };
        match hit.offset {
            Some(offset) => out.push_str(&format!("  0x{:04X} marker '{}'\n", offset, label)),
            None => out.push_str(&format!("  ------ marker '{}' missing\n", label)),
        }
    }

    out
}
