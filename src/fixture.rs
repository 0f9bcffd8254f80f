//! Fixture builder.
//!
//! Assembles a benign file carrying the strings and the load/call byte
//! idiom that `find_brickstorm.sh` looks for, then writes it to disk.

use std::fs::File;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::FixtureError;

pub const DEFAULT_FILENAME: &str = "brickstorm_testfile.elf";

pub const HEADER_LEN: usize = 64;

/// `\x7fELF`
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// ELFCLASS64, ELFDATA2LSB, EV_CURRENT
pub const ELF_IDENT: [u8; 3] = [0x02, 0x01, 0x01];

/// Order of the NIST P-256 group.
pub const P256_ORDER: &[u8] =
    b"115792089210356248762697446949407573529996955224135760342422259061068512044369";

/// Prime of the NIST P-256 field.
pub const P256_PRIME: &[u8] =
    b"115792089210356248762697446949407573530086143415290314195533631308867097853951";

const P256_PAIR: &[u8] = &P256_JOINED;

/// Strings the scanner requires. The last entry is the P-256 order and
/// prime back to back.
pub const MARKERS: &[&[u8]] = &[
    b"regex",
    b"mime",
    b"decompress",
    b"MIMEHeader",
    b"ResolveReference",
    P256_PAIR,
];

pub const MAX_GAP: usize = 5;
pub const DEFAULT_GAP: usize = 3;

const GAP_FILL: u8 = 0x90;

const P256_JOINED: [u8; P256_ORDER.len() + P256_PRIME.len()] = {
    let mut out = [0u8; P256_ORDER.len() + P256_PRIME.len()];
    let mut i = 0;
    while i < P256_ORDER.len() {
        out[i] = P256_ORDER[i];
        i += 1;
    }
    let mut j = 0;
    while j < P256_PRIME.len() {
        out[P256_ORDER.len() + j] = P256_PRIME[j];
        j += 1;
    }
    out
};

/// Fixed 64-byte preamble: magic, class/data/version, zero padding.
pub fn header_bytes() -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(&ELF_MAGIC);
    header[4..7].copy_from_slice(&ELF_IDENT);
    header
}

/// Byte idiom matching
/// `488b05........48890424e8........48b8................48890424(..){0,5}e8........eb..`.
///
/// Wildcard positions hold arbitrary stand-ins. `gap_len` is clamped to
/// [`MAX_GAP`].
pub fn signature_pattern(gap_len: usize) -> Vec<u8> {
    let gap_len = gap_len.min(MAX_GAP);
    let mut out = Vec::with_capacity(37 + gap_len);
    out.extend_from_slice(&[0x48, 0x8B, 0x05, 0x01, 0x02, 0x03, 0x04]); // mov rax, [rip+imm32]
    out.extend_from_slice(&[0x48, 0x89, 0x04, 0x24]); // mov [rsp], rax
    out.extend_from_slice(&[0xE8, 0x05, 0x06, 0x07, 0x08]); // call rel32
    // movabs rax, imm64
    out.extend_from_slice(&[0x48, 0xB8, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);
    out.extend_from_slice(&[0x48, 0x89, 0x04, 0x24]);
    out.extend(std::iter::repeat(GAP_FILL).take(gap_len));
    out.extend_from_slice(&[0xE8, 0x09, 0x0A, 0x0B, 0x0C]);
    out.extend_from_slice(&[0xEB, 0xFF]); // jmp rel8
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureOptions {
    /// Where to write.
    pub destination: PathBuf,
    /// Whether to prepend the 64-byte preamble.
    pub include_header: bool,
    /// Filler bytes between the second store and the final call.
    pub gap_len: usize,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        FixtureOptions {
            destination: PathBuf::from(DEFAULT_FILENAME),
            include_header: true,
            gap_len: DEFAULT_GAP,
        }
    }
}

impl FixtureOptions {
    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_header(mut self, include_header: bool) -> Self {
        self.include_header = include_header;
        self
    }

    pub fn with_gap(mut self, gap_len: usize) -> Self {
        self.gap_len = gap_len;
        self
    }
}

/// Named region of a built fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: &'static str,
    pub range: Range<usize>,
}

/// In-memory fixture content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    bytes: Vec<u8>,
    sections: Vec<Section>,
}

impl Fixture {
    pub fn build(options: &FixtureOptions) -> Self {
        let mut bytes = Vec::with_capacity(expected_len(options));
        let mut sections = Vec::with_capacity(3);

        if options.include_header {
            bytes.extend_from_slice(&header_bytes());
            sections.push(Section {
                name: "header",
                range: 0..bytes.len(),
            });
        }

        let start = bytes.len();
        bytes.extend_from_slice(&MARKERS.join(&b'\n'));
        bytes.push(b'\n');
        sections.push(Section {
            name: "markers",
            range: start..bytes.len(),
        });

        let start = bytes.len();
        bytes.extend_from_slice(&signature_pattern(options.gap_len));
        sections.push(Section {
            name: "signature",
            range: start..bytes.len(),
        });

        for section in &sections {
            debug!(
                "section {} at 0x{:X}, {} bytes",
                section.name,
                section.range.start,
                section.range.len()
            );
        }

        Fixture { bytes, sections }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Offset of the named section within the buffer.
    pub fn section_start(&self, name: &str) -> Option<usize> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.range.start)
    }

    pub fn section(&self, name: &str) -> Option<&[u8]> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| &self.bytes[s.range.clone()])
    }

    /// Creates or truncates `path` and writes the whole buffer. Missing
    /// parent directories are an error.
    pub fn write_to(&self, path: &Path) -> Result<(), FixtureError> {
        let mut file = File::create(path).map_err(|e| FixtureError::io(path, e))?;
        file.write_all(&self.bytes)
            .and_then(|_| file.flush())
            .map_err(|e| FixtureError::io(path, e))
    }
}

/// Size of the file [`build_fixture`] would write.
pub fn expected_len(options: &FixtureOptions) -> usize {
    let header = if options.include_header { HEADER_LEN } else { 0 };
    let markers: usize = MARKERS.iter().map(|m| m.len()).sum::<usize>() + MARKERS.len();
    header + markers + signature_pattern(options.gap_len).len()
}

/// Builds the fixture and writes it to `options.destination`.
pub fn build_fixture(options: &FixtureOptions) -> Result<Fixture, FixtureError> {
    let fixture = Fixture::build(options);
    fixture.write_to(&options.destination)?;
    info!(
        "wrote {} bytes to {}",
        fixture.len(),
        options.destination.display()
    );
    Ok(fixture)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = header_bytes();
        assert_eq!(&header[..4], b"\x7fELF");
        assert_eq!(&header[4..7], &[0x02, 0x01, 0x01]);
        assert!(header[7..].iter().all(|&b| b == 0));
    }

    #[test]
    fn p256_pair_is_adjacent() {
        let pair = MARKERS[MARKERS.len() - 1];
        assert_eq!(pair.len(), P256_ORDER.len() + P256_PRIME.len());
        assert!(pair.starts_with(P256_ORDER));
        assert!(pair.ends_with(P256_PRIME));
    }

    #[test]
    fn default_signature_is_forty_bytes() {
        let sig = signature_pattern(DEFAULT_GAP);
        assert_eq!(sig.len(), 40);
        assert_eq!(&sig[..3], &[0x48, 0x8B, 0x05]);
        assert_eq!(&sig[30..33], &[0x90, 0x90, 0x90]);
        assert_eq!(&sig[sig.len() - 2..], &[0xEB, 0xFF]);
    }

    #[test]
    fn gap_is_clamped() {
        assert_eq!(signature_pattern(0).len(), 37);
        assert_eq!(signature_pattern(42), signature_pattern(MAX_GAP));
    }

    #[test]
    fn build_matches_expected_len() {
        let opts = FixtureOptions::default();
        let fixture = Fixture::build(&opts);
        assert_eq!(fixture.len(), expected_len(&opts));

        let bare = FixtureOptions::default().with_header(false);
        assert_eq!(Fixture::build(&bare).len() + HEADER_LEN, fixture.len());
    }

    #[test]
    fn sections_cover_buffer() {
        let fixture = Fixture::build(&FixtureOptions::default());
        let names: Vec<_> = fixture.sections().iter().map(|s| s.name).collect();
        assert_eq!(names, ["header", "markers", "signature"]);
        assert_eq!(fixture.sections()[0].range.start, 0);
        for pair in fixture.sections().windows(2) {
            assert_eq!(pair[0].range.end, pair[1].range.start);
        }
        assert_eq!(fixture.sections()[2].range.end, fixture.len());
        assert_eq!(fixture.section("markers").unwrap().last(), Some(&b'\n'));
    }

    #[test]
    fn headerless_fixture_still_has_content() {
        let fixture = Fixture::build(&FixtureOptions::default().with_header(false).with_gap(0));
        assert!(!fixture.is_empty());
        assert_eq!(fixture.section_start("header"), None);
        assert_eq!(fixture.section_start("markers"), Some(0));
    }

    #[test]
    fn build_is_deterministic() {
        let opts = FixtureOptions::default();
        assert_eq!(Fixture::build(&opts), Fixture::build(&opts));
    }
}
