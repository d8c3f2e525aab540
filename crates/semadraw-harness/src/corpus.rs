//! Malformed-stream corpus.
//!
//! Each entry pairs a byte string with the error kind the validator must
//! report for it. The integration tests assert every pairing; the fuzz
//! targets use the same bytes as seed corpus.

// Corpus construction uses constants; a failed expect is a harness bug.
#![allow(clippy::expect_used)]

use semadraw_sdcs::{StreamEncoder, ValidateErrorKind};

/// A malformed stream and the rejection it must produce.
#[derive(Debug, Clone)]
pub struct MalformedCase {
    /// What this case exercises.
    pub name: &'static str,
    /// The bytes.
    pub bytes: Vec<u8>,
    /// The expected error kind.
    pub expected: ValidateErrorKind,
}

fn base_stream() -> Vec<u8> {
    let mut enc = StreamEncoder::new();
    enc.fill_rect(1.0, 2.0, 3.0, 4.0, [10, 20, 30, 255]).expect("finite");
    enc.finish()
}

/// Fix up the header's declared total size after a truncation.
fn with_fixed_total(mut bytes: Vec<u8>) -> Vec<u8> {
    let total = bytes.len() as u64;
    bytes[16..24].copy_from_slice(&total.to_le_bytes());
    bytes
}

/// The full boundary-case corpus.
#[must_use]
pub fn malformed_cases() -> Vec<MalformedCase> {
    let base = base_stream();
    // Offsets into the single-CMDS-chunk layout the encoder produces.
    let chunk = 64;
    let first_cmd = chunk + 40;
    let first_payload = first_cmd + 8;

    let mut cases = Vec::new();

    cases.push(MalformedCase {
        name: "empty file",
        bytes: Vec::new(),
        expected: ValidateErrorKind::TruncatedHeader,
    });

    cases.push(MalformedCase {
        name: "truncated header",
        bytes: base[..32].to_vec(),
        expected: ValidateErrorKind::TruncatedHeader,
    });

    {
        let mut bytes = base.clone();
        bytes[0..4].copy_from_slice(b"NOPE");
        cases.push(MalformedCase {
            name: "bad magic",
            bytes,
            expected: ValidateErrorKind::BadMagic,
        });
    }

    {
        let mut bytes = base.clone();
        bytes[4..6].copy_from_slice(&9u16.to_le_bytes());
        cases.push(MalformedCase {
            name: "wrong major version",
            bytes,
            expected: ValidateErrorKind::VersionUnsupported,
        });
    }

    {
        let mut bytes = base.clone();
        bytes[6..8].copy_from_slice(&99u16.to_le_bytes());
        cases.push(MalformedCase {
            name: "newer minor version",
            bytes,
            expected: ValidateErrorKind::VersionUnsupported,
        });
    }

    cases.push(MalformedCase {
        name: "truncated chunk header",
        bytes: with_fixed_total(base[..chunk + 16].to_vec()),
        expected: ValidateErrorKind::TruncatedChunkHeader,
    });

    {
        // Inflate the chunk's payload claim past the file end.
        let mut bytes = base.clone();
        bytes[chunk + 24..chunk + 32].copy_from_slice(&4096u64.to_le_bytes());
        cases.push(MalformedCase {
            name: "chunk exceeds file",
            bytes,
            expected: ValidateErrorKind::ChunkExceedsFile,
        });
    }

    {
        // Redeclare the chunk payload as four bytes, ending mid
        // command header.
        let mut bytes = base[..first_cmd + 4].to_vec();
        let payload = (bytes.len() - first_cmd) as u64;
        let padded_total = 40 + payload + (8 - (40 + payload) % 8) % 8;
        bytes[chunk + 16..chunk + 24].copy_from_slice(&padded_total.to_le_bytes());
        bytes[chunk + 24..chunk + 32].copy_from_slice(&payload.to_le_bytes());
        bytes.resize(chunk + padded_total as usize, 0);
        cases.push(MalformedCase {
            name: "truncated command header",
            bytes: with_fixed_total(bytes),
            expected: ValidateErrorKind::TruncatedCommandHeader,
        });
    }

    {
        // Command payload claims more than its chunk holds.
        let mut bytes = base.clone();
        bytes[first_cmd + 4..first_cmd + 8].copy_from_slice(&1000u32.to_le_bytes());
        cases.push(MalformedCase {
            name: "payload exceeds chunk",
            bytes,
            expected: ValidateErrorKind::PayloadExceedsChunk,
        });
    }

    {
        let mut bytes = base.clone();
        bytes[first_cmd..first_cmd + 2].copy_from_slice(&0x0BADu16.to_le_bytes());
        cases.push(MalformedCase {
            name: "unknown opcode",
            bytes,
            expected: ValidateErrorKind::UnknownOpcode,
        });
    }

    {
        // FillRect payload off by one.
        let mut bytes = base.clone();
        bytes[first_cmd + 4..first_cmd + 8].copy_from_slice(&19u32.to_le_bytes());
        cases.push(MalformedCase {
            name: "payload size off by one",
            bytes,
            expected: ValidateErrorKind::BadPayloadSize,
        });
    }

    cases.push(MalformedCase {
        name: "missing end",
        bytes: {
            let mut enc = StreamEncoder::new();
            enc.fill_rect(0.0, 0.0, 1.0, 1.0, [1, 1, 1, 1]).expect("finite");
            enc.finish_without_end()
        },
        expected: ValidateErrorKind::MissingEnd,
    });

    cases.push(MalformedCase {
        name: "header only, no chunks",
        bytes: {
            let header = semadraw_sdcs::StreamHeader::new(64, 0, 0);
            zerocopy_bytes(&header)
        },
        expected: ValidateErrorKind::MissingEnd,
    });

    // A non-finite float in every scalar slot of FillRect.
    for slot in 0..4 {
        let mut bytes = base.clone();
        let at = first_payload + slot * 4;
        bytes[at..at + 4].copy_from_slice(&f32::NAN.to_le_bytes());
        cases.push(MalformedCase {
            name: "non-finite rect scalar",
            bytes,
            expected: ValidateErrorKind::NonFiniteScalar,
        });
    }

    cases
}

fn zerocopy_bytes(header: &semadraw_sdcs::StreamHeader) -> Vec<u8> {
    zerocopy::IntoBytes::as_bytes(header).to_vec()
}

/// Streams that must validate despite looking odd: unknown chunks,
/// multiple ENDs, empty clip lists, degenerate geometry.
#[must_use]
pub fn odd_but_valid() -> Vec<(&'static str, Vec<u8>)> {
    let mut cases = Vec::new();

    cases.push(("multiple ends", {
        let mut enc = StreamEncoder::new();
        enc.reset();
        enc.end();
        enc.reset();
        enc.finish()
    }));

    cases.push(("empty clip list", {
        let mut enc = StreamEncoder::new();
        enc.set_clip_rects(&[]).expect("finite");
        enc.fill_rect(0.0, 0.0, 4.0, 4.0, [1, 2, 3, 4]).expect("finite");
        enc.finish()
    }));

    cases.push(("degenerate geometry", {
        let mut enc = StreamEncoder::new();
        enc.fill_rect(0.0, 0.0, 0.0, 8.0, [255, 0, 0, 255]).expect("finite");
        enc.stroke_line(5.0, 5.0, 5.0, 5.0, 4.0, [255, 0, 0, 255]).expect("finite");
        enc.stroke_path(&[[1.0, 1.0]], 2.0, [255, 0, 0, 255]).expect("finite");
        enc.stroke_path(&[], 2.0, [255, 0, 0, 255]).expect("finite");
        enc.finish()
    }));

    cases.push(("negative zero scalars", {
        let mut enc = StreamEncoder::new();
        enc.fill_rect(-0.0, -0.0, 8.0, 8.0, [9, 9, 9, 9]).expect("finite");
        enc.finish()
    }));

    cases
}
