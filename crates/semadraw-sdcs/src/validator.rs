//! Stream validation.
//!
//! [`validate`] is total over arbitrary bytes: it terminates, never reads
//! past the buffer, allocates nothing proportional to claimed lengths, and
//! reports the byte offset of the first defect. Execution-side code
//! (renderer, daemon) runs only on streams this function accepted, which is
//! what lets the hot path skip redundant bounds checks.
//!
//! Validation order per region is cheapest-first: size, magic, version,
//! then structure. Reserved flag bits are ignored.

use zerocopy::FromBytes;

use crate::{
    CHUNK_CMDS, Opcode, STREAM_FLAG_TOLERATE_UNKNOWN_OPCODES, ValidateError, ValidateErrorKind,
    headers::{self, ChunkHeader, CmdHeader, StreamHeader},
    pad8,
};

/// What a successful validation observed. Advisory; useful for dump tools
/// and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Chunks walked, executable or not.
    pub chunks: u32,
    /// `CMDS` chunks walked.
    pub command_chunks: u32,
    /// Command records walked across all `CMDS` chunks.
    pub commands: u64,
    /// Stream-level flags from the header.
    pub flags: u32,
}

fn err(kind: ValidateErrorKind, offset: u64, detail: impl Into<String>) -> ValidateError {
    ValidateError::new(kind, offset, detail)
}

/// Validate an SDCS stream.
///
/// # Errors
///
/// A [`ValidateError`] naming the defect kind and the byte offset at which
/// it was detected. The first defect wins; nothing after it is inspected.
pub fn validate(bytes: &[u8]) -> Result<StreamSummary, ValidateError> {
    let header = parse_stream_header(bytes)?;
    let tolerate = header.flags.get() & STREAM_FLAG_TOLERATE_UNKNOWN_OPCODES != 0;

    let mut pos = header.header_size.get() as usize;
    let mut chunks: u32 = 0;
    let mut command_chunks: u32 = 0;
    let mut commands: u64 = 0;

    while pos < bytes.len() {
        let remaining = bytes.len() - pos;
        if remaining < ChunkHeader::SIZE {
            return Err(err(
                ValidateErrorKind::TruncatedChunkHeader,
                pos as u64,
                format!("{remaining} bytes left, chunk header needs {}", ChunkHeader::SIZE),
            ));
        }

        // INVARIANT: remaining >= ChunkHeader::SIZE, so the prefix cast
        // cannot fail.
        #[allow(clippy::expect_used)]
        let chunk = ChunkHeader::ref_from_prefix(&bytes[pos..])
            .expect("invariant: chunk header bounds checked above")
            .0;

        if chunk.offset.get() != pos as u64 {
            return Err(err(
                ValidateErrorKind::ChunkExceedsFile,
                pos as u64,
                format!("chunk declares offset {}, found at {pos}", chunk.offset.get()),
            ));
        }

        let payload = chunk.payload_bytes.get();
        let expected_total = (ChunkHeader::SIZE as u64)
            .checked_add(payload)
            .map(|n| n + pad8(n as usize) as u64)
            .ok_or_else(|| {
                err(ValidateErrorKind::ChunkExceedsFile, pos as u64, "chunk size overflows")
            })?;
        if chunk.total_bytes.get() != expected_total {
            return Err(err(
                ValidateErrorKind::ChunkExceedsFile,
                pos as u64,
                format!(
                    "chunk total {} != header + payload + padding ({expected_total})",
                    chunk.total_bytes.get()
                ),
            ));
        }
        if expected_total > remaining as u64 {
            return Err(err(
                ValidateErrorKind::ChunkExceedsFile,
                pos as u64,
                format!("chunk of {expected_total} bytes exceeds {remaining} remaining"),
            ));
        }

        if chunk.kind == CHUNK_CMDS {
            let body_start = pos + ChunkHeader::SIZE;
            let body = &bytes[body_start..body_start + payload as usize];
            let walked = walk_commands(body, body_start as u64, tolerate)?;
            commands += walked.commands;
            if !walked.end_seen {
                return Err(err(
                    ValidateErrorKind::MissingEnd,
                    (body_start + body.len()) as u64,
                    "CMDS chunk has no END opcode",
                ));
            }
            command_chunks += 1;
        } else {
            tracing::trace!(kind = ?chunk.kind, offset = pos, "skipping non-CMDS chunk");
        }

        pos += expected_total as usize;
        chunks += 1;
    }

    if command_chunks == 0 {
        return Err(err(
            ValidateErrorKind::MissingEnd,
            bytes.len() as u64,
            "stream has no CMDS chunk, so no END was observed",
        ));
    }

    Ok(StreamSummary { chunks, command_chunks, commands, flags: header.flags.get() })
}

fn parse_stream_header(bytes: &[u8]) -> Result<&StreamHeader, ValidateError> {
    let Ok((header, _)) = StreamHeader::ref_from_prefix(bytes) else {
        return Err(err(
            ValidateErrorKind::TruncatedHeader,
            0,
            format!("{} bytes, stream header needs {}", bytes.len(), StreamHeader::SIZE),
        ));
    };

    if header.magic != headers::MAGIC {
        return Err(err(ValidateErrorKind::BadMagic, 0, "magic prefix is not SDCS"));
    }
    if header.version_major.get() != headers::VERSION_MAJOR {
        return Err(err(
            ValidateErrorKind::VersionUnsupported,
            4,
            format!("major version {} != {}", header.version_major.get(), headers::VERSION_MAJOR),
        ));
    }
    if header.version_minor.get() > headers::VERSION_MINOR {
        return Err(err(
            ValidateErrorKind::VersionUnsupported,
            6,
            format!("minor version {} > supported {}", header.version_minor.get(), headers::VERSION_MINOR),
        ));
    }

    let declared = header.header_size.get() as u64;
    if declared < StreamHeader::SIZE as u64 || declared % 8 != 0 || declared > bytes.len() as u64 {
        return Err(err(
            ValidateErrorKind::TruncatedHeader,
            8,
            format!("declared header size {declared} is invalid"),
        ));
    }
    if header.total_size.get() != bytes.len() as u64 {
        return Err(err(
            ValidateErrorKind::TruncatedHeader,
            16,
            format!("declared total size {} != stream length {}", header.total_size.get(), bytes.len()),
        ));
    }

    Ok(header)
}

struct WalkedChunk {
    commands: u64,
    end_seen: bool,
}

/// Walk the command records of one `CMDS` payload. `base` is the absolute
/// offset of the payload, used only for error reporting.
fn walk_commands(payload: &[u8], base: u64, tolerate: bool) -> Result<WalkedChunk, ValidateError> {
    let mut rel = 0usize;
    let mut commands: u64 = 0;
    let mut end_seen = false;

    while rel < payload.len() {
        let abs = base + rel as u64;
        let remaining = payload.len() - rel;
        if remaining < CmdHeader::SIZE {
            return Err(err(
                ValidateErrorKind::TruncatedCommandHeader,
                abs,
                format!("{remaining} bytes left, command header needs {}", CmdHeader::SIZE),
            ));
        }

        // INVARIANT: remaining >= CmdHeader::SIZE.
        #[allow(clippy::expect_used)]
        let cmd = CmdHeader::ref_from_prefix(&payload[rel..])
            .expect("invariant: command header bounds checked above")
            .0;

        let size = cmd.payload_bytes.get() as usize;
        if size > remaining - CmdHeader::SIZE {
            return Err(err(
                ValidateErrorKind::PayloadExceedsChunk,
                abs,
                format!("payload of {size} bytes exceeds {} remaining in chunk", remaining - CmdHeader::SIZE),
            ));
        }
        let record = CmdHeader::SIZE + size;
        let padded = record + pad8(record);
        if padded > remaining {
            return Err(err(
                ValidateErrorKind::PayloadExceedsChunk,
                abs,
                format!("record padding to {padded} bytes exceeds {remaining} remaining"),
            ));
        }

        let body = &payload[rel + CmdHeader::SIZE..rel + record];
        match Opcode::from_u16(cmd.opcode.get()) {
            None => {
                if !tolerate {
                    return Err(err(
                        ValidateErrorKind::UnknownOpcode,
                        abs,
                        format!("opcode {:#06x}", cmd.opcode.get()),
                    ));
                }
                tracing::trace!(opcode = cmd.opcode.get(), offset = abs, "skipping unknown opcode");
            },
            Some(op) => {
                if let Some(fixed) = op.fixed_payload_size() {
                    if size != fixed {
                        return Err(err(
                            ValidateErrorKind::BadPayloadSize,
                            abs,
                            format!("{op:?} payload is {size} bytes, layout needs {fixed}"),
                        ));
                    }
                }
                check_payload(op, body, abs + CmdHeader::SIZE as u64)?;
                if op == Opcode::End {
                    end_seen = true;
                }
            },
        }

        commands += 1;
        rel += padded;
    }

    Ok(WalkedChunk { commands, end_seen })
}

fn u32_at(body: &[u8], rel: usize) -> Option<u32> {
    body.get(rel..rel + 4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn f32_at(body: &[u8], rel: usize) -> Option<f32> {
    body.get(rel..rel + 4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Check that the float at `rel` is finite. Negative zero is tolerated.
fn finite(body: &[u8], rel: usize, base: u64, slot: &'static str) -> Result<(), ValidateError> {
    let value = f32_at(body, rel).ok_or_else(|| {
        err(ValidateErrorKind::BadPayloadSize, base + rel as u64, format!("{slot} slot truncated"))
    })?;
    if value.is_finite() {
        Ok(())
    } else {
        Err(err(ValidateErrorKind::NonFiniteScalar, base + rel as u64, format!("{slot} is {value}")))
    }
}

fn finite_run(body: &[u8], start: usize, count: usize, base: u64, slot: &'static str) -> Result<(), ValidateError> {
    for i in 0..count {
        finite(body, start + i * 4, base, slot)?;
    }
    Ok(())
}

fn enum_range(body: &[u8], max: u32, base: u64, what: &'static str) -> Result<(), ValidateError> {
    let raw = u32_at(body, 0).ok_or_else(|| {
        err(ValidateErrorKind::BadPayloadSize, base, format!("{what} slot truncated"))
    })?;
    if raw > max {
        return Err(err(
            ValidateErrorKind::BadPayloadSize,
            base,
            format!("{what} value {raw} out of range 0..={max}"),
        ));
    }
    Ok(())
}

/// Opcode-specific payload checks. `base` is the absolute offset of the
/// payload. Fixed sizes were checked by the caller; variable opcodes
/// reconcile their embedded length fields here.
fn check_payload(op: Opcode, body: &[u8], base: u64) -> Result<(), ValidateError> {
    match op {
        Opcode::Reset | Opcode::ResetTransform | Opcode::ClearClip | Opcode::End => Ok(()),

        Opcode::SetTransform2D => finite_run(body, 0, 6, base, "transform coefficient"),
        Opcode::SetMiterLimit => finite(body, 0, base, "miter limit"),
        Opcode::SetBlend => enum_range(body, 3, base, "blend mode"),
        Opcode::SetStrokeJoin => enum_range(body, 2, base, "stroke join"),
        Opcode::SetStrokeCap => enum_range(body, 2, base, "stroke cap"),
        Opcode::SetAntialias => enum_range(body, 1, base, "antialias flag"),

        Opcode::FillRect => finite_run(body, 0, 4, base, "rect coordinate"),
        Opcode::StrokeRect | Opcode::StrokeLine => finite_run(body, 0, 5, base, "stroke coordinate"),
        Opcode::StrokeQuadBezier => finite_run(body, 0, 7, base, "curve coordinate"),
        Opcode::StrokeCubicBezier => finite_run(body, 0, 9, base, "curve coordinate"),

        Opcode::SetClipRects => {
            let count = require_u32(body, 0, base, "clip rect count")?;
            let expected = 4u64 + u64::from(count) * 16;
            require_len(body, expected, base, "SetClipRects")?;
            finite_run(body, 4, count as usize * 4, base, "clip rect coordinate")
        },

        Opcode::StrokePath => {
            let count = require_u32(body, 0, base, "path point count")?;
            finite(body, 4, base, "stroke width")?;
            let expected = 12u64 + u64::from(count) * 8;
            require_len(body, expected, base, "StrokePath")?;
            finite_run(body, 12, count as usize * 2, base, "path coordinate")
        },

        Opcode::BlitImage => {
            finite(body, 0, base, "blit x")?;
            finite(body, 4, base, "blit y")?;
            let width = require_u32(body, 8, base, "image width")?;
            let height = require_u32(body, 12, base, "image height")?;
            let pixels = u64::from(width)
                .checked_mul(u64::from(height))
                .and_then(|n| n.checked_mul(4))
                .ok_or_else(|| {
                    err(ValidateErrorKind::BadPayloadSize, base, "image dimensions overflow")
                })?;
            require_len(body, 16 + pixels, base, "BlitImage")
        },

        Opcode::DrawGlyphRun => {
            finite(body, 0, base, "glyph run x")?;
            finite(body, 4, base, "glyph run y")?;
            let atlas_w = require_u32(body, 12, base, "atlas width")?;
            let atlas_h = require_u32(body, 16, base, "atlas height")?;
            let columns = require_u32(body, 20, base, "atlas columns")?;
            let cell_w = require_u32(body, 24, base, "cell width")?;
            let cell_h = require_u32(body, 28, base, "cell height")?;
            let glyph_count = require_u32(body, 32, base, "glyph count")?;

            let atlas = u64::from(atlas_w).checked_mul(u64::from(atlas_h)).ok_or_else(|| {
                err(ValidateErrorKind::BadPayloadSize, base, "atlas dimensions overflow")
            })?;
            let expected = 36u64
                .checked_add(atlas)
                .and_then(|n| n.checked_add(u64::from(glyph_count) * 12))
                .ok_or_else(|| {
                    err(ValidateErrorKind::BadPayloadSize, base, "glyph run size overflows")
                })?;
            require_len(body, expected, base, "DrawGlyphRun")?;

            if glyph_count > 0 && (columns == 0 || cell_w == 0 || cell_h == 0) {
                return Err(err(
                    ValidateErrorKind::BadPayloadSize,
                    base + 20,
                    "degenerate atlas geometry with non-empty glyph list",
                ));
            }

            let glyphs_start = 36 + atlas as usize;
            for i in 0..glyph_count as usize {
                finite(body, glyphs_start + i * 12 + 4, base, "glyph x offset")?;
                finite(body, glyphs_start + i * 12 + 8, base, "glyph y offset")?;
            }
            Ok(())
        },
    }
}

fn require_u32(body: &[u8], rel: usize, base: u64, what: &'static str) -> Result<u32, ValidateError> {
    u32_at(body, rel).ok_or_else(|| {
        err(ValidateErrorKind::BadPayloadSize, base + rel as u64, format!("{what} slot truncated"))
    })
}

fn require_len(body: &[u8], expected: u64, base: u64, what: &'static str) -> Result<(), ValidateError> {
    if body.len() as u64 != expected {
        return Err(err(
            ValidateErrorKind::BadPayloadSize,
            base,
            format!("{what} payload is {} bytes, embedded lengths need {expected}", body.len()),
        ));
    }
    Ok(())
}
