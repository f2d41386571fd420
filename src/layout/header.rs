// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! On-disk header and footer.
//!
//! The header is 80 bytes of fixed-size fields at exact, normative byte
//! offsets, parsed in a single read before anything else. It tells you
//! which node layout governs the file (`version`: 3 for Large, 4 for
//! Compact), where a hybrid promotion's cutover point sits
//! (`transition_offset`, null for a pure-layout file), where the root and
//! text live, and where the jump table bridging a Compact prefix to a
//! Large suffix starts and ends.
//!
//! The footer is 8 bytes: a CRC32 over everything before it, plus a magic
//! number marking a clean close. A missing or mismatched footer means the
//! write was interrupted — don't trust the data.
//!
//! `transition_offset` is the single source of truth for "which layout
//! governs offset X" on a hybrid file: `X < transition_offset` means
//! Compact, otherwise Large. A non-hybrid file has no cutover at all —
//! `version` alone says which layout governs every offset in it. No node
//! or array carries its own layout tag.

use std::io::{self, Read, Write};

use crc32fast::Hasher as Crc32Hasher;

use super::NULL;
use crate::error::{Result, SfxError};

/// Magic bytes: 8-byte fixed constant identifying this file format.
pub const MAGIC: [u8; 8] = *b"SFXTREE5";

/// Footer magic: "5XFS" (reversed, marks a clean, fully-flushed file).
pub const FOOTER_MAGIC: [u8; 4] = *b"5XFS";

/// Node layout version recorded in the header: Large offsets (`i64`).
pub const LAYOUT_VERSION_LARGE: i32 = 3;
/// Node layout version recorded in the header: Compact offsets (`u32`).
pub const LAYOUT_VERSION_COMPACT: i32 = 4;

/// Highest offset a Compact (u32, 4-byte) node field can address.
pub const COMPACT_MAX_OFFSET: u64 = u32::MAX as u64 - 1;

/// Null sentinel in Compact layout.
pub const COMPACT_NULL: u32 = 0xFFFF_FFFF;

/// Null sentinel in Large layout.
pub const LARGE_NULL: i64 = -1;

/// Fixed-size 80-byte file header. Field order and byte widths below match
/// the normative on-disk table exactly; see module docs for the byte
/// offsets.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    /// Node layout version: [`LAYOUT_VERSION_LARGE`] or
    /// [`LAYOUT_VERSION_COMPACT`]. For a hybrid file this names the layout
    /// the build *started* in, i.e. the one governing offsets below
    /// `transition_offset`.
    pub version: i32,
    /// Byte offset of the root node.
    pub root_offset: i64,
    /// Total bytes occupied by the tree payload (header, nodes, jump
    /// table, and text). Validated against the storage's actual logical
    /// size on load — optionally plus the trailing 8-byte footer.
    pub size: i64,
    /// Byte offset of the persisted text region.
    pub text_offset: i64,
    /// Number of UTF-16 code units in the persisted text.
    pub text_len: u32,
    /// Byte offset of the internal node with the greatest character depth,
    /// precomputed by the builder so `longest_repeated_substring` is O(1)
    /// on a freshly loaded tree instead of requiring a DFS. Equal to
    /// `root_offset` itself on a degenerate tree with no internal node
    /// besides the root.
    pub deepest_offset: i64,
    /// First byte offset governed by the Large layout on a hybrid file;
    /// the null sentinel on a file built entirely in one layout.
    pub transition_offset: i64,
    /// Byte offset where the jump table begins, or the null sentinel if
    /// no jump-table entries were needed (non-hybrid, or hybrid with no
    /// Compact array ever landing past the cutover).
    pub jump_table_start: i64,
    /// Byte offset one past the jump table's last entry, or the null
    /// sentinel alongside `jump_table_start`.
    pub jump_table_end: i64,
}

impl Header {
    pub const SIZE: usize = 80;

    /// `true` if `transition_offset`/`jump_table_start`/`jump_table_end`
    /// describe a real Compact-to-Large promotion rather than all-null.
    pub fn is_hybrid(&self) -> bool {
        self.transition_offset != NULL
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&[0u8; 4])?; // offset 12..16: padding
        w.write_all(&self.root_offset.to_le_bytes())?;
        w.write_all(&self.size.to_le_bytes())?;
        w.write_all(&self.text_offset.to_le_bytes())?;
        w.write_all(&self.text_len.to_le_bytes())?;
        w.write_all(&[0u8; 4])?; // offset 44..48: reserved
        w.write_all(&self.deepest_offset.to_le_bytes())?;
        w.write_all(&self.transition_offset.to_le_bytes())?;
        w.write_all(&self.jump_table_start.to_le_bytes())?;
        w.write_all(&self.jump_table_end.to_le_bytes())?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad magic: expected {MAGIC:?}, got {magic:?}"),
            ));
        }
        let mut buf = [0u8; Header::SIZE - 8];
        r.read_exact(&mut buf)?;
        Ok(Self {
            version: i32::from_le_bytes(buf[0..4].try_into().unwrap()),
            // buf[4..8] padding
            root_offset: i64::from_le_bytes(buf[8..16].try_into().unwrap()),
            size: i64::from_le_bytes(buf[16..24].try_into().unwrap()),
            text_offset: i64::from_le_bytes(buf[24..32].try_into().unwrap()),
            text_len: u32::from_le_bytes(buf[32..36].try_into().unwrap()),
            // buf[36..40] reserved
            deepest_offset: i64::from_le_bytes(buf[40..48].try_into().unwrap()),
            transition_offset: i64::from_le_bytes(buf[48..56].try_into().unwrap()),
            jump_table_start: i64::from_le_bytes(buf[56..64].try_into().unwrap()),
            jump_table_end: i64::from_le_bytes(buf[64..72].try_into().unwrap()),
        })
    }

    /// Validate internal consistency against the actual file/storage size.
    /// Named per the offending field, per the crate's "never return
    /// silently-wrong answers" error contract. `total_size` is the
    /// storage's current logical size, which may or may not include a
    /// trailing 8-byte footer.
    pub fn validate(&self, total_size: i64) -> Result<()> {
        if self.version != LAYOUT_VERSION_LARGE && self.version != LAYOUT_VERSION_COMPACT {
            return Err(SfxError::corruption(
                "version",
                format!(
                    "unsupported node layout version {} (expected {LAYOUT_VERSION_LARGE} or {LAYOUT_VERSION_COMPACT})",
                    self.version
                ),
            ));
        }
        if self.size < 0 || (self.size != total_size && self.size + Footer::SIZE as i64 != total_size) {
            return Err(SfxError::corruption(
                "size",
                format!("header size {} does not match storage size {total_size}", self.size),
            ));
        }
        if self.root_offset < 0 || self.root_offset >= self.size {
            return Err(SfxError::corruption(
                "root",
                format!("root offset {} outside the {} byte payload", self.root_offset, self.size),
            ));
        }
        if self.text_offset < 0 {
            return Err(SfxError::corruption("text", "negative text offset"));
        }
        let text_end = self
            .text_offset
            .checked_add(self.text_len as i64 * 2)
            .ok_or_else(|| SfxError::corruption("text", "offset+len overflowed"))?;
        if text_end > self.size {
            return Err(SfxError::corruption(
                "text",
                format!("text region end {text_end} exceeds payload size {}", self.size),
            ));
        }
        if self.deepest_offset < 0 || self.deepest_offset >= self.size {
            return Err(SfxError::corruption(
                "deepest",
                format!(
                    "deepest internal node at {} is outside the {} byte payload",
                    self.deepest_offset, self.size
                ),
            ));
        }
        if self.is_hybrid() {
            if self.transition_offset < 0 || self.transition_offset > self.size {
                return Err(SfxError::corruption(
                    "transition",
                    format!("transition offset {} outside the {} byte payload", self.transition_offset, self.size),
                ));
            }
            let jump_present = self.jump_table_start != NULL || self.jump_table_end != NULL;
            if jump_present {
                if self.jump_table_start < 0 || self.jump_table_end < self.jump_table_start {
                    return Err(SfxError::corruption("jump", "jump table end precedes start"));
                }
                if self.jump_table_end > self.size {
                    return Err(SfxError::corruption(
                        "jump",
                        format!("jump table end {} exceeds payload size {}", self.jump_table_end, self.size),
                    ));
                }
            }
        } else if self.jump_table_start != NULL || self.jump_table_end != NULL {
            return Err(SfxError::corruption(
                "jump",
                "jump table present without a hybrid transition offset",
            ));
        }
        Ok(())
    }
}

/// 8-byte footer: CRC32 over every byte before it, plus a magic marker.
#[derive(Debug, Clone, Copy)]
pub struct Footer {
    pub crc32: u32,
}

impl Footer {
    pub const SIZE: usize = 8;

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.crc32.to_le_bytes())?;
        w.write_all(&FOOTER_MAGIC)?;
        Ok(())
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(SfxError::corruption(
                "footer",
                "file too short to contain a footer",
            ));
        }
        let start = bytes.len() - Self::SIZE;
        let magic = &bytes[start + 4..];
        if magic != FOOTER_MAGIC {
            return Err(SfxError::corruption(
                "footer_magic",
                format!("expected {FOOTER_MAGIC:?}, got {magic:?} — file may be truncated"),
            ));
        }
        let crc32 = u32::from_le_bytes(bytes[start..start + 4].try_into().unwrap());
        Ok(Self { crc32 })
    }

    pub fn compute_crc32(data: &[u8]) -> u32 {
        let mut hasher = Crc32Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            version: LAYOUT_VERSION_COMPACT,
            root_offset: 0,
            size: 1012,
            text_offset: 1000,
            text_len: 6,
            deepest_offset: 28,
            transition_offset: NULL,
            jump_table_start: NULL,
            jump_table_end: NULL,
        }
    }

    #[test]
    fn header_roundtrips_through_bytes() {
        let h = sample_header();
        let mut buf = Vec::new();
        h.write(&mut buf).unwrap();
        assert_eq!(buf.len(), Header::SIZE);
        let back = Header::read(&mut &buf[..]).unwrap();
        assert_eq!(back.root_offset, h.root_offset);
        assert_eq!(back.transition_offset, h.transition_offset);
        assert_eq!(back.text_len, h.text_len);
        assert_eq!(back.deepest_offset, h.deepest_offset);
    }

    #[test]
    fn validate_accepts_a_well_formed_non_hybrid_header() {
        let h = sample_header();
        assert!(h.validate(h.size).is_ok());
        // Also accept total size including the optional trailing footer.
        assert!(h.validate(h.size + Footer::SIZE as i64).is_ok());
    }

    #[test]
    fn validate_rejects_size_mismatch() {
        let h = sample_header();
        assert!(matches!(
            h.validate(h.size + 3),
            Err(SfxError::Corruption { field: "size", .. })
        ));
    }

    #[test]
    fn validate_rejects_deepest_outside_payload() {
        let mut h = sample_header();
        h.deepest_offset = 5000;
        assert!(matches!(
            h.validate(h.size),
            Err(SfxError::Corruption { field: "deepest", .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_magic() {
        let mut buf = vec![0u8; Header::SIZE];
        buf[0..8].copy_from_slice(b"NOPENOPE");
        assert!(Header::read(&mut &buf[..]).is_err());
    }

    #[test]
    fn validate_rejects_root_outside_payload() {
        let mut h = sample_header();
        h.root_offset = 5000;
        assert!(matches!(
            h.validate(h.size),
            Err(SfxError::Corruption { field: "root", .. })
        ));
    }

    #[test]
    fn validate_rejects_jump_table_without_hybrid_transition() {
        let mut h = sample_header();
        h.jump_table_start = 10;
        h.jump_table_end = 50;
        assert!(matches!(
            h.validate(h.size),
            Err(SfxError::Corruption { field: "jump", .. })
        ));
    }

    #[test]
    fn validate_rejects_unsupported_version() {
        let mut h = sample_header();
        h.version = 5;
        assert!(matches!(
            h.validate(h.size),
            Err(SfxError::Corruption { field: "version", .. })
        ));
    }

    #[test]
    fn footer_roundtrips_and_detects_truncation() {
        let data = b"hello world";
        let crc = Footer::compute_crc32(data);
        let footer = Footer { crc32: crc };
        let mut buf = data.to_vec();
        footer.write(&mut buf).unwrap();
        let parsed = Footer::read(&buf).unwrap();
        assert_eq!(parsed.crc32, crc);

        let truncated = &buf[..buf.len() - 3];
        assert!(Footer::read(truncated).is_err());
    }
}
