//! Binary postings codec
//!
//! One block per term, laid out as:
//!
//! ```text
//! doc_count              varint
//! per doc:
//!   doc_id               varint length + UTF-8 bytes
//!   segment_mask         u32 LE
//!   corpus_doc_frequency varint
//!   field_count          varint
//!   per field:
//!     field_name         varint length + UTF-8 bytes
//!     tf                 varint
//!     field_length       varint
//! ```
//!
//! Varints are unsigned LEB128. Decoding is bounds-checked and never panics on
//! truncated or corrupt input.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::collections::BTreeMap;

use crate::error::CodecError;
use crate::types::{FieldOccurrence, Postings, TokenMetadata};

/// u64 needs at most 10 LEB128 bytes
pub const MAX_VARINT_BYTES: usize = 10;

// ============================================================================
// VARINT
// ============================================================================

/// Encode a varint to bytes
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

/// Decode a varint, returning (value, bytes_consumed)
pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize), CodecError> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in bytes.iter().take(MAX_VARINT_BYTES).enumerate() {
        // The 10th byte only has room for bit 63
        if i == MAX_VARINT_BYTES - 1 && byte > 0x01 {
            return Err(CodecError::VarintOverflow);
        }
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }

    if bytes.len() >= MAX_VARINT_BYTES {
        Err(CodecError::VarintOverflow)
    } else {
        Err(CodecError::UnexpectedEof { context: "varint" })
    }
}

fn encode_str(value: &str, buf: &mut Vec<u8>) {
    encode_varint(value.len() as u64, buf);
    buf.extend_from_slice(value.as_bytes());
}

// ============================================================================
// ENCODER
// ============================================================================

/// Append one term's postings block to `buf`
pub fn encode_postings(postings: &Postings, buf: &mut Vec<u8>) -> Result<(), CodecError> {
    encode_varint(postings.len() as u64, buf);

    for (doc_id, meta) in postings {
        encode_str(doc_id, buf);
        buf.write_u32::<LittleEndian>(meta.segment_mask)?;
        encode_varint(meta.corpus_doc_frequency as u64, buf);
        encode_varint(meta.field_occurrences.len() as u64, buf);

        for (field, occurrence) in &meta.field_occurrences {
            encode_str(field, buf);
            encode_varint(occurrence.tf as u64, buf);
            encode_varint(occurrence.field_length as u64, buf);
        }
    }

    Ok(())
}

// ============================================================================
// DECODER
// ============================================================================

/// Cursor over an encoded postings buffer
struct PostingsReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PostingsReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_varint(&mut self) -> Result<u64, CodecError> {
        let (value, consumed) = decode_varint(&self.buf[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    fn read_u32_varint(&mut self) -> Result<u32, CodecError> {
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| CodecError::LengthOutOfBounds {
            len: value,
            remaining: self.remaining(),
        })
    }

    fn read_usize_varint(&mut self) -> Result<usize, CodecError> {
        let value = self.read_varint()?;
        usize::try_from(value).map_err(|_| CodecError::LengthOutOfBounds {
            len: value,
            remaining: self.remaining(),
        })
    }

    /// Read a count and reject it if even one byte per entry can't fit
    fn read_count(&mut self) -> Result<usize, CodecError> {
        let count = self.read_varint()?;
        if count > self.remaining() as u64 {
            return Err(CodecError::LengthOutOfBounds {
                len: count,
                remaining: self.remaining(),
            });
        }
        Ok(count as usize)
    }

    fn read_u32_le(&mut self) -> Result<u32, CodecError> {
        if self.remaining() < 4 {
            return Err(CodecError::UnexpectedEof {
                context: "segment mask",
            });
        }
        let value = LittleEndian::read_u32(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(value)
    }

    fn read_str(&mut self, context: &'static str) -> Result<String, CodecError> {
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(CodecError::LengthOutOfBounds {
                len,
                remaining: self.remaining(),
            });
        }
        let end = self.pos + len as usize;
        let value = std::str::from_utf8(&self.buf[self.pos..end])
            .map_err(|_| CodecError::InvalidUtf8 { context })?
            .to_string();
        self.pos = end;
        Ok(value)
    }
}

/// Decode one postings block from the start of `buf`.
///
/// Returns the postings and the number of bytes consumed. Trailing bytes
/// (the next term's block) are left untouched.
pub fn decode_postings(buf: &[u8]) -> Result<(Postings, usize), CodecError> {
    let mut reader = PostingsReader::new(buf);
    let doc_count = reader.read_count()?;
    let mut postings = Postings::new();

    for _ in 0..doc_count {
        let doc_id = reader.read_str("doc id")?;
        let segment_mask = reader.read_u32_le()?;
        let corpus_doc_frequency = reader.read_usize_varint()?;
        let field_count = reader.read_count()?;

        let mut field_occurrences = BTreeMap::new();
        for _ in 0..field_count {
            let field = reader.read_str("field name")?;
            let tf = reader.read_u32_varint()?;
            let field_length = reader.read_u32_varint()?;
            field_occurrences.insert(field, FieldOccurrence { tf, field_length });
        }

        postings.insert(
            doc_id,
            TokenMetadata {
                field_occurrences,
                segment_mask,
                corpus_doc_frequency,
            },
        );
    }

    Ok((postings, reader.pos))
}

// ============================================================================
// Tests
// ============================================================================
