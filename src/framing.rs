//! 4.F: the framed codec frontend. Wraps a compiled schema with the
//! preamble protocol — `<VLC size><VLC group id><payload>` — that turns a
//! single [`GroupValue`] encode/decode into a self-delimiting frame a
//! stream of frames can be read back out of.

use std::io::{self, Read, Write};

use crate::buffer::{InternalBuffer, LocalPool, SegmentPool};
use crate::compiler::Diagnostics;
use crate::config::CodecOptions;
use crate::dispatch::{self, CompiledSchema};
use crate::result::{DecodingError, EncodingError, Result, SchemaError};
use crate::schema::Schema;
use crate::value::GroupValue;

struct CountingReader<'r, R> {
    inner: &'r mut R,
    count: u64,
}

impl<'r, R: Read> Read for CountingReader<'r, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// A schema compiled once and reused across many encode/decode calls. The
/// pool backing the internal buffer lives here so successive encodes reuse
/// the same leased segments instead of allocating fresh ones.
pub struct Codec {
    dispatch: CompiledSchema,
    options: CodecOptions,
    pool: LocalPool,
}

impl Codec {
    pub fn compile(schema: Schema, options: CodecOptions) -> Result<(Self, Diagnostics), SchemaError> {
        let (dispatch, diagnostics) = CompiledSchema::compile(schema, &options)?;
        let pool = LocalPool::new(options.segment_size);
        Ok((
            Self {
                dispatch,
                options,
                pool,
            },
            diagnostics,
        ))
    }

    pub fn schema(&self) -> &Schema {
        self.dispatch.schema()
    }

    /// Encodes `value` as one framed message and writes it to `sink`.
    pub fn encode<W: Write>(&self, value: &GroupValue, mut sink: W) -> Result<()> {
        let instructions = self
            .dispatch
            .by_name(&value.type_name)
            .ok_or_else(|| EncodingError::UnknownGroupType(value.type_name.clone()))?
            .clone();
        let group_id = instructions
            .group_id
            .ok_or_else(|| EncodingError::UnknownGroupType(value.type_name.clone()))?;

        let width = self.options.frame_size_width.0 as usize;
        let mut buf = InternalBuffer::new(&self.pool as &dyn SegmentPool);
        let slot = buf.reserve(width + 1);
        let payload_start = buf.position();
        crate::primitives::vlc::encode_unsigned(&mut buf, group_id)?;
        dispatch::encode_group_fields(&self.dispatch, &instructions, value, &self.options, &mut buf)?;
        let payload_end = buf.position();
        let payload_len = (payload_end - payload_start) as u64;

        let max = if width >= 8 {
            u64::MAX
        } else {
            (1u64 << (8 * width as u32)) - 1
        };
        if payload_len > max {
            return Err(EncodingError::FrameTooLarge {
                size: payload_len as usize,
                width,
            }
            .into());
        }
        let mut size_bytes = Vec::with_capacity(width + 1);
        size_bytes.push(0xC0 | width as u8);
        size_bytes.extend_from_slice(&payload_len.to_le_bytes()[..width]);
        buf.overwrite(slot, &size_bytes);

        buf.copy_to(&mut sink, 0, payload_end)?;
        Ok(())
    }

    /// Reads one framed message from `source`. Returns `Ok(None)` when the
    /// stream ends cleanly between frames (an `Eof` on the very first byte,
    /// or an explicit zero-size terminator frame).
    pub fn decode<R: Read>(&self, mut source: R) -> Result<Option<GroupValue>> {
        let mut first = [0u8; 1];
        if source.read(&mut first)? == 0 {
            return Ok(None);
        }
        let size = {
            let mut chained = (&first[..]).chain(&mut source);
            match crate::primitives::vlc::decode_unsigned(&mut chained)? {
                None | Some(0) => return Ok(None),
                Some(size) => size,
            }
        };

        let mut counting = CountingReader {
            inner: &mut source,
            count: 0,
        };
        let group_id = crate::primitives::vlc::decode_unsigned(&mut counting)?
            .ok_or(DecodingError::Truncated)?;
        let instructions = self
            .dispatch
            .by_id(group_id)
            .ok_or(DecodingError::UnknownGroupId(group_id))?
            .clone();
        let value =
            dispatch::decode_group_fields(&self.dispatch, &instructions, &self.options, &mut counting)?;
        let used = counting.count;
        if used > size {
            return Err(DecodingError::FrameOverrun {
                group_id,
                declared: size as usize,
                used: used as usize,
            }
            .into());
        }
        if used < size {
            let residual = size - used;
            tracing::debug!(group_id, residual, "skipping unknown trailing bytes in frame");
            io::copy(&mut (&mut source).take(residual), &mut io::sink())?;
        }
        Ok(Some(value))
    }
}
