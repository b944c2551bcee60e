// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Chunked 16-bit little-endian field reader/writer with a direct-write
//! fast path, generic over `Read`/`Write`/`Seek` so tests can substitute
//! an in-memory `Cursor`.

use crate::error::Result;
use std::io::{Read, Seek, SeekFrom, Write};

/// Reads whole fields of 16-bit little-endian samples from an underlying
/// stream, one field-sized chunk at a time.
pub struct BufferedFieldReader<R> {
    inner: R,
    field_width: u32,
    field_height: u32,
}

impl<R: Read + Seek> BufferedFieldReader<R> {
    #[must_use]
    pub fn new(inner: R, field_width: u32, field_height: u32) -> Self {
        Self { inner, field_width, field_height }
    }

    fn samples_per_field(&self) -> usize {
        (self.field_width as usize) * (self.field_height as usize)
    }

    /// Reads field number `index` (0-based) from the stream. Returns `Ok(None)`
    /// on a clean end-of-stream (no bytes read at all); a short read partway
    /// through a field is an I/O error.
    ///
    /// # Errors
    /// Returns `TbcError::Io` on seek or read failure, including short reads.
    pub fn read_field(&mut self, index: u64) -> Result<Option<Vec<u16>>> {
        let samples = self.samples_per_field();
        let byte_offset = index * (samples as u64) * 2;
        self.inner.seek(SeekFrom::Start(byte_offset))?;

        let mut raw = vec![0u8; samples * 2];
        let mut total_read = 0;
        loop {
            let n = self.inner.read(&mut raw[total_read..])?;
            if n == 0 {
                break;
            }
            total_read += n;
            if total_read == raw.len() {
                break;
            }
        }

        if total_read == 0 {
            return Ok(None);
        }
        if total_read != raw.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("short read: expected {} bytes, got {total_read}", raw.len()),
            )
            .into());
        }

        let mut out = Vec::with_capacity(samples);
        for chunk in raw.chunks_exact(2) {
            out.push(u16::from_le_bytes([chunk[0], chunk[1]]));
        }
        Ok(Some(out))
    }
}

/// Writes whole fields of 16-bit little-endian samples to an underlying
/// stream. `write_field_direct` bypasses the intermediate byte-buffer copy
/// when the caller already holds a fully materialized `&[u16]` field.
pub struct BufferedFieldWriter<W> {
    inner: W,
}

impl<W: Write> BufferedFieldWriter<W> {
    #[must_use]
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// # Errors
    /// Returns `TbcError::Io` on write failure.
    pub fn write_field(&mut self, samples: &[u16]) -> Result<()> {
        self.write_field_direct(samples)
    }

    /// Fast path: writes a field's samples directly without an intermediate
    /// owned buffer beyond the per-call little-endian byte scratch space.
    ///
    /// # Errors
    /// Returns `TbcError::Io` on write failure.
    pub fn write_field_direct(&mut self, samples: &[u16]) -> Result<()> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        self.inner.write_all(&bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn write_then_read_roundtrips() {
        let mut buf = Vec::new();
        {
            let mut writer = BufferedFieldWriter::new(&mut buf);
            writer.write_field(&[1, 2, 3, 4]).unwrap();
            writer.write_field(&[5, 6, 7, 8]).unwrap();
        }

        let mut reader = BufferedFieldReader::new(Cursor::new(buf), 2, 2);
        assert_eq!(reader.read_field(0).unwrap(), Some(vec![1, 2, 3, 4]));
        assert_eq!(reader.read_field(1).unwrap(), Some(vec![5, 6, 7, 8]));
        assert_eq!(reader.read_field(2).unwrap(), None);
    }

    #[test]
    fn short_read_is_an_error() {
        let data = vec![0u8; 6]; // 3 samples, but field wants 4
        let mut reader = BufferedFieldReader::new(Cursor::new(data), 2, 2);
        assert!(reader.read_field(0).is_err());
    }
}
