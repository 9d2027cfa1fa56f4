//! Bounds-checked little-endian cursor over the blob bytes.

use super::BlobError;

pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, offset: 0 }
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], BlobError> {
        let remaining = self.buf.len() - self.offset;
        if needed > remaining {
            return Err(BlobError::TruncatedBuffer {
                offset: self.offset,
                needed,
                remaining,
            });
        }
        let bytes = &self.buf[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(bytes)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, BlobError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, BlobError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// A `u32` count followed by that many `u32` values.
    pub(crate) fn read_u32_array(&mut self) -> Result<Vec<u32>, BlobError> {
        let count = self.read_u32()? as usize;
        // Check the whole array up front so a bogus count cannot allocate
        let remaining = self.buf.len() - self.offset;
        if count.saturating_mul(4) > remaining {
            return Err(BlobError::TruncatedBuffer {
                offset: self.offset,
                needed: count.saturating_mul(4),
                remaining,
            });
        }
        (0..count).map(|_| self.read_u32()).collect()
    }

    /// A `u32` size followed by that many opaque bytes.
    pub(crate) fn read_block(&mut self) -> Result<&'a [u8], BlobError> {
        let size = self.read_u32()? as usize;
        self.take(size)
    }

    /// Narrow string: `u16` length, `u16` byte count, then the bytes.
    pub(crate) fn read_narrow_string(&mut self) -> Result<String, BlobError> {
        let _length = self.read_u16()?;
        let byte_count = self.read_u16()? as usize;
        let bytes = self.take(byte_count)?;
        // Single-byte code page; Latin-1 keeps every byte representable
        Ok(bytes.iter().map(|&b| char::from(b)).collect())
    }

    /// Wide string: `u16` character count, then UTF-16LE code units.
    pub(crate) fn read_wide_string(&mut self) -> Result<String, BlobError> {
        let chars = self.read_u16()? as usize;
        let offset = self.offset;
        let bytes = self.take(chars * 2)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| BlobError::InvalidString { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_are_little_endian() {
        let mut reader = ByteReader::new(&[0x34, 0x12, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_short_read_reports_position() {
        let mut reader = ByteReader::new(&[1, 0, 0]);
        assert_eq!(reader.read_u16().unwrap(), 1);
        match reader.read_u32() {
            Err(BlobError::TruncatedBuffer {
                offset,
                needed,
                remaining,
            }) => {
                assert_eq!((offset, needed, remaining), (2, 4, 1));
            }
            other => panic!("expected TruncatedBuffer, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_array_count_is_truncation() {
        let mut reader = ByteReader::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0]);
        assert!(matches!(
            reader.read_u32_array(),
            Err(BlobError::TruncatedBuffer { .. })
        ));
    }

    #[test]
    fn test_strings() {
        let mut bytes = vec![4, 0, 3, 0, b'a', b'b', 0xE9];
        bytes.extend_from_slice(&[2, 0, b'h', 0, b'i', 0]);
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_narrow_string().unwrap(), "ab\u{e9}");
        assert_eq!(reader.read_wide_string().unwrap(), "hi");
    }

    #[test]
    fn test_unpaired_surrogate_is_invalid() {
        let mut reader = ByteReader::new(&[1, 0, 0x00, 0xD8]);
        assert!(matches!(
            reader.read_wide_string(),
            Err(BlobError::InvalidString { offset: 2 })
        ));
    }
}
