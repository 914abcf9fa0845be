//! Seekable, short-read-tolerant byte-stream reader (spec.md §4.1, C1).
//!
//! Every multi-byte primitive is little-endian, matching the ChituBox family
//! of formats. Reads loop until the requested count is satisfied or EOF;
//! an EOF before `n` bytes is a format error, never a panic.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A random-access file reader with bounded buffered reads.
pub struct ByteReader {
    file: File,
    path: PathBuf,
    len: u64,
}

impl ByteReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Error::IoAt {
            path: path.clone(),
            source,
        })?;
        let len = file.metadata().map_err(|source| Error::IoAt {
            path: path.clone(),
            source,
        })?.len();
        Ok(Self { file, path, len })
    }

    /// Total file length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seeks to an absolute byte offset.
    pub fn seek(&mut self, absolute: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(absolute))
            .map_err(|source| Error::IoAt {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }

    /// Reads exactly `n` bytes from the current position, looping over short
    /// reads. An EOF before `n` bytes is a format error.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            let read = self
                .file
                .read(&mut buf[filled..])
                .map_err(|source| Error::IoAt {
                    path: self.path.clone(),
                    source,
                })?;
            if read == 0 {
                return Err(Error::UnexpectedEof(
                    self.file.stream_position().unwrap_or(0),
                    n - filled,
                ));
            }
            filled += read;
        }
        Ok(buf)
    }

    /// Reads exactly `n` bytes starting at `offset`, restoring no particular
    /// position afterwards (callers always seek before the next read).
    pub fn read_at(&mut self, offset: u64, n: usize) -> Result<Vec<u8>> {
        self.seek(offset)?;
        self.read_exact(n)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_exact(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_exact(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_exact(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn close(self) {
        drop(self);
    }
}

/// Little-endian primitive readers over an in-memory byte slice, used for
/// parsing buffers already pulled off the file (layer tables, decrypted
/// settings blocks, preview headers).
pub struct SliceCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(Error::UnexpectedEof(self.pos as u64, n));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_primitives_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x78, 0x56, 0x34, 0x12]).unwrap();
        file.flush().unwrap();

        let mut reader = ByteReader::open(file.path()).unwrap();
        assert_eq!(reader.read_u32().unwrap(), 0x1234_5678);
    }

    #[test]
    fn short_file_is_eof_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x01, 0x02]).unwrap();
        file.flush().unwrap();

        let mut reader = ByteReader::open(file.path()).unwrap();
        assert!(reader.read_u32().is_err());
    }

    #[test]
    fn slice_cursor_reads_le() {
        let data = [0x01, 0x00, 0x00, 0x00, 0xAD, 0xDE];
        let mut cur = SliceCursor::new(&data);
        assert_eq!(cur.u32().unwrap(), 1);
        assert_eq!(cur.u16().unwrap(), 0xDEAD);
    }

    #[test]
    fn slice_cursor_eof() {
        let data = [0x01, 0x02];
        let mut cur = SliceCursor::new(&data);
        assert!(cur.u32().is_err());
    }
}
