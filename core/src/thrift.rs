//! Minimal binary-protocol framing: field headers, scalars, length-prefixed
//! binaries, and structural skipping of containers and nested structs.

use std::io::{self, BufRead, Read, Write};

/// Largest length prefix accepted for a single binary/string value.
pub const MAX_BINARY_LEN: usize = 256 * 1024 * 1024;
/// Largest element count accepted for a list, set or map.
pub const MAX_CONTAINER_LEN: usize = 64 * 1024 * 1024;
/// Nesting limit for structs and containers.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TType {
    Stop,
    Bool,
    Byte,
    Double,
    I16,
    I32,
    I64,
    Binary,
    Struct,
    Map,
    Set,
    List,
}

impl TType {
    pub fn code(self) -> u8 {
        match self {
            TType::Stop => 0,
            TType::Bool => 2,
            TType::Byte => 3,
            TType::Double => 4,
            TType::I16 => 6,
            TType::I32 => 8,
            TType::I64 => 10,
            TType::Binary => 11,
            TType::Struct => 12,
            TType::Map => 13,
            TType::Set => 14,
            TType::List => 15,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => TType::Stop,
            2 => TType::Bool,
            3 => TType::Byte,
            4 => TType::Double,
            6 => TType::I16,
            8 => TType::I32,
            10 => TType::I64,
            11 => TType::Binary,
            12 => TType::Struct,
            13 => TType::Map,
            14 => TType::Set,
            15 => TType::List,
            _ => return None,
        })
    }
}

/// Why a frame could not be read.
#[derive(Debug)]
pub enum FrameError {
    /// Input ended before the frame was complete.
    Eof,
    Corrupt(String),
    Io(io::Error),
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof { FrameError::Eof } else { FrameError::Io(err) }
    }
}

pub type FrameResult<T> = std::result::Result<T, FrameError>;

/// Forward-only reader that tracks its byte offset for diagnostics.
pub struct BinaryReader<R> {
    inner: R,
    offset: u64,
}

impl<R: BufRead> BinaryReader<R> {
    pub fn new(inner: R) -> Self { Self { inner, offset: 0 } }

    pub fn offset(&self) -> u64 { self.offset }

    /// True when no further byte is available. Does not consume input.
    pub fn at_eof(&mut self) -> io::Result<bool> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.is_empty()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn read_array<const N: usize>(&mut self) -> FrameResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        self.offset += N as u64;
        Ok(buf)
    }

    pub fn read_byte(&mut self) -> FrameResult<u8> { Ok(self.read_array::<1>()?[0]) }

    pub fn read_i16(&mut self) -> FrameResult<i16> { Ok(i16::from_be_bytes(self.read_array()?)) }

    pub fn read_i32(&mut self) -> FrameResult<i32> { Ok(i32::from_be_bytes(self.read_array()?)) }

    pub fn read_i64(&mut self) -> FrameResult<i64> { Ok(i64::from_be_bytes(self.read_array()?)) }

    pub fn read_double(&mut self) -> FrameResult<f64> { Ok(f64::from_be_bytes(self.read_array()?)) }

    fn read_len(&mut self, limit: usize, what: &str) -> FrameResult<usize> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(FrameError::Corrupt(format!("negative {what} length {len}")));
        }
        let len = len as usize;
        if len > limit {
            return Err(FrameError::Corrupt(format!("{what} length {len} exceeds limit {limit}")));
        }
        Ok(len)
    }

    pub fn read_binary(&mut self) -> FrameResult<Vec<u8>> {
        let len = self.read_len(MAX_BINARY_LEN, "binary")?;
        let mut buf = Vec::with_capacity(len.min(1 << 20));
        let got = (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        self.offset += got as u64;
        if got < len {
            return Err(FrameError::Eof);
        }
        Ok(buf)
    }

    /// Binary value decoded as UTF-8, invalid sequences replaced.
    pub fn read_string(&mut self) -> FrameResult<String> {
        let bytes = self.read_binary()?;
        Ok(match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    fn read_type(&mut self) -> FrameResult<TType> {
        let code = self.read_byte()?;
        TType::from_code(code).ok_or_else(|| FrameError::Corrupt(format!("invalid type code {code}")))
    }

    /// Next field header of the current struct, or `None` at its stop marker.
    pub fn read_field_header(&mut self) -> FrameResult<Option<(TType, i16)>> {
        match self.read_type()? {
            TType::Stop => Ok(None),
            ttype => Ok(Some((ttype, self.read_i16()?))),
        }
    }

    /// Consume one value of `ttype` without materializing it.
    pub fn skip(&mut self, ttype: TType, depth: usize) -> FrameResult<()> {
        if depth > MAX_DEPTH {
            return Err(FrameError::Corrupt(format!("nesting deeper than {MAX_DEPTH}")));
        }
        match ttype {
            TType::Stop => return Err(FrameError::Corrupt("unexpected stop marker".into())),
            TType::Bool | TType::Byte => { self.read_byte()?; }
            TType::I16 => { self.read_i16()?; }
            TType::I32 => { self.read_i32()?; }
            TType::Double | TType::I64 => { self.read_i64()?; }
            TType::Binary => { self.read_binary()?; }
            TType::Struct => {
                while let Some((field_type, _)) = self.read_field_header()? {
                    self.skip(field_type, depth + 1)?;
                }
            }
            TType::Map => {
                let key = self.read_type()?;
                let value = self.read_type()?;
                let len = self.read_len(MAX_CONTAINER_LEN, "map")?;
                for _ in 0..len {
                    self.skip(key, depth + 1)?;
                    self.skip(value, depth + 1)?;
                }
            }
            TType::Set | TType::List => {
                let elem = self.read_type()?;
                let len = self.read_len(MAX_CONTAINER_LEN, "list")?;
                for _ in 0..len {
                    self.skip(elem, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

/// Writer for the same framing.
pub struct BinaryWriter<W> {
    inner: W,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W) -> Self { Self { inner } }

    pub fn into_inner(self) -> W { self.inner }

    pub fn field_header(&mut self, ttype: TType, id: i16) -> io::Result<()> {
        self.inner.write_all(&[ttype.code()])?;
        self.inner.write_all(&id.to_be_bytes())
    }

    pub fn stop(&mut self) -> io::Result<()> { self.inner.write_all(&[TType::Stop.code()]) }

    pub fn i32(&mut self, v: i32) -> io::Result<()> { self.inner.write_all(&v.to_be_bytes()) }

    pub fn double(&mut self, v: f64) -> io::Result<()> { self.inner.write_all(&v.to_be_bytes()) }

    pub fn binary(&mut self, bytes: &[u8]) -> io::Result<()> {
        let len = i32::try_from(bytes.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "binary value too large"))?;
        self.i32(len)?;
        self.inner.write_all(bytes)
    }

    pub fn map_header(&mut self, key: TType, value: TType, len: i32) -> io::Result<()> {
        self.inner.write_all(&[key.code(), value.code()])?;
        self.i32(len)
    }

    pub fn list_header(&mut self, elem: TType, len: i32) -> io::Result<()> {
        self.inner.write_all(&[elem.code()])?;
        self.i32(len)
    }
}
