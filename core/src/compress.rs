use crate::error::Result;
use std::fmt;
use std::io::{BufRead, BufReader, Cursor, Read};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const BZIP2_MAGIC: &[u8] = b"BZh";
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
/// XZ stream header: magic, two flag bytes, CRC32 of the flags.
const XZ_HEADER_LEN: usize = 12;
const PEEK_LEN: usize = XZ_HEADER_LEN;
const READ_BUFFER: usize = 64 * 1024;

/// Wrapper format recognized on an input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Zstd,
    Xz,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Zstd => "zstd",
            Compression::Xz => "xz",
        };
        f.write_str(name)
    }
}

/// Signature-based detection over the common compressor formats.
fn detect_signature(head: &[u8]) -> Option<Compression> {
    if head.starts_with(GZIP_MAGIC) {
        return Some(Compression::Gzip);
    }
    if head.starts_with(BZIP2_MAGIC) && head.get(3).is_some_and(|b| (b'1'..=b'9').contains(b)) {
        return Some(Compression::Bzip2);
    }
    if head.starts_with(ZSTD_MAGIC) {
        return Some(Compression::Zstd);
    }
    None
}

/// XZ fallback: accept only a stream header whose flag bytes check out against their CRC32.
fn is_xz_stream(head: &[u8]) -> bool {
    if head.len() < XZ_HEADER_LEN || !head.starts_with(XZ_MAGIC) {
        return false;
    }
    let flags = &head[6..8];
    if flags[0] != 0 || flags[1] > 0x0f {
        return false;
    }
    let stored = u32::from_le_bytes([head[8], head[9], head[10], head[11]]);
    crc32fast::hash(flags) == stored
}

/// Peek the leading bytes of `raw` and return a decoded stream: signature detection
/// first, then the XZ fallback, then the original bytes untouched.
///
/// The peeked bytes are replayed in front of the remaining input, so whichever
/// decoder is chosen sees the stream from its first byte.
pub fn detect_and_wrap<R>(mut raw: R) -> Result<(Compression, Box<dyn BufRead + Send>)>
where
    R: Read + Send + 'static,
{
    let mut head = Vec::with_capacity(PEEK_LEN);
    (&mut raw).take(PEEK_LEN as u64).read_to_end(&mut head)?;
    let kind = detect_signature(&head).unwrap_or_else(|| {
        if is_xz_stream(&head) { Compression::Xz } else { Compression::None }
    });
    let replay = Cursor::new(head).chain(raw);

    let stream: Box<dyn BufRead + Send> = match kind {
        Compression::Gzip => Box::new(BufReader::with_capacity(
            READ_BUFFER,
            flate2::read::MultiGzDecoder::new(replay),
        )),
        Compression::Bzip2 => Box::new(BufReader::with_capacity(
            READ_BUFFER,
            bzip2::read::MultiBzDecoder::new(replay),
        )),
        Compression::Zstd => Box::new(BufReader::with_capacity(
            READ_BUFFER,
            zstd::stream::read::Decoder::new(replay)?,
        )),
        Compression::Xz => Box::new(BufReader::with_capacity(
            READ_BUFFER,
            xz2::read::XzDecoder::new_multi_decoder(replay),
        )),
        Compression::None => Box::new(BufReader::with_capacity(READ_BUFFER, replay)),
    };
    tracing::debug!(compression = %kind, "input stream wrapped");
    Ok((kind, stream))
}
