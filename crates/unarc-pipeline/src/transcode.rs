//! On-the-fly gzip encoding of uploads selected by file extension.

use std::collections::BTreeSet;
use std::io;

use flate2::{Compress, Compression, Crc, FlushCompress, Status};

/// Bytes inspected when sniffing a content type.
pub const SNIFF_LEN: usize = 512;

const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff];
const MIN_OUTPUT_SPARE: usize = 4 * 1024;

/// Extensions whose files are gzip-encoded on upload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GzipPolicy {
    extensions: BTreeSet<String>,
}

impl GzipPolicy {
    /// Accepts extensions with or without the leading dot, in any case.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn applies(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.extensions.contains(&ext.to_ascii_lowercase())
            }
            _ => false,
        }
    }
}

/// Content type for a body starting with `head`.
pub fn sniff_content_type(head: &[u8]) -> &'static str {
    let head = &head[..head.len().min(SNIFF_LEN)];
    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }
    match std::str::from_utf8(head) {
        Ok(_) => "text/plain; charset=utf-8",
        // A multi-byte character cut off by the sniff window is still text.
        Err(e) if e.error_len().is_none() => "text/plain; charset=utf-8",
        Err(_) => "application/octet-stream",
    }
}

pub fn new_compressor() -> Compress {
    Compress::new(Compression::default(), false)
}

/// Streaming gzip framing around a raw deflate [`Compress`].
///
/// The compressor is borrowed so it can come from a pool; it is reset on
/// construction.
pub struct GzipEncoder<'a> {
    deflate: &'a mut Compress,
    crc: Crc,
    header_written: bool,
}

impl<'a> GzipEncoder<'a> {
    pub fn new(deflate: &'a mut Compress) -> Self {
        deflate.reset();
        Self {
            deflate,
            crc: Crc::new(),
            header_written: false,
        }
    }

    /// Compress `input`, appending whatever output is ready to `out`.
    pub fn encode(&mut self, mut input: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
        self.write_header(out);
        self.crc.update(input);

        while !input.is_empty() {
            out.reserve(MIN_OUTPUT_SPARE);
            let before = self.deflate.total_in();
            self.deflate
                .compress_vec(input, out, FlushCompress::None)
                .map_err(io::Error::other)?;
            let consumed = (self.deflate.total_in() - before) as usize;
            input = &input[consumed..];
        }
        Ok(())
    }

    /// Flush the deflate stream and append the gzip trailer.
    pub fn finish(mut self, out: &mut Vec<u8>) -> io::Result<()> {
        self.write_header(out);
        loop {
            out.reserve(MIN_OUTPUT_SPARE);
            let status = self
                .deflate
                .compress_vec(&[], out, FlushCompress::Finish)
                .map_err(io::Error::other)?;
            if status == Status::StreamEnd {
                break;
            }
        }
        out.extend_from_slice(&self.crc.sum().to_le_bytes());
        out.extend_from_slice(&self.crc.amount().to_le_bytes());
        Ok(())
    }

    fn write_header(&mut self, out: &mut Vec<u8>) {
        if !self.header_written {
            out.extend_from_slice(&GZIP_HEADER);
            self.header_written = true;
        }
    }
}
