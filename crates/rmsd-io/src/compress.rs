//! Transparent gzip input
//!
//! Compressed input is recognized by its magic bytes, not by the file name.

use std::fs::File;
use std::io::{BufReader, Chain, Cursor, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::IoResult;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reader that transparently handles gzip compression
pub enum MaybeGzReader<R: Read> {
    /// Plain uncompressed reader
    Plain(R),
    /// Gzip-compressed reader
    Gzip(GzDecoder<R>),
}

impl<R: Read> Read for MaybeGzReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            MaybeGzReader::Plain(r) => r.read(buf),
            MaybeGzReader::Gzip(r) => r.read(buf),
        }
    }
}

impl<R: Read> MaybeGzReader<Chain<Cursor<Vec<u8>>, R>> {
    /// Peek at the first two bytes and wrap the reader in a decoder if they
    /// are the gzip magic. The peeked bytes are replayed to the consumer.
    pub fn sniff(mut reader: R) -> std::io::Result<Self> {
        let mut magic = Vec::with_capacity(GZIP_MAGIC.len());
        (&mut reader)
            .take(GZIP_MAGIC.len() as u64)
            .read_to_end(&mut magic)?;
        let gzip = magic == GZIP_MAGIC;
        let replayed = Cursor::new(magic).chain(reader);
        Ok(if gzip {
            MaybeGzReader::Gzip(GzDecoder::new(replayed))
        } else {
            MaybeGzReader::Plain(replayed)
        })
    }

    pub fn is_gzip(&self) -> bool {
        matches!(self, MaybeGzReader::Gzip(_))
    }
}

/// Open a file for reading, automatically detecting and handling gzip compression
pub fn open_file(path: &Path) -> IoResult<Box<dyn Read>> {
    let file = File::open(path)?;
    Ok(Box::new(MaybeGzReader::sniff(BufReader::new(file))?))
}
