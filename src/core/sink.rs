//! Destination write sink for streamget
//!
//! Each successful exchange opens the destination with truncation, so bytes
//! from an earlier attempt never survive into the final file. An optional gzip
//! stage sits in front of the file. Concatenated gzip members are decoded in
//! sequence.

use std::io::Write;
use std::path::Path;

use flate2::write::MultiGzDecoder;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::core::error::{Error, Result};

/// Open destination file, optionally fed through a gzip decoder
pub struct WriteSink {
    file: File,
    decoder: Option<MultiGzDecoder<Vec<u8>>>,
    written: u64,
}

fn decode_error(err: std::io::Error) -> Error {
    Error::Transport(format!("Failed to decompress gzip body: {err}"))
}

impl WriteSink {
    /// Create or truncate `path` for writing
    pub async fn create(path: &Path, gunzip: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;

        Ok(Self {
            file,
            decoder: gunzip.then(|| MultiGzDecoder::new(Vec::new())),
            written: 0,
        })
    }

    /// Write one chunk as received from the wire
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        match self.decoder.as_mut() {
            Some(decoder) => {
                decoder.write_all(chunk).map_err(decode_error)?;
                let decoded = std::mem::take(decoder.get_mut());
                self.write_to_file(&decoded).await
            }
            None => self.write_to_file(chunk).await,
        }
    }

    async fn write_to_file(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.file.write_all(bytes).await?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Flush the bytes written so far without draining the decoder
    pub async fn close(mut self) -> Result<u64> {
        self.file.flush().await?;
        Ok(self.written)
    }

    /// Drain the decoder and flush everything to storage
    ///
    /// Returns the number of bytes written to the file.
    pub async fn finish(mut self) -> Result<u64> {
        if let Some(decoder) = self.decoder.take() {
            let remaining = decoder.finish().map_err(decode_error)?;
            self.write_to_file(&remaining).await?;
        }
        self.file.flush().await?;
        Ok(self.written)
    }
}
