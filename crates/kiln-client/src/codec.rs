//! Newline-delimited JSON framing

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Write one frame and flush it.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut payload = serde_json::to_vec(message)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await
}

/// Upper bound on one encoded frame, newline included
///
/// Must hold a build request carrying the largest accepted Dockerfile
/// after JSON escaping.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Reads frames until the peer closes its write half.
pub struct FrameReader<R> {
    reader: R,
    limit: usize,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_FRAME_LEN)
    }

    pub fn with_limit(reader: R, limit: usize) -> Self {
        Self {
            reader,
            limit,
            buf: Vec::new(),
        }
    }

    /// `Ok(None)` on a clean end of stream. Blank lines are skipped.
    ///
    /// A line longer than the limit is an `InvalidData` error; the rest of
    /// it is never buffered.
    pub async fn next<T: DeserializeOwned>(&mut self) -> std::io::Result<Option<T>> {
        loop {
            self.buf.clear();
            let read = (&mut self.reader)
                .take(self.limit as u64)
                .read_until(b'\n', &mut self.buf)
                .await?;
            if read == 0 {
                return Ok(None);
            }
            if read == self.limit && self.buf.last() != Some(&b'\n') {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("frame exceeds {} bytes", self.limit),
                ));
            }

            let line = self.buf.trim_ascii();
            if line.is_empty() {
                continue;
            }
            return serde_json::from_slice(line)
                .map(Some)
                .map_err(std::io::Error::from);
        }
    }
}
