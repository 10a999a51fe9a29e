//! Byte streams handed to the scanning engine.
//!
//! A [`ValueStream`] wraps any async reader; property values are read lazily
//! and consumed exactly once by the engine.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::io::AsyncRead;
use pin_project_lite::pin_project;

/// A one-shot async stream over a property value.
pub struct ValueStream {
    reader: Box<dyn AsyncRead + Send + Unpin>,
    size_hint: Option<u64>,
}

impl std::fmt::Debug for ValueStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStream")
            .field("size_hint", &self.size_hint)
            .finish_non_exhaustive()
    }
}

impl ValueStream {
    /// Creates a stream over in-memory bytes.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self {
            reader: Box::new(BytesReader::new(data)),
            size_hint: Some(size),
        }
    }

    /// Creates a stream over UTF-8 encoded text.
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes().to_vec())
    }

    /// Creates a stream from an async reader.
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            size_hint: None,
        }
    }

    /// Sets the size hint.
    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    /// Returns the expected number of bytes, if known.
    pub fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }
}

impl AsyncRead for ValueStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

pin_project! {
    /// A wrapper that allows reading bytes as an async stream.
    pub struct BytesReader {
        data: Vec<u8>,
        position: usize,
    }
}

impl BytesReader {
    /// Creates a new `BytesReader` from the given bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }
}

impl AsyncRead for BytesReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.project();
        let remaining = &this.data[*this.position..];
        let to_copy = std::cmp::min(buf.len(), remaining.len());
        buf[..to_copy].copy_from_slice(&remaining[..to_copy]);
        *this.position += to_copy;
        Poll::Ready(Ok(to_copy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::AsyncReadExt;

    #[tokio::test]
    async fn test_bytes_stream_reads_everything() {
        let mut stream = ValueStream::from_bytes(vec![1u8, 2, 3, 4]);
        assert_eq!(stream.size_hint(), Some(4));

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_text_stream_is_utf8() {
        let mut stream = ValueStream::from_text("grüß");
        assert_eq!(stream.size_hint(), Some(6));

        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "grüß");
    }

    #[tokio::test]
    async fn test_reader_stream_has_no_hint() {
        let stream = ValueStream::from_reader(BytesReader::new(b"abc".to_vec()));
        assert_eq!(stream.size_hint(), None);
        assert_eq!(stream.with_size_hint(3).size_hint(), Some(3));
    }
}
