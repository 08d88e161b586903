//! Bounded newline framing
//!
//! Reads one `\n`-terminated line at a time from a buffered stream while
//! holding at most `max_len + 1` bytes of it in memory.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Result of reading a bounded line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadLineResult {
    /// A complete line is in the buffer with its delimiter stripped.
    /// Carries the number of bytes consumed from the stream.
    Line(usize),
    /// The line exceeded the limit and was consumed up to its delimiter
    TooLong,
    /// The stream ended after this many bytes without a delimiter, whether
    /// or not they exceeded the limit
    Partial(usize),
    /// End of stream at a line boundary
    Eof,
}

/// Read the next line into `buf`
///
/// On `Line`, `buf` holds the content without the trailing `\n` and without
/// one `\r` directly before it. Content longer than `max_len` is consumed
/// without being stored and reported as `TooLong`, so one client cannot
/// grow the buffer past the limit. Unterminated data at end of stream is
/// never returned as a line; it is reported as `Partial` even when it is
/// already over the limit.
///
/// Not cancel safe: if the future is dropped mid-line, the bytes already
/// consumed are lost. Callers close the connection in that case.
pub async fn read_bounded_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_len: usize,
) -> io::Result<ReadLineResult>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();

    let mut total_bytes = 0;
    let mut too_long = false;

    loop {
        let (consumed, done) = {
            let available = reader.fill_buf().await?;

            if available.is_empty() {
                buf.clear();
                return Ok(match total_bytes {
                    0 => ReadLineResult::Eof,
                    n => ReadLineResult::Partial(n),
                });
            }

            let (consumed, done) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };

            if !too_long {
                let content = if done { consumed - 1 } else { consumed };
                // One extra byte of room for a `\r` that belongs to the delimiter
                if buf.len() + content <= max_len + 1 {
                    buf.extend_from_slice(&available[..content]);
                } else {
                    too_long = true;
                    buf.clear();
                }
            }

            (consumed, done)
        };

        total_bytes += consumed;
        reader.consume(consumed);

        if done {
            break;
        }
    }

    if too_long {
        return Ok(ReadLineResult::TooLong);
    }

    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    if buf.len() > max_len {
        buf.clear();
        return Ok(ReadLineResult::TooLong);
    }

    Ok(ReadLineResult::Line(total_bytes))
}

/// Check if error is a connection reset (peer went away abruptly)
pub fn is_connection_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    /// Read every frame from `input`, using a tiny buffer so lines span refills
    async fn frames(input: &[u8], max_len: usize) -> Vec<(ReadLineResult, Vec<u8>)> {
        let mut reader = BufReader::with_capacity(3, input);
        let mut buf = Vec::new();
        let mut out = Vec::new();

        loop {
            let result = read_bounded_line(&mut reader, &mut buf, max_len)
                .await
                .unwrap();
            out.push((result, buf.clone()));
            if matches!(result, ReadLineResult::Eof | ReadLineResult::Partial(_)) {
                break;
            }
        }
        out
    }

    #[tokio::test]
    async fn test_lines_then_eof() {
        let out = frames(b"hello\nworld\n", 64).await;
        assert_eq!(
            out,
            vec![
                (ReadLineResult::Line(6), b"hello".to_vec()),
                (ReadLineResult::Line(6), b"world".to_vec()),
                (ReadLineResult::Eof, Vec::new()),
            ]
        );
    }

    #[tokio::test]
    async fn test_trailing_partial_is_not_a_line() {
        let out = frames(b"hello\nworld", 64).await;
        assert_eq!(out[0], (ReadLineResult::Line(6), b"hello".to_vec()));
        assert_eq!(out[1].0, ReadLineResult::Partial(5));
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_crlf_stripped_once() {
        let out = frames(b"a\r\nb\r\r\n\r\n\n", 64).await;
        let lines: Vec<_> = out.iter().map(|(_, line)| line.clone()).collect();
        assert_eq!(
            lines,
            vec![
                b"a".to_vec(),
                b"b\r".to_vec(),
                Vec::new(),
                Vec::new(),
                Vec::new()
            ]
        );
    }

    #[tokio::test]
    async fn test_bare_cr_is_content() {
        let out = frames(b"a\rb\n", 64).await;
        assert_eq!(out[0], (ReadLineResult::Line(4), b"a\rb".to_vec()));
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let out = frames(b"12345678\n12345678\r\n", 8).await;
        assert_eq!(out[0], (ReadLineResult::Line(9), b"12345678".to_vec()));
        assert_eq!(out[1], (ReadLineResult::Line(10), b"12345678".to_vec()));
    }

    #[tokio::test]
    async fn test_oversized_line_skipped_and_stream_continues() {
        let out = frames(b"123456789\nok\n", 8).await;
        assert_eq!(out[0].0, ReadLineResult::TooLong);
        assert!(out[0].1.is_empty());
        assert_eq!(out[1], (ReadLineResult::Line(3), b"ok".to_vec()));
    }

    #[tokio::test]
    async fn test_oversized_with_cr_at_boundary() {
        // Nine content bytes where the ninth is a `\r` that is not part of CRLF
        let out = frames(b"12345678\rx\n", 8).await;
        assert_eq!(out[0].0, ReadLineResult::TooLong);
    }

    #[tokio::test]
    async fn test_oversized_partial_at_eof() {
        let out = frames(b"ok\n0123456789abcdef", 8).await;
        assert_eq!(out[0], (ReadLineResult::Line(3), b"ok".to_vec()));
        assert_eq!(out[1], (ReadLineResult::Partial(16), Vec::new()));
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_buffer_stays_bounded() {
        let mut input = vec![b'x'; 10_000];
        input.push(b'\n');
        let mut reader = BufReader::with_capacity(512, &input[..]);
        let mut buf = Vec::new();

        let result = read_bounded_line(&mut reader, &mut buf, 100).await.unwrap();
        assert_eq!(result, ReadLineResult::TooLong);
        assert!(buf.capacity() <= 1024);
    }

    #[test]
    fn test_is_connection_reset() {
        assert!(is_connection_reset(&io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset"
        )));
        assert!(is_connection_reset(&io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "aborted"
        )));
        assert!(is_connection_reset(&io::Error::new(
            io::ErrorKind::BrokenPipe,
            "broken"
        )));
        assert!(!is_connection_reset(&io::Error::other("other")));
    }
}
