//! JSON-RPC wire codec
//!
//! Delve's net/rpc JSON codec writes one JSON object per message, each
//! followed by a newline:
//! ```text
//! {"id":1,"result":{...},"error":null}\n
//! ```

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Error;

/// Largest message accepted from the server
const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

fn closed(e: io::Error) -> Error {
    Error::Connection(format!("connection lost: {}", e))
}

/// Read one message from the stream
///
/// Blank lines between messages are skipped
pub async fn read_message<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String, Error> {
    read_message_limited(reader, MAX_MESSAGE_SIZE).await
}

/// Like `read_message`, buffering at most `limit` bytes per line
async fn read_message_limited<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    limit: usize,
) -> Result<String, Error> {
    loop {
        let mut line = String::new();
        let bytes_read = (&mut *reader)
            .take(limit as u64 + 1)
            .read_line(&mut line)
            .await
            .map_err(closed)?;

        if bytes_read == 0 {
            return Err(Error::Connection("connection closed by server".to_string()));
        }

        if line.len() > limit {
            return Err(Error::Protocol(format!(
                "Message too large: more than {} bytes",
                limit
            )));
        }

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
}

/// Write one message to the stream
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<(), Error> {
    writer.write_all(json.as_bytes()).await.map_err(closed)?;
    writer.write_all(b"\n").await.map_err(closed)?;
    writer.flush().await.map_err(closed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_read_message() {
        let data = b"{\"id\":1}\n{\"id\":2}\n";
        let mut reader = BufReader::new(Cursor::new(data.to_vec()));

        assert_eq!(read_message(&mut reader).await.unwrap(), "{\"id\":1}");
        assert_eq!(read_message(&mut reader).await.unwrap(), "{\"id\":2}");
    }

    #[tokio::test]
    async fn test_read_message_skips_blank_lines() {
        let data = b"\r\n\n{\"id\":7}\r\n";
        let mut reader = BufReader::new(Cursor::new(data.to_vec()));

        assert_eq!(read_message(&mut reader).await.unwrap(), "{\"id\":7}");
    }

    #[tokio::test]
    async fn test_read_message_eof_is_connection_error() {
        let mut reader = BufReader::new(Cursor::new(Vec::new()));
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_oversized_line_is_rejected_before_newline() {
        let mut data = vec![b'x'; 64];
        data.extend_from_slice(b"\n{\"id\":1}\n");
        let mut reader = BufReader::new(Cursor::new(data));

        let err = read_message_limited(&mut reader, 16).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "{}", err);
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let mut reader = BufReader::new(Cursor::new(b"{\"id\":12}\n".to_vec()));
        assert_eq!(
            read_message_limited(&mut reader, 10).await.unwrap(),
            "{\"id\":12}"
        );
    }

    #[tokio::test]
    async fn test_write_message() {
        let mut output = Vec::new();
        write_message(&mut output, "{\"id\":1}").await.unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "{\"id\":1}\n");
    }
}
