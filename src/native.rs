//! Chrome native-messaging framing for the mood host.
//!
//! Each message is a 32-bit native-endian length followed by that many bytes
//! of UTF-8 JSON.

use crate::backend::MoodBackend;
use crate::types::Request;
use serde_json::json;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Largest message the browser accepts from a host
pub const MAX_FRAME: usize = 1024 * 1024;

/// Read one message; `None` on a clean end of input or a zero-length frame
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut length_bytes = [0u8; 4];
    match reader.read_exact(&mut length_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let length = u32::from_ne_bytes(length_bytes) as usize;
    if length == 0 {
        return Ok(None);
    }
    if length > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds {}", length, MAX_FRAME),
        ));
    }

    let mut message = vec![0u8; length];
    reader.read_exact(&mut message).await?;
    Ok(Some(message))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, message: &[u8]) -> io::Result<()> {
    let length = u32::try_from(message.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
    writer.write_all(&length.to_ne_bytes()).await?;
    writer.write_all(message).await?;
    writer.flush().await
}

/// Answer one raw request. Anything unparseable gets an error object, which
/// the page side reads as no result.
pub async fn answer(backend: &dyn MoodBackend, raw: &[u8]) -> Vec<u8> {
    let request: Request = match serde_json::from_slice(raw) {
        Ok(request) => request,
        Err(e) => {
            warn!("Unreadable request: {}", e);
            return error_response(&format!("invalid request: {}", e));
        }
    };

    debug!("Answering {}", request.kind());
    let response = backend.handle(&request).await;
    serde_json::to_vec(&response).unwrap_or_else(|e| error_response(&e.to_string()))
}

fn error_response(message: &str) -> Vec<u8> {
    json!({ "error": message }).to_string().into_bytes()
}

/// Answer frames from `reader` on `writer` until input ends
pub async fn serve_frames<R, W>(backend: &dyn MoodBackend, reader: &mut R, writer: &mut W) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut answered = 0;
    while let Some(message) = read_frame(reader).await? {
        let reply = answer(backend, &message).await;
        write_frame(writer, &reply).await?;
        answered += 1;
    }
    Ok(answered)
}
