//! Length-prefixed framing over any reliable byte stream.
//!
//! Each frame is a big-endian `u32` length followed by a JSON body, so
//! requests can be pipelined and multiplexed on one connection.

use std::io;

use bytes::{BufMut, BytesMut};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are rejected as corrupt.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Write one framed message.
///
/// # Errors
/// Returns the underlying I/O error, or `InvalidData` if the message
/// cannot be serialized or exceeds the frame cap.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds cap", body.len()),
        ));
    }

    let mut buf = BytesMut::with_capacity(4 + body.len());
    buf.put_u32(body.len() as u32);
    buf.put_slice(&body);
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Read one framed message.
///
/// Returns `Ok(None)` on a clean end of stream at a frame boundary.
///
/// # Errors
/// Returns the underlying I/O error; an oversized or undecodable frame, or
/// end of stream inside a frame body, is `InvalidData`/`UnexpectedEof`.
pub async fn read_frame<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };

    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds cap"),
        ));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Op, Request, Response};

    #[tokio::test]
    async fn frames_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let request = Request {
            correlation_id: 1,
            op: Op::Get,
            session_id: "s1".to_string(),
            payload: None,
        };
        write_frame(&mut client, &request).await.unwrap();
        write_frame(&mut client, &Response::not_found(1)).await.unwrap();

        let first: Request = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(first.session_id, "s1");

        let second: Response = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(second.correlation_id, 1);
    }

    #[tokio::test]
    async fn clean_eof_yields_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let read: Option<Response> = read_frame(&mut server).await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn eof_inside_a_body_is_an_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(100).await.unwrap();
        client.write_all(b"short").await.unwrap();
        drop(client);

        let read: io::Result<Option<Response>> = read_frame(&mut server).await;
        assert!(read.is_err());
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(u32::MAX).await.unwrap();

        let read: io::Result<Option<Response>> = read_frame(&mut server).await;
        assert_eq!(read.unwrap_err().kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn undecodable_body_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(4).await.unwrap();
        client.write_all(b"\x00\x01\x02\x03").await.unwrap();

        let read: io::Result<Option<Response>> = read_frame(&mut server).await;
        assert_eq!(read.unwrap_err().kind(), io::ErrorKind::InvalidData);
    }
}
