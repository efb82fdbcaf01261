use crate::router;
use crate::state::AppState;
use bytes::Bytes;
use faultline_core::ipc::{FaultlineRequest, FaultlineResponse};
use futures::{SinkExt, StreamExt};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

pub async fn run_unix_server(
    socket_path: &str,
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)?;
    tracing::info!("IPC Server listening on {}", socket_path);

    loop {
        tokio::select! {
            res = listener.accept() => {
                let (stream, _) = res?;
                let state = state.clone();
                tokio::spawn(async move {
                    let (read, write) = stream.into_split();
                    serve_connection(read, write, state).await;
                });
            }
            _ = shutdown.recv() => {
                tracing::info!("Shutting down IPC server...");
                break;
            }
        }
    }

    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    Ok(())
}

/// Serve one connection: 4-byte little-endian length prefix + MessagePack payload
/// in both directions, one response per request, until the peer hangs up.
pub async fn serve_connection<R, W>(read: R, write: W, state: AppState)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let le_codec = || LengthDelimitedCodec::builder().little_endian().new_codec();
    let mut framed_read = FramedRead::new(read, le_codec());
    let mut framed_write = FramedWrite::new(write, le_codec());

    while let Some(frame) = framed_read.next().await {
        let bytes_mut = match frame {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("Frame error: {}", e);
                break;
            }
        };

        let response = match rmp_serde::from_slice::<FaultlineRequest>(&bytes_mut) {
            Ok(request) => router::handle_request(request, &state).await,
            Err(e) => FaultlineResponse::err(format!("Deserialization error: {}", e)),
        };

        match rmp_serde::to_vec_named(&response) {
            Ok(resp_bytes) => {
                if let Err(e) = framed_write.send(Bytes::from(resp_bytes)).await {
                    tracing::error!("Failed to send response: {}", e);
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                break;
            }
        }
    }
}
