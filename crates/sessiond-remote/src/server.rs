//! The serving side of the session protocol.

use std::{io, net::SocketAddr, sync::Arc};

use sessiond_core::{SessionBackend, codec};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

use crate::{
    frame,
    protocol::{Op, Request, Response},
};

/// TCP server answering session requests from any store.
///
/// One task per connection; a malformed frame terminates that connection
/// only. Per-request backend failures are reported as `Status::Error`
/// responses carrying the message.
pub struct SessionRpcServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl SessionRpcServer {
    /// Bind and start serving `store` on `addr`.
    ///
    /// # Errors
    /// Returns the bind error.
    pub async fn bind(addr: SocketAddr, store: Arc<dyn SessionBackend>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "session server listening");

        let handle = tokio::spawn(accept_loop(listener, store));
        Ok(Self { local_addr, handle })
    }

    /// The bound address (useful with an ephemeral port).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and drop all connection tasks.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for SessionRpcServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn accept_loop(listener: TcpListener, store: Arc<dyn SessionBackend>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::debug!(%peer, "session client connected");
                tokio::spawn(serve_connection(stream, Arc::clone(&store)));
            }
            Err(e) => {
                tracing::warn!(error = %e, "session server accept failed");
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, store: Arc<dyn SessionBackend>) {
    let (mut read, mut write) = stream.into_split();

    loop {
        let request = match frame::read_frame::<_, Request>(&mut read).await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "dropping session client after bad frame");
                break;
            }
        };

        let response = handle_request(&*store, request).await;
        if let Err(e) = frame::write_frame(&mut write, &response).await {
            tracing::warn!(error = %e, "session client write failed");
            break;
        }
    }
}

async fn handle_request(store: &dyn SessionBackend, request: Request) -> Response {
    let correlation_id = request.correlation_id;

    match request.op {
        Op::Get => match store.get(&request.session_id).await {
            Ok(Some(session)) => match codec::encode(&session) {
                Ok(bytes) => Response::ok(correlation_id, Some(bytes)),
                Err(e) => Response::failure(correlation_id, &e.to_string()),
            },
            Ok(None) => Response::not_found(correlation_id),
            Err(e) => Response::failure(correlation_id, &e.to_string()),
        },
        Op::Create | Op::Put => {
            let Some(payload) = request.payload else {
                return Response::failure(correlation_id, "missing session payload");
            };
            match codec::decode(&payload) {
                Ok(session) => match store.put(&session).await {
                    Ok(()) => Response::ok(correlation_id, None),
                    Err(e) => Response::failure(correlation_id, &e.to_string()),
                },
                Err(e) => Response::failure(correlation_id, &e.to_string()),
            }
        }
        Op::Remove => match store.remove(&request.session_id).await {
            Ok(()) => Response::ok(correlation_id, None),
            Err(e) => Response::failure(correlation_id, &e.to_string()),
        },
    }
}
