//! Client backend proxying session operations to a remote session server.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use sessiond_core::{BackendRole, Session, SessionBackend, SessionError, codec};
use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    addr, frame,
    protocol::{Op, Request, Response, Status},
};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Tuning for the remote backend.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// Deadline for one request/response round-trip.
    pub request_timeout: Duration,
    /// How many requests may queue while the connection is down or busy.
    pub queue_limit: usize,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            queue_limit: 64,
        }
    }
}

struct Outbound {
    request: Request,
    reply: oneshot::Sender<Result<Response, SessionError>>,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Response, SessionError>>>>>;

/// Session backend backed by a remote session server.
///
/// The connection is established lazily on first use and re-established
/// with capped exponential backoff after a loss. Requests are multiplexed;
/// responses are matched by correlation id.
pub struct RemoteRpcBackend {
    address: String,
    tx: mpsc::Sender<Outbound>,
    pending: Pending,
    next_id: AtomicU64,
    request_timeout: Duration,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for RemoteRpcBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRpcBackend")
            .field("address", &self.address)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteRpcBackend {
    /// Set up a backend for `host:port` (or bare `host`, port 80).
    ///
    /// No I/O happens here; the first request dials the server.
    ///
    /// # Errors
    /// Returns `InvalidAddress` if the address cannot be parsed.
    pub fn connect(address: &str, options: RemoteOptions) -> Result<Self, SessionError> {
        let (host, port) = addr::parse_address(address)?;
        let address = format!("{host}:{port}");

        let (tx, rx) = mpsc::channel(options.queue_limit);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let task = tokio::spawn(run_connection(address.clone(), rx, Arc::clone(&pending)));

        Ok(Self {
            address,
            tx,
            pending,
            next_id: AtomicU64::new(1),
            request_timeout: options.request_timeout,
            task,
        })
    }

    /// The resolved `host:port` this backend talks to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn call(
        &self,
        op: Op,
        session_id: &str,
        payload: Option<Vec<u8>>,
    ) -> Result<Response, SessionError> {
        let correlation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            correlation_id,
            op,
            session_id: session_id.to_string(),
            payload,
        };

        let (reply, rx) = oneshot::channel();
        self.tx
            .try_send(Outbound { request, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    SessionError::RemoteUnavailable("request queue full".to_string())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    SessionError::RemoteUnavailable("connection task stopped".to_string())
                }
            })?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SessionError::RemoteUnavailable(
                "connection task dropped the request".to_string(),
            )),
            Err(_) => {
                // Abandon the in-flight request; a late response finds no
                // pending entry and is discarded.
                self.pending.lock().await.remove(&correlation_id);
                Err(SessionError::RemoteTimeout)
            }
        }
    }

    /// Ask the server to store a newly created session.
    ///
    /// # Errors
    /// Returns `RemoteUnavailable`/`RemoteTimeout` on transport failure.
    pub async fn create(&self, session: &Session) -> Result<(), SessionError> {
        let payload = codec::encode(session)?;
        let response = self.call(Op::Create, &session.id, Some(payload)).await?;
        match response.status {
            Status::Ok | Status::NotFound => Ok(()),
            Status::Error => Err(SessionError::RemoteUnavailable(response.error_message())),
        }
    }
}

impl Drop for RemoteRpcBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl SessionBackend for RemoteRpcBackend {
    fn role(&self) -> BackendRole {
        BackendRole::Remote
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let response = self.call(Op::Get, id, None).await?;
        match response.status {
            Status::Ok => {
                let payload = response.payload.ok_or_else(|| {
                    SessionError::CorruptPayload("get response without payload".to_string())
                })?;
                codec::decode(&payload).map(Some)
            }
            Status::NotFound => Ok(None),
            Status::Error => Err(SessionError::RemoteUnavailable(response.error_message())),
        }
    }

    async fn put(&self, session: &Session) -> Result<(), SessionError> {
        let payload = codec::encode(session)?;
        let response = self.call(Op::Put, &session.id, Some(payload)).await?;
        match response.status {
            Status::Ok => Ok(()),
            Status::NotFound | Status::Error => {
                Err(SessionError::RemoteUnavailable(response.error_message()))
            }
        }
    }

    async fn remove(&self, id: &str) -> Result<(), SessionError> {
        let response = self.call(Op::Remove, id, None).await?;
        match response.status {
            Status::Ok | Status::NotFound => Ok(()),
            Status::Error => Err(SessionError::RemoteUnavailable(response.error_message())),
        }
    }
}

struct Conn {
    write: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

async fn run_connection(address: String, mut rx: mpsc::Receiver<Outbound>, pending: Pending) {
    let mut conn: Option<Conn> = None;
    let mut backoff = INITIAL_BACKOFF;

    while let Some(outbound) = rx.recv().await {
        if conn.as_ref().is_some_and(|c| c.reader.is_finished()) {
            // Reader died with the connection; in-flight requests run into
            // their deadlines, new ones get a fresh dial.
            conn = None;
        }

        if conn.is_none() {
            match TcpStream::connect(&address).await {
                Ok(stream) => {
                    let (read, write) = stream.into_split();
                    let reader = tokio::spawn(read_loop(read, Arc::clone(&pending)));
                    conn = Some(Conn { write, reader });
                    backoff = INITIAL_BACKOFF;
                    tracing::debug!(%address, "connected to session server");
                }
                Err(e) => {
                    tracing::warn!(%address, error = %e, "session server connect failed");
                    let _ = outbound
                        .reply
                        .send(Err(SessionError::RemoteUnavailable(e.to_string())));
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            }
        }

        let Some(active) = conn.as_mut() else {
            continue;
        };

        let correlation_id = outbound.request.correlation_id;
        pending.lock().await.insert(correlation_id, outbound.reply);

        if let Err(e) = frame::write_frame(&mut active.write, &outbound.request).await {
            tracing::warn!(%address, error = %e, "session server write failed");
            if let Some(reply) = pending.lock().await.remove(&correlation_id) {
                let _ = reply.send(Err(SessionError::RemoteUnavailable(e.to_string())));
            }
            if let Some(dead) = conn.take() {
                dead.reader.abort();
            }
        }
    }

    if let Some(dead) = conn.take() {
        dead.reader.abort();
    }
}

async fn read_loop(mut read: OwnedReadHalf, pending: Pending) {
    loop {
        match frame::read_frame::<_, Response>(&mut read).await {
            Ok(Some(response)) => {
                match pending.lock().await.remove(&response.correlation_id) {
                    Some(reply) => {
                        let _ = reply.send(Ok(response));
                    }
                    None => tracing::debug!(
                        correlation_id = response.correlation_id,
                        "discarding late or unknown response"
                    ),
                }
            }
            Ok(None) => {
                tracing::debug!("session server closed the connection");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "session server read failed");
                break;
            }
        }
    }
}
