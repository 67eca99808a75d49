//! Remote session storage over a minimal request/response RPC.
//!
//! Provides:
//! - Wire protocol (length-prefixed JSON frames, correlation ids)
//! - `RemoteRpcBackend` - Client backend proxying to a session server
//! - `SessionRpcServer` - The serving side of the same protocol

pub mod addr;
pub mod client;
pub mod frame;
pub mod protocol;
pub mod server;

pub use addr::parse_address;
pub use client::{RemoteOptions, RemoteRpcBackend};
pub use protocol::{Op, Request, Response, Status};
pub use server::SessionRpcServer;
