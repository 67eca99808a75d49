//! Configuration surface supplied by the embedding layer.

use std::{path::PathBuf, sync::Arc, time::Duration};

use serde::Deserialize;
use sessiond_core::{SessionBackend, SessionError};
use sessiond_local::{ExpirationSweeper, LocalFileBackend};
use sessiond_remote::{RemoteOptions, RemoteRpcBackend};

use crate::CompositeSessionService;

/// Servlet-style default inactivity timeout: 30 minutes.
const DEFAULT_TIMEOUT_SECS: i64 = 1800;

/// Session service configuration.
///
/// The embedding layer fills this in (from its own config format) and
/// calls [`build`](Self::build) once at startup; the resulting service is
/// passed by handle to every request-handling context.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionServiceConfig {
    /// Default inactivity timeout for new sessions, in seconds.
    pub session_timeout_secs: i64,

    /// Whether sessions are persisted to local files.
    pub local_file_session_enabled: bool,

    /// Directory for local session records.
    pub local_session_directory: PathBuf,

    /// `host` or `host:port` of a remote session server; empty disables
    /// the remote backend.
    pub remote_session_server_address: String,

    /// Deadline for one remote round-trip, in milliseconds.
    pub remote_request_timeout_ms: u64,

    /// How many remote requests may queue while the connection is down.
    pub remote_queue_limit: usize,

    /// Sweep cadence override; defaults to half the session timeout.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for SessionServiceConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: DEFAULT_TIMEOUT_SECS,
            local_file_session_enabled: false,
            local_session_directory: PathBuf::from("sessions"),
            remote_session_server_address: String::new(),
            remote_request_timeout_ms: 5000,
            remote_queue_limit: 64,
            sweep_interval_secs: None,
        }
    }
}

impl SessionServiceConfig {
    /// Wire up the configured backends and the expiration sweeper.
    ///
    /// The local backend, when enabled, sits ahead of the remote one so
    /// reads are served locally and remote hits are cached back.
    ///
    /// # Errors
    /// Returns `InvalidAddress` for a malformed remote address and
    /// `PersistenceFailure` if the session directory cannot be created;
    /// both are startup failures, not runtime degradation.
    pub fn build(&self) -> Result<CompositeSessionService, SessionError> {
        let mut service = CompositeSessionService::new(self.session_timeout_secs);

        if self.local_file_session_enabled {
            let backend = Arc::new(LocalFileBackend::open(&self.local_session_directory)?);
            let sweeper = ExpirationSweeper::start(Arc::clone(&backend), self.sweep_interval());
            service = service
                .with_backend(backend as Arc<dyn SessionBackend>)
                .with_sweeper(sweeper);
        }

        let remote_address = self.remote_session_server_address.trim();
        if !remote_address.is_empty() {
            let backend = RemoteRpcBackend::connect(
                remote_address,
                RemoteOptions {
                    request_timeout: Duration::from_millis(self.remote_request_timeout_ms),
                    queue_limit: self.remote_queue_limit,
                },
            )?;
            service = service.with_backend(Arc::new(backend) as Arc<dyn SessionBackend>);
        }

        Ok(service)
    }

    fn sweep_interval(&self) -> Duration {
        match self.sweep_interval_secs {
            Some(secs) => Duration::from_secs(secs.max(1)),
            None => {
                let half = self.session_timeout_secs.max(0) as u64 / 2;
                Duration::from_secs(half.max(1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_local_only_service() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionServiceConfig {
            local_file_session_enabled: true,
            local_session_directory: dir.path().to_path_buf(),
            ..SessionServiceConfig::default()
        };

        let service = config.build().unwrap();
        assert_eq!(service.backends().len(), 1);

        let created = service.create_session_default().await.unwrap();
        assert_eq!(created.session.max_inactive_interval, 1800);
        assert!(service.get_session(&created.session.id).await.is_some());
        service.shutdown();
    }

    #[tokio::test]
    async fn builds_both_backends_in_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionServiceConfig {
            local_file_session_enabled: true,
            local_session_directory: dir.path().to_path_buf(),
            remote_session_server_address: "127.0.0.1:9456".to_string(),
            ..SessionServiceConfig::default()
        };

        let service = config.build().unwrap();
        assert_eq!(service.backends().len(), 2);
        assert_eq!(
            service.backends()[0].role(),
            sessiond_core::BackendRole::Local
        );
        assert_eq!(
            service.backends()[1].role(),
            sessiond_core::BackendRole::Remote
        );
        service.shutdown();
    }

    #[tokio::test]
    async fn empty_remote_address_disables_the_remote_backend() {
        let config = SessionServiceConfig {
            remote_session_server_address: "   ".to_string(),
            ..SessionServiceConfig::default()
        };
        assert!(config.build().unwrap().backends().is_empty());
    }

    #[tokio::test]
    async fn malformed_remote_address_fails_at_startup() {
        let config = SessionServiceConfig {
            remote_session_server_address: "host:notaport".to_string(),
            ..SessionServiceConfig::default()
        };
        let err = config.build().unwrap_err();
        assert!(matches!(err, SessionError::InvalidAddress(_)));
    }

    #[test]
    fn sweep_interval_defaults_to_half_the_timeout() {
        let config = SessionServiceConfig::default();
        assert_eq!(config.sweep_interval(), Duration::from_secs(900));

        let short = SessionServiceConfig {
            session_timeout_secs: 1,
            ..SessionServiceConfig::default()
        };
        assert_eq!(short.sweep_interval(), Duration::from_secs(1));

        let fixed = SessionServiceConfig {
            sweep_interval_secs: Some(30),
            ..SessionServiceConfig::default()
        };
        assert_eq!(fixed.sweep_interval(), Duration::from_secs(30));
    }
}
