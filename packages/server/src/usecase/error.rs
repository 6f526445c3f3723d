//! UseCase 層のエラー定義

use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio::time::Instant;

use crate::domain::{DenyReason, RepositoryError};

/// Errors returned to the client that issued the operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// No appointment between the two parties; the conversation does not exist.
    #[error("no appointment exists between the participants")]
    NoAppointmentFound,

    /// The conversation exists but its current status forbids the operation.
    #[error("access denied: {reason}")]
    AccessDenied { reason: DenyReason },

    /// Transient external-store failure.
    #[error("message store failure: {0}")]
    PersistenceError(String),

    /// An external call exceeded the configured bound.
    #[error("operation timed out")]
    Timeout,

    /// `send` or `load-history` for a conversation this connection has not joined.
    #[error("not joined to a conversation with '{0}'")]
    NotJoined(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ChatError {
    /// Wire error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoAppointmentFound => "NoAppointmentFound",
            Self::AccessDenied { .. } => "AccessDenied",
            Self::PersistenceError(_) => "PersistenceError",
            Self::Timeout => "Timeout",
            Self::NotJoined(_) => "NotJoined",
            Self::InvalidRequest(_) => "InvalidRequest",
        }
    }

    /// Human-readable reason. For `AccessDenied` this is the bare reason
    /// (`pending`, `completed`, ...) so clients can pick the right banner.
    pub fn reason(&self) -> String {
        match self {
            Self::AccessDenied { reason } => reason.as_str().to_string(),
            other => other.to_string(),
        }
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::Timeout)
    }
}

impl From<RepositoryError> for ChatError {
    fn from(error: RepositoryError) -> Self {
        Self::PersistenceError(error.to_string())
    }
}

/// Run an external-store call with a per-operation time bound.
pub(crate) async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T, ChatError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    with_deadline(Instant::now() + limit, operation).await
}

/// Run an external-store call that must finish before `deadline`.
pub(crate) async fn with_deadline<T, F>(deadline: Instant, operation: F) -> Result<T, ChatError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout_at(deadline, operation).await {
        Ok(result) => result.map_err(ChatError::from),
        Err(_) => Err(ChatError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        // テスト項目: PersistenceError と Timeout のみ再試行可能
        // given (前提条件) / when (操作) / then (期待する結果):
        assert!(ChatError::PersistenceError("down".into()).is_retryable());
        assert!(ChatError::Timeout.is_retryable());
        assert!(!ChatError::NoAppointmentFound.is_retryable());
        assert!(
            !ChatError::AccessDenied {
                reason: DenyReason::Pending
            }
            .is_retryable()
        );
        assert!(!ChatError::NotJoined("d-1".into()).is_retryable());
    }

    #[test]
    fn test_access_denied_reason_is_bare() {
        // テスト項目: AccessDenied の reason は理由コードそのもの
        // given (前提条件):
        let error = ChatError::AccessDenied {
            reason: DenyReason::Cancelled,
        };

        // when (操作) / then (期待する結果):
        assert_eq!(error.code(), "AccessDenied");
        assert_eq!(error.reason(), "cancelled");
    }

    #[test]
    fn test_every_error_has_a_reason() {
        // テスト項目: すべてのエラーが人間が読める理由を持つ
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(
            ChatError::NoAppointmentFound.reason(),
            "no appointment exists between the participants"
        );
        assert_eq!(ChatError::Timeout.reason(), "operation timed out");
        assert!(!ChatError::NotJoined("d-1".into()).reason().is_empty());
    }

    #[tokio::test]
    async fn test_with_timeout_maps_outcomes() {
        // テスト項目: タイムアウト・ストア障害・成功がそれぞれ対応する結果になる
        // given (前提条件):
        let limit = Duration::from_millis(20);

        // when (操作):
        let ok = with_timeout(limit, async { Ok::<_, RepositoryError>(1) }).await;
        let failed = with_timeout(limit, async {
            Err::<(), _>(RepositoryError::Unavailable("db down".into()))
        })
        .await;
        let stalled = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, RepositoryError>(())
        })
        .await;

        // then (期待する結果):
        assert_eq!(ok, Ok(1));
        assert!(matches!(failed, Err(ChatError::PersistenceError(_))));
        assert_eq!(stalled, Err(ChatError::Timeout));
    }
}
