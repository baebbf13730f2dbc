//! Loan notification dispatch.
//!
//! Notifications run on their own tokio task once a loan is recorded. The
//! request that created the loan never waits for them, and a failed delivery
//! only shows up in the log.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::AppResult;

/// Delivers the notice for a newly created loan
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanNotifier: Send + Sync {
    async fn notify(&self, loan_id: i32) -> AppResult<()>;
}

/// Notifier that only writes the notice to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl LoanNotifier for LogNotifier {
    async fn notify(&self, loan_id: i32) -> AppResult<()> {
        tracing::info!(loan_id, "Loan notification recorded");
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Option<Arc<dyn LoanNotifier>>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn LoanNotifier>) -> Self {
        Self {
            notifier: Some(notifier),
        }
    }

    /// Dispatcher that drops every notification
    pub fn disabled() -> Self {
        Self { notifier: None }
    }

    /// Schedule the notification for `loan_id` and return immediately.
    ///
    /// The handle is only useful to tests; callers normally drop it.
    pub fn dispatch(&self, loan_id: i32) -> Option<JoinHandle<()>> {
        let notifier = self.notifier.clone()?;

        Some(tokio::spawn(async move {
            match notifier.notify(loan_id).await {
                Ok(()) => tracing::debug!(loan_id, "Loan notification delivered"),
                Err(e) => tracing::warn!(loan_id, error = %e, "Loan notification failed"),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_dispatch_calls_notifier_once() {
        let mut notifier = MockLoanNotifier::new();
        notifier.expect_notify().with(eq(42)).times(1).returning(|_| Ok(()));

        let dispatcher = NotificationDispatcher::new(Arc::new(notifier));
        let handle = dispatcher.dispatch(42).expect("dispatcher is enabled");
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_delivery_is_contained() {
        let mut notifier = MockLoanNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_| Err(AppError::Internal("smtp unreachable".into())));

        let dispatcher = NotificationDispatcher::new(Arc::new(notifier));
        let handle = dispatcher.dispatch(7).expect("dispatcher is enabled");
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_spawns_nothing() {
        assert!(NotificationDispatcher::disabled().dispatch(1).is_none());
    }
}
