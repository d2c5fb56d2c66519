//! Cooperative cancellation shared between a caller and a running operation.

use crate::error::CatalogError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag checked at directory, file and plan-item boundaries.
///
/// Clones share the same flag, so a UI can keep one clone and hand another
/// to the operation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the operation stops at its next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Checkpoint helper: `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), CatalogError> {
        if self.is_cancelled() {
            Err(CatalogError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(observer.check().is_ok());

        token.cancel();

        assert!(observer.is_cancelled());
        assert!(matches!(observer.check(), Err(CatalogError::Cancelled)));
    }
}
