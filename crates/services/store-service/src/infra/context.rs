//! Persistence context shared by every repository of one unit of work.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use sea_orm::DatabaseConnection;

use super::change_tracker::ChangeTracker;
use crate::repository::expansion::ExpansionPolicy;
use common::{AppError, AppResult};

/// Connection handle, change tracker and expansion policy of one logical operation.
pub struct DbContext {
    connection: RwLock<Option<DatabaseConnection>>,
    tracker: Mutex<ChangeTracker>,
    expansion: ExpansionPolicy,
}

impl DbContext {
    pub fn new(connection: DatabaseConnection, expansion: ExpansionPolicy) -> Self {
        Self {
            connection: RwLock::new(Some(connection)),
            tracker: Mutex::new(ChangeTracker::default()),
            expansion,
        }
    }

    /// Handle to the open connection, or `Disposed` once the context was released.
    pub fn connection(&self) -> AppResult<DatabaseConnection> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(AppError::Disposed)
    }

    pub fn expansion(&self) -> &ExpansionPolicy {
        &self.expansion
    }

    pub fn is_disposed(&self) -> bool {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub(crate) fn tracker(&self) -> AppResult<MutexGuard<'_, ChangeTracker>> {
        if self.is_disposed() {
            return Err(AppError::Disposed);
        }
        Ok(self.tracker.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Release the connection handle and detach all entries.
    ///
    /// Returns false when the context was already released.
    pub(crate) fn release(&self) -> bool {
        let taken = self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if taken.is_none() {
            return false;
        }

        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        true
    }
}
