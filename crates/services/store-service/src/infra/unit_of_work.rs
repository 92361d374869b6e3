//! Unit of Work pattern implementation.
//!
//! One unit of work owns one persistence context: the connection handle, the
//! change tracker and every repository built on them. Repositories only stage
//! writes; `complete` flushes everything staged across all of them inside a
//! single transaction, so either every change lands or none does.
//!
//! A unit of work is meant for one logical operation on one task at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, EntityTrait, TransactionTrait};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cancel::CancelExt;
use super::change_tracker::{AssignedKeys, Flushed};
use super::context::DbContext;
use crate::repository::entities::{
    address, cart, customer, delivery_man, order, order_item, product, product_image,
};
use crate::repository::{ExpansionPolicy, Repository};
use common::{AppError, AppResult};

/// Lifecycle of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    /// Accepting reads and staged writes; nothing committed yet
    Open,
    /// At least one `complete` succeeded; still accepting work
    Committed,
    /// Terminal; every operation fails with `Disposed`
    Disposed,
}

/// Unit of Work trait for dependency injection.
///
/// Every accessor returns the same repository instance for the lifetime of the
/// unit of work, and all of them share one change tracker.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn addresses(&self) -> Arc<Repository<address::Entity>>;

    /// Cart lines are keyed by customer and product, so they are reached by predicate only.
    fn carts(&self) -> Arc<Repository<cart::Entity>>;

    fn customers(&self) -> Arc<Repository<customer::Entity>>;

    fn delivery_men(&self) -> Arc<Repository<delivery_man::Entity>>;

    fn orders(&self) -> Arc<Repository<order::Entity>>;

    fn order_items(&self) -> Arc<Repository<order_item::Entity>>;

    fn products(&self) -> Arc<Repository<product::Entity>>;

    fn product_images(&self) -> Arc<Repository<product_image::Entity>>;

    fn state(&self) -> UnitOfWorkState;

    /// True when a `complete` would write anything
    fn has_changes(&self) -> AppResult<bool>;

    /// Drop every staged change and stop tracking every entity.
    fn discard_changes(&self) -> AppResult<()>;

    /// Persist every staged change atomically.
    ///
    /// Returns the number of tracked entries written. On failure nothing is
    /// persisted and the staged changes stay in place.
    async fn complete(&self) -> AppResult<usize>;

    /// [`complete`](Self::complete) that gives up with `Cancelled` once `token`
    /// fires, rolling the transaction back if it was still open.
    async fn complete_with(&self, token: &CancellationToken) -> AppResult<usize>;

    /// Release the connection handle. Calling it again has no effect.
    fn dispose(&self);
}

/// Concrete implementation of UnitOfWork
pub struct Persistence {
    context: Arc<DbContext>,
    committed: AtomicBool,
    addresses: OnceLock<Arc<Repository<address::Entity>>>,
    carts: OnceLock<Arc<Repository<cart::Entity>>>,
    customers: OnceLock<Arc<Repository<customer::Entity>>>,
    delivery_men: OnceLock<Arc<Repository<delivery_man::Entity>>>,
    orders: OnceLock<Arc<Repository<order::Entity>>>,
    order_items: OnceLock<Arc<Repository<order_item::Entity>>>,
    products: OnceLock<Arc<Repository<product::Entity>>>,
    product_images: OnceLock<Arc<Repository<product_image::Entity>>>,
}

impl Persistence {
    /// Create new UnitOfWork instance
    pub fn new(db: DatabaseConnection, expansion: ExpansionPolicy) -> Self {
        Self {
            context: Arc::new(DbContext::new(db, expansion)),
            committed: AtomicBool::new(false),
            addresses: OnceLock::new(),
            carts: OnceLock::new(),
            customers: OnceLock::new(),
            delivery_men: OnceLock::new(),
            orders: OnceLock::new(),
            order_items: OnceLock::new(),
            products: OnceLock::new(),
            product_images: OnceLock::new(),
        }
    }

    /// Shared persistence context of this unit of work
    pub fn context(&self) -> &Arc<DbContext> {
        &self.context
    }

    fn repository<E: EntityTrait>(
        &self,
        cell: &OnceLock<Arc<Repository<E>>>,
    ) -> Arc<Repository<E>> {
        Arc::clone(cell.get_or_init(|| Arc::new(Repository::new(Arc::clone(&self.context)))))
    }

    async fn flush(&self, token: &CancellationToken) -> AppResult<usize> {
        let pending = self.context.tracker()?.pending();
        if pending.is_empty() {
            debug!("Nothing staged, complete is a no-op");
            self.committed.store(true, Ordering::SeqCst);
            return Ok(0);
        }

        let db = self.context.connection()?;
        let txn = async { db.begin().await.map_err(AppError::from) }
            .with_cancellation(token)
            .await?;

        let mut assigned = AssignedKeys::default();
        let mut results = Vec::with_capacity(pending.len());
        for (slot, entry) in &pending {
            let flushed = async { entry.flush(&txn, &assigned).await.map_err(AppError::from) }
                .with_cancellation(token)
                .await;

            match flushed {
                Ok(flushed) => {
                    if let Some(key) = entry.assigned_key(&flushed) {
                        assigned.insert(*slot, key);
                    }
                    results.push((*slot, flushed));
                }
                Err(err) => {
                    warn!(
                        entity = entry.table(),
                        key = ?entry.key().map(|k| k.to_string()),
                        error = %err,
                        "Flush failed, rolling back"
                    );
                    return Err(rollback(txn, err).await);
                }
            }
        }

        if token.is_cancelled() {
            return Err(rollback(txn, AppError::Cancelled).await);
        }
        txn.commit().await?;

        let written = results
            .iter()
            .filter(|(_, flushed)| !matches!(flushed, Flushed::Skipped))
            .count();
        self.context.tracker()?.accept(results);
        self.committed.store(true, Ordering::SeqCst);

        info!(staged = pending.len(), written, "Unit of work committed");
        Ok(written)
    }
}

async fn rollback(txn: DatabaseTransaction, cause: AppError) -> AppError {
    if let Err(rollback_err) = txn.rollback().await {
        error!("Transaction rollback failed: {}", rollback_err);
    }
    cause
}

#[async_trait]
impl UnitOfWork for Persistence {
    fn addresses(&self) -> Arc<Repository<address::Entity>> {
        self.repository(&self.addresses)
    }

    fn carts(&self) -> Arc<Repository<cart::Entity>> {
        self.repository(&self.carts)
    }

    fn customers(&self) -> Arc<Repository<customer::Entity>> {
        self.repository(&self.customers)
    }

    fn delivery_men(&self) -> Arc<Repository<delivery_man::Entity>> {
        self.repository(&self.delivery_men)
    }

    fn orders(&self) -> Arc<Repository<order::Entity>> {
        self.repository(&self.orders)
    }

    fn order_items(&self) -> Arc<Repository<order_item::Entity>> {
        self.repository(&self.order_items)
    }

    fn products(&self) -> Arc<Repository<product::Entity>> {
        self.repository(&self.products)
    }

    fn product_images(&self) -> Arc<Repository<product_image::Entity>> {
        self.repository(&self.product_images)
    }

    fn state(&self) -> UnitOfWorkState {
        if self.context.is_disposed() {
            UnitOfWorkState::Disposed
        } else if self.committed.load(Ordering::SeqCst) {
            UnitOfWorkState::Committed
        } else {
            UnitOfWorkState::Open
        }
    }

    fn has_changes(&self) -> AppResult<bool> {
        Ok(self.context.tracker()?.has_changes())
    }

    fn discard_changes(&self) -> AppResult<()> {
        let mut tracker = self.context.tracker()?;
        debug!(entries = tracker.len(), "Discarding staged changes");
        tracker.clear();
        Ok(())
    }

    async fn complete(&self) -> AppResult<usize> {
        self.flush(&CancellationToken::new()).await
    }

    async fn complete_with(&self, token: &CancellationToken) -> AppResult<usize> {
        self.flush(token).await
    }

    fn dispose(&self) {
        if self.context.release() {
            debug!("Unit of work disposed");
        }
    }
}

impl Drop for Persistence {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn persistence() -> Persistence {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        Persistence::new(db, ExpansionPolicy::default())
    }

    #[test]
    fn accessors_are_lazy_and_stable() {
        let uow = persistence();
        assert!(uow.products.get().is_none());

        let first = uow.products();
        let second = uow.products();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn empty_complete_moves_to_committed() {
        let uow = persistence();
        assert_eq!(uow.state(), UnitOfWorkState::Open);

        assert_eq!(uow.complete().await.unwrap(), 0);
        assert_eq!(uow.state(), UnitOfWorkState::Committed);
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_terminal() {
        let uow = persistence();
        uow.dispose();
        uow.dispose();

        assert_eq!(uow.state(), UnitOfWorkState::Disposed);
        assert!(matches!(uow.complete().await, Err(AppError::Disposed)));
        assert!(matches!(uow.has_changes(), Err(AppError::Disposed)));
    }
}
