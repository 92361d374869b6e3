//! Infrastructure layer
//!
//! - Database bootstrap and migrations
//! - Persistence context and change tracking
//! - Unit of Work for transaction management
//! - Cancellation helpers

pub mod cancel;
pub mod change_tracker;
pub mod context;
pub mod db;
pub mod migrations;
pub mod unit_of_work;

pub use cancel::CancelExt;
pub use change_tracker::{EntityKey, EntryState, Tracked};
pub use context::DbContext;
pub use db::Database;
pub use migrations::Migrator;
pub use unit_of_work::{Persistence, UnitOfWork, UnitOfWorkState};
