//! Persistence of matched events, merge windows and alert aggregates.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::PersistenceError;
pub use sqlite::SqliteAlertStore;
pub use traits::AlertStore;
