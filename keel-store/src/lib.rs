//! Keel Store
//!
//! Storage engine of the keel control plane. One generic engine provides
//! create, get, update, delete, list and count for every persisted entity,
//! on top of which sit the stale-build sweep, scoped secret resolution and
//! the pipeline queries. The same statements run against PostgreSQL and
//! SQLite; the backend adapter absorbs the differences between them.

pub mod backend;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod repository;
pub mod store;

pub use config::{Driver, StoreConfig, SweepConfig};
pub use error::{Result, StoreError};
pub use repository::{Engine, Filter, Page, Sort};
pub use store::Store;
