pub mod dto;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use repository::memory::MemoryStore;
pub use repository::postgres::Database;
pub use repository::{Store, Transaction};
