pub mod connection;
pub mod entities;
pub mod record_store;
pub mod repositories;

pub use record_store::SeaOrmRecordStore;
