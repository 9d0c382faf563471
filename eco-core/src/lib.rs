pub mod attempt;
pub mod memory_store;
pub mod reconcile;
pub mod scoring;
pub mod session;
pub mod store;

// Re-export main components
pub use attempt::*;
pub use memory_store::*;
pub use reconcile::*;
pub use scoring::*;
pub use session::*;
pub use store::*;
