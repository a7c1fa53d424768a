pub mod price_history;
pub mod product;
pub mod state;

// Re-exports for convenience
pub use price_history::*;
pub use product::*;
pub use state::*;
