//! On-disk persistence: the product catalog (CSV), per-product state (JSON)
//! and the price check log (SQLite).

pub mod history;
pub mod products_csv;
pub mod state_store;

pub use history::PriceHistoryStore;
pub use products_csv::{add_product, read_products, remove_product, update_product, write_products};
pub use state_store::{load_state, save_state};
