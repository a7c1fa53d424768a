pub mod error;
pub mod file_lock;

pub use error::{AppError, Result};
pub use file_lock::FileLock;
