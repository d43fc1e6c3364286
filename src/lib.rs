// Export modules for use in tests
pub mod compare;
pub mod error;
pub mod panic_handler;
pub mod settings;
pub mod sync;

pub use compare::{CompareOperation, CompareResult, OperationStatus};
pub use error::{CompareError, ErrorCode, Result};
pub use sync::{Command, Effect, SyncController};
