pub mod logger;

pub use crate::{debug, error, info, warn};
pub use logger::{log, LogLevel};
