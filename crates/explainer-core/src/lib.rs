pub mod config_manager;
pub mod error;

pub use config_manager::*;
pub use error::*;
