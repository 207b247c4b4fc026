pub mod config;
pub mod models;
pub mod transcribe;

pub use config::*;
pub use models::*;
pub use transcribe::*;
