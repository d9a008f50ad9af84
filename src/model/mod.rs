pub mod board;
pub mod config;
pub mod fields;
pub mod task;

pub use board::*;
pub use config::*;
pub use fields::*;
pub use task::*;
