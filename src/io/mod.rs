pub mod common;
pub mod file;
pub mod memory;
