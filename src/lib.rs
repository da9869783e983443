pub mod asset;
pub mod config;
pub mod io;
pub mod loader;
mod util;
