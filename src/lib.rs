pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod game;

pub use error::{GameError, Result};
