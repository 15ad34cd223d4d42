pub mod bot;
pub mod config;
pub mod disk;
pub mod error;
pub mod index;
pub mod likes;
pub mod loader;
pub mod model;
