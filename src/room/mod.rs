// Public API - what other modules can use
pub use handlers::{create_room, get_room, list_rooms};
pub use expiry_task::{start_expiry_task, ExpiryConfig};

// Internal modules
pub mod code;
pub mod expiry_task;
mod handlers;
pub mod models;
pub mod repository;
mod service;
pub mod types;
