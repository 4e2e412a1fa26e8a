pub mod app;
pub mod authz;
pub mod badges;
pub mod catalog;
pub mod context;
pub mod db;
pub mod docs;
pub mod errors;
pub mod events;
pub mod forms;
pub mod jwt;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod storage;
pub mod utils;

// Re-export commonly used items for tests
pub use app::{create_app, create_app_with, AppState};
