pub mod engine;
pub mod event;
pub mod file_store;
pub mod questions;
pub mod store;
