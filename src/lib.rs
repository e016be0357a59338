pub mod config;
pub mod errors;
pub mod generation;
pub mod hosting;
pub mod models;
pub mod registry;
pub mod store;
pub mod ui;
pub mod util;
pub mod workflow;
