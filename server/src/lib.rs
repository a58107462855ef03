pub mod api;
pub mod app;
pub mod availability;
pub mod config;
pub mod error;
pub mod migrate;
pub mod mongo_ext;
pub mod stripe;
pub mod util;
