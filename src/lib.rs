pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod seed;
pub mod state;
pub mod stats;
pub mod storage;
pub mod store;
pub mod tracking;
