pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
