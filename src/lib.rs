pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod henrik;
pub mod middleware;
pub mod models;
pub mod oauth;
pub mod routes;
pub mod state;
