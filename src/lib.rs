pub mod auth;
pub mod coerce;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod n8n;
pub mod routes;
pub mod store;
pub mod tracking;
