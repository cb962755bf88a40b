// Library exports for the six-cities rental backend.
// Integration tests drive the router through these modules.

pub mod adapters;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod uploads;
pub mod validation;
