//! API endpoint handlers module
//!
//! Contains all HTTP endpoint handler implementations.

pub mod access;
pub mod health;
pub mod images;
pub mod license;
pub mod products;
pub mod tools;
