//! Beijing Gas API Library
//!
//! This library fetches gas account data (balance, tiered pricing, usage
//! history) from the Beijing Gas mobile API and publishes it to a home
//! automation hub as periodically refreshed sensor readings.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `coordinator`: Periodic refresh and latest snapshot.
//! - `de`: Lenient coercion of vendor fields.
//! - `errors`: Error handling types.
//! - `gas_client`: Beijing Gas API client.
//! - `handlers`: HTTP request handlers.
//! - `models`: Credentials, wire and facet models.
//! - `sensors`: Sensor descriptors and readings.

pub mod config;
pub mod coordinator;
pub mod de;
pub mod errors;
pub mod gas_client;
pub mod handlers;
pub mod models;
pub mod sensors;
