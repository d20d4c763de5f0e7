//! Common test utilities for droughtmap.
//!
//! Shared fixtures (GeoTIFF writers), HTTP helpers and assertions used by
//! the integration tests.
#![allow(dead_code)]

pub mod assertions;
pub mod http_client;
pub mod test_data;
