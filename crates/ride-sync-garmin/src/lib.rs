//! Garmin Connect sink client: login, recent-activity listing for
//! duplicate comparison, and FIT file upload.

pub mod client;

pub use client::{GarminClient, GarminConfig};
