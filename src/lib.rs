//! # apod
//!
//! Download the Astronomy Picture of the Day, keep a bounded local cache
//! of saved pictures, and set the most recent one as desktop wallpaper.
//!
//! ## Architecture
//!
//! - **fetch**: HTTP transport (text and raw bytes, 404-aware)
//! - **site**: dated-page traversal and parsing
//! - **store**: bounded picture store with recency-based trimming
//! - **picture**: image decode, normalization and re-encoding
//! - **wallpaper**: best-effort desktop integration
//! - **config**: configuration loading

pub mod config;
pub mod fetch;
pub mod picture;
pub mod site;
pub mod store;
pub mod wallpaper;
