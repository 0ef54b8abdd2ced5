// src/lib.rs

//! Viager listing watcher library
//!
//! Detects listings newly published in a site's sitemap, remembers every
//! identifier ever seen, and fetches detail records for the new ones.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
