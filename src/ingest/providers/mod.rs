// src/ingest/providers/mod.rs
pub mod structured;
pub mod usgs_feed;
