//! Storewatch library - store uptime/downtime reporting
//!
//! This module exports internal components for integration testing.

pub mod calendar;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod ingest;
pub mod jobs;
pub mod model;
pub mod report;
pub mod timeline;
