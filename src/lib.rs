//! Filter, summarise and aggregate a tabular sales dataset for a dashboard.
//!
//! [`data`] holds the pipeline itself; [`state`] and [`report`] drive it for
//! one interaction at a time.

pub mod config;
pub mod data;
pub mod report;
pub mod state;
