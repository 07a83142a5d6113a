//! GWatch data pipeline
//!
//! Concurrent ingestion of National Assembly politicians, bills, legislative
//! notices and citizen opinions into a relational store.

pub mod application;
pub mod crawling;
pub mod domain;
pub mod infrastructure;
