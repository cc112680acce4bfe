//! flatwatch - daily apartment listing crawler.
//!
//! Collects the listings published on a target day from a classifieds
//! search, enriches each ad from its detail page, and flags probable
//! re-listings against a persisted fingerprint history.

pub mod cli;
pub mod config;
pub mod crawl;
pub mod extract;
pub mod fetcher;
pub mod models;
pub mod report;
pub mod repository;
