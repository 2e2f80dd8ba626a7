//! Opportunity Matcher - recommendation engine for students.
//!
//! Ranks job postings and mentors for a student by combining a weighted
//! content score with a collaborative adjustment drawn from similar
//! students, and serves the results through a coalescing cache that
//! behavior events invalidate.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
