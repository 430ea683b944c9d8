//! services/api/src/lib.rs
//!
//! The HTTP service for course and professor ratings: adapters for the
//! database, the auth provider and the shared rate limiter, plus the web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
