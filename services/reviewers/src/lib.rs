//! Reviewer assignment service library.
//!
//! This crate primarily ships a `reviewers` binary, but we expose the
//! engine, the stores and the router to enable integration testing and
//! reuse.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod state;
pub mod store;
