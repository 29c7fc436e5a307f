//! Stride - progress tracking and exactly-once rewards for plan-based content
//!
//! This crate provides the core engine behind plan progress and
//! gamification: start a multi-item plan, toggle items, detect
//! completion, and credit points exactly once per qualifying event even
//! under client retries and concurrent requests.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`content`] - Content collaborator interface (item id lists)
//! - [`engine`] - Lifecycle gate, event dispatcher, streak calculator
//! - [`model`] - Data types (`PlanProgress`, `LedgerEntry`, outcomes)
//! - [`storage`] - SQLite database layer
//! - [`config`] - Database and actor resolution
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod model;
pub mod storage;

pub use engine::Engine;
pub use error::{Error, Result};
