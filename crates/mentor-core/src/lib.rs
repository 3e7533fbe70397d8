//! Core types and trait definitions for the mentor-match backend.
//!
//! This crate is deliberately free of HTTP server and database dependencies.
//! It owns the CRM facade traits, the session store trait, the match workflow
//! and the report reshaping; concrete backends live in sibling crates.

pub mod contact;
pub mod crm;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod report;
pub mod session;
pub mod soql;
pub mod workflow;

pub use error::{Error, Result};
