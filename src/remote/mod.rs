//! Remote calendar API integration.
//!
//! This module provides the client and types for talking to the Graph-style
//! calendar API: a paginated calendar-view endpoint for date-bounded fetches
//! and a delta endpoint for token-based differential fetches.

/// HTTP client and the `CalendarSource` boundary trait
mod client;
/// Type definitions for the calendar API wire format
mod types;

pub use client::{CalendarSource, GraphCalendarClient};
pub use types::*;
