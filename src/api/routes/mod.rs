//! API Routes
//!
//! Route handlers organized by functionality.

pub mod files;
pub mod health;
pub mod search;
