//! Type definitions module.
//!
//! Contains shared types used across the application.

pub mod price;
pub mod round;

pub use price::*;
pub use round::*;
