//! Core types and trait definitions for the Cohort season, task and feedback
//! tracker.
//!
//! No HTTP or database code lives here; backends implement
//! [`store::Store`] and the API layer consumes it.

pub mod comment;
pub mod error;
pub mod events;
pub mod group;
pub mod participant;
pub mod season;
pub mod seeding;
pub mod store;

pub use error::{Error, Result};
