//! Gateway that asks a text-generation provider for university timetables,
//! keeps only the structurally complete ones, and reports teacher and room
//! double-bookings across the batch.
//!
//! The checking core lives in [`validator`] and [`conflicts`]; both are pure
//! and never fail on malformed provider output.

pub mod config;
pub mod conflicts;
pub mod data;
pub mod error;
pub mod provider;
pub mod server;
pub mod validator;

#[cfg(test)]
mod fixtures;
