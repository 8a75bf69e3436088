//! drivetest-core — Question banks, selection, grading and exam engine.
//!
//! This crate defines the data model, the progress store trait and the
//! practice engines that the drivetest CLI builds on.

pub mod bank;
pub mod config;
pub mod error;
pub mod exam;
pub mod grading;
pub mod mnemonics;
pub mod model;
pub mod progress;
pub mod selection;
pub mod statistics;
pub mod topics;

#[cfg(test)]
mod test_support;
