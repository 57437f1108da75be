//! Home battery state-of-charge simulation and time-of-use tariff economics.

pub mod analysis;
pub mod battery;
pub mod cli;
pub mod config;
/// Cost aggregation and billing reconciliation.
pub mod cost;
pub mod error;
pub mod finance;
/// Reading loaders and report export.
pub mod io;
pub mod reading;
pub mod reporting;
/// Battery simulation engine, policies, and summary statistics.
pub mod sim;
pub mod tariff;
