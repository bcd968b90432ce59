#![warn(missing_docs)]
//! A toolkit for normalizing multibeam water column data
//!
//! Vendor files are decoded by the parsers in [`parser`] into [`model::Ping`]s,
//! which can be stored in and read back from the Generic Water Column Format
//! ([`gwf`]).
pub mod binary;
pub mod cli;
pub mod config;
pub mod error;
pub mod gwf;
pub mod locker;
pub mod model;
pub mod parser;
