//! qx-rest: XNAT REST adapter for the qx CLI
//!
//! This crate provides the implementation of the Repository trait over the
//! XNAT REST API using reqwest. It is the only crate that talks HTTP.

pub mod client;
pub mod result_set;

pub use client::XnatClient;
