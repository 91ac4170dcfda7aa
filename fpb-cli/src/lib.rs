//! # fpb-cli
//!
//! Command-line front end for the fpb device server: file upload and
//! download, folder upload, and compile-and-inject of patch sources.

pub mod config;
pub mod connection;
pub mod console;
