//! `imapsave` — download every attachment from an IMAP folder.
//!
//! This crate walks a mailbox in fixed-size batches, saves each message's
//! attachment parts to a local directory, and records processed UIDs in an
//! append-only ledger so that interrupted or repeated runs resume safely.

pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod imap;
pub mod ledger;
pub mod model;
pub mod parser;

pub use error::{Result, SaveError};
pub use fetch::{run, RunSummary};
