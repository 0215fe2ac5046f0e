//! Core data model types: batch ranges, fetched message metadata, and attachments.

pub mod attachment;
pub mod batch;
pub mod message;
