//! Email parsing: splitting a fetched message body into its attachment parts.

pub mod mime;
