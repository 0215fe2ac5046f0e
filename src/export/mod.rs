//! Writing extracted attachments to the destination directory.

pub mod attachment;
