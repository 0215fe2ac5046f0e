//! Mail transport seam.
//!
//! The batch loop only talks to a [`MailSession`]; [`client::ImapClient`]
//! implements it on top of `async-imap`, tests implement it in memory.

pub mod client;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::model::batch::BatchRange;
use crate::model::message::MessageMeta;

/// An authenticated mail session.
#[async_trait]
pub trait MailSession: Send {
    /// Select `folder` and return its message count.
    async fn select(&mut self, folder: &str) -> Result<u32>;

    /// Fetch UID, envelope and structure for every message in `range`,
    /// sending each one into `tx` as the server streams it.
    ///
    /// Returns when the server has completed the command. `tx` is dropped
    /// on return, which closes the channel for the consumer.
    async fn fetch_metadata(
        &mut self,
        range: BatchRange,
        tx: mpsc::Sender<MessageMeta>,
    ) -> Result<()>;

    /// Fetch the full raw body of the message with `uid`.
    ///
    /// Fails with [`crate::error::SaveError::MissingBody`] if the server
    /// returns no body for it.
    async fn fetch_body(&mut self, uid: u32) -> Result<Vec<u8>>;

    /// End the session.
    async fn logout(&mut self) -> Result<()>;
}
