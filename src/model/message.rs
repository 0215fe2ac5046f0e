//! Metadata streamed back by a batch fetch.

/// One message as reported by a `FETCH <range> (UID ENVELOPE BODYSTRUCTURE)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    /// Sequence number inside the selected mailbox.
    pub seq: u32,

    /// Server-assigned UID, the key stored in the ledger.
    pub uid: u32,

    /// Envelope subject with RFC 2047 encoded words decoded, empty if absent.
    pub subject: String,
}
