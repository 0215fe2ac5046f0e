//! Decoded attachment parts.

/// An attachment extracted from a message body.
///
/// `contents` is already transfer-decoded (base64, quoted-printable) and
/// ready to be written to disk byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename declared by the sender. Generated if missing from the headers.
    pub filename: String,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,

    /// Decoded payload.
    pub contents: Vec<u8>,
}

impl Attachment {
    /// Decoded size in bytes.
    pub fn size(&self) -> usize {
        self.contents.len()
    }
}
