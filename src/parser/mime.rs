//! MIME message parsing: attachment classification and extraction.

use mail_parser::{MessageParser, MimeHeaders};

use crate::model::attachment::Attachment;

/// Parse a complete raw message and return its attachment parts in order.
///
/// Uses `mail-parser` internally, which takes care of transfer decoding and
/// of RFC 2047 / RFC 2231 encoded filenames. Parts whose
/// `Content-Disposition` is `inline` belong to the message body and are
/// skipped. Returns `None` if the bytes are not a message at all.
pub fn extract_attachments(raw_message: &[u8]) -> Option<Vec<Attachment>> {
    let parser = MessageParser::default();
    let msg = parser.parse(raw_message)?;
    Some(attachments_from_parsed(&msg))
}

/// Decode a raw header value such as an IMAP envelope subject.
///
/// RFC 2047 encoded words (`=?utf-8?Q?...?=`) are decoded by letting
/// `mail-parser` read the value as a `Subject:` header. Anything it cannot
/// make sense of is returned as lossy UTF-8.
pub fn decode_header_text(raw: &[u8]) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let mut header = Vec::with_capacity(raw.len() + 13);
    header.extend_from_slice(b"Subject: ");
    header.extend_from_slice(raw);
    header.extend_from_slice(b"\r\n\r\n");

    MessageParser::default()
        .parse(header.as_slice())
        .and_then(|msg| msg.subject().map(String::from))
        .unwrap_or_else(|| String::from_utf8_lossy(raw).into_owned())
}

/// Build [`Attachment`]s from a parsed `mail_parser::Message`.
fn attachments_from_parsed(msg: &mail_parser::Message<'_>) -> Vec<Attachment> {
    let mut result = Vec::new();

    for (idx, part) in msg.attachments().enumerate() {
        let is_inline = part
            .content_disposition()
            .map(|d: &mail_parser::ContentType| d.ctype().eq_ignore_ascii_case("inline"))
            .unwrap_or(false);
        if is_inline {
            tracing::trace!(index = idx, "Skipping inline part");
            continue;
        }

        let filename = part
            .attachment_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .unwrap_or_else(|| format!("attachment_{idx}"));

        let content_type = part
            .content_type()
            .map(|ct: &mail_parser::ContentType| {
                let main = ct.ctype();
                match ct.subtype() {
                    Some(sub) => format!("{main}/{sub}"),
                    None => main.to_string(),
                }
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        result.push(Attachment {
            filename,
            content_type,
            contents: part.contents().to_vec(),
        });
    }

    result
}
