//! Save attachments to the destination directory.
//!
//! Existing files are never overwritten: a colliding name gets a
//! `YYYYMMDD_HHMMSS_` prefix, and if that is taken too, a counter suffix.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{Result, SaveError};
use crate::model::attachment::Attachment;

/// `strftime` format of the collision prefix.
pub const COLLISION_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Longest declared filename, in UTF-8 bytes. Leaves room under the
/// usual 255-byte component limit for the collision prefix and counter.
const MAX_FILENAME_BYTES: usize = 200;

/// Extensions longer than this are not worth preserving on truncation.
const MAX_EXTENSION_BYTES: usize = 16;

/// Write `attachment` under `dest_dir`, returning the path actually used.
pub fn save_attachment(dest_dir: &Path, attachment: &Attachment) -> Result<PathBuf> {
    save_attachment_at(dest_dir, attachment, Local::now())
}

/// Same as [`save_attachment`] with an explicit clock, for the collision prefix.
pub fn save_attachment_at(
    dest_dir: &Path,
    attachment: &Attachment,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    let filename = sanitize_filename(&attachment.filename, MAX_FILENAME_BYTES);
    let timestamp = now.format(COLLISION_TIMESTAMP_FORMAT).to_string();

    let mut attempt = 0u32;
    loop {
        let path = dest_dir.join(candidate_name(&filename, &timestamp, attempt));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(&attachment.contents)
                    .and_then(|()| file.flush())
                    .map_err(|e| SaveError::io(&path, e))?;
                tracing::info!(
                    path = %path.display(),
                    size = attachment.size(),
                    content_type = %attachment.content_type,
                    "Saved attachment"
                );
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "Name taken, trying next candidate");
                attempt = attempt
                    .checked_add(1)
                    .ok_or_else(|| SaveError::io(&path, e))?;
            }
            Err(e) => return Err(SaveError::io(&path, e)),
        }
    }
}

/// The name tried on the given attempt.
///
/// 0 → `name`, 1 → `{ts}_name`, n ≥ 2 → `{ts}_{stem}_{n-1}.{ext}`.
fn candidate_name(filename: &str, timestamp: &str, attempt: u32) -> String {
    match attempt {
        0 => filename.to_string(),
        1 => format!("{timestamp}_{filename}"),
        n => {
            let counter = n - 1;
            match filename.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => {
                    format!("{timestamp}_{stem}_{counter}.{ext}")
                }
                _ => format!("{timestamp}_{filename}_{counter}"),
            }
        }
    }
}

/// Sanitize a declared attachment name for use as a single path component.
///
/// Path separators, control characters and characters reserved on Windows
/// become `_`; leading dots are dropped so nothing hidden or relative
/// (`..`) is produced. The result is at most `max_bytes` UTF-8 bytes, cut
/// on a character boundary with a short extension kept intact.
pub fn sanitize_filename(name: &str, max_bytes: usize) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            {
                '_'
            } else {
                c
            }
        })
        .skip_while(|&c| c == '.' || c.is_whitespace())
        .collect();

    let sanitized = truncate_keeping_extension(sanitized.trim_end(), max_bytes);
    let sanitized = sanitized.trim_end();
    if sanitized.is_empty() {
        "attachment".to_string()
    } else {
        sanitized.to_string()
    }
}

/// Cut `name` to `max_bytes`, shortening the stem rather than the extension.
fn truncate_keeping_extension(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    if let Some((stem, ext)) = name.rsplit_once('.') {
        let ext_len = ext.len() + 1;
        if !stem.is_empty() && ext.len() <= MAX_EXTENSION_BYTES && ext_len < max_bytes {
            let stem = truncate_at_char_boundary(stem, max_bytes - ext_len);
            return format!("{}.{ext}", stem.trim_end());
        }
    }
    truncate_at_char_boundary(name, max_bytes).to_string()
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn att(name: &str, body: &[u8]) -> Attachment {
        Attachment {
            filename: name.to_string(),
            content_type: "application/pdf".to_string(),
            contents: body.to_vec(),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf", 50), "report.pdf");
        assert_eq!(sanitize_filename("my report.pdf", 50), "my report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd", 50), "_.._etc_passwd");
        assert_eq!(sanitize_filename("a/b\\c:d*e", 20), "a_b_c_d_e");
        assert_eq!(sanitize_filename(".hidden", 20), "hidden");
        assert_eq!(sanitize_filename("..", 20), "attachment");
        assert_eq!(sanitize_filename("", 20), "attachment");
        assert_eq!(sanitize_filename("abcdef", 3), "abc");
        assert_eq!(sanitize_filename("abcdef.pdf", 7), "abc.pdf");
    }

    #[test]
    fn test_sanitize_multibyte_name_fits_in_bytes() {
        let name = format!("{}.pdf", "報".repeat(100));
        assert_eq!(name.len(), 304);

        let sanitized = sanitize_filename(&name, MAX_FILENAME_BYTES);
        assert!(sanitized.len() <= MAX_FILENAME_BYTES);
        assert!(sanitized.ends_with(".pdf"));
        assert!(sanitized.starts_with('報'));

        // Never split a character, even without an extension to keep.
        let bare = sanitize_filename(&"報".repeat(100), 10);
        assert_eq!(bare, "報報報");
    }

    #[test]
    fn test_long_multibyte_name_saves_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let name = format!("{}.pdf", "報".repeat(100));

        let first = save_attachment_at(dir.path(), &att(&name, b"one"), fixed_now()).unwrap();
        let second = save_attachment_at(dir.path(), &att(&name, b"two"), fixed_now()).unwrap();
        let third = save_attachment_at(dir.path(), &att(&name, b"three"), fixed_now()).unwrap();

        for path in [&first, &second, &third] {
            let file_name = path.file_name().unwrap().to_str().unwrap();
            assert!(file_name.len() < 255, "{file_name} too long");
            assert!(file_name.ends_with(".pdf"));
        }
        assert!(second
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("20240309_140507_"));
        assert_eq!(std::fs::read(&third).unwrap(), b"three");
    }

    #[test]
    fn test_candidate_names() {
        let ts = "20240309_140507";
        assert_eq!(candidate_name("report.pdf", ts, 0), "report.pdf");
        assert_eq!(candidate_name("report.pdf", ts, 1), "20240309_140507_report.pdf");
        assert_eq!(candidate_name("report.pdf", ts, 2), "20240309_140507_report_1.pdf");
        assert_eq!(candidate_name("README", ts, 3), "20240309_140507_README_2");
    }

    #[test]
    fn test_first_write_uses_declared_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_attachment_at(dir.path(), &att("report.pdf", b"one"), fixed_now()).unwrap();
        assert_eq!(path, dir.path().join("report.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"one");
    }

    #[test]
    fn test_collision_gets_timestamp_prefix() {
        let dir = tempfile::tempdir().unwrap();
        save_attachment_at(dir.path(), &att("report.pdf", b"one"), fixed_now()).unwrap();
        let second =
            save_attachment_at(dir.path(), &att("report.pdf", b"two"), fixed_now()).unwrap();
        assert_eq!(second, dir.path().join("20240309_140507_report.pdf"));
        assert_eq!(std::fs::read(dir.path().join("report.pdf")).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn test_same_second_collision_gets_counter() {
        let dir = tempfile::tempdir().unwrap();
        for body in [b"1", b"2", b"3"] {
            save_attachment_at(dir.path(), &att("report.pdf", body), fixed_now()).unwrap();
        }
        let third = dir.path().join("20240309_140507_report_1.pdf");
        assert_eq!(std::fs::read(third).unwrap(), b"3");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = save_attachment_at(&missing, &att("x.bin", b"x"), fixed_now()).unwrap_err();
        assert!(matches!(err, SaveError::Io { .. }));
    }
}
