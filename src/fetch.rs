//! Batch fetch/process loop.
//!
//! The mailbox's sequence numbers are walked in fixed-size batches. Each
//! batch's metadata is streamed through a bounded channel; the consumer
//! drains that channel completely before it looks at the fetch result, so a
//! producer blocked on a full channel can never deadlock against a consumer
//! waiting for completion. Messages not yet in the ledger are then fetched
//! one by one, their attachments written, and their UID recorded.

use std::future::Future;
use std::path::Path;

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::error::{Result, SaveError};
use crate::export::attachment::save_attachment;
use crate::imap::MailSession;
use crate::ledger::Ledger;
use crate::model::batch::{batches, BatchRange};
use crate::model::message::MessageMeta;
use crate::parser::mime::extract_attachments;

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Metadata fetches issued.
    pub batches: u32,
    /// Messages reported by the server.
    pub seen: u32,
    /// Messages skipped because the ledger already had them.
    pub skipped: u32,
    /// Messages processed in this run.
    pub processed: u32,
    /// Attachment files written.
    pub attachments: u32,
}

/// Full run: load the ledger, prepare the destination, connect, process.
///
/// The ledger is loaded before `connect` is called, so a corrupt ledger
/// fails the run without touching the network.
pub async fn run<S, F, Fut>(settings: &Settings, connect: F) -> Result<RunSummary>
where
    S: MailSession,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S>>,
{
    let mut ledger = Ledger::load_in(&settings.destination_dir)?;

    std::fs::create_dir_all(&settings.destination_dir)
        .map_err(|e| SaveError::io(&settings.destination_dir, e))?;

    let mut session = connect().await?;
    process_folder(&mut session, settings, &mut ledger).await
}

/// Select the configured folder, process every batch, and log out.
///
/// Logout is attempted on every path; when processing failed, its error
/// wins over a logout error.
pub async fn process_folder<S: MailSession>(
    session: &mut S,
    settings: &Settings,
    ledger: &mut Ledger,
) -> Result<RunSummary> {
    let result = process_batches(session, settings, ledger).await;

    match (result, session.logout().await) {
        (Ok(summary), Ok(())) => {
            tracing::info!("Logged out");
            Ok(summary)
        }
        (Ok(_), Err(e)) => Err(e),
        (Err(e), logout) => {
            if let Err(logout_err) = logout {
                tracing::debug!(error = %logout_err, "Logout after failure also failed");
            }
            Err(e)
        }
    }
}

async fn process_batches<S: MailSession>(
    session: &mut S,
    settings: &Settings,
    ledger: &mut Ledger,
) -> Result<RunSummary> {
    let total = session.select(&settings.folder).await?;
    tracing::info!(folder = %settings.folder, total, "Mailbox selected");

    let mut summary = RunSummary::default();
    if total == 0 {
        tracing::info!(folder = %settings.folder, "No messages in mailbox");
        return Ok(summary);
    }

    for range in batches(total, settings.batch_size) {
        tracing::info!(range = %range, "Fetching messages");
        let seen = drain_batch(session, range, settings.batch_size).await?;
        summary.batches += 1;

        for meta in seen {
            summary.seen += 1;
            if ledger.contains(meta.uid) {
                tracing::debug!(uid = meta.uid, "Message already processed, skipping");
                summary.skipped += 1;
                continue;
            }

            tracing::info!(uid = meta.uid, seq = meta.seq, subject = %meta.subject, "Processing message");
            let written = process_message(session, &settings.destination_dir, meta.uid).await?;
            ledger.record(meta.uid)?;
            summary.processed += 1;
            summary.attachments += written;
        }
        tracing::info!(range = %range, "Batch processed");
    }

    Ok(summary)
}

/// Run one metadata fetch and collect everything it yields, in server order.
///
/// The producer's result is inspected only after the channel has been
/// drained to closure.
pub async fn drain_batch<S: MailSession>(
    session: &mut S,
    range: BatchRange,
    capacity: u32,
) -> Result<Vec<MessageMeta>> {
    let (tx, mut rx) = mpsc::channel(capacity.max(1) as usize);

    let producer = session.fetch_metadata(range, tx);
    let consumer = async {
        let mut seen = Vec::new();
        while let Some(meta) = rx.recv().await {
            seen.push(meta);
        }
        seen
    };

    let (done, seen) = tokio::join!(producer, consumer);
    done?;
    Ok(seen)
}

/// Fetch one message body and save all its attachments.
///
/// Returns the number of files written.
pub async fn process_message<S: MailSession>(
    session: &mut S,
    dest_dir: &Path,
    uid: u32,
) -> Result<u32> {
    let body = session.fetch_body(uid).await?;
    let attachments = extract_attachments(&body).ok_or(SaveError::Parse { uid })?;

    let mut written = 0;
    for attachment in &attachments {
        save_attachment(dest_dir, attachment)?;
        written += 1;
    }
    if written == 0 {
        tracing::debug!(uid, "No attachments");
    }
    Ok(written)
}
