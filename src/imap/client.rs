//! `async-imap` session over implicit TLS (`tokio-rustls`).

use std::sync::Arc;

use async_imap::Session;
use async_trait::async_trait;
use futures::TryStreamExt;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use super::MailSession;
use crate::config::Settings;
use crate::error::{Result, SaveError};
use crate::model::batch::BatchRange;
use crate::model::message::MessageMeta;
use crate::parser::mime::decode_header_text;

type ImapSession = Session<TlsStream<TcpStream>>;

/// Items requested by the per-batch metadata fetch.
const METADATA_QUERY: &str = "(UID ENVELOPE BODYSTRUCTURE)";

/// Full body, without setting `\Seen`.
const BODY_QUERY: &str = "BODY.PEEK[]";

/// A logged-in IMAP session.
pub struct ImapClient {
    session: ImapSession,
}

impl ImapClient {
    /// Connect over TLS and log in with the configured credentials.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let server = &settings.server;
        let tcp = TcpStream::connect((server.host.as_str(), server.port))
            .await
            .map_err(|e| SaveError::Connect {
                server: server.to_string(),
                source: e,
            })?;

        let server_name = ServerName::try_from(server.host.clone())
            .map_err(|e| SaveError::Tls(format!("invalid server name '{}': {e}", server.host)))?;
        let tls = create_tls_connector()
            .connect(server_name, tcp)
            .await
            .map_err(|e| SaveError::Tls(e.to_string()))?;
        tracing::info!(server = %server, "Connected");

        let client = async_imap::Client::new(tls);
        let session = client
            .login(&settings.username, &settings.password)
            .await
            .map_err(|(e, _)| SaveError::Login {
                user: settings.username.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!(server = %server, user = %settings.username, "Logged in");

        Ok(Self { session })
    }
}

/// Creates a TLS connector trusting the webpki root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

#[async_trait]
impl MailSession for ImapClient {
    async fn select(&mut self, folder: &str) -> Result<u32> {
        let mailbox = self
            .session
            .select(folder)
            .await
            .map_err(|e| SaveError::Select {
                folder: folder.to_string(),
                reason: e.to_string(),
            })?;
        Ok(mailbox.exists)
    }

    async fn fetch_metadata(
        &mut self,
        range: BatchRange,
        tx: mpsc::Sender<MessageMeta>,
    ) -> Result<()> {
        let stream = self
            .session
            .fetch(range.to_sequence_set(), METADATA_QUERY)
            .await
            .map_err(SaveError::fetch)?;
        futures::pin_mut!(stream);

        while let Some(fetch) = stream.try_next().await.map_err(SaveError::fetch)? {
            let uid = fetch.uid.ok_or_else(|| {
                SaveError::Fetch(format!("no UID in FETCH response for message {}", fetch.message))
            })?;
            let subject = fetch
                .envelope()
                .and_then(|env| env.subject.as_ref())
                .map(|s| decode_header_text(s))
                .unwrap_or_default();

            let meta = MessageMeta {
                seq: fetch.message,
                uid,
                subject,
            };
            if tx.send(meta).await.is_err() {
                return Err(SaveError::Fetch("metadata consumer stopped early".into()));
            }
        }
        Ok(())
    }

    async fn fetch_body(&mut self, uid: u32) -> Result<Vec<u8>> {
        let mut body = None;
        {
            let stream = self
                .session
                .uid_fetch(uid.to_string(), BODY_QUERY)
                .await
                .map_err(SaveError::fetch)?;
            futures::pin_mut!(stream);

            // Drain the whole response even after the body has been seen
            while let Some(fetch) = stream.try_next().await.map_err(SaveError::fetch)? {
                if body.is_none() && fetch.uid.is_none_or(|u| u == uid) {
                    body = fetch.body().map(<[u8]>::to_vec);
                }
            }
        }
        body.ok_or(SaveError::MissingBody(uid))
    }

    async fn logout(&mut self) -> Result<()> {
        self.session
            .logout()
            .await
            .map_err(|e| SaveError::Logout(e.to_string()))
    }
}
