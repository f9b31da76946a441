//! Request Tracker (RT) REST 1.0 client.
//!
//! RT's REST 1.0 interface is form-based: requests carry a `content` field in
//! RFC822-like `Key: value` form, responses start with a status line such as
//! `RT/4.4.3 200 Ok` followed by a `# ...` message line. Authentication is a
//! form login that sets a session cookie, so each [`RtClient`] owns its own
//! cookie jar.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::{Certificate, Url};
use tracing::debug;

use super::{
    Attachment, NewTicket, TicketError, TicketReply, TicketingClient, TicketingConnector,
};
use crate::types::TicketId;

/// How the RT server's TLS certificate is checked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TlsVerification {
    /// Verify against the platform's trust roots.
    #[default]
    Enabled,
    /// Accept any certificate.
    Disabled,
    /// Additionally trust the PEM bundle at this path.
    CaBundle(PathBuf),
}

impl TlsVerification {
    /// Interprets the `RT_CA_CERT` setting: unset or `true` verifies normally,
    /// `false` disables verification, anything else is a CA bundle path.
    pub fn from_setting(setting: Option<&str>) -> Self {
        match setting.map(str::trim) {
            None | Some("") => TlsVerification::Enabled,
            Some(s) if s.eq_ignore_ascii_case("true") || s == "1" => TlsVerification::Enabled,
            Some(s) if s.eq_ignore_ascii_case("false") || s == "0" => TlsVerification::Disabled,
            Some(path) => TlsVerification::CaBundle(PathBuf::from(path)),
        }
    }
}

/// Connection settings for an RT instance.
#[derive(Clone)]
pub struct RtConfig {
    /// REST root, e.g. `https://rt.example.com/REST/1.0/`.
    pub base_url: String,
    pub user: String,
    pub password: String,
    /// Queue new tickets are filed in.
    pub queue: String,
    pub tls: TlsVerification,
}

impl std::fmt::Debug for RtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtConfig")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("queue", &self.queue)
            .field("tls", &self.tls)
            .finish()
    }
}

struct RtSettings {
    base_url: Url,
    user: String,
    password: String,
    queue: String,
    tls: TlsVerification,
    root_cert: Option<Certificate>,
}

/// Creates one [`RtClient`] per invocation from shared settings.
#[derive(Clone)]
pub struct RtConnector {
    settings: Arc<RtSettings>,
}

impl std::fmt::Debug for RtConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtConnector")
            .field("base_url", &self.settings.base_url.as_str())
            .field("queue", &self.settings.queue)
            .finish_non_exhaustive()
    }
}

impl RtConnector {
    /// Validates the base URL and loads the CA bundle, if any.
    pub fn new(config: RtConfig) -> Result<Self, TicketError> {
        let base_url = parse_base_url(&config.base_url)?;

        let root_cert = match &config.tls {
            TlsVerification::CaBundle(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    TicketError::Config(format!("reading CA bundle {}: {e}", path.display()))
                })?;
                let cert = Certificate::from_pem(&pem).map_err(|e| {
                    TicketError::Config(format!("parsing CA bundle {}: {e}", path.display()))
                })?;
                Some(cert)
            }
            TlsVerification::Enabled | TlsVerification::Disabled => None,
        };

        Ok(Self {
            settings: Arc::new(RtSettings {
                base_url,
                user: config.user,
                password: config.password,
                queue: config.queue,
                tls: config.tls,
                root_cert,
            }),
        })
    }
}

impl TicketingConnector for RtConnector {
    type Client = RtClient;

    fn connect(&self) -> Result<RtClient, TicketError> {
        let mut builder = reqwest::Client::builder().cookie_store(true);

        match &self.settings.tls {
            TlsVerification::Enabled => {}
            TlsVerification::Disabled => builder = builder.danger_accept_invalid_certs(true),
            TlsVerification::CaBundle(_) => {
                if let Some(cert) = &self.settings.root_cert {
                    builder = builder.add_root_certificate(cert.clone());
                }
            }
        }

        Ok(RtClient {
            http: builder.build()?,
            settings: Arc::clone(&self.settings),
        })
    }
}

/// A single RT session. Obtain one from [`RtConnector::connect`].
pub struct RtClient {
    http: reqwest::Client,
    settings: Arc<RtSettings>,
}

impl RtClient {
    fn endpoint(&self, path: &str) -> Result<Url, TicketError> {
        self.settings
            .base_url
            .join(path)
            .map_err(|e| TicketError::Config(format!("building URL for {path}: {e}")))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, TicketError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TicketError::HttpStatus {
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn post_multipart(
        &self,
        path: &str,
        content: String,
        attachments: &[Attachment],
    ) -> Result<String, TicketError> {
        let mut form = Form::new().text("content", content);
        for (index, attachment) in attachments.iter().enumerate() {
            let part = Part::text(attachment.content.clone())
                .file_name(attachment.filename.clone())
                .mime_str(&attachment.mime_type)?;
            form = form.part(format!("attachment_{}", index + 1), part);
        }

        let url = self.endpoint(path)?;
        self.send(self.http.post(url).multipart(form)).await
    }
}

impl TicketingClient for RtClient {
    async fn login(&self) -> Result<bool, TicketError> {
        let url = self.endpoint("")?;
        let body = self
            .send(self.http.post(url).form(&[
                ("user", self.settings.user.as_str()),
                ("pass", self.settings.password.as_str()),
            ]))
            .await?;

        debug!(status_line = first_line(&body), "RT login response");
        Ok(is_ok_status(&body))
    }

    async fn create(&self, ticket: &NewTicket) -> Result<Option<TicketId>, TicketError> {
        let attachment_names = attachment_field(&ticket.attachments);
        let mut fields = vec![
            ("id", "ticket/new"),
            ("Queue", self.settings.queue.as_str()),
            ("Requestor", ticket.requestor.as_str()),
            ("Subject", ticket.subject.as_str()),
            ("Text", ticket.text.as_str()),
        ];
        if !attachment_names.is_empty() {
            fields.push(("Attachment", attachment_names.as_str()));
        }

        let body = self
            .post_multipart("ticket/new", format_content(&fields), &ticket.attachments)
            .await?;

        if !is_ok_status(&body) {
            return Ok(None);
        }
        Ok(parse_created_ticket(&body))
    }

    async fn reply(&self, ticket: TicketId, reply: &TicketReply) -> Result<bool, TicketError> {
        let id = ticket.to_string();
        let attachment_names = attachment_field(&reply.attachments);
        let mut fields = vec![
            ("id", id.as_str()),
            ("Action", "correspond"),
            ("Text", reply.text.as_str()),
        ];
        if !attachment_names.is_empty() {
            fields.push(("Attachment", attachment_names.as_str()));
        }

        let body = self
            .post_multipart(
                &format!("ticket/{ticket}/comment"),
                format_content(&fields),
                &reply.attachments,
            )
            .await?;

        Ok(is_ok_status(&body) && body.contains("# Correspondence added"))
    }

    async fn resolve(&self, ticket: TicketId) -> Result<bool, TicketError> {
        let url = self.endpoint(&format!("ticket/{ticket}/edit"))?;
        let content = format_content(&[("Status", "resolved")]);
        let body = self
            .send(self.http.post(url).form(&[("content", content.as_str())]))
            .await?;

        Ok(is_ok_status(&body) && body.contains(&format!("# Ticket {ticket} updated.")))
    }

    async fn logout(&self) -> Result<(), TicketError> {
        let url = self.endpoint("logout")?;
        self.send(self.http.post(url)).await.map(|_| ())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, TicketError> {
    // Url::join replaces the last segment unless the base ends in '/'.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| TicketError::Config(format!("RT base URL {raw:?}: {e}")))
}

/// Renders `Key: value` lines. Continuation lines of multi-line values are
/// indented by one space, which RT strips when parsing.
fn format_content(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}: {}", value.replace('\n', "\n ")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn attachment_field(attachments: &[Attachment]) -> String {
    attachments
        .iter()
        .map(|a| a.filename.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_line(body: &str) -> &str {
    body.lines().next().unwrap_or("")
}

/// True if the response's status line reads `RT/<version> 200 ...`.
fn is_ok_status(body: &str) -> bool {
    let mut words = first_line(body).split_whitespace();
    matches!(
        (words.next(), words.next()),
        (Some(version), Some("200")) if version.starts_with("RT/")
    )
}

/// Extracts the ticket number from a `# Ticket <n> created.` line.
fn parse_created_ticket(body: &str) -> Option<TicketId> {
    body.lines().find_map(|line| {
        line.trim()
            .strip_prefix("# Ticket ")?
            .strip_suffix(" created.")?
            .parse()
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str, tls: TlsVerification) -> RtConfig {
        RtConfig {
            base_url: base_url.to_string(),
            user: "bridge".to_string(),
            password: "hunter2".to_string(),
            queue: "GitHub".to_string(),
            tls,
        }
    }

    #[test]
    fn tls_setting_parsing() {
        assert_eq!(TlsVerification::from_setting(None), TlsVerification::Enabled);
        assert_eq!(TlsVerification::from_setting(Some("")), TlsVerification::Enabled);
        assert_eq!(TlsVerification::from_setting(Some("True")), TlsVerification::Enabled);
        assert_eq!(TlsVerification::from_setting(Some("false")), TlsVerification::Disabled);
        assert_eq!(TlsVerification::from_setting(Some("0")), TlsVerification::Disabled);
        assert_eq!(
            TlsVerification::from_setting(Some("/etc/ssl/rt-ca.pem")),
            TlsVerification::CaBundle(PathBuf::from("/etc/ssl/rt-ca.pem"))
        );
    }

    #[test]
    fn status_line_detection() {
        assert!(is_ok_status("RT/4.4.3 200 Ok\n\n# Ticket 5 created.\n"));
        assert!(!is_ok_status("RT/4.4.3 401 Credentials required\n"));
        assert!(!is_ok_status("<html>login</html>"));
        assert!(!is_ok_status(""));
        assert!(!is_ok_status("HTTP/1.1 200 OK"));
    }

    #[test]
    fn created_ticket_parsing() {
        assert_eq!(
            parse_created_ticket("RT/4.4.3 200 Ok\n\n# Ticket 1234 created.\n\n"),
            Some(TicketId(1234))
        );
        assert_eq!(
            parse_created_ticket("RT/4.4.3 200 Ok\n\n# Could not create ticket.\n"),
            None
        );
        assert_eq!(parse_created_ticket("# Ticket abc created."), None);
    }

    #[test]
    fn content_continues_multiline_values() {
        let content = format_content(&[
            ("Subject", "[r] Bug"),
            ("Text", "alice created issue #1.\nURL: http://x"),
        ]);
        assert_eq!(
            content,
            "Subject: [r] Bug\nText: alice created issue #1.\n URL: http://x"
        );
    }

    #[test]
    fn attachment_field_lists_filenames() {
        let attachments = vec![
            Attachment::markdown("a.md", "x"),
            Attachment::markdown("b.md", "y"),
        ];
        assert_eq!(attachment_field(&attachments), "a.md\nb.md");
        assert_eq!(attachment_field(&[]), "");
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = parse_base_url("https://rt.example.com/REST/1.0").unwrap();
        assert_eq!(
            url.join("ticket/new").unwrap().as_str(),
            "https://rt.example.com/REST/1.0/ticket/new"
        );
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        assert!(matches!(
            RtConnector::new(config("not a url", TlsVerification::Enabled)),
            Err(TicketError::Config(_))
        ));
    }

    #[test]
    fn missing_ca_bundle_is_config_error() {
        let result = RtConnector::new(config(
            "https://rt.example.com/REST/1.0/",
            TlsVerification::CaBundle(PathBuf::from("/nonexistent/ca.pem")),
        ));
        assert!(matches!(result, Err(TicketError::Config(msg)) if msg.contains("ca.pem")));
    }

    #[test]
    fn connector_builds_independent_clients() {
        let connector =
            RtConnector::new(config("https://rt.example.com/REST/1.0/", TlsVerification::Disabled))
                .unwrap();
        let first = connector.connect().unwrap();
        let second = connector.connect().unwrap();

        assert_eq!(
            first.endpoint("ticket/1/edit").unwrap(),
            second.endpoint("ticket/1/edit").unwrap()
        );
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", config("https://rt/", TlsVerification::Enabled));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
