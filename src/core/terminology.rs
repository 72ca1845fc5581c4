//! UMLS terminology client: ticket exchange and definition lookup
//!
//! Authentication follows the CAS proxy flow. The API key buys a
//! ticket-granting ticket (a URL), each content request then needs a fresh
//! single-use service ticket minted from it.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::core::config::ExplainerConfig;
use crate::core::errors::{ExplainerError, Result};
use crate::core::models::{Definition, GrantingTicket, ServiceTicket, TicketState};

/// Matches the form action carrying the granting ticket URL
fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"action="([^"]+)""#).expect("valid regex"))
}

/// A bare token: non-empty, no whitespace, no markup
fn bare_token(body: &str) -> Option<&str> {
    let body = body.trim();
    if body.is_empty() || body.contains(char::is_whitespace) || body.contains('<') {
        return None;
    }
    Some(body)
}

/// Read the granting ticket URL from the api-key response.
///
/// The service answers with an HTML form whose action is the ticket URL;
/// a bare `TGT-...` token is resolved against the auth endpoint.
fn parse_granting_url(body: &str, auth_endpoint: &str) -> Option<String> {
    if let Some(caps) = action_regex().captures(body) {
        let url = caps[1].trim();
        return (!url.is_empty()).then(|| url.to_string());
    }

    bare_token(body).map(|token| format!("{}/{}", auth_endpoint.trim_end_matches('/'), token))
}

/// Stateless client for the terminology calls
#[derive(Debug, Clone)]
pub struct TerminologyClient {
    client: reqwest::Client,
    auth_endpoint: String,
    service: String,
    content_endpoint: String,
}

impl TerminologyClient {
    /// Create a new client
    pub fn new(config: &ExplainerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            auth_endpoint: config.umls_auth_endpoint.clone(),
            service: config.umls_service.clone(),
            content_endpoint: config.umls_content_endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// POST a form and return the body, classifying transport and status failures
    async fn post_form(&self, url: &str, form: &[(&str, &str)], what: &str) -> Result<String> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| ExplainerError::TerminologyUnreachable {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExplainerError::TerminologyUnreachable {
                message: e.to_string(),
            })?;

        if status.is_client_error() {
            return Err(ExplainerError::TerminologyAuth {
                message: format!("{} rejected with {}", what, status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(ExplainerError::TerminologyUnreachable {
                message: format!("{} failed with {}", what, status.as_u16()),
            });
        }

        Ok(body)
    }

    /// Exchange an API key for a ticket-granting ticket
    pub async fn request_granting_ticket(&self, api_key: &str) -> Result<GrantingTicket> {
        if api_key.trim().is_empty() {
            return Err(ExplainerError::TerminologyAuth {
                message: "API key is empty".to_string(),
            });
        }

        let body = self
            .post_form(&self.auth_endpoint, &[("apikey", api_key)], "ticket request")
            .await?;

        let url = parse_granting_url(&body, &self.auth_endpoint).ok_or_else(|| {
            ExplainerError::TerminologyAuth {
                message: "no ticket in authentication response".to_string(),
            }
        })?;

        info!("Obtained terminology granting ticket");
        Ok(GrantingTicket::new(url))
    }

    /// Mint a single-use service ticket from a granting ticket
    pub async fn mint_service_ticket(&self, granting: &GrantingTicket) -> Result<ServiceTicket> {
        let body = self
            .post_form(granting.url(), &[("service", &self.service)], "service ticket request")
            .await?;

        let ticket = bare_token(&body).ok_or_else(|| ExplainerError::TerminologyAuth {
            message: "no service ticket in response".to_string(),
        })?;

        Ok(ServiceTicket::new(ticket))
    }

    /// Exchange an API key for a short-lived service ticket
    pub async fn get_service_ticket(&self, api_key: &str) -> Result<ServiceTicket> {
        let granting = self.request_granting_ticket(api_key).await?;
        self.mint_service_ticket(&granting).await
    }

    /// Fetch the first available definition for a code; consumes the ticket
    pub async fn get_definition(
        &self,
        code: &str,
        ticket: &ServiceTicket,
    ) -> Result<Option<Definition>> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ExplainerError::InvalidInput {
                message: "code is empty".to_string(),
            });
        }

        let url = format!("{}/CUI/{}/definitions", self.content_endpoint, code);
        debug!("Fetching definition for {}", code);

        let response = self
            .client
            .get(&url)
            .query(&[("ticket", ticket.as_str())])
            .send()
            .await
            .map_err(|e| ExplainerError::TerminologyUnreachable {
                message: e.to_string(),
            })?;

        let status = response.status();
        match status.as_u16() {
            404 => {
                debug!("No definition for {}", code);
                return Ok(None);
            }
            401 | 403 => {
                return Err(ExplainerError::TerminologyAuth {
                    message: format!("ticket rejected with {}", status.as_u16()),
                });
            }
            _ if !status.is_success() => {
                return Err(ExplainerError::TerminologyUnreachable {
                    message: format!("definition lookup failed with {}", status.as_u16()),
                });
            }
            _ => {}
        }

        let json: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| ExplainerError::TerminologyUnreachable {
                    message: format!("unreadable response: {}", e),
                })?;

        Ok(first_definition(&json))
    }
}

/// First non-blank `result[*].value`
fn first_definition(json: &serde_json::Value) -> Option<Definition> {
    json["result"].as_array()?.iter().find_map(|entry| {
        let text = entry["value"].as_str()?.trim();
        if text.is_empty() {
            return None;
        }
        Some(Definition {
            text: text.to_string(),
            source: entry["rootSource"].as_str().map(str::to_string),
        })
    })
}

/// A terminology client bound to an API key.
///
/// The granting ticket is requested on first use and kept for the session;
/// every lookup mints its own service ticket from it.
#[derive(Debug)]
pub struct TerminologySession {
    client: TerminologyClient,
    api_key: String,
    granting: OnceCell<GrantingTicket>,
}

impl TerminologySession {
    pub fn new(client: TerminologyClient, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            granting: OnceCell::new(),
        }
    }

    /// Session from configuration; `None` when no API key is configured
    pub fn from_config(config: &ExplainerConfig) -> Result<Option<Self>> {
        match &config.umls_api_key {
            Some(key) => Ok(Some(Self::new(TerminologyClient::new(config)?, key.clone()))),
            None => Ok(None),
        }
    }

    pub fn state(&self) -> TicketState {
        if self.granting.initialized() {
            TicketState::Ticketed
        } else {
            TicketState::NoTicket
        }
    }

    /// When the session's granting ticket was obtained
    pub fn ticket_issued_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.granting.get().map(|t| t.issued_at)
    }

    /// The session granting ticket, requested on first use and then reused
    pub async fn granting_ticket(&self) -> Result<&GrantingTicket> {
        self.granting
            .get_or_try_init(|| self.client.request_granting_ticket(&self.api_key))
            .await
    }

    /// Look up a definition with a freshly minted service ticket
    pub async fn definition(&self, code: &str) -> Result<Option<Definition>> {
        let granting = self.granting_ticket().await.map_err(|e| {
            warn!("Could not obtain terminology ticket: {}", e);
            e
        })?;
        let ticket = self.client.mint_service_ticket(granting).await?;
        self.client.get_definition(code, &ticket).await
    }
}
