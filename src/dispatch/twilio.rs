//! Twilio voice call + SMS transport

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{AlertDispatcher, DispatchError};
use crate::config::TwilioConfig;

/// Twilio REST API client.
#[derive(Clone)]
pub struct TwilioDispatcher {
    http: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl std::fmt::Debug for TwilioDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioDispatcher")
            .field("api_base", &self.api_base)
            .field("account_sid", &self.account_sid)
            .field("from_number", &self.from_number)
            .finish_non_exhaustive()
    }
}

impl TwilioDispatcher {
    pub fn new(config: &TwilioConfig, timeout_secs: u64) -> Result<Self, DispatchError> {
        let missing: Vec<&str> = [
            ("account_sid", config.account_sid.is_empty()),
            ("auth_token", config.auth_token.is_empty()),
            ("from_number", config.from_number.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();
        if !missing.is_empty() {
            return Err(DispatchError::NotConfigured(format!(
                "twilio missing {}",
                missing.join(", ")
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
        })
    }

    fn endpoint(&self, resource: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/{}.json",
            self.api_base, self.account_sid, resource
        )
    }

    async fn post_form(&self, resource: &str, form: &[(&str, &str)]) -> Result<(), DispatchError> {
        let resp = self
            .http
            .post(self.endpoint(resource))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            debug!(resource, status = status.as_u16(), "Twilio request accepted");
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl AlertDispatcher for TwilioDispatcher {
    async fn call(&self, destination: &str, message: &str) -> Result<(), DispatchError> {
        let twiml = twiml_say(message);
        self.post_form(
            "Calls",
            &[
                ("To", destination),
                ("From", self.from_number.as_str()),
                ("Twiml", twiml.as_str()),
            ],
        )
        .await?;
        info!(destination = %destination, "Emergency call placed");
        Ok(())
    }

    async fn send_text(&self, destination: &str, message: &str) -> Result<(), DispatchError> {
        self.post_form(
            "Messages",
            &[
                ("To", destination),
                ("From", self.from_number.as_str()),
                ("Body", message),
            ],
        )
        .await?;
        info!(destination = %destination, "Emergency SMS sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}

/// TwiML document that reads `message` aloud.
fn twiml_say(message: &str) -> String {
    format!(
        "<Response><Say voice=\"alice\">{}</Say></Response>",
        escape_xml(message)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
