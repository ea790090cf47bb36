//! Utility actors that need no dedicated package: log notes, sleep timers,
//! and a generic HTTP call.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ActorError;

use super::base::ActorCore;
use super::options::{OptionSpec, OptionType};
use super::registry::ActorEntry;
use super::{Actor, ActorInit, ActorRef};

/// Print any message to the log.
pub struct Note {
    core: ActorCore,
}

impl Note {
    const DESC: &'static str = "Info Log";
    const SUMMARY: &'static str = "Logs a message and succeeds.";

    fn option_specs() -> Vec<OptionSpec> {
        vec![OptionSpec::required(
            "message",
            OptionType::String,
            "Message to log.",
        )]
    }

    async fn build(init: ActorInit) -> Result<ActorRef, ActorError> {
        let core = ActorCore::new(
            "misc.Note",
            Self::DESC,
            &Self::option_specs(),
            &init,
            true,
            None,
        )?;
        Ok(std::sync::Arc::new(Note { core }))
    }
}

#[async_trait]
impl Actor for Note {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    async fn execute(&self) -> Result<(), ActorError> {
        self.core.info(self.core.option_str("message").unwrap_or(""));
        Ok(())
    }
}

pub fn note_entry() -> ActorEntry {
    ActorEntry {
        factory: Box::new(|init| Box::pin(Note::build(init))),
        summary: Note::SUMMARY,
        desc_template: Note::DESC,
        option_specs: Note::option_specs,
    }
}

/// Sleep for an arbitrary number of seconds.
pub struct Sleep {
    core: ActorCore,
}

impl Sleep {
    const DESC: &'static str = "Sleep {sleep}s";
    const SUMMARY: &'static str = "Does nothing for the given number of seconds.";

    fn option_specs() -> Vec<OptionSpec> {
        vec![OptionSpec::required(
            "sleep",
            OptionType::StringOrNumber,
            "Number of seconds to do nothing.",
        )]
    }

    async fn build(init: ActorInit) -> Result<ActorRef, ActorError> {
        let core = ActorCore::new(
            "misc.Sleep",
            Self::DESC,
            &Self::option_specs(),
            &init,
            true,
            None,
        )?;
        Ok(std::sync::Arc::new(Sleep { core }))
    }

    fn seconds(&self) -> Result<f64, ActorError> {
        let value = self.core.option("sleep");
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| {
            ActorError::Recoverable(format!("unable to parse sleep duration: {}", value))
        })
    }
}

#[async_trait]
impl Actor for Sleep {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    async fn execute(&self) -> Result<(), ActorError> {
        let seconds = self.seconds()?;
        self.core
            .debug(&format!("sleeping for {} seconds", seconds));
        self.core
            .dry_guard(format!("Would have slept {}s", seconds), || async move {
                tokio::time::sleep(std::time::Duration::from_secs_f64(seconds)).await;
                Ok(())
            })
            .await
    }
}

pub fn sleep_entry() -> ActorEntry {
    ActorEntry {
        factory: Box::new(|init| Box::pin(Sleep::build(init))),
        summary: Sleep::SUMMARY,
        desc_template: Sleep::DESC,
        option_specs: Sleep::option_specs,
    }
}

/// GET or POST a URL, with optional basic auth.
pub struct GenericHttp {
    core: ActorCore,
}

impl GenericHttp {
    const DESC: &'static str = "HTTP {url}";
    const SUMMARY: &'static str = "Makes a GET or POST request over HTTP(S).";

    fn option_specs() -> Vec<OptionSpec> {
        vec![
            OptionSpec::required("url", OptionType::String, "Domain name + query string to fetch."),
            OptionSpec::optional(
                "data",
                OptionType::Object,
                json!({}),
                "Form data to attach as a POST body.",
            ),
            OptionSpec::optional(
                "data-json",
                OptionType::Object,
                json!({}),
                "JSON data to attach as a POST body. Exclusive of data.",
            ),
            OptionSpec::optional("username", OptionType::String, json!(""), "Basic auth username."),
            OptionSpec::optional("password", OptionType::String, json!(""), "Basic auth password."),
        ]
    }

    async fn build(init: ActorInit) -> Result<ActorRef, ActorError> {
        let core = ActorCore::new(
            "misc.GenericHttp",
            Self::DESC,
            &Self::option_specs(),
            &init,
            true,
            None,
        )?;
        Ok(std::sync::Arc::new(GenericHttp { core }))
    }

    fn is_post(&self) -> bool {
        let data = self.core.option("data").as_object();
        let data_json = self.core.option("data-json").as_object();
        data.map(|m| !m.is_empty()).unwrap_or(false)
            || data_json.map(|m| !m.is_empty()).unwrap_or(false)
    }

    async fn fetch(&self) -> Result<(), ActorError> {
        let url = self.core.option_str("url").unwrap_or("").to_string();
        let client = reqwest::Client::new();

        let mut request = if self.is_post() {
            client.post(&url)
        } else {
            client.get(&url)
        };

        if let Some(data) = self.core.option("data").as_object() {
            if !data.is_empty() {
                let form: Vec<(String, String)> = data
                    .iter()
                    .map(|(k, v)| {
                        let value = crate::utils::value_to_string(v).unwrap_or_else(|| v.to_string());
                        (k.clone(), value)
                    })
                    .collect();
                request = request.form(&form);
            }
        }
        if let Some(data_json) = self.core.option("data-json").as_object() {
            if !data_json.is_empty() {
                request = request.json(data_json);
            }
        }
        let username = self.core.option_str("username").unwrap_or("");
        if !username.is_empty() {
            let password = self.core.option_str("password").unwrap_or("");
            request = request.basic_auth(username, Some(password));
        }

        self.core.debug(&format!("making HTTP request to {}", url));
        let response = request
            .send()
            .await
            .map_err(|e| ActorError::Recoverable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ActorError::InvalidCredentials(format!(
                "{} returned 401",
                url
            )));
        }
        if !status.is_success() {
            return Err(ActorError::BadRequest(format!(
                "{} returned {}",
                url, status
            )));
        }

        response.json::<Value>().await.map_err(|e| {
            ActorError::Fatal(format!(
                "unable to parse response from {} as JSON: {}",
                url, e
            ))
        })?;
        Ok(())
    }
}

#[async_trait]
impl Actor for GenericHttp {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    async fn execute(&self) -> Result<(), ActorError> {
        let method = if self.is_post() { "POST" } else { "GET" };
        let url = self.core.option_str("url").unwrap_or("");
        self.core
            .dry_guard(
                format!("Would do a {} request to {}", method, url),
                || async { self.fetch().await },
            )
            .await
    }
}

pub fn generic_http_entry() -> ActorEntry {
    ActorEntry {
        factory: Box::new(|init| Box::pin(GenericHttp::build(init))),
        summary: GenericHttp::SUMMARY,
        desc_template: GenericHttp::DESC,
        option_specs: GenericHttp::option_specs,
    }
}
