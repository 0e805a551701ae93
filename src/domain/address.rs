//! Addressing of outgoing messages and validation of message names

use super::message::Message;
use thiserror::Error;
use uuid::Uuid;

/// Target addressing every known application
pub const BROADCAST: &str = "*";

/// Prefix marking an application as excluded from a broadcast
pub const EXCLUSION_PREFIX: &str = "!";

/// Errors caused by incomplete or invalid addressing, raised before anything is sent
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Name does not follow the `group.action` convention
    #[error("invalid name {0:?}, expected two lowercase segments separated by a dot")]
    InvalidName(String),
    /// No name has been provided
    #[error("no name has been provided")]
    MissingName,
    /// Nobody is left to receive the message
    #[error("no targets specified")]
    NoTargetsSpecified,
}

/// Validates that a name consists of two non-empty, lowercase segments separated by a single dot
///
/// Names are literal, so wildcard and alternation characters are rejected as well.
pub fn validate_name(name: &str) -> Result<(), AddressError> {
    let is_valid = !name.is_empty()
        && !name.contains(char::is_whitespace)
        && !name.contains(|c: char| matches!(c, ':' | '*' | '{' | '}' | '|'))
        && name.matches('.').count() == 1
        && !name.starts_with('.')
        && !name.ends_with('.')
        && name.to_lowercase() == name;

    if is_valid {
        Ok(())
    } else {
        Err(AddressError::InvalidName(name.to_owned()))
    }
}

/// Recipients and metadata of a message which is about to be sent
///
/// Addresses are plain values. Every send consumes one, so nothing set up for a
/// previous message can leak into the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    targets: Vec<String>,
    excepts: Vec<String>,
    correlation_id: Option<String>,
    name: Option<String>,
}

impl Address {
    /// Creates an empty address without any targets
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an address replying to the sender of a message within the same conversation
    pub fn response_to(message: &Message) -> Self {
        Self {
            targets: message.from.iter().cloned().collect(),
            excepts: Vec::new(),
            correlation_id: message.correlation_id.clone(),
            name: Some(message.name().to_owned()),
        }
    }

    /// Adds applications to the list of recipients
    pub fn to<I, S>(mut self, apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets.extend(apps.into_iter().map(Into::into));
        self
    }

    /// Addresses every known application
    pub fn broadcast(self) -> Self {
        self.to([BROADCAST])
    }

    /// Excludes applications from receiving the message, even when broadcasting
    pub fn except<I, S>(mut self, apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excepts.extend(apps.into_iter().map(Into::into));
        self
    }

    /// Sets the name of the message
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the correlation identifier
    pub fn correlated(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Assigns a random correlation identifier unless one is set already
    pub fn correlate(mut self) -> Self {
        if self.correlation_id.is_none() {
            self.correlation_id = Some(Uuid::new_v4().to_string());
        }

        self
    }

    /// Correlation identifier, if any
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Name of the message, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Target list as transmitted to the relay
    ///
    /// Excluded applications are removed and, when broadcasting, appended as exclusion tokens.
    pub fn resolve_targets(&self) -> Result<Vec<String>, AddressError> {
        let mut targets: Vec<String> = self
            .targets
            .iter()
            .filter(|target| !self.excepts.contains(target))
            .cloned()
            .collect();

        if targets.iter().any(|target| target == BROADCAST) {
            targets.extend(
                self.excepts
                    .iter()
                    .map(|app| format!("{}{}", EXCLUSION_PREFIX, app)),
            );
        }

        if targets.is_empty() {
            Err(AddressError::NoTargetsSpecified)
        } else {
            Ok(targets)
        }
    }
}
