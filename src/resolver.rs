//! Credential resolution and connection verification.
//!
//! Every workflow that talks to Jira starts here: a stored
//! [`ConnectionRecord`] plus per-request [`Overrides`] resolve into an
//! [`EffectiveConnection`], which a [`ConnectionResolver`] verifies once and
//! then hands out the cached client.

use crate::model::ConnectionRecord;
use crate::tracker::{ClientFactory, Diagnostic, FailureContext, explain_failure};
use std::cell::OnceCell;
use std::fmt;
use tracing::{debug, info};

/// Values supplied for a single request. Empty strings count as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_url: Option<String>,
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overrides")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// A connection with overrides applied. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct EffectiveConnection {
    pub api_url: String,
    pub username: String,
    pub password: String,
    /// Display name of the underlying record, used in diagnostics.
    pub display_name: String,
}

impl EffectiveConnection {
    /// Whether the preconditions for authenticating hold.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_url.is_empty() && !self.username.is_empty()
    }

    /// Context for translating failures of calls made with this connection.
    #[must_use]
    pub fn failure_context(&self) -> FailureContext {
        FailureContext::new()
            .with_api_url(self.api_url.clone())
            .with_connection(self.display_name.clone())
    }
}

impl fmt::Debug for EffectiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveConnection")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}

fn pick(override_value: Option<&str>, base: Option<&str>) -> String {
    override_value
        .filter(|v| !v.is_empty())
        .or(base)
        .unwrap_or_default()
        .to_string()
}

/// Combine a stored connection with overrides, field by field.
#[must_use]
pub fn resolve(base: &ConnectionRecord, overrides: &Overrides) -> EffectiveConnection {
    EffectiveConnection {
        api_url: pick(overrides.api_url.as_deref(), Some(base.api_url.as_str())),
        username: pick(overrides.username.as_deref(), base.username.as_deref()),
        password: pick(overrides.password.as_deref(), base.password.as_deref()),
        display_name: base.display_name().to_string(),
    }
}

/// Verifies one effective connection and caches the authenticated client.
pub struct ConnectionResolver<'f, F: ClientFactory> {
    factory: &'f F,
    connection: EffectiveConnection,
    client: OnceCell<F::Client>,
}

impl<'f, F: ClientFactory> ConnectionResolver<'f, F> {
    #[must_use]
    pub fn new(factory: &'f F, base: &ConnectionRecord, overrides: &Overrides) -> Self {
        Self::from_effective(factory, resolve(base, overrides))
    }

    #[must_use]
    pub fn from_effective(factory: &'f F, connection: EffectiveConnection) -> Self {
        Self {
            factory,
            connection,
            client: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn connection(&self) -> &EffectiveConnection {
        &self.connection
    }

    /// Authenticate, or return the client from an earlier successful call.
    ///
    /// # Errors
    ///
    /// Returns a `MissingCredentials` diagnostic without touching the network
    /// when the API URL or username is empty, and the translated tracker
    /// failure otherwise.
    pub fn verify(&self) -> Result<&F::Client, Diagnostic> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        if !self.connection.has_credentials() {
            debug!(connection = %self.connection.display_name, "Missing API URL or username");
            return Err(Diagnostic::missing_credentials());
        }

        let client = self
            .factory
            .authenticate(&self.connection)
            .map_err(|err| {
                debug!(error = %err, "Authentication failed");
                explain_failure(&err, &self.connection.failure_context())
            })?;
        info!(
            connection = %self.connection.display_name,
            api_url = %self.connection.api_url,
            "Authenticated"
        );
        Ok(self.client.get_or_init(|| client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ConnectionRecord {
        ConnectionRecord {
            id: 1,
            label: None,
            api_url: "http://test_url".to_string(),
            username: Some("testuser".to_string()),
            password: Some("stored".to_string()),
            story_points_field: "customfield_10002".to_string(),
        }
    }

    #[test]
    fn empty_overrides_fall_back_to_base() {
        let overrides = Overrides {
            username: Some(String::new()),
            password: None,
            api_url: Some(String::new()),
        };
        let effective = resolve(&base(), &overrides);
        assert_eq!(effective.api_url, "http://test_url");
        assert_eq!(effective.username, "testuser");
        assert_eq!(effective.password, "stored");
        assert_eq!(effective.display_name, "http://test_url");
    }

    #[test]
    fn overrides_win_per_field() {
        let overrides = Overrides {
            password: Some("typed".to_string()),
            ..Overrides::default()
        };
        let effective = resolve(&base(), &overrides);
        assert_eq!(effective.password, "typed");
        assert_eq!(effective.username, "testuser");
    }

    #[test]
    fn debug_never_shows_password() {
        let effective = resolve(&base(), &Overrides::default());
        assert!(!format!("{effective:?}").contains("stored"));
        let overrides = Overrides {
            password: Some("typed".to_string()),
            ..Overrides::default()
        };
        assert!(!format!("{overrides:?}").contains("typed"));
    }
}
