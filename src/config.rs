//! Service configuration, read from the process environment.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::router::RouterSettings;
use crate::tickets::{RtConfig, TlsVerification};

#[derive(Clone, Deserialize)]
pub struct BridgeConfig {
    // RT
    /// RT REST root (`RT_REST_BASEURL`)
    pub rt_rest_baseurl: String,
    pub rt_user: String,
    pub rt_pass: String,
    /// Queue new tickets are filed in
    pub rt_queue: String,
    /// Requestor address on new tickets
    pub rt_requestor: String,
    /// `true`/unset, `false`, or a PEM bundle path
    #[serde(default)]
    pub rt_ca_cert: Option<String>,

    // GitHub
    /// Webhook shared secret
    pub gh_secret: String,

    // Correlation store
    pub correlation_table: String,
    /// SQLite file; `:memory:` keeps records for the process lifetime only
    #[serde(default = "default_correlation_db")]
    pub correlation_db: String,

    // Service
    /// Present (any value) to enable verbose diagnostics
    #[serde(default)]
    pub debug: Option<String>,
    /// Bound on every store and ticketing call, in seconds
    #[serde(default = "default_external_timeout_secs")]
    pub external_timeout_secs: u64,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Log filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_correlation_db() -> String {
    "correlation.db".to_string()
}

fn default_external_timeout_secs() -> u64 {
    10
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    /// Loads from an explicit variable map instead of the process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(Environment::default().source(Some(vars)))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    pub fn verbose(&self) -> bool {
        self.debug.is_some()
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external_timeout_secs)
    }

    pub fn rt_config(&self) -> RtConfig {
        RtConfig {
            base_url: self.rt_rest_baseurl.clone(),
            user: self.rt_user.clone(),
            password: self.rt_pass.clone(),
            queue: self.rt_queue.clone(),
            tls: TlsVerification::from_setting(self.rt_ca_cert.as_deref()),
        }
    }

    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            requestor: self.rt_requestor.clone(),
            timeout: self.external_timeout(),
        }
    }
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("rt_rest_baseurl", &self.rt_rest_baseurl)
            .field("rt_user", &self.rt_user)
            .field("rt_pass", &"<redacted>")
            .field("rt_queue", &self.rt_queue)
            .field("rt_requestor", &self.rt_requestor)
            .field("rt_ca_cert", &self.rt_ca_cert)
            .field("gh_secret", &"<redacted>")
            .field("correlation_table", &self.correlation_table)
            .field("correlation_db", &self.correlation_db)
            .field("verbose", &self.verbose())
            .field("external_timeout_secs", &self.external_timeout_secs)
            .field("listen_addr", &self.listen_addr)
            .field("log_level", &self.log_level)
            .finish()
    }
}
