//! Per-channel configuration.

use serde::{Deserialize, Serialize};
use simplenet_codec::FreezePolicy;
use simplenet_protocol::ChannelName;

/// Protocol version used when none is configured.
pub const DEFAULT_PROTOCOL_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// ChannelConfig
// ---------------------------------------------------------------------------

/// Configuration for one named channel.
///
/// Built with [`ChannelConfig::new`] and the `with_*` setters, or
/// deserialized from a config file:
///
/// ```json
/// {
///   "name": "demo:handshake",
///   "protocol_version": "2",
///   "accepted_versions": ["1"],
///   "allow_absent": true,
///   "freeze_policy": "on_first_dispatch"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Namespaced channel name, e.g. `demo:handshake`.
    pub name: ChannelName,

    /// Version this side announces for the channel.
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    /// Remote versions accepted in addition to `protocol_version`.
    #[serde(default)]
    pub accepted_versions: Vec<String>,

    /// Whether a peer that doesn't have this channel at all is acceptable.
    #[serde(default)]
    pub allow_absent: bool,

    /// When the channel stops accepting message registrations.
    #[serde(default)]
    pub freeze_policy: FreezePolicy,
}

fn default_protocol_version() -> String {
    DEFAULT_PROTOCOL_VERSION.to_string()
}

impl ChannelConfig {
    /// Creates a config with version [`DEFAULT_PROTOCOL_VERSION`], no extra
    /// accepted versions, a mandatory remote channel, and manual freezing.
    pub fn new(name: ChannelName) -> Self {
        Self {
            name,
            protocol_version: default_protocol_version(),
            accepted_versions: Vec::new(),
            allow_absent: false,
            freeze_policy: FreezePolicy::default(),
        }
    }

    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Also accept peers announcing `version`.
    pub fn with_accepted_version(mut self, version: impl Into<String>) -> Self {
        self.accepted_versions.push(version.into());
        self
    }

    pub fn with_allow_absent(mut self, allow: bool) -> Self {
        self.allow_absent = allow;
        self
    }

    pub fn with_freeze_policy(mut self, policy: FreezePolicy) -> Self {
        self.freeze_policy = policy;
        self
    }

    /// Would this side talk to a peer announcing `remote` for this channel?
    /// `None` means the peer doesn't have the channel.
    pub fn accepts_version(&self, remote: Option<&str>) -> bool {
        match remote {
            None => self.allow_absent,
            Some(version) => {
                version == self.protocol_version
                    || self.accepted_versions.iter().any(|v| v == version)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> ChannelName {
        ChannelName::new("demo:config").unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::new(name());
        assert_eq!(config.protocol_version, "1");
        assert!(config.accepted_versions.is_empty());
        assert!(!config.allow_absent);
        assert_eq!(config.freeze_policy, FreezePolicy::Manual);
    }

    #[test]
    fn test_accepts_exact_and_extra_versions() {
        let config = ChannelConfig::new(name())
            .with_protocol_version("3")
            .with_accepted_version("2");
        assert!(config.accepts_version(Some("3")));
        assert!(config.accepts_version(Some("2")));
        assert!(!config.accepts_version(Some("1")));
    }

    #[test]
    fn test_absent_remote_channel() {
        let strict = ChannelConfig::new(name());
        assert!(!strict.accepts_version(None));
        let lenient = strict.with_allow_absent(true);
        assert!(lenient.accepts_version(None));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: ChannelConfig = serde_json::from_str(r#"{ "name": "demo:config" }"#).unwrap();
        assert_eq!(config, ChannelConfig::new(name()));
    }

    #[test]
    fn test_deserialize_full() {
        let json = r#"{
            "name": "demo:config",
            "protocol_version": "2",
            "accepted_versions": ["1"],
            "allow_absent": true,
            "freeze_policy": "on_first_dispatch"
        }"#;
        let config: ChannelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.protocol_version, "2");
        assert!(config.accepts_version(Some("1")));
        assert!(config.allow_absent);
        assert_eq!(config.freeze_policy, FreezePolicy::OnFirstDispatch);
    }

    #[test]
    fn test_invalid_channel_name_is_rejected() {
        let result = serde_json::from_str::<ChannelConfig>(r#"{ "name": "NoNamespace" }"#);
        assert!(result.is_err());
    }
}
