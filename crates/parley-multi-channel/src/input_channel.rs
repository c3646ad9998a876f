//! Registered input channels and the credentials file that declares them.
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::output_channel::{CallbackOutputChannel, OutputChannel};

/// Trait contract for `InputChannel` behavior.
pub trait InputChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Output channel that carries replies back to this channel's users, if any.
    fn output_channel(&self) -> Option<Arc<dyn OutputChannel>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// Read-only view of a registered channel's reply capability.
pub struct ChannelCandidate<'a> {
    pub name: &'a str,
    pub provides_output: bool,
}

#[derive(Debug, Clone)]
/// Synchronous HTTP channel; replies are returned in the response body.
pub struct RestInputChannel {
    name: String,
}

impl RestInputChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl InputChannel for RestInputChannel {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn output_channel(&self) -> Option<Arc<dyn OutputChannel>> {
        None
    }
}

#[derive(Clone)]
/// Channel whose replies are posted to a webhook.
pub struct CallbackInputChannel {
    output: Arc<CallbackOutputChannel>,
}

impl CallbackInputChannel {
    pub fn new(output: CallbackOutputChannel) -> Self {
        Self {
            output: Arc::new(output),
        }
    }
}

impl InputChannel for CallbackInputChannel {
    fn name(&self) -> &str {
        self.output.name()
    }

    fn output_channel(&self) -> Option<Arc<dyn OutputChannel>> {
        let output: Arc<dyn OutputChannel> = self.output.clone();
        Some(output)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ChannelKind` values.
pub enum ChannelKind {
    Callback,
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One `[[channels]]` entry of the credentials file.
pub struct ChannelConfig {
    pub name: String,
    pub kind: ChannelKind,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Public struct `ChannelsFile` used across Parley components.
pub struct ChannelsFile {
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Clone, Default)]
/// Immutable, registration-ordered list of input channels.
pub struct ChannelRegistry {
    channels: Vec<Arc<dyn InputChannel>>,
}

impl ChannelRegistry {
    pub fn new(channels: Vec<Arc<dyn InputChannel>>) -> Self {
        Self { channels }
    }

    pub fn from_config(file: &ChannelsFile) -> Result<Self> {
        let mut seen = BTreeSet::new();
        let mut channels: Vec<Arc<dyn InputChannel>> = Vec::with_capacity(file.channels.len());
        for config in &file.channels {
            let name = config.name.trim();
            if name.is_empty() {
                bail!("channel entries require a non-empty name");
            }
            if !seen.insert(name.to_string()) {
                tracing::warn!(
                    channel = name,
                    "duplicate channel name; the first registration wins"
                );
            }
            match config.kind {
                ChannelKind::Rest => channels.push(Arc::new(RestInputChannel::new(name))),
                ChannelKind::Callback => {
                    let Some(url) = config.url.as_deref().map(str::trim).filter(|url| !url.is_empty())
                    else {
                        bail!("callback channel '{name}' requires a url");
                    };
                    let output = CallbackOutputChannel::new(name, url)?;
                    channels.push(Arc::new(CallbackInputChannel::new(output)));
                }
            }
        }
        Ok(Self { channels })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read channels file {}", path.display()))?;
        let file: ChannelsFile = toml::from_str(&raw)
            .with_context(|| format!("failed to parse channels file {}", path.display()))?;
        Self::from_config(&file)
    }

    pub fn channels(&self) -> &[Arc<dyn InputChannel>] {
        self.channels.as_slice()
    }

    pub fn candidates(&self) -> Vec<ChannelCandidate<'_>> {
        self.channels
            .iter()
            .map(|channel| ChannelCandidate {
                name: channel.name(),
                provides_output: channel.output_channel().is_some(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("candidates", &self.candidates())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{ChannelCandidate, ChannelRegistry};

    #[test]
    fn functional_channel_registry_loads_toml_in_registration_order() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("channels.toml");
        std::fs::write(
            &path,
            r#"
[[channels]]
name = "rest"
kind = "rest"

[[channels]]
name = "telegram"
kind = "callback"
url = "http://127.0.0.1:9/telegram"
"#,
        )
        .expect("write");
        let registry = ChannelRegistry::load(&path).expect("load");
        assert_eq!(
            registry.candidates(),
            vec![
                ChannelCandidate {
                    name: "rest",
                    provides_output: false
                },
                ChannelCandidate {
                    name: "telegram",
                    provides_output: true
                },
            ]
        );
    }

    #[test]
    fn regression_channel_registry_rejects_callback_without_url() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("channels.toml");
        std::fs::write(&path, "[[channels]]\nname = \"hook\"\nkind = \"callback\"\n")
            .expect("write");
        let error = ChannelRegistry::load(&path).expect_err("missing url");
        assert!(error.to_string().contains("requires a url"));
    }

    #[test]
    fn regression_channel_registry_rejects_unknown_kind() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("channels.toml");
        std::fs::write(&path, "[[channels]]\nname = \"x\"\nkind = \"carrier_pigeon\"\n")
            .expect("write");
        let error = ChannelRegistry::load(&path).expect_err("unknown kind");
        assert!(format!("{error:#}").contains("failed to parse channels file"));
    }
}
