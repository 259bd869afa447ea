use std::net::SocketAddr;

use serde::Deserialize;
use tokio::time::Duration;

use chatline_core::attachment::{AttachmentPolicy, DEFAULT_ALLOWED_MIME, DEFAULT_MAX_ATTACHMENT_BYTES};
use chatline_core::error::{ChatError, Result};

use crate::realtime::RealtimeSettings;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub presence: PresenceSection,

    #[serde(default)]
    pub routing: RoutingSection,

    #[serde(default)]
    pub attachments: AttachmentSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ChatError::UnsupportedVersion);
        }
        self.gateway.validate()?;
        self.presence.validate()?;
        self.routing.validate()?;
        self.attachments.validate()?;
        Ok(())
    }

    pub fn realtime_settings(&self) -> RealtimeSettings {
        RealtimeSettings {
            presence_send_timeout: Duration::from_millis(self.presence.send_timeout_ms),
            deliver_timeout: Duration::from_millis(self.routing.deliver_timeout_ms),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            presence: PresenceSection::default(),
            routing: RoutingSection::default(),
            attachments: AttachmentSection::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Capacity of each connection's outbound queue.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,

    /// Allowed browser origins. Empty means permissive.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            max_frame_bytes: default_max_frame_bytes(),
            outbound_queue: default_outbound_queue(),
            cors_origins: Vec::new(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !(1000..=120000).contains(&self.ping_interval_ms) {
            return Err(ChatError::BadRequest(
                "gateway.ping_interval_ms must be between 1000 and 120000".into(),
            ));
        }
        if !(2000..=600000).contains(&self.idle_timeout_ms) {
            return Err(ChatError::BadRequest(
                "gateway.idle_timeout_ms must be between 2000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(ChatError::BadRequest(
                "gateway.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if !(1024..=1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(ChatError::BadRequest(
                "gateway.max_frame_bytes must be between 1024 and 1048576".into(),
            ));
        }
        if self.outbound_queue < 16 {
            return Err(ChatError::BadRequest(
                "gateway.outbound_queue must be at least 16".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            ChatError::BadRequest(format!("gateway.listen must be a socket address: {e}"))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:5000".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}
fn default_max_frame_bytes() -> usize {
    64 * 1024
}
fn default_outbound_queue() -> usize {
    256
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceSection {
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for PresenceSection {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl PresenceSection {
    pub fn validate(&self) -> Result<()> {
        check_timeout("presence.send_timeout_ms", self.send_timeout_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingSection {
    #[serde(default = "default_send_timeout_ms")]
    pub deliver_timeout_ms: u64,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            deliver_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl RoutingSection {
    pub fn validate(&self) -> Result<()> {
        check_timeout("routing.deliver_timeout_ms", self.deliver_timeout_ms)
    }
}

fn default_send_timeout_ms() -> u64 {
    1500
}

fn check_timeout(name: &str, ms: u64) -> Result<()> {
    if !(1..=30000).contains(&ms) {
        return Err(ChatError::BadRequest(format!(
            "{name} must be between 1 and 30000"
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachmentSection {
    #[serde(default = "default_max_attachment_bytes")]
    pub max_bytes: u64,

    #[serde(default = "default_allowed_mime")]
    pub allowed_mime: Vec<String>,
}

impl Default for AttachmentSection {
    fn default() -> Self {
        Self {
            max_bytes: default_max_attachment_bytes(),
            allowed_mime: default_allowed_mime(),
        }
    }
}

impl AttachmentSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=DEFAULT_MAX_ATTACHMENT_BYTES).contains(&self.max_bytes) {
            return Err(ChatError::BadRequest(format!(
                "attachments.max_bytes must be between 1 and {DEFAULT_MAX_ATTACHMENT_BYTES}"
            )));
        }
        if self.allowed_mime.iter().all(|m| m.trim().is_empty()) {
            return Err(ChatError::BadRequest(
                "attachments.allowed_mime must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn policy(&self) -> AttachmentPolicy {
        AttachmentPolicy::new(self.max_bytes, self.allowed_mime.iter().cloned())
    }
}

fn default_max_attachment_bytes() -> u64 {
    DEFAULT_MAX_ATTACHMENT_BYTES
}
fn default_allowed_mime() -> Vec<String> {
    DEFAULT_ALLOWED_MIME.iter().map(|m| m.to_string()).collect()
}
