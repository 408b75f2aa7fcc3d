//! Lease message entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseMessage {
    pub id: i64,
    pub lease_id: i64,
    pub team_id: i64,
    pub sender: MessageSender,
    pub body: String,
    pub read_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSender {
    Owner,
    Tenant,
}

impl MessageSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSender::Owner => "owner",
            MessageSender::Tenant => "tenant",
        }
    }
}

impl From<&str> for MessageSender {
    fn from(s: &str) -> Self {
        match s {
            "tenant" => MessageSender::Tenant,
            _ => MessageSender::Owner,
        }
    }
}

impl std::fmt::Display for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
