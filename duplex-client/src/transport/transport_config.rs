use duplex_core::IceServerConfig;
use serde::{Deserialize, Serialize};

/// Which candidates the negotiation engine may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcePolicy {
    #[default]
    All,
    /// Only candidates through the traversal-assist (TURN) endpoint.
    Relay,
}

/// Configuration for every connection opened by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    pub ice_policy: IcePolicy,
    /// Label of the chat data channel created by the caller.
    pub chat_label: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                username: None,
                credential: None,
            }],
            ice_policy: IcePolicy::All,
            chat_label: "messages".to_owned(),
        }
    }
}

impl TransportConfig {
    /// Adds a TURN endpoint with its shared credential.
    pub fn with_turn(
        mut self,
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.ice_servers.push(IceServerConfig {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        });
        self
    }
}
