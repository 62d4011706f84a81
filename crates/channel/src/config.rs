use std::fmt;

use serde::{Deserialize, Serialize};

/// Where and how to reach the message channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Transport name looked up in the [`ChannelFactory`](crate::ChannelFactory)
    pub kind: String,
    /// Transport endpoint. Publishers bind it, subscribers connect to it.
    pub endpoint: String,
    /// Topics a subscriber listens on
    pub topics: Vec<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            kind: "zmq".to_string(),
            endpoint: "tcp://127.0.0.1:5555".to_string(),
            topics: Vec::new(),
        }
    }
}

impl ChannelConfig {
    /// Whether both ends of this kind only meet inside a single process
    pub fn is_in_process(&self) -> bool {
        self.kind == "memory"
    }
}

impl fmt::Display for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} channel at {}", self.kind, self.endpoint)?;
        if !self.topics.is_empty() {
            write!(f, " [{}]", self.topics.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_process_kinds() {
        let memory = ChannelConfig { kind: "memory".to_string(), ..ChannelConfig::default() };
        assert!(memory.is_in_process());
        assert!(!ChannelConfig::default().is_in_process());
    }
}
