//! In-memory publisher

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use super::MessagePublisher;
use crate::error::{IngestError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub id: String,
    pub topic: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    messages: Vec<PublishedMessage>,
    /// Payload substrings that make `publish` fail
    rejects: BTreeSet<String>,
}

/// Publisher that keeps messages in order of publication
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    state: Mutex<State>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| IngestError::Publish("memory publisher lock poisoned".to_string()))
    }

    /// Fail any publish whose payload contains `needle`
    pub fn reject_containing(&self, needle: &str) -> Result<()> {
        self.state()?.rejects.insert(needle.to_string());
        Ok(())
    }

    pub fn messages(&self) -> Result<Vec<PublishedMessage>> {
        Ok(self.state()?.messages.clone())
    }
}

#[async_trait]
impl MessagePublisher for MemoryPublisher {
    async fn publish(&self, topic: &str, data: &[u8]) -> Result<String> {
        let mut state = self.state()?;

        let payload = String::from_utf8_lossy(data);
        if state.rejects.iter().any(|needle| payload.contains(needle.as_str())) {
            return Err(IngestError::Publish(format!("message rejected by {}", topic)));
        }

        let id = (state.messages.len() + 1).to_string();
        state.messages.push(PublishedMessage {
            id: id.clone(),
            topic: topic.to_string(),
            data: data.to_vec(),
        });

        Ok(id)
    }
}
