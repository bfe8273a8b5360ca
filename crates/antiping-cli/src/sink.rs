// Action sink that reports actions through tracing instead of a homeserver

use antiping_moderation::{ActionSink, ModerationAction, SinkError};
use async_trait::async_trait;
use tracing::info;

/// Logs every action it is asked to perform.
#[derive(Debug, Clone)]
pub struct TracingSink {
    user_id: String,
}

impl TracingSink {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl ActionSink for TracingSink {
    async fn prepare(&self) -> Result<(), SinkError> {
        info!(user_id = %self.user_id, "dry-run sink ready");
        Ok(())
    }

    async fn perform(&self, action: &ModerationAction) -> Result<(), SinkError> {
        let message = &action.message;
        info!(
            kind = %action.kind,
            target = %action.target,
            room = %message.room,
            join = message.join,
            content = %message.content(),
            "would send message"
        );
        Ok(())
    }
}
