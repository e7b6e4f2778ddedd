use std::sync::Arc;

use {
    einoah_channels::Platform,
    einoah_common::PlatformMessage,
    einoah_sessions::Session,
    tracing::debug,
};

use crate::{AddressMatcher, Flags, InvocationContext, Result, resolve_all, tokenize};

/// Tokenizes a message and resolves its mentions into an [`InvocationContext`].
#[derive(Clone)]
pub struct CommandParser {
    address: AddressMatcher,
    platform: Arc<dyn Platform>,
}

impl CommandParser {
    pub fn new(address: AddressMatcher, platform: Arc<dyn Platform>) -> Self {
        Self { address, platform }
    }

    pub fn address(&self) -> &AddressMatcher {
        &self.address
    }

    /// Nothing is looked up if tokenizing fails.
    pub async fn parse(
        &self,
        message: Arc<PlatformMessage>,
        session: Arc<dyn Session>,
    ) -> Result<InvocationContext> {
        let tokens = tokenize(&message.content, &self.address)?;
        let flags: Flags = tokens.flags.into_iter().collect();

        let params = resolve_all(
            &tokens.positional,
            self.platform.as_ref(),
            message.guild_id(),
        )
        .await?;

        debug!(
            message_id = %message.id,
            params = params.len(),
            flags = flags.len(),
            "parsed command"
        );
        Ok(InvocationContext::new(message, params, flags, session))
    }
}
