//! Split message text into flags and positional tokens.

use crate::{Error, Result};

/// Recognizes the token that addresses the bot.
///
/// The address is either a mention of the bot user (`<@id>` or `<@!id>`) or
/// one of the configured keywords. A follower word directly after the
/// address (`ei noah lobby`) is dropped too.
#[derive(Debug, Clone, Default)]
pub struct AddressMatcher {
    keywords: Vec<String>,
    followers: Vec<String>,
    bot_user_id: Option<String>,
}

impl AddressMatcher {
    /// Keywords compare case-insensitively.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
            ..Default::default()
        }
    }

    /// Matches nothing; no token is ever stripped.
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_followers<I, S>(mut self, followers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.followers = followers
            .into_iter()
            .map(|f| f.as_ref().to_lowercase())
            .collect();
        self
    }

    #[must_use]
    pub fn with_bot_user_id(mut self, id: impl Into<String>) -> Self {
        self.bot_user_id = Some(id.into());
        self
    }

    pub fn is_address(&self, token: &str) -> bool {
        if let Some(id) = &self.bot_user_id {
            let mention = token
                .strip_prefix("<@")
                .and_then(|rest| rest.strip_suffix('>'))
                .map(|rest| rest.strip_prefix('!').unwrap_or(rest));
            if mention == Some(id.as_str()) {
                return true;
            }
        }
        let lowered = token.to_lowercase();
        self.keywords.iter().any(|k| *k == lowered)
    }

    fn is_follower(&self, token: &str) -> bool {
        let lowered = token.to_lowercase();
        self.followers.iter().any(|f| *f == lowered)
    }

    /// Whether `content` starts with an address token.
    pub fn addresses(&self, content: &str) -> bool {
        content
            .split_whitespace()
            .next()
            .is_some_and(|first| self.is_address(first))
    }
}

/// Output of [`tokenize`], both sequences in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    /// Flag names without the leading `-`. May contain repeats.
    pub flags: Vec<String>,
    pub positional: Vec<String>,
}

impl Tokens {
    /// Re-join into command text: flags first, then positional tokens.
    pub fn to_command_line(&self) -> String {
        self.flags
            .iter()
            .map(|f| format!("-{f}"))
            .chain(self.positional.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A token is a flag when it starts with `-` and has something after it.
pub fn is_flag(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}

/// Split `raw` on whitespace into flags and positional tokens.
///
/// If the first positional token addresses the bot it is dropped, and after
/// it a single follower word. Fails with [`Error::EmptyMessage`] when `raw`
/// has no non-whitespace content.
pub fn tokenize(raw: &str, address: &AddressMatcher) -> Result<Tokens> {
    if raw.trim().is_empty() {
        return Err(Error::EmptyMessage);
    }

    let mut tokens = Tokens::default();
    for token in raw.split_whitespace() {
        match token.strip_prefix('-') {
            Some(name) if !name.is_empty() => tokens.flags.push(name.to_string()),
            _ => tokens.positional.push(token.to_string()),
        }
    }

    if tokens
        .positional
        .first()
        .is_some_and(|first| address.is_address(first))
    {
        tokens.positional.remove(0);
        if tokens
            .positional
            .first()
            .is_some_and(|next| address.is_follower(next))
        {
            tokens.positional.remove(0);
        }
    }

    Ok(tokens)
}
