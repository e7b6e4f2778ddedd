use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EiNoahConfig {
    pub address: AddressConfig,
    pub errors: ErrorsConfig,
    pub replies: RepliesConfig,
    pub dispatch: DispatchConfig,
    pub console: ConsoleConfig,
}

/// How a message addresses the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    /// Leading keywords that address the bot (matched case-insensitively).
    pub keywords: Vec<String>,

    /// Filler words stripped right after the address token ("ei noah ...").
    pub followers: Vec<String>,

    /// The bot's own user id. Enables `<@id>` / `<@!id>` addressing and
    /// ignoring the bot's own messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_user_id: Option<String>,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            keywords: vec!["ei".into()],
            followers: vec!["noah".into()],
            bot_user_id: None,
        }
    }
}

/// Deployment environment; controls where error reports go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Reports are posted in the channel the message came from.
    #[default]
    Development,
    /// Users get a generic notice; reports go to the error channel.
    Production,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Error surfacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorsConfig {
    pub environment: Environment,

    /// Operator channel that receives error reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_channel: Option<String>,

    /// Notice shown to users when a command fails in production.
    pub user_notice: String,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            error_channel: None,
            user_notice: "Even normaal doen!".into(),
        }
    }
}

/// Canned replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepliesConfig {
    /// Reply when no route matched. `None` keeps unknown commands silent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_command: Option<String>,

    /// DM sent when the bot may not write in the originating channel.
    pub cannot_send: String,

    /// Same, for authors with administrator permissions.
    pub cannot_send_admin: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            unknown_command: None,
            cannot_send: "Ik kan niet in dat kanaal reageren, vraag een admin om mij \
                          schrijfrechten te geven"
                .into(),
            cannot_send_admin: "Ik kan niet in dat kanaal praten, geef mij schrijfrechten".into(),
        }
    }
}

/// Per-message handling budget.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Overall time budget for one message, in seconds. `None` = unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl DispatchConfig {
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_secs.map(std::time::Duration::from_secs)
    }
}

/// Who "types" in the interactive console.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub user_id: String,
    pub username: String,
    pub admin: bool,
    pub guild_id: String,
    pub guild_name: String,
    pub channel_id: String,
    /// Category the console channel is nested in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    /// Other guild members that console messages may mention.
    pub members: Vec<ConsoleMember>,
    pub roles: Vec<ConsoleRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMember {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleRole {
    pub id: String,
    pub name: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            user_id: "100".into(),
            username: "console".into(),
            admin: true,
            guild_id: "1".into(),
            guild_name: "console".into(),
            channel_id: "10".into(),
            category_id: Some("5".into()),
            members: vec![
                ConsoleMember {
                    id: "2".into(),
                    username: "alice".into(),
                },
                ConsoleMember {
                    id: "3".into(),
                    username: "bob".into(),
                },
            ],
            roles: vec![ConsoleRole {
                id: "7".into(),
                name: "mods".into(),
            }],
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = EiNoahConfig::default();
        assert_eq!(cfg.address.keywords, vec!["ei"]);
        assert_eq!(cfg.address.followers, vec!["noah"]);
        assert_eq!(cfg.errors.environment, Environment::Development);
        assert!(cfg.replies.unknown_command.is_none());
        assert!(cfg.dispatch.timeout().is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let cfg: EiNoahConfig = toml::from_str(
            r#"
            [address]
            bot_user_id = "999"

            [errors]
            environment = "production"
            error_channel = "555"

            [dispatch]
            timeout_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.address.bot_user_id.as_deref(), Some("999"));
        // unspecified fields keep defaults
        assert_eq!(cfg.address.keywords, vec!["ei"]);
        assert_eq!(cfg.errors.environment, Environment::Production);
        assert_eq!(cfg.errors.error_channel.as_deref(), Some("555"));
        assert_eq!(
            cfg.dispatch.timeout(),
            Some(std::time::Duration::from_secs(10))
        );
    }

    #[test]
    fn console_members_from_yaml() {
        let cfg: EiNoahConfig = serde_yaml::from_str(
            "console:\n  members:\n    - id: \"9\"\n      username: carol\n  roles: []\n",
        )
        .unwrap();
        assert_eq!(cfg.console.members, vec![ConsoleMember {
            id: "9".into(),
            username: "carol".into(),
        }]);
        assert!(cfg.console.roles.is_empty());
        assert_eq!(cfg.console.channel_id, "10");
    }

    #[test]
    fn environment_from_str() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("dev".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }
}
