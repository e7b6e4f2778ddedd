//! Routes served by the console build.

use std::sync::Arc;

use {
    async_trait::async_trait,
    einoah_channels::Platform,
    einoah_common::{Reply, RichReply},
    einoah_routing::{
        HandlerResult, Identity, InitHook, InvocationContext, ResolvedValue, RouteHandler,
        RouteKey, RouteNode, RouteTable, TypeTag, handler_fn,
    },
    einoah_sessions::Persistence,
    futures::FutureExt,
    tracing::info,
};

const LOBBY_COLOR: u32 = 0x5865f2;

struct Help {
    commands: Vec<String>,
}

#[async_trait]
impl RouteHandler for Help {
    async fn handle(&self, _ctx: &InvocationContext) -> HandlerResult {
        let reply = RichReply::titled("EiNoah")
            .description(format!("Commando's: {}", self.commands.join(", ")))
            .field("Gebruik", "ei <commando> [argumenten] [-vlag]", false);
        Ok(Some(reply.into()))
    }
}

struct WhoAmI;

#[async_trait]
impl RouteHandler for WhoAmI {
    async fn handle(&self, ctx: &InvocationContext) -> HandlerResult {
        let text = match ctx.identity().await? {
            Identity::Guild(member) => format!(
                "{} (lid #{} van server {})",
                member.user.username, member.id, member.guild_id
            ),
            Identity::Bare(user) => format!("{} (#{})", user.username, user.id),
        };
        Ok(Some(text.into()))
    }
}

/// Describes whatever the `whois` type entry consumed.
struct WhoIs;

#[async_trait]
impl RouteHandler for WhoIs {
    async fn handle(&self, ctx: &InvocationContext) -> HandlerResult {
        let text = match ctx.route_argument() {
            Some(ResolvedValue::User(user)) if user.bot => format!("{} is een bot", user.username),
            Some(ResolvedValue::User(user)) => format!("{} heeft id {}", user.username, user.id),
            Some(ResolvedValue::Role(role)) => {
                format!("{} is een rol in server {}", role.name, role.guild_id)
            },
            Some(ResolvedValue::Channel(channel)) => format!("{} is een kanaal", channel.mention()),
            Some(ResolvedValue::Literal(_)) | None => return Ok(None),
        };
        Ok(Some(text.into()))
    }
}

struct ShowCategory;

#[async_trait]
impl RouteHandler for ShowCategory {
    async fn handle(&self, ctx: &InvocationContext) -> HandlerResult {
        let text = match ctx.category().await? {
            None => "Dit kanaal zit niet in een categorie".to_string(),
            Some(category) if category.is_lobby_category => {
                format!("Lobbies zijn toegestaan in categorie {}", category.id)
            },
            Some(category) => format!("Lobbies zijn uitgeschakeld in categorie {}", category.id),
        };
        Ok(Some(text.into()))
    }
}

struct SetLobbyCategory(bool);

#[async_trait]
impl RouteHandler for SetLobbyCategory {
    async fn handle(&self, ctx: &InvocationContext) -> HandlerResult {
        let Some(category) = ctx.category().await? else {
            return Ok(Some("Dit kanaal zit niet in een categorie".into()));
        };
        let mut record = (*category).clone();
        record.is_lobby_category = self.0;
        ctx.session().save_category(record).await?;

        let state = if self.0 {
            "aan"
        } else {
            "uit"
        };
        Ok(Some(format!("Lobbies {state} voor categorie {}", category.id).into()))
    }
}

struct CreateLobby;

#[async_trait]
impl RouteHandler for CreateLobby {
    async fn handle(&self, ctx: &InvocationContext) -> HandlerResult {
        let Some(member) = ctx.guild_identity().await? else {
            return Ok(Some("Je kan alleen lobbies aanmaken in een server".into()));
        };
        if member.temp_channel.is_some() {
            return Ok(Some("Je hebt al een lobby".into()));
        }

        match ctx.category().await? {
            Some(category) if category.is_lobby_category => {},
            _ => return Ok(Some("Je kan hier geen lobby aanmaken".into())),
        }

        let mut allowed = Vec::new();
        for value in ctx.params() {
            match value {
                ResolvedValue::User(user) => allowed.push(user.username.clone()),
                ResolvedValue::Role(role) => allowed.push(format!("@{}", role.name)),
                other => return Ok(Some(format!("{other} is geen gebruiker of rol").into())),
            }
        }

        let speak = if ctx.has_flag("nospeak") {
            "nee"
        } else {
            "ja"
        };
        let access = if allowed.is_empty() {
            "iedereen".to_string()
        } else {
            allowed.join(", ")
        };

        let reply = RichReply::titled("Lobby")
            .field("Eigenaar", member.user.username.clone(), true)
            .field("Toegang", access, true)
            .field("Spreken", speak, true)
            .color(LOBBY_COLOR);
        Ok(Some(Reply::Rich(reply)))
    }
}

/// Summary of every mention in the message, however deep the route was.
struct Mentions;

#[async_trait]
impl RouteHandler for Mentions {
    async fn handle(&self, ctx: &InvocationContext) -> HandlerResult {
        let mentioned: Vec<String> = ctx
            .absolute_params()
            .iter()
            .filter(|value| value.type_tag().is_some())
            .map(ToString::to_string)
            .collect();
        if mentioned.is_empty() {
            return Ok(Some("Niemand genoemd".into()));
        }
        Ok(Some(mentioned.join(" ").into()))
    }
}

struct ConsoleInit;

#[async_trait]
impl InitHook for ConsoleInit {
    async fn init(
        &self,
        _platform: Arc<dyn Platform>,
        persistence: Arc<dyn Persistence>,
    ) -> anyhow::Result<()> {
        persistence.fork().flush().await?;
        info!("console routes ready");
        Ok(())
    }
}

/// Assemble the route tree.
pub fn build() -> einoah_routing::Result<RouteTable> {
    let ping = handler_fn(|_ctx| async { Ok(Some(Reply::from("pong"))) }.boxed());

    let whois = RouteTable::new()
        .route(TypeTag::User, RouteNode::handler(WhoIs))?
        .route(TypeTag::Role, RouteNode::handler(WhoIs))?
        .route(TypeTag::Channel, RouteNode::handler(WhoIs))?;

    let lobby_switch = RouteTable::new()
        .route("on", RouteNode::handler(SetLobbyCategory(true)))?
        .route("off", RouteNode::handler(SetLobbyCategory(false)))?;
    let category = RouteTable::new()
        .route("lobby", lobby_switch)?
        .route(RouteKey::Wildcard, RouteNode::handler(ShowCategory))?;

    let lobby = RouteTable::new().route("create", RouteNode::handler(CreateLobby))?;

    let mut root = RouteTable::new()
        .with_init(Arc::new(ConsoleInit))
        .route("ping", ping)?
        .route("whoami", RouteNode::handler(WhoAmI))?
        .route("whois", whois)?
        .route("category", category)?
        .route("lobby", lobby)?
        .route("mentions", RouteNode::handler(Mentions))?;

    let mut commands: Vec<String> = root.literal_keys().into_iter().map(String::from).collect();
    commands.push("help".into());
    commands.sort();
    root.register("help", RouteNode::handler(Help { commands }))?;

    Ok(root)
}
