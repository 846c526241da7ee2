//! Discord gateway for Codebridge using serenity.
//!
//! Listens for @mentions of the bot, dispatches session commands
//! (`help`, `new`, `switch`, `list`), relays everything else as a chat turn
//! through the orchestrator, and delivers replies in Discord-sized chunks.

use std::sync::Arc;

use codebridge_core::{BridgeError, Orchestrator, Reply, SessionListing};
use serenity::all::{ChannelId, CreateMessage, GatewayIntents};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Discord caps messages at 2000 characters; stay under it with headroom
/// for formatting added by the platform.
const MAX_MESSAGE_LENGTH: usize = 1900;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the Discord gateway.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Discord bot token.
    pub bot_token: String,
}

impl DiscordConfig {
    /// Create a new config with the given bot token.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
        }
    }
}

// ============================================================================
// Discord Gateway
// ============================================================================

/// Discord gateway that bridges chat users to remote sessions.
pub struct DiscordGateway {
    config: DiscordConfig,
    orchestrator: Arc<Orchestrator>,
    cancel: CancellationToken,
}

impl DiscordGateway {
    /// Create a new Discord gateway.
    pub fn new(
        config: DiscordConfig,
        orchestrator: Arc<Orchestrator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            orchestrator,
            cancel,
        }
    }

    /// Connect to Discord and process messages until the cancellation token
    /// fires or the connection fails.
    pub async fn start(self) -> Result<(), serenity::Error> {
        let intents = GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let handler = Handler {
            orchestrator: self.orchestrator,
            cancel: self.cancel.clone(),
            bot_user_id: Arc::new(tokio::sync::OnceCell::new()),
        };

        let mut client = Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await?;

        // Shut the shards down when cancellation is requested; this makes
        // client.start() below return.
        let shard_manager = client.shard_manager.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            info!("shutdown requested, stopping Discord shards");
            shard_manager.shutdown_all().await;
        });

        info!("Discord gateway started");
        client.start().await
    }
}

// ============================================================================
// Event Handler
// ============================================================================

struct Handler {
    orchestrator: Arc<Orchestrator>,
    cancel: CancellationToken,
    /// Bot user ID, set from the Ready event.
    bot_user_id: Arc<tokio::sync::OnceCell<u64>>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        let _ = self.bot_user_id.set(ready.user.id.get());
        info!(
            user = %ready.user.name,
            user_id = %ready.user.id,
            "Discord bot connected"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Skip bot messages to avoid loops
        if msg.author.bot {
            return;
        }

        // Only respond when the bot is @mentioned.
        let Some(bot_id) = self.bot_user_id.get().copied() else {
            return;
        };
        if !msg.mentions.iter().any(|u| u.id.get() == bot_id) {
            return;
        }

        let mut content = strip_mentions(&msg.content, bot_id);
        if content.is_empty() {
            // A bare mention still deserves a response.
            content = "hello".to_string();
        }

        let command = parse_command(&content);
        if let Err(e) = self.handle_command(&ctx, &msg, command).await {
            warn!(error = %e, "failed to deliver response");
        }
    }
}

impl Handler {
    async fn handle_command(
        &self,
        ctx: &Context,
        msg: &Message,
        command: BotCommand,
    ) -> Result<(), serenity::Error> {
        let user_id = msg.author.id.to_string();

        match command {
            BotCommand::Help => {
                msg.reply(&ctx.http, self.help_text()).await?;
            }

            BotCommand::New { model } => {
                let model = model.unwrap_or_else(|| self.orchestrator.default_model().to_string());
                match self.orchestrator.create_session(&user_id).await {
                    Ok(session_id) => {
                        msg.reply(
                            &ctx.http,
                            format!("Started new session `{session_id}`\nModel: `{model}`"),
                        )
                        .await?;
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "session creation failed");
                        msg.reply(&ctx.http, format_error(&e)).await?;
                    }
                }
            }

            BotCommand::Switch { session_id: None } => {
                msg.reply(&ctx.http, "Usage: `@Bot switch <session_id>`")
                    .await?;
            }

            BotCommand::Switch {
                session_id: Some(session_id),
            } => {
                self.orchestrator.switch_session(&user_id, &session_id).await;
                msg.reply(&ctx.http, format!("Switched to session `{session_id}`"))
                    .await?;
            }

            BotCommand::List => {
                let _ = msg.channel_id.broadcast_typing(&ctx.http).await;
                match self.orchestrator.list_sessions(&user_id).await {
                    Ok(sessions) => {
                        send_chunked(&ctx.http, msg.channel_id, &render_session_list(&sessions))
                            .await?;
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "listing sessions failed");
                        msg.reply(&ctx.http, format_error(&e)).await?;
                    }
                }
            }

            BotCommand::Chat { text } => {
                let _ = msg.channel_id.broadcast_typing(&ctx.http).await;
                match self
                    .orchestrator
                    .send_message(&user_id, &text, None, &self.cancel)
                    .await
                {
                    Ok(Reply::Text(reply)) => {
                        send_chunked(&ctx.http, msg.channel_id, &reply).await?;
                    }
                    Ok(Reply::Timeout) => {
                        msg.reply(
                            &ctx.http,
                            "No reply from the assistant (timed out waiting). Try again.",
                        )
                        .await?;
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "chat turn failed");
                        msg.reply(&ctx.http, format_error(&e)).await?;
                    }
                }
            }
        }

        Ok(())
    }

    fn help_text(&self) -> String {
        format!(
            "**Codebridge commands:**\n\
             - `@Bot new [model]` - Start a new session (default model: `{}`)\n\
             - `@Bot switch <session_id>` - Switch to an existing session\n\
             - `@Bot list` - List all available sessions\n\
             - `@Bot <message>` - Chat with the current session",
            self.orchestrator.default_model()
        )
    }
}

// ============================================================================
// Command Parsing
// ============================================================================

/// A parsed bot command from the text following the mention.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BotCommand {
    Help,
    New { model: Option<String> },
    Switch { session_id: Option<String> },
    List,
    Chat { text: String },
}

fn parse_command(content: &str) -> BotCommand {
    let mut words = content.split_whitespace();
    match words.next() {
        Some("help") => BotCommand::Help,
        Some("new") => BotCommand::New {
            model: words.next().map(str::to_string),
        },
        Some("switch") => BotCommand::Switch {
            session_id: words.next().map(str::to_string),
        },
        Some("list") => BotCommand::List,
        _ => BotCommand::Chat {
            text: content.to_string(),
        },
    }
}

/// Remove the bot's mention markup (`<@id>` and `<@!id>`) from the message.
fn strip_mentions(content: &str, bot_id: u64) -> String {
    content
        .replace(&format!("<@{bot_id}>"), "")
        .replace(&format!("<@!{bot_id}>"), "")
        .trim()
        .to_string()
}

// ============================================================================
// Rendering
// ============================================================================

fn format_error(err: &BridgeError) -> String {
    match err {
        BridgeError::SessionExpired(_) => {
            "Session expired or was not found. Send your message again to start fresh.".to_string()
        }
        BridgeError::Cancelled => "Request cancelled.".to_string(),
        BridgeError::Transport(e) => format!("Something went wrong talking to the server: {e}"),
    }
}

fn render_session_list(sessions: &[SessionListing]) -> String {
    if sessions.is_empty() {
        return "No sessions found.".to_string();
    }

    let mut lines = vec!["**Available sessions:**".to_string()];
    for session in sessions {
        let marker = if session.active { " (active)" } else { "" };
        lines.push(format!("- `{}`{}", session.id, marker));
    }
    lines.join("\n")
}

// ============================================================================
// Chunked Delivery
// ============================================================================

async fn send_chunked(
    http: &Arc<serenity::http::Http>,
    channel: ChannelId,
    text: &str,
) -> Result<(), serenity::Error> {
    if text.is_empty() {
        channel
            .send_message(http, CreateMessage::new().content("<empty response>"))
            .await?;
        return Ok(());
    }

    for chunk in chunk_text(text, MAX_MESSAGE_LENGTH) {
        channel
            .send_message(http, CreateMessage::new().content(chunk))
            .await?;
    }
    Ok(())
}

/// Split `text` into chunks of at most `limit` characters on char
/// boundaries. The chunks concatenate back to the original text.
fn chunk_text(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let split = rest
            .char_indices()
            .map(|(i, _)| i)
            .nth(limit)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(split);
        chunks.push(chunk);
        rest = tail;
    }

    chunks
}
