//! Huddle demo: two clients chatting over the in-process hub.
//!
//! Exercises the session core end to end without a network backend.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use huddle_core::config::AppConfig;
use huddle_core::error::AppError;
use huddle_core::traits::StaticTokenProvider;
use huddle_core::types::{Message, MessageMetadata, MessageReaction, PresenceChange, RoomReaction};
use huddle_realtime::bridge::{MemoryBackend, MemoryHub};
use huddle_realtime::{ChatSession, SenderProfile, SessionEvents};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and `HUDDLE_*` variables.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("HUDDLE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Logs every event a client receives.
struct LoggingEvents {
    client: &'static str,
}

impl SessionEvents for LoggingEvents {
    fn on_message(&self, channel: &str, message: &Message) {
        tracing::info!(
            client = self.client,
            channel = %channel,
            from = %message.sender_display_name,
            content = %message.content,
            "Message received"
        );
    }

    fn on_presence_change(&self, channel: &str, change: &PresenceChange) {
        tracing::info!(
            client = self.client,
            channel = %channel,
            member = %change.member.client_id,
            action = ?change.member.last_event,
            members = ?change.members,
            "Presence changed"
        );
    }

    fn on_typing_change(&self, channel: &str, typing: &HashSet<String>) {
        tracing::info!(client = self.client, channel = %channel, typing = ?typing, "Typing changed");
    }

    fn on_room_reaction(&self, channel: &str, reaction: &RoomReaction) {
        tracing::info!(
            client = self.client,
            channel = %channel,
            reaction = %reaction.name,
            from = %reaction.user_id,
            "Room reaction"
        );
    }

    fn on_message_reaction(&self, channel: &str, reaction: &MessageReaction) {
        tracing::info!(
            client = self.client,
            channel = %channel,
            message_identity = %reaction.message_identity,
            summary = ?reaction.summary,
            "Message reactions updated"
        );
    }
}

fn client(hub: &MemoryHub, config: &AppConfig, name: &'static str, display: &str) -> ChatSession {
    let session = ChatSession::new(
        Arc::new(MemoryBackend::new(hub.clone())),
        Arc::new(StaticTokenProvider::new(format!("demo-token-{name}"))),
        config.realtime.clone(),
    )
    .with_profile(SenderProfile::new(name).with_display_name(display));
    session.set_handlers(Arc::new(LoggingEvents { client: name }));
    session.on_connection_state_change(move |change| {
        tracing::info!(client = name, previous = %change.previous, current = %change.current, "Connection state");
    });
    session
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Huddle demo v{}", env!("CARGO_PKG_VERSION"));

    let hub = MemoryHub::new();
    let alice = client(&hub, &config, "alice", "Alice");
    let bob = client(&hub, &config, "bob", "Bob");

    alice.connect("alice").await?;
    bob.connect("bob").await?;

    alice.switch_to("general").await?;
    bob.switch_to("general").await?;
    tracing::info!(members = ?alice.presence_members(), "Both clients in 'general'");

    bob.send_typing(true).await?;
    bob.send_typing(false).await?;

    let metadata = MessageMetadata::new()
        .with_topic("greeting")
        .with_extra("mood", serde_json::json!("cheerful"));
    alice.send("Hello Bob!", Some(metadata)).await?;
    bob.send("Hi Alice", None).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let history = bob.fetch_history(10).await?;
    if let Some(latest) = history.first() {
        if let Some(identity) = latest.identity() {
            alice.send_message_reaction(identity, "like").await;
        }
    }
    bob.send_room_reaction("applause").await;

    // alice moves rooms; bob should see her leave
    alice.switch_to("random").await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    tracing::info!(members = ?bob.presence_members(), "Members left in 'general'");

    for message in &history {
        tracing::info!(from = %message.sender_id, content = %message.content, "History");
    }

    alice.close().await;
    bob.close().await;
    tracing::info!("Demo finished");
    Ok(())
}
