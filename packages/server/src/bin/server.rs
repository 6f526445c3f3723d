//! Patient–doctor chat server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin clinic-chat-server
//! cargo run --bin clinic-chat-server -- --port 3000 --appointment p-1:d-1:active
//! ```

use std::{str::FromStr, sync::Arc, time::Duration};

use clap::Parser;
use clinic_chat_server::{
    config::ChatConfig,
    domain::{AppointmentStore, MessagePusher, PresenceRegistry, PushService, Timestamp, UserId},
    infrastructure::{
        dto::conversion::EventEncoder,
        message_pusher::WebSocketMessagePusher,
        presence::InMemoryPresenceRegistry,
        push::{LogPushService, WebhookPushService},
        repository::{InMemoryAppointmentStore, InMemoryMessageStore},
    },
    ui::{Server, state::AppState},
    usecase::{
        ChatSessionManager, ConnectUserUseCase, ConversationResolver, DisconnectUserUseCase,
        MessageStoreGateway, NotificationDispatcher, PresenceGate,
    },
};
use clinic_chat_shared::{
    logger::setup_logger,
    time::{SystemClock, get_utc_timestamp},
};

#[derive(Parser, Debug)]
#[command(name = "clinic-chat-server")]
#[command(about = "Real-time chat between patients and doctors", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "CHAT_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "CHAT_PORT", default_value = "8080")]
    port: u16,

    /// Upper bound on each external-store call, in milliseconds
    #[arg(long, env = "CHAT_STORE_TIMEOUT_MS", default_value = "3000")]
    store_timeout_ms: u64,

    /// Messages returned on join and by history reads without a limit
    #[arg(long, env = "CHAT_HISTORY_PAGE_SIZE", default_value = "50")]
    history_page_size: usize,

    /// Upper clamp for client-supplied history limits
    #[arg(long, env = "CHAT_MAX_HISTORY_PAGE_SIZE", default_value = "200")]
    max_history_page_size: usize,

    /// Prefix that turns an attachment storage key into a fetchable URL
    #[arg(
        long,
        env = "CHAT_ATTACHMENT_BASE_URL",
        default_value = "http://localhost:9000/attachments"
    )]
    attachment_base_url: String,

    /// POST push notifications to this URL instead of logging them
    #[arg(long, env = "CHAT_PUSH_WEBHOOK_URL")]
    push_webhook_url: Option<String>,

    /// Seed an appointment as `patient:doctor:status` (repeatable; empty status = unset)
    #[arg(long = "appointment", value_name = "PATIENT:DOCTOR:STATUS")]
    appointments: Vec<SeedAppointment>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "debug")]
    log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SeedAppointment {
    patient: UserId,
    doctor: UserId,
    status: Option<String>,
}

impl FromStr for SeedAppointment {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.splitn(3, ':');
        let (Some(patient), Some(doctor)) = (parts.next(), parts.next()) else {
            return Err(format!("expected PATIENT:DOCTOR[:STATUS], got '{}'", raw));
        };
        let status = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Self {
            patient: UserId::try_from(patient).map_err(|e| e.to_string())?,
            doctor: UserId::try_from(doctor).map_err(|e| e.to_string())?,
            status,
        })
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger("clinic_chat_server", env!("CARGO_BIN_NAME"), &args.log_level);

    let config = ChatConfig {
        store_timeout: Duration::from_millis(args.store_timeout_ms),
        history_page_size: args.history_page_size,
        max_history_page_size: args.max_history_page_size,
        attachment_base_url: args.attachment_base_url,
    };
    tracing::debug!("Starting with {:?}", config);

    // Initialize dependencies in order:
    // 1. Collaborators (stores, push service)
    // 2. Presence registry and MessagePusher
    // 3. UseCases
    let presence_gate = Arc::new(PresenceGate::new());
    // 4. AppState and Server

    // 1. Collaborators
    let appointments = Arc::new(InMemoryAppointmentStore::new());
    let seeded_at = Timestamp::new(get_utc_timestamp());
    for seed in args.appointments {
        tracing::info!(
            "Seeding appointment {} / {} ({})",
            seed.patient,
            seed.doctor,
            seed.status.as_deref().unwrap_or("unset")
        );
        appointments
            .record_appointment(seed.patient, seed.doctor, seed.status, seeded_at)
            .await;
    }
    let appointments: Arc<dyn AppointmentStore> = appointments;
    let messages = Arc::new(InMemoryMessageStore::new());

    let push: Arc<dyn PushService> = match args.push_webhook_url {
        Some(url) => match WebhookPushService::new(url.clone()) {
            Ok(service) => {
                tracing::info!("Push notifications are POSTed to {}", url);
                Arc::new(service)
            }
            Err(e) => {
                tracing::error!("Failed to create push webhook client: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::info!("No push webhook configured, push notifications are logged");
            Arc::new(LogPushService)
        }
    };

    // 2. Presence registry and MessagePusher (WebSocket implementation)
    let encoder = EventEncoder::new(config.attachment_base_url.clone());
    let presence: Arc<dyn PresenceRegistry> = Arc::new(InMemoryPresenceRegistry::new());
    let message_pusher: Arc<dyn MessagePusher> =
        Arc::new(WebSocketMessagePusher::new(encoder.clone()));

    // 3. UseCases
    let presence_gate = Arc::new(PresenceGate::new());
    let sessions = Arc::new(ChatSessionManager::new(
        ConversationResolver::new(appointments, config.store_timeout),
        MessageStoreGateway::new(messages, Arc::new(SystemClock), &config),
        message_pusher.clone(),
        NotificationDispatcher::new(presence.clone(), push),
        ConnectUserUseCase::new(presence.clone(), message_pusher.clone(), presence_gate.clone()),
        DisconnectUserUseCase::new(presence.clone(), message_pusher, presence_gate),
    ));

    // 4. Create and run the server
    let server = Server::new(AppState {
        sessions,
        presence,
        encoder,
    });
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_appointment() {
        // テスト項目: patient:doctor:status 形式の予約指定を解釈できる
        // given (前提条件) / when (操作):
        let seed: SeedAppointment = "p-1:d-1:active".parse().unwrap();
        let unset: SeedAppointment = "p-1:d-1".parse().unwrap();

        // then (期待する結果):
        assert_eq!(seed.patient.as_str(), "p-1");
        assert_eq!(seed.doctor.as_str(), "d-1");
        assert_eq!(seed.status.as_deref(), Some("active"));
        assert_eq!(unset.status, None);
        assert!("p-1".parse::<SeedAppointment>().is_err());
    }
}
