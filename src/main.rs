use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{Chat, User};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use assistbot::ai;
use assistbot::bot::{
    BotEngine, BotIdentity, ChatKind, Content, IncomingCallback, IncomingMessage, Sender, Store,
    TelegramClient,
};
use assistbot::config::Config;
use assistbot::telegram_log::TelegramLogLayer;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "assistbot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {e}");
            eprintln!("Set TELEGRAM_BOT_TOKEN or add telegram_bot_token to {config_path}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    let log_file = std::fs::create_dir_all(&log_dir).and_then(|_| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("assistbot.log"))
    });
    let log_file = match log_file {
        Ok(file) => file,
        Err(e) => {
            eprintln!("ERROR: cannot open log file in {}: {e}", log_dir.display());
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        registry.with(TelegramLogLayer::new(bot.clone(), log_chat_id)).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting assistbot...");
    info!("Loaded config from {config_path}");
    info!("Admin IDs: {:?}", config.admin_ids);
    info!("Data directory: {}", config.data_dir.display());

    let store = Arc::new(Store::new(config.data_dir.clone()));
    if let Err(e) = store.ensure_files() {
        error!("Failed to prepare data directory: {e}");
    }

    let identity = match bot.get_me().await {
        Ok(me) => {
            info!("Bot user ID: {}, username: @{}", me.id, me.username());
            BotIdentity {
                username: Some(me.username().to_string()),
                first_name: me.first_name.clone(),
            }
        }
        Err(e) => {
            warn!("Failed to get bot info: {e}");
            BotIdentity::default()
        }
    };

    let provider = ai::from_config(&config.ai);
    if provider.is_some() {
        info!("AI chat enabled (model {})", config.ai.model);
    } else {
        info!("AI chat disabled");
    }

    let config = Arc::new(config);
    let messenger = Arc::new(TelegramClient::new(bot.clone()));
    let engine = Arc::new(BotEngine::new(config, store, messenger, provider, identity));
    engine.spawn_daily_digest();

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(msg: Message, engine: Arc<BotEngine>) -> ResponseResult<()> {
    let Some(ref user) = msg.from else {
        return Ok(());
    };

    let content = if let Some(text) = msg.text() {
        Content::Text(text.to_string())
    } else if msg.photo().is_some() || msg.video().is_some() || msg.document().is_some() {
        Content::Media
    } else if msg.sticker().is_some() {
        Content::Sticker
    } else if msg.voice().is_some() {
        Content::Voice
    } else {
        return Ok(());
    };

    engine
        .handle_message(IncomingMessage {
            chat_id: msg.chat.id.0,
            chat_kind: chat_kind(&msg.chat),
            sender: sender(user),
            content,
        })
        .await;
    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, engine: Arc<BotEngine>) -> ResponseResult<()> {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback: {e}");
    }

    let Some(data) = q.data.clone() else {
        return Ok(());
    };

    let (chat_id, chat_kind, message_id) = match q.message.as_ref() {
        Some(message) => (
            message.chat().id.0,
            chat_kind(message.chat()),
            Some(message.id().0 as i64),
        ),
        None => (q.from.id.0 as i64, ChatKind::Private, None),
    };

    engine
        .handle_callback(IncomingCallback {
            chat_id,
            chat_kind,
            message_id,
            sender: sender(&q.from),
            data,
        })
        .await;
    Ok(())
}

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

fn sender(user: &User) -> Sender {
    Sender {
        id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}
