mod config;
mod gemini;
mod language;
mod resolver;
mod store;

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatAction, KeyboardButton, KeyboardMarkup, ParseMode, User};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use config::Config;
use gemini::GeminiClient;
use resolver::{Resolution, Resolver};
use store::{NewInteraction, StatsSnapshot, Store};

/// Ephemeral message shown while the API call is in flight.
const THINKING_TEXT: &str = "Обрабатываю ваш запрос...";

/// Reply for anything that blows up during dispatch or delivery.
const UNEXPECTED_FALLBACK: &str = "Произошла непредвиденная ошибка. Попробуйте еще раз.";

/// Stored in place of the response when the API returns no candidates.
const EMPTY_RESPONSE_MARKER: &str = "ОШИБКА: Не удалось получить ответ от AI";

/// Interval between liveness probes.
const LIVENESS_INTERVAL: Duration = Duration::from_secs(600);

/// Synthetic prompt for the periodic self-test.
const SELF_TEST_PROMPT: &str = "Ответь одним словом: работаешь?";

const BTN_ABOUT: &str = "О боте";
const BTN_EXAMPLES: &str = "Примеры запросов";
const BTN_HELP: &str = "Помощь";

const WELCOME_TEXT: &str = r#"<b>Добро пожаловать в умный чат-бот!</b>

Я помогу вам с:
• Ответами на вопросы
• Решением задач
• Объяснением сложных тем
• Творческими идеями

Просто напишите ваш вопрос или выберите опцию ниже."#;

const HELP_TEXT: &str = r#"<b>Справка по использованию бота</b>

Команды:
/start - начать работу
/help - показать справку
/myid - узнать свой ID
/stats - статистика (только для админа)

Примеры запросов:
• "Объясни квантовую физику простыми словами"
• "Напиши план для изучения Python"
• "Помоги решить математическую задачу"
• "Расскажи интересный факт о космосе""#;

const ABOUT_TEXT: &str = r#"<b>О боте</b>

Я - интеллектуальный помощник STLNbot на модели Gemini 2.0 Flash Experimental.

Мои возможности:
• Отвечать на вопросы любой сложности
• Помогать с учебой и работой
• Объяснять сложные концепции
• Поддерживать беседу на различные темы"#;

const EXAMPLES_TEXT: &str = r#"<b>Примеры запросов для вдохновения:</b>

Образование:
• "Объясни теорию относительности"
• "Помоги с домашним заданием по математике"
• "Расскажи о Древнем Риме"

Творчество:
• "Напиши короткий рассказ о космосе"
• "Придумай идеи для стартапа"
• "Составь план тренировок"

Помощь:
• "Как научиться программировать?"
• "Давай подготовимся к собеседованию"
• "Объясни эту научную статью""#;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    #[command(description = "начать работу")]
    Start,
    #[command(description = "показать справку")]
    Help,
    #[command(description = "узнать свой ID")]
    MyId,
    #[command(description = "статистика (только для админа)")]
    Stats,
}

/// Application context shared by every handler.
struct BotState {
    config: Config,
    resolver: Resolver<GeminiClient>,
    store: Store,
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Ошибка конфигурации: {e}");
            std::process::exit(1);
        }
    };

    std::fs::create_dir_all(&config.data_dir).ok();

    // Setup logging: stdout plus a non-blocking log file in the data dir
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.data_dir.join("stlnbot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
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
        )
        .init();

    info!("🚀 Starting stlnbot (model: {})", gemini::MODEL_NAME);

    let store = match Store::open(&config.data_dir.join("requests.db")) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open record store: {e}");
            std::process::exit(1);
        }
    };

    log_recent_requests(&store);

    let bot = Bot::new(config.bot_token.clone());
    let resolver = Resolver::new(GeminiClient::new(config.gemini_api_key.clone()));
    let state = Arc::new(BotState {
        config,
        resolver,
        store,
    });

    spawn_liveness_probe(bot.clone(), state.clone());

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_message().endpoint(handle_text));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/// Startup dump of the record store, matching what an operator would ask for.
fn log_recent_requests(store: &Store) {
    match store.dump(10) {
        Ok(records) => {
            info!("Последние {} запросов:", records.len());
            for rec in &records {
                let preview: String = rec.user_message.chars().take(60).collect();
                info!(
                    "  [{}] @{}: {}",
                    rec.timestamp,
                    rec.username.as_deref().unwrap_or("Нет username"),
                    preview
                );
            }
        }
        Err(e) => warn!("Failed to dump record store: {e}"),
    }
}

/// Periodic self-check: confirms the Telegram session is alive and runs a
/// synthetic resolve. Failures are logged and swallowed, never affecting the
/// dispatch path.
fn spawn_liveness_probe(bot: Bot, state: Arc<BotState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIVENESS_INTERVAL);
        loop {
            interval.tick().await;

            match bot.get_me().await {
                Ok(me) => info!("Liveness: session alive as @{}", me.username()),
                Err(e) => warn!("Liveness: get_me failed: {e}"),
            }

            match state.resolver.resolve(SELF_TEST_PROMPT).await {
                Resolution::Answer(_) | Resolution::Override(_) => {
                    info!("Liveness: self-test answered")
                }
                Resolution::Empty => warn!("Liveness: self-test returned no candidates"),
                Resolution::Failed(reason) => warn!("Liveness: self-test failed: {reason}"),
            }
        }
    });
}

fn main_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new(BTN_ABOUT),
            KeyboardButton::new(BTN_EXAMPLES),
        ],
        vec![KeyboardButton::new(BTN_HELP)],
    ])
    .resize_keyboard()
    .input_field_placeholder("Напишите ваш вопрос...")
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, WELCOME_TEXT)
                .parse_mode(ParseMode::Html)
                .reply_markup(main_keyboard())
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, HELP_TEXT)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::MyId => {
            let Some(user) = msg.from.clone() else {
                return Ok(());
            };
            let text = format!(
                "<b>Ваши данные:</b>\n\n\
                 ID: <code>{}</code>\n\
                 Имя: {}\n\
                 Фамилия: {}\n\
                 Username: @{}",
                user.id,
                user.first_name,
                user.last_name.as_deref().unwrap_or("Не указана"),
                user.username.as_deref().unwrap_or("Не указан"),
            );
            bot.send_message(msg.chat.id, text)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::Stats => {
            let Some(user) = msg.from.clone() else {
                return Ok(());
            };
            if user.id.0 != state.config.admin_id {
                bot.send_message(msg.chat.id, "❌ Эта команда доступна только администратору")
                    .await?;
                return Ok(());
            }

            match state.store.stats() {
                Ok(stats) => {
                    bot.send_message(msg.chat.id, format_stats(&stats))
                        .parse_mode(ParseMode::Html)
                        .await?;
                }
                Err(e) => {
                    error!("Failed to read stats: {e}");
                    bot.send_message(msg.chat.id, UNEXPECTED_FALLBACK).await?;
                }
            }
        }
    }
    Ok(())
}

fn format_stats(stats: &StatsSnapshot) -> String {
    let mut text = format!(
        "<b>Статистика бота</b>\n\n\
         Модель: {}\n\
         Всего пользователей: {}\n\
         Всего запросов: {}\n",
        gemini::MODEL_NAME,
        stats.unique_users,
        stats.total_requests,
    );

    if stats.recent.is_empty() {
        text.push_str("\nПока нет запросов.");
        return text;
    }

    text.push_str("\n<b>Последние запросы:</b>");
    for (i, rec) in stats.recent.iter().enumerate() {
        let username = rec.username.as_deref().unwrap_or("Нет username");
        let message = if rec.user_message.is_empty() {
            "Пустой запрос"
        } else {
            &rec.user_message
        };
        let preview: String = message.chars().take(50).collect();
        let ellipsis = if message.chars().count() > 50 { "..." } else { "" };
        text.push_str(&format!("\n{}. @{}: {}{}", i + 1, username, preview, ellipsis));
        text.push_str(&format!("\n   Время: {}", rec.timestamp));
    }
    text
}

async fn handle_text(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text().map(str::to_owned) else {
        return Ok(());
    };
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };

    // Keyboard buttons are fixed texts, not questions for the model
    match text.as_str() {
        BTN_ABOUT => {
            bot.send_message(msg.chat.id, ABOUT_TEXT)
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
        BTN_EXAMPLES => {
            bot.send_message(msg.chat.id, EXAMPLES_TEXT)
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
        BTN_HELP => {
            bot.send_message(msg.chat.id, HELP_TEXT)
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
        _ => {}
    }

    // Anything unexpected ends the turn with a generic apology; no record
    // is saved for a failed turn.
    if let Err(e) = answer_question(&bot, &msg, &text, &user, &state).await {
        error!("Message handling failed: {e}");
        bot.send_message(msg.chat.id, UNEXPECTED_FALLBACK).await.ok();
    }
    Ok(())
}

/// The Received → Thinking → Answered path for one inbound question.
async fn answer_question(
    bot: &Bot,
    msg: &Message,
    text: &str,
    user: &User,
    state: &BotState,
) -> ResponseResult<()> {
    bot.send_chat_action(msg.chat.id, ChatAction::Typing).await?;
    let thinking = bot.send_message(msg.chat.id, THINKING_TEXT).await?;

    let resolution = state.resolver.resolve(text).await;

    // Retraction is best-effort; a stale "thinking" bubble is harmless
    bot.delete_message(msg.chat.id, thinking.id).await.ok();
    bot.send_message(msg.chat.id, resolution.reply_text()).await?;

    let stored_response = match &resolution {
        Resolution::Override(reply) | Resolution::Answer(reply) => Some(reply.clone()),
        Resolution::Empty => Some(EMPTY_RESPONSE_MARKER.to_string()),
        // Transport failures are not persisted
        Resolution::Failed(_) => None,
    };

    if let Some(bot_response) = stored_response {
        let record = NewInteraction {
            user_id: user.id.0 as i64,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            user_message: text.to_string(),
            bot_response,
        };
        if let Err(e) = state.store.save(record) {
            warn!("Failed to save interaction: {e}");
        }
    }

    Ok(())
}
