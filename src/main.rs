mod config;
mod frame;
mod host;
mod quiz;
mod shell;

use std::sync::Arc;

use config::FrameConfig;
use dotenv::dotenv;
use frame::{AnswerOutcome, FrameRegistry};
use host::{telegram::TelegramHost, HostEvent};
use log::{debug, info};
use teloxide::{
    prelude::*,
    types::{KeyboardRemove, UserId},
    utils::command::BotCommands,
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone)]
struct Frames {
    bot_id: UserId,
    config: Arc<FrameConfig>,
    open: FrameRegistry<TelegramHost>,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "snake_case", description = "These commands are supported:")]
enum Command {
    #[command(description = "open the quiz frame in this chat")]
    Start,
    #[command(description = "remove the quiz frame")]
    Stop,
    #[command(description = "pin the quiz frame")]
    Pin,
    #[command(description = "get notified about the frame")]
    NotifyOn,
    #[command(description = "stop notifications")]
    NotifyOff,
    #[command(description = "show the frame status")]
    Menu,
    #[command(description = "display this text")]
    Help,
}

#[tokio::main]
async fn main() {
    // a missing .env is fine, the variables may come from the environment
    dotenv().ok();

    pretty_env_logger::init();
    log::info!("Starting quiz frame bot...");

    let config = match FrameConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            log::error!("Invalid configuration: {}", err);
            return;
        }
    };
    info!(
        "Loaded \"{}\" with {} questions, reset after {:?}",
        config.title,
        config.bank.len(),
        config.reset_delay
    );

    let bot = Bot::from_env();
    let bot_id = match bot.get_me().await {
        Ok(me) => me.id,
        Err(err) => {
            log::error!("Failed to reach Telegram: {}", err);
            return;
        }
    };

    let frames = Frames {
        bot_id,
        config,
        open: FrameRegistry::default(),
    };

    let handler = Update::filter_message()
        .branch(dptree::entry().filter_command::<Command>().endpoint(command))
        .branch(dptree::filter(|msg: Message| msg.pinned_message().is_some()).endpoint(pinned))
        .branch(dptree::endpoint(answer));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![frames])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn command(bot: Bot, msg: Message, cmd: Command, frames: Frames) -> HandlerResult {
    let chat_id = msg.chat.id;

    match cmd {
        Command::Help => {
            bot.send_message(chat_id, Command::descriptions().to_string()).await?;
        }
        Command::Start => {
            if frames.open.contains(chat_id).await {
                bot.send_message(chat_id, "The quiz is already running here")
                    .await?;
                return Ok(());
            }

            let config = frames.config.clone();
            let frame = frame::open_in_chat(bot.clone(), chat_id, frames.bot_id, config).await?;
            if let Some(status) = frame.view().pin_status {
                bot.send_message(chat_id, status).await?;
            }
            // two /start racing each other keep the newest frame
            if let Some(previous) = frames.open.insert(chat_id, frame).await {
                previous.lock().await.close();
            }
        }
        Command::Stop => {
            match frames.open.remove(chat_id).await {
                Some(frame) => {
                    let mut frame = frame.lock().await;
                    frame.host().dispatch(HostEvent::Removed);
                    frame.close();
                    bot.send_message(chat_id, "Quiz frame removed")
                        .reply_markup(KeyboardRemove::new())
                        .await?;
                }
                None => {
                    bot.send_message(chat_id, "There is no quiz here, send /start")
                        .await?;
                }
            }
        }
        Command::Pin => {
            // only this chat's frame stays locked while Telegram answers
            let status = match frames.open.get(chat_id).await {
                Some(frame) => match frame.lock().await.request_pin().await {
                    Ok(()) => "Frame pinned".to_string(),
                    Err(err) => err.to_string(),
                },
                None => "There is no quiz here, send /start".to_string(),
            };
            bot.send_message(chat_id, status).await?;
        }
        Command::NotifyOn | Command::NotifyOff | Command::Menu => {
            let text = match frames.open.get(chat_id).await {
                Some(frame) => {
                    let frame = frame.lock().await;
                    let event = match cmd {
                        Command::NotifyOn => HostEvent::NotificationsEnabled {
                            notifications: frame.host().notification_details(),
                        },
                        Command::NotifyOff => HostEvent::NotificationsDisabled,
                        _ => HostEvent::PrimaryActionInvoked,
                    };
                    frame.host().dispatch(event);

                    let view = frame.view();
                    format!(
                        "Pinned: {}\nNotifications: {}",
                        if view.added { "yes" } else { "no" },
                        if view.notifications_enabled { "on" } else { "off" }
                    )
                }
                None => "There is no quiz here, send /start".to_string(),
            };
            bot.send_message(chat_id, text).await?;
        }
    }

    Ok(())
}

async fn pinned(msg: Message, frames: Frames) -> HandlerResult {
    // our own pins are reported by the host when the request succeeds
    if msg.from().map_or(false, |user| user.id == frames.bot_id) {
        return Ok(());
    }
    let ours = msg
        .pinned_message()
        .and_then(|pinned| pinned.from())
        .map_or(false, |author| author.id == frames.bot_id);
    if !ours {
        return Ok(());
    }

    if let Some(frame) = frames.open.get(msg.chat.id).await {
        frame.lock().await.host().dispatch(HostEvent::PinAdded {
            notifications: None,
        });
    }
    Ok(())
}

async fn answer(bot: Bot, msg: Message, frames: Frames) -> HandlerResult {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let outcome = match frames.open.get(msg.chat.id).await {
        Some(frame) => Some(frame.lock().await.answer(text)),
        None => None,
    };

    match outcome {
        Some(AnswerOutcome::Accepted(state)) => {
            debug!(
                "Chat {}: answered {:?}, score {}",
                msg.chat.id.0, state.answers, state.score
            );
        }
        Some(AnswerOutcome::NotAnOption) => {
            bot.send_message(msg.chat.id, "Please pick one of the options")
                .await?;
        }
        Some(AnswerOutcome::Dwelling) => {
            bot.send_message(msg.chat.id, "The quiz restarts in a moment")
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Send /start to open the quiz")
                .await?;
        }
    }
    Ok(())
}
