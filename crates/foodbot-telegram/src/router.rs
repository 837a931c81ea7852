use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand as TgCommand};

use tokio_util::sync::CancellationToken;

use foodbot_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use foodbot_core::{
    commands::{CommandHandler, COMMANDS},
    config::Config,
    messaging::port::MessagingPort,
    ports::ProcessSupervisor,
    posts::PostService,
    registry::DestinationRegistry,
    scheduler::{DeliveryLoop, UtcClock},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub commands: Arc<CommandHandler>,
    pub registry: Arc<DestinationRegistry>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    service: Arc<PostService>,
    supervisor: Arc<dyn ProcessSupervisor>,
    registry: Arc<DestinationRegistry>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "bot connected"),
        Err(e) => anyhow::bail!("telegram login failed: {e}"),
    }
    tracing::info!(
        admins = cfg.admin_users.len(),
        destinations = registry.list().await.len(),
        "starting"
    );

    let menu: Vec<TgCommand> = COMMANDS
        .iter()
        .map(|c| TgCommand::new(c.name, c.description))
        .collect();
    if let Err(e) = bot.set_my_commands(menu).await {
        tracing::warn!("failed to register command menu: {e}");
    }

    // Throttle in front of the raw adapter so a delivery round to many chats stays under
    // Telegram's flood limits; the adapter still retries a single 429.
    let raw_messenger: Arc<dyn MessagingPort> =
        Arc::new(TelegramMessenger::new(bot.clone(), registry.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let commands = Arc::new(CommandHandler::new(
        service.clone(),
        messenger.clone(),
        supervisor,
        cfg.admin_users.clone(),
    ));

    let cancel = CancellationToken::new();
    let delivery = DeliveryLoop::new(
        service,
        messenger,
        Arc::new(UtcClock),
        cfg.poll_interval,
    );
    let delivery_task = tokio::spawn(delivery.run(cancel.clone()));

    let state = Arc::new(AppState {
        commands,
        registry,
    });

    let handler = dptree::entry()
        .branch(Update::filter_my_chat_member().endpoint(handlers::handle_my_chat_member))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("dispatcher stopped; waiting for the delivery loop");
    cancel.cancel();
    if let Err(e) = delivery_task.await {
        tracing::error!("delivery loop task failed: {e}");
    }

    Ok(())
}
