use crate::bot;
use crate::bot::handlers::{get_user_id_safe, Command};
use crate::bot::TelegramTransport;
use crate::config::Settings;
use crate::media::{sweep_stale_workspaces, Fetcher, MediaFetcher};
use crate::relay::{ChatTransport, RelayPipeline};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info, warn};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<Settings>) {
    let download_root = settings.download_root();
    sweep_workspaces(&download_root).await;

    let fetcher = init_fetcher(&settings);
    let bot = Bot::new(settings.telegram_token.clone());
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(bot.clone()));

    let pipeline = Arc::new(RelayPipeline::new(
        fetcher,
        transport,
        download_root,
        settings.max_upload_bytes(),
    ));
    info!(
        "Relay pipeline ready (upload ceiling: {} bytes)",
        pipeline.max_upload_bytes()
    );

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, pipeline])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn sweep_workspaces(root: &std::path::Path) {
    match sweep_stale_workspaces(root).await {
        Ok(0) => {}
        Ok(removed) => info!("Removed {removed} stale download workspaces."),
        Err(e) => warn!("Failed to sweep download workspaces in {}: {e}", root.display()),
    }
}

fn init_fetcher(settings: &Settings) -> Arc<dyn MediaFetcher> {
    match Fetcher::new(settings) {
        Ok(f) => {
            info!("Media fetcher initialized (extractor: {}).", settings.ytdlp_path);
            Arc::new(f)
        }
        Err(e) => {
            error!("Failed to initialize media fetcher: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some() || msg.caption().is_some())
                .endpoint(handle_link_message),
        )
        .branch(dptree::endpoint(handle_unsupported))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start | Command::Help => bot::handlers::start(bot, msg, settings).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_link_message(
    msg: Message,
    pipeline: Arc<RelayPipeline>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_text(msg, pipeline).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_unsupported(bot: Bot, msg: Message) -> Result<(), teloxide::RequestError> {
    info!(
        "Ignoring non-text message from user {}",
        get_user_id_safe(&msg)
    );
    if let Err(e) = bot
        .send_message(msg.chat.id, "❌ Send me a link as a text message.")
        .await
    {
        error!("Failed to reply to {}: {}", get_user_id_safe(&msg), e);
    }
    respond(())
}
