use std::sync::Arc;

use foodbot_core::{
    config::Config,
    posts::PostService,
    registry::DestinationRegistry,
    selector::{SelectionPolicy, Selector},
    store::JsonFileRecordStore,
    subreddits::Subreddits,
    supervisor::Pm2Supervisor,
};
use foodbot_reddit::RedditClient;

#[tokio::main]
async fn main() {
    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            if foodbot_core::logging::init("foodbot", None).is_ok() {
                tracing::error!("startup failed: {e}");
            } else {
                eprintln!("startup failed: {e}");
            }
            return;
        }
    };
    if let Err(e) = foodbot_core::logging::init("foodbot", cfg.log_file.as_deref()) {
        eprintln!("failed to initialize logging: {e}");
        return;
    }

    if let Err(e) = run(cfg).await {
        tracing::error!("bot stopped with error: {e}");
    }
}

async fn run(cfg: Arc<Config>) -> Result<(), foodbot_core::Error> {
    let source = Arc::new(RedditClient::from_config(&cfg)?);
    let store = Arc::new(JsonFileRecordStore::open(&cfg.record_store_file).await?);
    let registry = Arc::new(DestinationRegistry::open(&cfg.destinations_file).await?);

    let selector = Selector::new(
        source,
        store.clone(),
        Subreddits::from_file(&cfg.subreddits_file),
        SelectionPolicy {
            initial_batch: cfg.initial_batch_size,
            max_batch: cfg.max_search_size,
            search_limit: cfg.search_result_limit,
            ..Default::default()
        },
    );
    let service = Arc::new(PostService::new(selector, store));
    let supervisor = Arc::new(Pm2Supervisor::new(
        cfg.pm2_path.clone(),
        cfg.pm2_process_name.clone(),
    ));

    foodbot_telegram::router::run_polling(cfg, service, supervisor, registry)
        .await
        .map_err(|e| foodbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
