use clap::Parser;
use listing_watch::domain::ports::Storage;
use listing_watch::utils::error::ErrorSeverity;
use listing_watch::utils::{logger, validation::Validate};
use listing_watch::{
    CliConfig, CommandHandler, CommandPoller, HtmlListingSource, LocalStorage, MemoryStorage,
    NotificationDispatcher, Scheduler, SeenStore, SelectorConfig, SubscriberRegistry,
    TelegramApi, TelegramNotifier, WatchEngine, WatchError,
};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.json_logs);

    tracing::info!("Starting listing-watch");
    if config.verbose {
        tracing::debug!(
            source_url = ?config.source_url,
            interval_seconds = config.check_interval_seconds,
            state_dir = %config.state_dir,
            in_memory = config.in_memory,
            "CLI config"
        );
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let selectors = match &config.selectors_file {
        Some(path) => match SelectorConfig::from_file(path) {
            Ok(selectors) => selectors,
            Err(e) => exit_with(&e),
        },
        None => SelectorConfig::default(),
    };

    let result = if config.in_memory {
        tracing::warn!("State is kept in memory only and will be lost on restart");
        run(&config, &selectors, MemoryStorage::new()).await
    } else {
        let storage = LocalStorage::new(&config.state_dir);
        if let Err(e) = storage.remove_stale_temp_files().await {
            tracing::warn!(error = %e, "Could not clean up leftover temp files");
        }
        run(&config, &selectors, storage).await
    };

    match result {
        Ok(0) => {
            tracing::info!("👋 listing-watch stopped");
            Ok(())
        }
        Ok(code) => std::process::exit(code),
        Err(e) => exit_with(&e),
    }
}

async fn run<S: Storage + Clone>(
    config: &CliConfig,
    selectors: &SelectorConfig,
    storage: S,
) -> listing_watch::Result<i32> {
    let source = HtmlListingSource::new(
        config.source_url()?,
        selectors,
        &config.user_agent,
        config.request_timeout(),
    )?;
    let api = TelegramApi::new(&config.telegram_api_url, config.bot_token()?)?;

    let seen = Arc::new(SeenStore::load(storage.clone()).await);
    let subscribers = Arc::new(SubscriberRegistry::load(storage).await);

    if let Some(chat_id) = config.target_chat() {
        if subscribers.add(chat_id).await {
            tracing::info!(chat_id = %chat_id, "Added configured target chat to subscribers");
            if let Err(e) = subscribers.persist().await {
                tracing::error!(chat_id = %chat_id, error = %e, "Failed to persist subscribers");
            }
        }
    }

    let dispatcher = NotificationDispatcher::new(TelegramNotifier::new(api.clone()));
    let engine = Arc::new(
        WatchEngine::new(source, dispatcher, seen, subscribers.clone())
            .with_skip_without_subscribers(config.skip_without_subscribers),
    );

    if config.once {
        return match engine.run().await {
            Ok(report) => {
                println!(
                    "✅ Cycle completed: {} fetched, {} new, {} delivered, {} failed",
                    report.fetched,
                    report.new_listings,
                    report.delivery.delivered,
                    report.delivery.failed
                );
                Ok(0)
            }
            Err(e) => {
                tracing::error!(error = %e, "❌ Cycle failed: {}", e.recovery_suggestion());
                eprintln!("❌ {}", e.user_friendly_message());
                Ok(1)
            }
        };
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller_task = if config.no_commands {
        None
    } else {
        let poller = CommandPoller::new(api, CommandHandler::new(subscribers));
        Some(tokio::spawn(poller.run(shutdown_rx)))
    };

    let handle = Scheduler::new(engine, config.check_interval()).start();

    wait_for_shutdown_signal().await;
    tracing::info!("Shutdown requested, finishing the current cycle");

    let _ = shutdown_tx.send(true);
    let cycles = handle.stop().await;
    if let Some(task) = poller_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Command poller ended abnormally");
        }
    }

    tracing::info!("Ran {} cycles", cycles);
    Ok(0)
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn exit_with(e: &WatchError) -> ! {
    tracing::error!(
        "❌ listing-watch failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = if e.is_fatal() {
        1
    } else {
        match e.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => 3,
            ErrorSeverity::Medium | ErrorSeverity::Low => 2,
        }
    };
    std::process::exit(exit_code);
}
