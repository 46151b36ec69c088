use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use elbek_storefront::config::cli::{AdminCommand, Command, NotificationCommand, OrderCommand, SubmitArgs};
use elbek_storefront::core::admin::{content_type_for, Attachment, Broadcast};
use elbek_storefront::domain::hours::WorkingHours;
use elbek_storefront::domain::model::{Gender, Order, OrderStatus};
use elbek_storefront::domain::notifications::{FeedSource, FeedView};
use elbek_storefront::domain::ports::{IdentityProvider, MessageSink, ObjectStorage, RealtimeStore};
use elbek_storefront::domain::pricing::{format_amount, PriceQuote};
use elbek_storefront::utils::error::{ErrorSeverity, StorefrontError};
use elbek_storefront::utils::{logger, validation::Validate};
use elbek_storefront::{
    BackendKind, CliConfig, HttpObjectStorage, LocalObjectStorage, LocalRealtimeStore, LogSink,
    RestRealtimeStore, StaticIdentity, Storefront, StorefrontConfig, TelegramSink,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

type CmdResult = elbek_storefront::Result<()>;

fn report(e: &StorefrontError) {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
}

fn build_storefront(config: StorefrontConfig) -> anyhow::Result<Storefront> {
    let store: Arc<dyn RealtimeStore> = match config.store.r#type {
        BackendKind::Remote => {
            let endpoint = config
                .store
                .endpoint
                .as_deref()
                .context("store.endpoint is required for a remote store")?;
            Arc::new(RestRealtimeStore::new(
                endpoint,
                config.store.auth_token.clone(),
                Duration::from_secs(config.store.timeout_seconds),
            )?)
        }
        BackendKind::Local => Arc::new(
            LocalRealtimeStore::open(&config.store.path)
                .with_context(|| format!("Failed to open local store {}", config.store.path))?,
        ),
    };

    let storage: Arc<dyn ObjectStorage> = match config.storage.r#type {
        BackendKind::Remote => {
            let endpoint = config
                .storage
                .endpoint
                .as_deref()
                .context("storage.endpoint is required for remote storage")?;
            let bucket = config
                .storage
                .bucket
                .as_deref()
                .context("storage.bucket is required for remote storage")?;
            Arc::new(HttpObjectStorage::new(
                endpoint,
                bucket,
                config.storage.auth_token.clone(),
                config.upload_timeout(),
            )?)
        }
        BackendKind::Local => Arc::new(LocalObjectStorage::new(
            &config.storage.base_path,
            config.storage.public_base_url.clone(),
        )),
    };

    let notifier: Arc<dyn MessageSink> = match &config.telegram {
        Some(telegram) if telegram.is_configured() => Arc::new(TelegramSink::from_config(telegram)?),
        _ => {
            tracing::warn!("📭 Telegram is not configured; order messages will only be logged");
            Arc::new(LogSink)
        }
    };

    Ok(Storefront::new(config, store, storage, notifier)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let config = match StorefrontConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(cli.verbose);
            tracing::error!("❌ Failed to load {}: {}", cli.config, e);
            report(&e);
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_logger(cli.verbose, config.json_logging(), config.log_level());
    tracing::info!("Starting elbek-storefront CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        report(&e);
        std::process::exit(1);
    }

    let mut storefront = build_storefront(config).context("Failed to initialise backends")?;
    let identity = StaticIdentity::new(cli.identity.to_identity()).or_else(StaticIdentity::from_env());

    let result = run(&cli, &mut storefront, &identity).await;
    storefront.sign_out();

    if let Err(e) = result {
        report(&e);

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,      // 警告，但成功
            ErrorSeverity::Medium => 2,   // 可重試
            ErrorSeverity::High => 1,     // 輸入或權限錯誤
            ErrorSeverity::Critical => 3, // 系統錯誤
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(cli: &CliConfig, sf: &mut Storefront, identity: &StaticIdentity) -> CmdResult {
    let now = Utc::now();
    if let Some(identity) = identity.current() {
        sf.sign_in(&identity, now).await?;
    }

    match &cli.command {
        Command::Status => status(sf, now).await,
        Command::Quote {
            services,
            promo,
            no_promo,
        } => {
            let quote = sf.quote(services, promo.as_deref().unwrap_or_default(), *no_promo)?;
            print_quote(&quote, &sf.config().business.currency);
            Ok(())
        }
        Command::Portfolio => {
            let items = sf.portfolio().await;
            if items.is_empty() {
                println!("📭 Portfolio is empty");
            }
            for item in items {
                println!("🖼️  [{}] {} {}", item.id, item.title, item.image_url);
            }
            Ok(())
        }
        Command::Order(cmd) => run_order(sf, cmd, now).await,
        Command::Notifications(cmd) => run_notifications(sf, cmd, now).await,
        Command::Admin(cmd) => run_admin(sf, cmd, now).await,
    }
}

async fn status(sf: &Storefront, now: DateTime<Utc>) -> CmdResult {
    let business = &sf.config().business;
    let hours = sf.working_hours().await;
    let open = sf.is_open(now).await;

    println!("🏪 {}", business.name);
    println!(
        "🕒 Local time: {} ({}, UTC{})",
        sf.local_clock(now),
        business.timezone,
        business.utc_offset
    );
    match hours {
        Some(hours) => println!("📅 Working hours: {}", hours),
        None => println!("📅 Working hours: not set"),
    }
    println!("{}", if open { "✅ Accepting orders" } else { "⛔ Closed" });
    if let Some(user) = sf.session().user() {
        println!(
            "👤 {} <{}>{}",
            user.display_name,
            user.email,
            if user.is_owner { " (owner)" } else { "" }
        );
    }
    Ok(())
}

fn print_quote(quote: &PriceQuote, currency: &str) {
    for line in &quote.lines {
        println!("  • {:<12} {:>10} {}", line.service, format_amount(line.price), currency);
    }
    if quote.promo_applied {
        println!("  🎟️ Discount   -{:>10} {}", format_amount(quote.discount), currency);
    }
    println!("  💰 Total      {:>10} {}", format_amount(quote.total), currency);
}

fn print_order(order: &Order, currency: &str) {
    println!(
        "🧾 {} [{}] {} | {} | {} | {} {}",
        order.id,
        order.status,
        order.full_name(),
        order.design_types.join(", "),
        order.game,
        format_amount(order.total_price),
        currency
    );
    if let Some(reason) = &order.cancel_reason {
        println!("   ↳ cancelled: {}", reason);
    }
}

async fn submit(sf: &Storefront, args: &SubmitArgs, now: DateTime<Utc>) -> CmdResult {
    let mut wizard = sf.wizard();

    wizard.set_first_name(&args.first_name);
    if let Some(last_name) = &args.last_name {
        wizard.set_last_name(last_name);
    }
    wizard.set_gender(args.gender.parse::<Gender>()?);
    wizard.set_phone(&args.phone);
    wizard.set_telegram(&args.telegram);
    wizard.next()?;

    // 重複的服務只切換一次
    let requested: BTreeSet<String> = args.services.iter().map(|s| s.trim().to_string()).collect();
    for service in &requested {
        if !wizard.draft().services.iter().any(|s| s.eq_ignore_ascii_case(service)) {
            wizard.toggle_service(service)?;
        }
    }
    wizard.next()?;

    wizard.set_game(&args.game);
    if let Some(message) = &args.message {
        wizard.set_message(message);
    }
    wizard.next()?;

    if let Some(promo) = &args.promo {
        wizard.set_promo_code(promo);
    }
    wizard.set_no_promo(args.no_promo);
    wizard.confirm_payment(args.confirm_payment);

    let currency = sf.config().business.currency.clone();
    print_quote(&wizard.quote(), &currency);
    if let Some(card) = &sf.config().business.payment_card {
        println!("💳 Payment card: {}", card);
    }

    let draft = wizard.finish()?;
    let order = sf.orders().submit(&draft, now).await?;
    println!("✅ Order {} submitted", order.id);
    Ok(())
}

async fn run_order(sf: &Storefront, cmd: &OrderCommand, now: DateTime<Utc>) -> CmdResult {
    let currency = sf.config().business.currency.clone();
    match cmd {
        OrderCommand::Submit(args) => submit(sf, args, now).await,
        OrderCommand::List => {
            let orders = sf.orders().list_mine(now).await?;
            if orders.is_empty() {
                println!("📭 No orders yet");
            }
            for order in &orders {
                print_order(order, &currency);
            }
            Ok(())
        }
        OrderCommand::Cancel { id, reason } => {
            let order = sf.orders().cancel(id, reason, now).await?;
            println!("🚫 Order {} cancelled", order.id);
            Ok(())
        }
    }
}

fn print_feed(view: &FeedView) {
    println!("🔔 {} unread", view.unread);
    for source in &view.degraded {
        println!("⚠️ {:?} notifications are unavailable right now", source);
    }
    for item in &view.items {
        let marker = if item.read { " " } else { "●" };
        let scope = match item.source {
            FeedSource::Global => "all",
            FeedSource::Private => "you",
        };
        println!(
            "{} [{}] ({}) {}: {}",
            marker, item.notification.id, scope, item.notification.title, item.notification.message
        );
        if let Some(link) = &item.notification.link {
            println!("    🔗 {}", link);
        }
        if let Some(url) = item.notification.attachment_url.as_ref().or(item.notification.image_url.as_ref()) {
            println!("    📎 {}", url);
        }
    }
}

async fn run_notifications(sf: &Storefront, cmd: &NotificationCommand, now: DateTime<Utc>) -> CmdResult {
    let my_feed = sf.my_feed(now)?;

    match cmd {
        NotificationCommand::List => {
            print_feed(&my_feed.refresh().await.view());
            Ok(())
        }
        NotificationCommand::Read { id } => {
            let mut feed = my_feed.refresh().await;
            if !feed.view().ids().any(|n| n == id.as_str()) {
                return Err(StorefrontError::not_found("Notification", id.as_str()));
            }
            if my_feed.mark_read(&mut feed, id).await? {
                println!("✅ Marked {} as read", id);
            } else {
                println!("ℹ️ {} was already read", id);
            }
            Ok(())
        }
        NotificationCommand::ReadAll => {
            let mut feed = my_feed.refresh().await;
            let count = my_feed.mark_all_read(&mut feed).await?;
            println!("✅ Marked {} notifications as read", count);
            Ok(())
        }
        NotificationCommand::Watch { interval_seconds } => {
            let interval = interval_seconds
                .map(|s| Duration::from_secs(s.max(1)))
                .unwrap_or_else(|| sf.config().poll_interval());
            let mut watch = my_feed.watch(interval);
            println!("👀 Watching notifications every {}s (Ctrl+C to stop)", interval.as_secs());

            loop {
                tokio::select! {
                    view = watch.next() => match view {
                        Some(view) => print_feed(&view),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            Ok(())
        }
    }
}

async fn read_file(path: &Path) -> elbek_storefront::Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| StorefrontError::validation(format!("Cannot read {}: {}", path.display(), e)))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

async fn run_admin(sf: &Storefront, cmd: &AdminCommand, now: DateTime<Utc>) -> CmdResult {
    let admin = sf.admin();
    // 遠端尚無營業時間時寫入預設值
    if admin.ensure_default_hours().await? {
        println!("🕒 Working hours initialised from configuration");
    }

    match cmd {
        AdminCommand::Orders => {
            let currency = &sf.config().business.currency;
            for order in admin.list_orders().await? {
                print_order(&order, currency);
                println!("   {} {} {}", order.user_email, order.phone_number, order.telegram_username);
            }
            Ok(())
        }
        AdminCommand::SetStatus { id, status } => {
            let status: OrderStatus = status.parse()?;
            admin.set_order_status(id, status).await?;
            println!("✅ Order {} is now {}", id, status);
            Ok(())
        }
        AdminCommand::Hours { start, end } => {
            let hours = WorkingHours::parse(start, end)?;
            admin.set_working_hours(&hours).await?;
            println!("✅ Working hours set to {}", hours);
            Ok(())
        }
        AdminCommand::Broadcast {
            title,
            message,
            to,
            attachment,
            link,
        } => {
            let attachment = match attachment {
                Some(path) => Some(Attachment {
                    file_name: file_name(path),
                    content_type: content_type_for(&file_name(path)).to_string(),
                    data: read_file(path).await?,
                }),
                None => None,
            };
            let notification = admin
                .broadcast(
                    Broadcast {
                        title: title.clone(),
                        message: message.clone(),
                        target_uid: to.clone(),
                        link: link.clone(),
                        attachment,
                    },
                    now,
                )
                .await?;
            println!("📢 Notification {} sent", notification.id);
            Ok(())
        }
        AdminCommand::PortfolioAdd { title, file } => {
            let data = read_file(file).await?;
            let item = admin
                .add_portfolio_item(title, &data, content_type_for(&file_name(file)), now)
                .await?;
            println!("🖼️ Added {} -> {}", item.id, item.image_url);
            Ok(())
        }
        AdminCommand::PortfolioRemove { id } => {
            admin.remove_portfolio_item(id).await?;
            println!("🗑️ Removed {}", id);
            Ok(())
        }
        AdminCommand::Users => {
            let now_ms = now.timestamp_millis();
            for user in admin.list_users().await? {
                let blocked = user.block_status.map(|b| b.is_active(now_ms)).unwrap_or(false);
                println!(
                    "{} {} <{}> last login {}",
                    if blocked { "⛔" } else { "👤" },
                    user.uid,
                    user.email,
                    user.last_login
                );
            }
            Ok(())
        }
        AdminCommand::Block { uid, until } => {
            let until = match until {
                Some(raw) => Some(
                    DateTime::parse_from_rfc3339(raw)
                        .map_err(|e| StorefrontError::validation(format!("Invalid --until '{}': {}", raw, e)))?
                        .with_timezone(&Utc),
                ),
                None => None,
            };
            admin.block_user(uid, until).await?;
            match until {
                Some(t) => println!("⛔ {} blocked until {}", uid, t.to_rfc3339()),
                None => println!("⛔ {} blocked permanently", uid),
            }
            Ok(())
        }
        AdminCommand::Unblock { uid } => {
            admin.unblock_user(uid).await?;
            println!("✅ {} unblocked", uid);
            Ok(())
        }
    }
}
