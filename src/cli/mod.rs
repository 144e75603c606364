//! `storecart` command line: a scripted walk-through against the in-memory
//! cart, and a thin client for a real cart service.

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use storecart::{
    AddLineInput, CartEngine, CartLine, CartNotifier, EngineConfig, GatewayCallKind, GatewayError,
    InMemoryCartGateway, LineOrdering, Notice, NoticeLevel, ProductRef, ReconcileMode,
    VariantKey,
};

#[derive(Parser, Debug)]
#[command(name = "storecart", version, about = "Optimistic shopping cart engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk through adds, updates, rejections and rollbacks against an in-memory cart
    Demo(DemoArgs),
    /// Talk to a remote cart service
    Remote(RemoteArgs),
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Simulated gateway latency in milliseconds
    #[arg(long, default_value_t = 50)]
    pub latency_ms: u64,

    /// Queue overlapping mutations of the same line
    #[arg(long)]
    pub serialized: bool,

    /// Keep unrelated speculative lines when an add snapshot arrives
    #[arg(long)]
    pub merge_present: bool,
}

#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Connection string, e.g. storecart+https://token@shop.example.com/api
    #[arg(long, env = "STORECART_URL")]
    pub url: String,

    /// User whose cart to operate on
    #[arg(long, env = "STORECART_USER")]
    pub user: String,

    #[command(subcommand)]
    pub action: RemoteAction,
}

#[derive(Subcommand, Debug)]
pub enum RemoteAction {
    /// Print the cart
    Show,
    /// Add items to the cart
    Add {
        #[arg(long)]
        product: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        size: Option<String>,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
    /// Empty the cart
    Clear,
}

/// Prints notices inline with the demo output.
struct ConsoleNotifier;

impl CartNotifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        let marker = match notice.level {
            NoticeLevel::Info => "+",
            NoticeLevel::Warning => "~",
            NoticeLevel::Error => "!",
        };
        println!("  {} {}", marker, notice.message);
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Demo(args) => run_demo(args).await,
        Command::Remote(args) => run_remote(args).await,
    }
}

fn print_cart(title: &str, lines: &im::Vector<CartLine>) {
    println!("{}", title);
    if lines.is_empty() {
        println!("    (empty)");
    }
    for line in lines {
        println!(
            "    {:<4} {:<6} {:<16} {:<10} x{:<3} {:<8} {}",
            line.local_id.to_string(),
            line.product.id,
            line.product.name,
            line.variant.to_string(),
            line.quantity,
            line.server_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string()),
            if line.speculative { "speculative" } else { "" }
        );
    }
}

async fn run_demo(args: DemoArgs) -> anyhow::Result<()> {
    let gateway = Arc::new(InMemoryCartGateway::new());
    let shirt = ProductRef::new("P1", "Linen shirt", 3900);
    let hat = ProductRef::new("P2", "Straw hat", 1500);
    gateway.register_product(shirt.clone()).await;
    gateway.register_product(hat.clone()).await;
    gateway.set_stock("P1", 3).await;
    gateway
        .set_latency(Duration::from_millis(args.latency_ms))
        .await;

    let mut config = EngineConfig::new("demo-user");
    if args.serialized {
        config = config.line_ordering(LineOrdering::Serialized);
    }
    if args.merge_present {
        config = config.reconcile_mode(ReconcileMode::MergePresent);
    }
    let engine = CartEngine::with_notifier(config, gateway.clone(), Arc::new(ConsoleNotifier))?;

    println!("1. two adds in flight at once");
    let red = AddLineInput::new(shirt, VariantKey::new(Some("red"), Some("M")), 1);
    let straw = AddLineInput::new(hat, VariantKey::default(), 1);
    let (first, second) = futures::join!(engine.add_line(red), engine.add_line(straw));
    if !first.success() || !second.success() {
        bail!("demo adds failed unexpectedly");
    }
    print_cart("   cart:", &engine.cart_items().await);

    println!("2. raise the shirt above stock");
    let shirt_line = engine
        .cart_items()
        .await
        .iter()
        .find(|line| line.product.id == "P1")
        .map(|line| line.local_id)
        .context("shirt line missing")?;
    let outcome = engine.update_quantity(shirt_line, 5).await;
    print_cart("   cart after rollback:", &engine.cart_items().await);

    if let Some(available) = outcome.error.as_ref().and_then(|err| err.available_quantity()) {
        println!("3. clamp to the {} available and try again", available);
        engine.clear_error(outcome.op_id).await;
        let clamped = engine.update_quantity(shirt_line, available).await;
        println!("   success: {}", clamped.success());
        print_cart("   cart:", &engine.cart_items().await);
    }

    println!("4. a remove the server refuses");
    gateway
        .fail_next(
            GatewayCallKind::Remove,
            GatewayError::Transport("connection reset".to_string()),
        )
        .await;
    let refused = engine.remove_line(shirt_line).await;
    print_cart("   cart after rollback:", &engine.cart_items().await);
    println!("   retrying {}", refused.op_id);
    let retried = engine.retry(refused.op_id).await;
    println!("   retry success: {}", retried.success());
    print_cart("   cart:", &engine.cart_items().await);

    println!("5. clear");
    engine.clear_cart().await;
    print_cart("   cart:", &engine.cart_items().await);

    println!(
        "gateway calls: {}, open errors: {}",
        gateway.total_calls().await,
        engine.current_errors().await.len()
    );
    Ok(())
}

async fn run_remote(args: RemoteArgs) -> anyhow::Result<()> {
    let engine = storecart::connect_http(EngineConfig::new(&args.user), &args.url)
        .with_context(|| format!("cannot connect to {}", args.url))?;
    engine.refresh().await.context("failed to load cart")?;

    match args.action {
        RemoteAction::Show => {}
        RemoteAction::Add {
            product,
            name,
            color,
            size,
            quantity,
        } => {
            let name = name.unwrap_or_else(|| product.clone());
            let input = AddLineInput::new(
                ProductRef::new(product, name, 0),
                VariantKey::new(color.as_deref(), size.as_deref()),
                quantity,
            );
            let outcome = engine.add_line(input).await;
            if let Some(err) = outcome.error {
                bail!("add failed: {}", err);
            }
        }
        RemoteAction::Clear => {
            let outcome = engine.clear_cart().await;
            if let Some(err) = outcome.error {
                bail!("clear failed: {}", err);
            }
        }
    }

    print_cart(
        &format!("cart of {} ({} items):", args.user, engine.total_item_count().await),
        &engine.cart_items().await,
    );
    Ok(())
}
