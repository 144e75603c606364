// ============================================================================
// storecart Library
// ============================================================================

pub mod core;
pub mod engine;
pub mod gateway;
pub mod prelude;
pub mod tracker;

// Re-export main types for convenience
pub use crate::core::{
    AddLineInput, CartError, CartLine, CartModel, CartSnapshot, LineKey, LocalId, ProductRef,
    Result, ServerLineId, SnapshotLine, UserId, VariantKey,
};
pub use engine::{
    CartEngine, CartNotifier, EngineConfig, LineOrdering, Notice, NoticeLevel, ReconcileMode,
    RecordingNotifier, TracingNotifier,
};
pub use gateway::{
    AddLineRequest, GatewayCallKind, GatewayError, GatewayResult, HttpCartGateway,
    HttpGatewayConfig, InMemoryCartGateway, RemoteCartGateway, ScriptedCartGateway,
};
pub use tracker::{ErrorRecord, MutationOutcome, OpId, OperationIntent, OperationKind};

/// Engine wired to the REST cart service
///
/// # Examples
///
/// ```no_run
/// use storecart::{EngineConfig, connect_http};
///
/// # async fn run() -> storecart::Result<()> {
/// let engine = connect_http(
///     EngineConfig::new("user-17"),
///     "storecart+https://token@shop.example.com/api",
/// )?;
/// engine.refresh().await?;
/// println!("{} item(s) in cart", engine.total_item_count().await);
/// # Ok(())
/// # }
/// ```
pub fn connect_http(config: EngineConfig, url: &str) -> Result<CartEngine> {
    let gateway = HttpCartGateway::new(HttpGatewayConfig::from_url(url)?)?;
    CartEngine::new(config, std::sync::Arc::new(gateway))
}

/// Engine backed by a fresh process-local cart (demo and tests)
pub fn in_memory(config: EngineConfig) -> Result<(CartEngine, std::sync::Arc<InMemoryCartGateway>)> {
    let gateway = std::sync::Arc::new(InMemoryCartGateway::new());
    let engine = CartEngine::new(config, gateway.clone())?;
    Ok((engine, gateway))
}
