// ============================================================================
// Optimistic Mutation Engine
// ============================================================================
//
// Every mutation runs the same three steps:
//   1. synchronous local patch + rollback capture (under one write guard)
//   2. remote gateway call (no guard held)
//   3. settle: reconcile on success, apply the rollback on failure,
//      then clear the operation's loading state either way
//
// Mutations run on spawned tasks, so a caller that stops waiting does not
// cancel the gateway call; its settle is still applied to whatever the cart
// looks like at that point.
//
// ============================================================================

pub mod accessors;
pub mod config;
pub mod notifier;
pub mod ordering;
pub mod reconcile;

pub use config::EngineConfig;
pub use notifier::{CartNotifier, Notice, NoticeLevel, RecordingNotifier, TracingNotifier};
pub use ordering::LineOrdering;
pub use reconcile::{ReconcileMode, reconcile};

use crate::core::{
    AddLineInput, CartError, CartLine, CartModel, CartSnapshot, LineKey, LocalId, Result,
};
use crate::gateway::{
    AddLineRequest, GatewayCallKind, GatewayError, GatewayResult, RemoteCartGateway,
};
use crate::tracker::{MutationOutcome, OpId, OperationIntent, OperationTracker, Rollback};
use ordering::LineQueue;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{Instrument, Level, debug, event, info_span, warn};

#[derive(Debug, Default)]
struct EngineState {
    model: CartModel,
    tracker: OperationTracker,
}

impl EngineState {
    /// Applies the stashed rollback and records the classified error.
    fn settle_failure(&mut self, op_id: OpId, err: GatewayError) -> MutationOutcome {
        let error = CartError::from(err);
        match self.tracker.take_rollback(op_id) {
            Some(rollback) => {
                let applied = rollback.apply(&mut self.model);
                event!(Level::WARN, error = %error, applied, "gateway call failed, optimistic patch rolled back");
            }
            None => {
                event!(Level::WARN, error = %error, "gateway call failed with nothing to roll back");
            }
        }
        self.tracker.set_error(op_id, Some(error.clone()));
        MutationOutcome::failed(op_id, error)
    }

    fn finish(&mut self, op_id: OpId) {
        self.tracker.set_loading(op_id, false);
        self.tracker.clear(op_id);
    }
}

struct EngineInner {
    config: EngineConfig,
    gateway: Arc<dyn RemoteCartGateway>,
    notifier: Arc<dyn CartNotifier>,
    state: RwLock<EngineState>,
    queue: LineQueue,
}

/// Optimistic cart. Cheap to clone; clones share one cart.
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<EngineInner>,
}

impl CartEngine {
    pub fn new(config: EngineConfig, gateway: Arc<dyn RemoteCartGateway>) -> Result<Self> {
        Self::with_notifier(config, gateway, Arc::new(TracingNotifier))
    }

    pub fn with_notifier(
        config: EngineConfig,
        gateway: Arc<dyn RemoteCartGateway>,
        notifier: Arc<dyn CartNotifier>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                gateway,
                notifier,
                state: RwLock::new(EngineState::default()),
                queue: LineQueue::new(),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Adds `input.quantity` items, merging into an existing line with the same key.
    pub async fn add_line(&self, input: AddLineInput) -> MutationOutcome {
        self.dispatch(OpId::new(), OperationIntent::Add { input })
            .await
    }

    pub async fn remove_line(&self, local_id: LocalId) -> MutationOutcome {
        self.dispatch(OpId::new(), OperationIntent::Remove { local_id })
            .await
    }

    /// Sets a line's quantity. Zero is rejected; route it to `remove_line`.
    pub async fn update_quantity(&self, local_id: LocalId, quantity: u32) -> MutationOutcome {
        self.dispatch(
            OpId::new(),
            OperationIntent::UpdateQuantity { local_id, quantity },
        )
        .await
    }

    pub async fn clear_cart(&self) -> MutationOutcome {
        self.dispatch(OpId::new(), OperationIntent::Clear).await
    }

    /// Re-dispatches a failed operation under a fresh id and drops its old error.
    ///
    /// A `ReconciliationMismatch` add was accepted remotely, so it is not
    /// replayed: the cart is refreshed instead and the error dropped once the
    /// refresh succeeds.
    pub async fn retry(&self, op_id: OpId) -> MutationOutcome {
        let unknown = || {
            MutationOutcome::failed(
                op_id,
                CartError::UnknownOperation {
                    op_id: op_id.to_string(),
                },
            )
        };

        let accepted_remotely = {
            let state = self.inner.state.read().await;
            match state.tracker.error_for(op_id) {
                Some(record) => {
                    matches!(record.error, CartError::ReconciliationMismatch { .. })
                }
                None => return unknown(),
            }
        };

        let retry_id = OpId::new();
        if accepted_remotely {
            debug!(previous_op_id = %op_id, "add already applied remotely, refreshing instead of replaying");
            return match self.refresh().await {
                Ok(()) => {
                    self.inner.state.write().await.tracker.clear_error(op_id);
                    MutationOutcome::ok(retry_id)
                }
                Err(err) => MutationOutcome::failed(retry_id, err),
            };
        }

        let record = self.inner.state.write().await.tracker.take_error(op_id);
        match record {
            Some(record) => {
                debug!(previous_op_id = %op_id, kind = %record.kind, "retrying failed operation");
                self.dispatch(retry_id, record.intent).await
            }
            None => unknown(),
        }
    }

    /// Replaces local state with the authoritative remote cart.
    pub async fn refresh(&self) -> Result<()> {
        let inner = &self.inner;
        let snapshot = inner
            .call(
                GatewayCallKind::Fetch,
                inner.gateway.fetch(&inner.config.user_id),
            )
            .await?;
        let mut state = inner.state.write().await;
        reconcile(&mut state.model, &snapshot, inner.config.reconcile_mode);
        debug!(lines = state.model.len(), "cart refreshed");
        Ok(())
    }

    /// Adopts a snapshot obtained elsewhere without calling the gateway.
    pub async fn hydrate(&self, snapshot: &CartSnapshot) {
        let mut state = self.inner.state.write().await;
        reconcile(&mut state.model, snapshot, ReconcileMode::ReplaceAll);
    }

    async fn dispatch(&self, op_id: OpId, intent: OperationIntent) -> MutationOutcome {
        let inner = Arc::clone(&self.inner);
        let span = info_span!("cart.mutation", op_id = %op_id, kind = %intent.kind());
        let task = tokio::spawn(async move { inner.run(op_id, intent).await }.instrument(span));
        match task.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                event!(Level::ERROR, op_id = %op_id, error = %join_err, "cart mutation task aborted");
                MutationOutcome::failed(
                    op_id,
                    CartError::internal(format!("mutation task aborted: {}", join_err)),
                )
            }
        }
    }
}

impl EngineInner {
    async fn run(&self, op_id: OpId, intent: OperationIntent) -> MutationOutcome {
        let kind = intent.kind();
        let added = match &intent {
            OperationIntent::Add { input } => Some(input.product.name.clone()),
            _ => None,
        };

        let outcome = match intent {
            OperationIntent::Add { input } => self.run_add(op_id, input).await,
            OperationIntent::Remove { local_id } => self.run_remove(op_id, local_id).await,
            OperationIntent::UpdateQuantity { local_id, quantity } => {
                self.run_update(op_id, local_id, quantity).await
            }
            OperationIntent::Clear => self.run_clear(op_id).await,
        };

        match (&outcome.error, added) {
            (None, Some(name)) if self.config.notify_on_success => {
                self.notify(op_id, NoticeLevel::Info, format!("Added {} to cart", name));
            }
            (Some(err), _) if !err.is_precondition() => {
                let level = if err.is_constraint_violation()
                    || matches!(err, CartError::ReconciliationMismatch { .. })
                {
                    NoticeLevel::Warning
                } else {
                    NoticeLevel::Error
                };
                self.notify(op_id, level, format!("Cart {} failed: {}", kind, err));
            }
            _ => {}
        }
        outcome
    }

    fn notify(&self, op_id: OpId, level: NoticeLevel, message: String) {
        self.notifier.notify(Notice::new(Some(op_id), level, message));
    }

    /// Awaits a gateway call, bounded by the configured timeout.
    async fn call<T>(
        &self,
        kind: GatewayCallKind,
        call: impl Future<Output = GatewayResult<T>>,
    ) -> GatewayResult<T> {
        match self.config.gateway_timeout_duration() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| {
                    Err(GatewayError::Transport(format!(
                        "{} timed out after {}ms",
                        kind,
                        limit.as_millis()
                    )))
                }),
            None => call.await,
        }
    }

    /// Registers the operation as loading before it queues for its line.
    async fn begin(&self, op_id: OpId, intent: OperationIntent) {
        self.state.write().await.tracker.begin(op_id, intent);
    }

    async fn line_key(&self, local_id: LocalId) -> Option<LineKey> {
        self.state
            .read()
            .await
            .model
            .get(local_id)
            .map(CartLine::key)
    }

    async fn run_add(&self, op_id: OpId, input: AddLineInput) -> MutationOutcome {
        if input.quantity == 0 {
            return MutationOutcome::failed(op_id, CartError::InvalidQuantity { quantity: 0 });
        }

        let key = input.key();
        self.begin(
            op_id,
            OperationIntent::Add {
                input: input.clone(),
            },
        )
        .await;
        let _ticket = self.queue.acquire(&key, self.config.line_ordering).await;

        {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let rollback = match state.model.find_key_mut(&key) {
                Some(line) => {
                    let rollback = Rollback::RestoreQuantity {
                        local_id: line.local_id,
                        quantity: line.quantity,
                        speculative: line.speculative,
                    };
                    line.quantity = line.quantity.saturating_add(input.quantity);
                    line.speculative = true;
                    rollback
                }
                None => Rollback::RemoveLine {
                    local_id: state.model.insert_speculative(&input),
                },
            };
            debug!(line_key = %key, rollback = ?rollback, "optimistic add applied");
            state.tracker.stash_rollback(op_id, rollback);
        }

        let request =
            AddLineRequest::new(input.product.id.clone(), input.variant.clone(), input.quantity);
        let result = self
            .call(
                GatewayCallKind::Add,
                self.gateway.add(&self.config.user_id, request),
            )
            .await;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let outcome = match result {
            Ok(snapshot) => {
                state.tracker.take_rollback(op_id);
                let optimistic = state.model.find_key(&key).cloned();
                reconcile(&mut state.model, &snapshot, self.config.reconcile_mode);

                if snapshot.find(&key).is_some() {
                    MutationOutcome::ok(op_id)
                } else {
                    // Data contract failure: keep the optimistic line rather than lose it.
                    if let Some(mut line) = optimistic {
                        if state.model.position_of_key(&key).is_none() {
                            if state.model.get(line.local_id).is_some() {
                                line.local_id = state.model.allocate_id();
                            }
                            line.speculative = true;
                            state.model.push(line);
                        }
                    }
                    warn!(line_key = %key, "add snapshot does not contain the added line");
                    let error = CartError::ReconciliationMismatch {
                        product_id: key.product_id.clone(),
                        variant: key.variant.clone(),
                    };
                    state.tracker.set_error(op_id, Some(error.clone()));
                    MutationOutcome::failed(op_id, error)
                }
            }
            Err(err) => state.settle_failure(op_id, err),
        };
        state.finish(op_id);
        outcome
    }

    async fn run_remove(&self, op_id: OpId, local_id: LocalId) -> MutationOutcome {
        let not_found = || MutationOutcome::failed(op_id, CartError::NotFound { local_id });
        let Some(key) = self.line_key(local_id).await else {
            return not_found();
        };
        self.begin(op_id, OperationIntent::Remove { local_id }).await;
        let _ticket = self.queue.acquire(&key, self.config.line_ordering).await;

        let server_id = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            // The line may have gone while we waited for our turn.
            let Some((index, line)) = state.model.remove(local_id) else {
                state.finish(op_id);
                return not_found();
            };

            match line.server_id.clone() {
                Some(server_id) => {
                    state
                        .tracker
                        .stash_rollback(op_id, Rollback::ReinsertLine { index, line });
                    server_id
                }
                None => {
                    debug!(local_id = %local_id, "removed unconfirmed line locally, skipping gateway");
                    state.finish(op_id);
                    return MutationOutcome::ok(op_id);
                }
            }
        };

        let result = self
            .call(
                GatewayCallKind::Remove,
                self.gateway.remove(&self.config.user_id, &server_id),
            )
            .await;

        let mut state = self.state.write().await;
        let outcome = match result {
            Ok(()) => {
                state.tracker.take_rollback(op_id);
                MutationOutcome::ok(op_id)
            }
            Err(err) => state.settle_failure(op_id, err),
        };
        state.finish(op_id);
        outcome
    }

    async fn run_update(&self, op_id: OpId, local_id: LocalId, quantity: u32) -> MutationOutcome {
        if quantity == 0 {
            return MutationOutcome::failed(op_id, CartError::InvalidQuantity { quantity });
        }
        let not_found = || MutationOutcome::failed(op_id, CartError::NotFound { local_id });
        let Some(key) = self.line_key(local_id).await else {
            return not_found();
        };
        self.begin(op_id, OperationIntent::UpdateQuantity { local_id, quantity })
            .await;
        let _ticket = self.queue.acquire(&key, self.config.line_ordering).await;

        let server_id = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let Some(line) = state.model.get_mut(local_id) else {
                state.finish(op_id);
                return not_found();
            };
            let rollback = Rollback::RestoreQuantity {
                local_id,
                quantity: line.quantity,
                speculative: line.speculative,
            };
            line.quantity = quantity;
            line.speculative = true;
            let server_id = line.server_id.clone();

            match server_id {
                Some(server_id) => {
                    state.tracker.stash_rollback(op_id, rollback);
                    server_id
                }
                None => {
                    // Mid-add line: nothing to update remotely yet, the add carries its own quantity.
                    debug!(local_id = %local_id, "updated unconfirmed line locally, skipping gateway");
                    state.finish(op_id);
                    return MutationOutcome::ok(op_id);
                }
            }
        };

        let result = self
            .call(
                GatewayCallKind::UpdateQuantity,
                self.gateway
                    .update_quantity(&self.config.user_id, &server_id, quantity),
            )
            .await;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let outcome = match result {
            Ok(snapshot) => {
                state.tracker.take_rollback(op_id);
                if let Some(line) = state.model.get_mut(local_id) {
                    if let Some(confirmed) = snapshot
                        .as_ref()
                        .and_then(|snapshot| snapshot.find_server(&server_id))
                    {
                        line.quantity = confirmed.quantity;
                    }
                    line.speculative = false;
                }
                MutationOutcome::ok(op_id)
            }
            Err(err) => state.settle_failure(op_id, err),
        };
        state.finish(op_id);
        outcome
    }

    async fn run_clear(&self, op_id: OpId) -> MutationOutcome {
        {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            state.tracker.begin(op_id, OperationIntent::Clear);
            let previous = state.model.take_lines();
            state
                .tracker
                .stash_rollback(op_id, Rollback::RestoreLines { lines: previous });
        }

        let result = self
            .call(
                GatewayCallKind::Clear,
                self.gateway.clear(&self.config.user_id),
            )
            .await;

        let mut state = self.state.write().await;
        let outcome = match result {
            Ok(()) => {
                state.tracker.take_rollback(op_id);
                MutationOutcome::ok(op_id)
            }
            Err(err) => state.settle_failure(op_id, err),
        };
        state.finish(op_id);
        outcome
    }
}
