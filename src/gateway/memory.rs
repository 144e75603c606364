//! Process-local remote cart.
//!
//! Behaves like the real cart service closely enough for tests and the demo
//! binary: lines merge by product/variant, per-product stock limits produce
//! `available_quantity` rejections, and faults or latency can be injected per
//! call kind.

use super::{AddLineRequest, GatewayCallKind, GatewayError, GatewayResult, RemoteCartGateway};
use crate::core::{CartSnapshot, ProductRef, ServerLineId, SnapshotLine, UserId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    carts: HashMap<UserId, Vec<SnapshotLine>>,
    catalog: HashMap<String, ProductRef>,
    stock: HashMap<String, u32>,
    faults: HashMap<GatewayCallKind, VecDeque<GatewayError>>,
    calls: HashMap<GatewayCallKind, usize>,
    latency: Duration,
    next_line: u64,
}

impl MemoryState {
    fn cart_mut(&mut self, user: &UserId) -> &mut Vec<SnapshotLine> {
        self.carts.entry(user.clone()).or_default()
    }

    fn snapshot(&self, user: &UserId) -> CartSnapshot {
        CartSnapshot::new(self.carts.get(user).cloned().unwrap_or_default())
    }

    fn check_stock(&self, product_id: &str, requested: u32) -> GatewayResult<()> {
        match self.stock.get(product_id) {
            Some(available) if requested > *available => {
                Err(GatewayError::insufficient_stock(*available))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct InMemoryCartGateway {
    state: Mutex<MemoryState>,
}

impl InMemoryCartGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps how many units of a product any single line may hold.
    pub async fn set_stock(&self, product_id: &str, available: u32) {
        self.state
            .lock()
            .await
            .stock
            .insert(product_id.to_string(), available);
    }

    /// Registers display fields returned for a product id. Unknown products
    /// are echoed back with their id as name and a zero price.
    pub async fn register_product(&self, product: ProductRef) {
        self.state
            .lock()
            .await
            .catalog
            .insert(product.id.clone(), product);
    }

    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    /// Makes the next call of `kind` fail with `error`. Queued faults are consumed in order.
    pub async fn fail_next(&self, kind: GatewayCallKind, error: GatewayError) {
        self.state
            .lock()
            .await
            .faults
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    pub async fn call_count(&self, kind: GatewayCallKind) -> usize {
        self.state
            .lock()
            .await
            .calls
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub async fn total_calls(&self) -> usize {
        self.state.lock().await.calls.values().sum()
    }

    /// Current server-side cart, bypassing call accounting.
    pub async fn snapshot_of(&self, user: &UserId) -> CartSnapshot {
        self.state.lock().await.snapshot(user)
    }

    /// Replaces a user's server-side cart, bypassing call accounting.
    pub async fn seed(&self, user: &UserId, snapshot: CartSnapshot) {
        let mut state = self.state.lock().await;
        state.next_line += snapshot.lines.len() as u64;
        state.carts.insert(user.clone(), snapshot.lines);
    }

    /// Counts the call, applies latency and pops a queued fault if any.
    async fn enter(&self, kind: GatewayCallKind) -> GatewayResult<()> {
        let latency = {
            let mut state = self.state.lock().await;
            *state.calls.entry(kind).or_default() += 1;
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        if let Some(error) = state.faults.get_mut(&kind).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCartGateway for InMemoryCartGateway {
    async fn fetch(&self, user: &UserId) -> GatewayResult<CartSnapshot> {
        self.enter(GatewayCallKind::Fetch).await?;
        Ok(self.state.lock().await.snapshot(user))
    }

    async fn add(&self, user: &UserId, request: AddLineRequest) -> GatewayResult<CartSnapshot> {
        self.enter(GatewayCallKind::Add).await?;
        if request.quantity == 0 {
            return Err(GatewayError::rejected("quantity must be at least 1"));
        }

        let mut state = self.state.lock().await;
        let existing = state.carts.get(user).and_then(|lines| {
            lines.iter().position(|line| {
                line.product.id == request.product_id && line.variant == request.variant
            })
        });

        match existing {
            Some(index) => {
                let merged = state.cart_mut(user)[index]
                    .quantity
                    .saturating_add(request.quantity);
                state.check_stock(&request.product_id, merged)?;
                state.cart_mut(user)[index].quantity = merged;
            }
            None => {
                state.check_stock(&request.product_id, request.quantity)?;
                state.next_line += 1;
                let server_id = ServerLineId::new(format!("line-{}", state.next_line));
                let product = state
                    .catalog
                    .get(&request.product_id)
                    .cloned()
                    .unwrap_or_else(|| {
                        ProductRef::new(request.product_id.clone(), request.product_id.clone(), 0)
                    });
                state.cart_mut(user).push(SnapshotLine {
                    server_id,
                    product,
                    variant: request.variant,
                    quantity: request.quantity,
                });
            }
        }

        Ok(state.snapshot(user))
    }

    async fn update_quantity(
        &self,
        user: &UserId,
        line: &ServerLineId,
        quantity: u32,
    ) -> GatewayResult<Option<CartSnapshot>> {
        self.enter(GatewayCallKind::UpdateQuantity).await?;
        if quantity == 0 {
            return Err(GatewayError::rejected("quantity must be at least 1"));
        }

        let mut state = self.state.lock().await;
        let Some(index) = state
            .carts
            .get(user)
            .and_then(|lines| lines.iter().position(|candidate| candidate.server_id == *line))
        else {
            return Err(GatewayError::rejected(format!("cart line '{}' not found", line)));
        };

        let product_id = state.cart_mut(user)[index].product.id.clone();
        state.check_stock(&product_id, quantity)?;
        state.cart_mut(user)[index].quantity = quantity;
        Ok(Some(state.snapshot(user)))
    }

    async fn remove(&self, user: &UserId, line: &ServerLineId) -> GatewayResult<()> {
        self.enter(GatewayCallKind::Remove).await?;
        let mut state = self.state.lock().await;
        let lines = state.cart_mut(user);
        let before = lines.len();
        lines.retain(|candidate| candidate.server_id != *line);
        if lines.len() == before {
            return Err(GatewayError::rejected(format!("cart line '{}' not found", line)));
        }
        Ok(())
    }

    async fn clear(&self, user: &UserId) -> GatewayResult<()> {
        self.enter(GatewayCallKind::Clear).await?;
        self.state.lock().await.cart_mut(user).clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::VariantKey;

    fn request(product: &str, color: &str, quantity: u32) -> AddLineRequest {
        AddLineRequest::new(product, VariantKey::color(color), quantity)
    }

    #[tokio::test]
    async fn test_add_merges_same_variant() {
        let gateway = InMemoryCartGateway::new();
        let user = UserId::new("u1");

        gateway.add(&user, request("P1", "red", 2)).await.unwrap();
        let snapshot = gateway.add(&user, request("P1", "red", 1)).await.unwrap();
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.lines[0].quantity, 3);

        let snapshot = gateway.add(&user, request("P1", "blue", 1)).await.unwrap();
        assert_eq!(snapshot.lines.len(), 2);
        assert_eq!(gateway.call_count(GatewayCallKind::Add).await, 3);
    }

    #[tokio::test]
    async fn test_stock_limit_reports_available_quantity() {
        let gateway = InMemoryCartGateway::new();
        let user = UserId::new("u1");
        gateway.set_stock("P1", 3).await;

        let snapshot = gateway.add(&user, request("P1", "red", 2)).await.unwrap();
        let line = snapshot.lines[0].server_id.clone();

        let err = gateway.update_quantity(&user, &line, 5).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Rejected {
                message: "only 3 item(s) available".to_string(),
                available_quantity: Some(3),
            }
        );
        assert_eq!(gateway.snapshot_of(&user).await.lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_injected_fault_is_consumed_once() {
        let gateway = InMemoryCartGateway::new();
        let user = UserId::new("u1");
        gateway
            .fail_next(GatewayCallKind::Fetch, GatewayError::Transport("down".into()))
            .await;

        assert!(gateway.fetch(&user).await.is_err());
        assert!(gateway.fetch(&user).await.is_ok());
        assert_eq!(gateway.call_count(GatewayCallKind::Fetch).await, 2);
    }

    #[tokio::test]
    async fn test_merge_saturates_quantity() {
        let gateway = InMemoryCartGateway::new();
        let user = UserId::new("u1");
        gateway
            .add(&user, request("P1", "red", u32::MAX))
            .await
            .unwrap();
        let snapshot = gateway.add(&user, request("P1", "red", 1)).await.unwrap();
        assert_eq!(snapshot.lines[0].quantity, u32::MAX);
    }

    #[tokio::test]
    async fn test_remove_unknown_line_is_rejected() {
        let gateway = InMemoryCartGateway::new();
        let user = UserId::new("u1");
        let err = gateway
            .remove(&user, &ServerLineId::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { .. }));
    }
}
