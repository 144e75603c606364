//! Hand-driven gateway for exercising overlapping operations.
//!
//! Every call parks until the driver pulls it with [`ScriptedCartGateway::next_call`]
//! and answers it. This makes the order in which in-flight calls settle fully
//! controllable.

use super::{AddLineRequest, GatewayCallKind, GatewayError, GatewayResult, RemoteCartGateway};
use crate::core::{CartSnapshot, ServerLineId, UserId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc, oneshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Fetch {
        user: UserId,
    },
    Add {
        user: UserId,
        request: AddLineRequest,
    },
    UpdateQuantity {
        user: UserId,
        line: ServerLineId,
        quantity: u32,
    },
    Remove {
        user: UserId,
        line: ServerLineId,
    },
    Clear {
        user: UserId,
    },
}

impl GatewayCall {
    pub fn kind(&self) -> GatewayCallKind {
        match self {
            GatewayCall::Fetch { .. } => GatewayCallKind::Fetch,
            GatewayCall::Add { .. } => GatewayCallKind::Add,
            GatewayCall::UpdateQuantity { .. } => GatewayCallKind::UpdateQuantity,
            GatewayCall::Remove { .. } => GatewayCallKind::Remove,
            GatewayCall::Clear { .. } => GatewayCallKind::Clear,
        }
    }
}

type Reply = GatewayResult<Option<CartSnapshot>>;

/// A parked gateway call waiting for its answer.
#[derive(Debug)]
pub struct PendingCall {
    pub call: GatewayCall,
    reply: oneshot::Sender<Reply>,
}

impl PendingCall {
    pub fn kind(&self) -> GatewayCallKind {
        self.call.kind()
    }

    /// Answers with a snapshot (required for `fetch` and `add`).
    pub fn respond_snapshot(self, snapshot: CartSnapshot) {
        let _ = self.reply.send(Ok(Some(snapshot)));
    }

    /// Answers with an empty success.
    pub fn respond_ok(self) {
        let _ = self.reply.send(Ok(None));
    }

    pub fn fail(self, error: GatewayError) {
        let _ = self.reply.send(Err(error));
    }
}

pub struct ScriptedCartGateway {
    calls_tx: mpsc::UnboundedSender<PendingCall>,
    calls_rx: Mutex<mpsc::UnboundedReceiver<PendingCall>>,
    calls_made: AtomicUsize,
}

impl Default for ScriptedCartGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCartGateway {
    pub fn new() -> Self {
        let (calls_tx, calls_rx) = mpsc::unbounded_channel();
        Self {
            calls_tx,
            calls_rx: Mutex::new(calls_rx),
            calls_made: AtomicUsize::new(0),
        }
    }

    /// Waits for the next call to reach the gateway.
    pub async fn next_call(&self) -> Option<PendingCall> {
        self.calls_rx.lock().await.recv().await
    }

    /// Returns a call only if one is already parked.
    pub async fn try_next_call(&self) -> Option<PendingCall> {
        self.calls_rx.lock().await.try_recv().ok()
    }

    pub fn calls_made(&self) -> usize {
        self.calls_made.load(Ordering::SeqCst)
    }

    async fn park(&self, call: GatewayCall) -> Reply {
        self.calls_made.fetch_add(1, Ordering::SeqCst);
        let (reply, answer) = oneshot::channel();
        self.calls_tx
            .send(PendingCall { call, reply })
            .map_err(|_| GatewayError::Transport("scripted gateway closed".to_string()))?;
        answer
            .await
            .map_err(|_| GatewayError::Transport("scripted call dropped unanswered".to_string()))?
    }

    async fn park_snapshot(&self, call: GatewayCall) -> GatewayResult<CartSnapshot> {
        let kind = call.kind();
        self.park(call).await?.ok_or_else(|| {
            GatewayError::Decode(format!("{} answered without a snapshot", kind))
        })
    }
}

#[async_trait]
impl RemoteCartGateway for ScriptedCartGateway {
    async fn fetch(&self, user: &UserId) -> GatewayResult<CartSnapshot> {
        self.park_snapshot(GatewayCall::Fetch { user: user.clone() })
            .await
    }

    async fn add(&self, user: &UserId, request: AddLineRequest) -> GatewayResult<CartSnapshot> {
        self.park_snapshot(GatewayCall::Add {
            user: user.clone(),
            request,
        })
        .await
    }

    async fn update_quantity(
        &self,
        user: &UserId,
        line: &ServerLineId,
        quantity: u32,
    ) -> GatewayResult<Option<CartSnapshot>> {
        self.park(GatewayCall::UpdateQuantity {
            user: user.clone(),
            line: line.clone(),
            quantity,
        })
        .await
    }

    async fn remove(&self, user: &UserId, line: &ServerLineId) -> GatewayResult<()> {
        self.park(GatewayCall::Remove {
            user: user.clone(),
            line: line.clone(),
        })
        .await
        .map(|_| ())
    }

    async fn clear(&self, user: &UserId) -> GatewayResult<()> {
        self.park(GatewayCall::Clear { user: user.clone() })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_calls_park_until_answered() {
        let gateway = Arc::new(ScriptedCartGateway::new());
        let user = UserId::new("u1");

        let caller = {
            let gateway = Arc::clone(&gateway);
            let user = user.clone();
            tokio::spawn(async move { gateway.fetch(&user).await })
        };

        let pending = gateway.next_call().await.unwrap();
        assert_eq!(pending.kind(), GatewayCallKind::Fetch);
        pending.respond_snapshot(CartSnapshot::empty());

        let snapshot = caller.await.unwrap().unwrap();
        assert!(snapshot.lines.is_empty());
        assert_eq!(gateway.calls_made(), 1);
    }

    #[tokio::test]
    async fn test_dropped_call_surfaces_transport_error() {
        let gateway = Arc::new(ScriptedCartGateway::new());
        let caller = {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move { gateway.clear(&UserId::new("u1")).await })
        };

        drop(gateway.next_call().await.unwrap());
        let err = caller.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn test_add_without_snapshot_is_decode_error() {
        let gateway = Arc::new(ScriptedCartGateway::new());
        let caller = {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                gateway
                    .add(
                        &UserId::new("u1"),
                        AddLineRequest::new("P1", Default::default(), 1),
                    )
                    .await
            })
        };

        gateway.next_call().await.unwrap().respond_ok();
        let err = caller.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }
}
