//! Recommended imports grouped by who is using the crate.
//!
//! `ui` is what a storefront component needs to drive the cart.
//! `gateway` is for wiring or faking the remote cart service.

pub mod ui {
    //! Engine surface consumed by UI code.
    pub use crate::{
        AddLineInput, CartEngine, CartError, CartLine, CartNotifier, EngineConfig, ErrorRecord,
        LocalId, MutationOutcome, Notice, NoticeLevel, OpId, ProductRef, VariantKey,
    };
}

pub mod gateway {
    //! Building blocks for remote cart implementations.
    pub use crate::gateway::{
        AddLineRequest, GatewayCall, GatewayCallKind, GatewayError, GatewayResult,
        HttpCartGateway, HttpGatewayConfig, InMemoryCartGateway, PendingCall,
        RemoteCartGateway, ScriptedCartGateway,
    };
    pub use crate::{CartSnapshot, ServerLineId, SnapshotLine, UserId};
}
