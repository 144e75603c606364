pub mod error;
pub mod model;
pub mod types;

pub use error::{CartError, Result};
pub use model::CartModel;
pub use types::{
    AddLineInput, CartLine, CartSnapshot, LineKey, LocalId, ProductRef, ServerLineId,
    SnapshotLine, UserId, VariantKey,
};
