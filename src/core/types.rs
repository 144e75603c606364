use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-side line identity. Allocated from a per-engine counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(u64);

impl LocalId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Line identity assigned by the remote cart once an add is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerLineId(String);

impl ServerLineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerLineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Denormalized product display fields. Read-only, never re-fetched per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Price in minor currency units.
    pub unit_price: u64,
}

impl ProductRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit_price: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: None,
            unit_price,
        }
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Color/size pair distinguishing lines of the same product.
///
/// `size` doubles as the remote variant id.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VariantKey {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl VariantKey {
    pub fn new(color: Option<&str>, size: Option<&str>) -> Self {
        Self {
            color: color.map(str::to_string),
            size: size.map(str::to_string),
        }
    }

    pub fn color(color: &str) -> Self {
        Self::new(Some(color), None)
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.color.as_deref().unwrap_or("-"),
            self.size.as_deref().unwrap_or("-")
        )
    }
}

/// Logical identity of a cart line: equal keys are the same line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineKey {
    pub product_id: String,
    pub variant: VariantKey,
}

impl LineKey {
    pub fn new(product_id: impl Into<String>, variant: VariantKey) -> Self {
        Self {
            product_id: product_id.into(),
            variant,
        }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.product_id, self.variant)
    }
}

/// One line of the local cart model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub local_id: LocalId,
    pub server_id: Option<ServerLineId>,
    pub product: ProductRef,
    pub variant: VariantKey,
    pub quantity: u32,
    pub speculative: bool,
}

impl CartLine {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product.id.clone(), self.variant.clone())
    }

    pub fn matches(&self, key: &LineKey) -> bool {
        self.product.id == key.product_id && self.variant == key.variant
    }

    /// Server-shaped view of this line, or `None` while it has no server identity.
    pub fn to_snapshot_line(&self) -> Option<SnapshotLine> {
        let server_id = self.server_id.clone()?;
        Some(SnapshotLine {
            server_id,
            product: self.product.clone(),
            variant: self.variant.clone(),
            quantity: self.quantity,
        })
    }
}

/// Caller input for adding items to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineInput {
    pub product: ProductRef,
    #[serde(default)]
    pub variant: VariantKey,
    pub quantity: u32,
}

impl AddLineInput {
    pub fn new(product: ProductRef, variant: VariantKey, quantity: u32) -> Self {
        Self {
            product,
            variant,
            quantity,
        }
    }

    pub fn key(&self) -> LineKey {
        LineKey::new(self.product.id.clone(), self.variant.clone())
    }
}

/// One line as reported by the remote cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotLine {
    pub server_id: ServerLineId,
    pub product: ProductRef,
    #[serde(flatten)]
    pub variant: VariantKey,
    pub quantity: u32,
}

impl SnapshotLine {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product.id.clone(), self.variant.clone())
    }
}

/// Full authoritative line list returned by the remote cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<SnapshotLine>,
}

impl CartSnapshot {
    pub fn new(lines: Vec<SnapshotLine>) -> Self {
        Self { lines }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn find(&self, key: &LineKey) -> Option<&SnapshotLine> {
        self.lines.iter().find(|line| line.key() == *key)
    }

    pub fn find_server(&self, server_id: &ServerLineId) -> Option<&SnapshotLine> {
        self.lines.iter().find(|line| line.server_id == *server_id)
    }

    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_key_ignores_display_fields() {
        let a = LineKey::new("P1", VariantKey::color("red"));
        let line = CartLine {
            local_id: LocalId::new(1),
            server_id: None,
            product: ProductRef::new("P1", "Shirt", 1999).image("shirt.png"),
            variant: VariantKey::color("red"),
            quantity: 1,
            speculative: true,
        };
        assert!(line.matches(&a));
        assert_eq!(line.key(), a);
        assert!(line.to_snapshot_line().is_none());
    }

    #[test]
    fn test_snapshot_wire_format_flattens_variant() {
        let json = r#"{
            "lines": [{
                "serverId": "line-1",
                "product": {"id": "P1", "name": "Shirt", "unitPrice": 1999},
                "color": "red",
                "quantity": 2
            }]
        }"#;
        let snapshot: CartSnapshot = serde_json::from_str(json).unwrap();
        let line = &snapshot.lines[0];
        assert_eq!(line.variant, VariantKey::color("red"));
        assert_eq!(line.server_id.as_str(), "line-1");
        assert_eq!(snapshot.total_quantity(), 2);
        assert!(
            snapshot
                .find(&LineKey::new("P1", VariantKey::color("red")))
                .is_some()
        );
    }

    #[test]
    fn test_variant_display() {
        assert_eq!(VariantKey::new(Some("red"), Some("M")).to_string(), "red/M");
        assert_eq!(VariantKey::default().to_string(), "-/-");
    }
}
