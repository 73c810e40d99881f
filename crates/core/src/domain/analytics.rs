use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    View,
    CartAdd,
    Wishlist,
    Purchase,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::CartAdd => "CART_ADD",
            Self::Wishlist => "WISHLIST",
            Self::Purchase => "PURCHASE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "VIEW" => Some(Self::View),
            "CART_ADD" => Some(Self::CartAdd),
            "WISHLIST" => Some(Self::Wishlist),
            "PURCHASE" => Some(Self::Purchase),
            _ => None,
        }
    }

    /// Interaction strength used by the default trainer.
    pub fn weight(&self) -> f64 {
        match self {
            Self::View => 1.0,
            Self::Wishlist => 2.0,
            Self::CartAdd => 3.0,
            Self::Purchase => 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub product_id: ProductId,
    pub action_type: ActionType,
    pub timestamp: DateTime<Utc>,
}

/// Per-user analytics state. `recommendations` is the last persisted cache and
/// may reference products that have since left the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAnalyticsRecord {
    pub user_id: UserId,
    pub actions: Vec<ActionEvent>,
    pub recommendations: Vec<ProductId>,
    pub last_trained: Option<DateTime<Utc>>,
}

impl UserAnalyticsRecord {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id, actions: Vec::new(), recommendations: Vec::new(), last_trained: None }
    }
}
