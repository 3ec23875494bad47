//! Persisted data types: [`Order`], [`OrderStatus`], [`Settings`] and the
//! adapter-produced [`NewOrder`].
//!
//! Field names serialise in camelCase to match the `zamzami_settings` record.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::defaults;

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Lifecycle of an order in the admin dashboard.
///
/// Older records stored the Arabic labels; both spellings deserialise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[serde(alias = "جديد")]
    New,
    #[serde(alias = "مكتمل")]
    Completed,
}

impl OrderStatus {
    /// The other status.
    pub fn toggled(self) -> Self {
        match self {
            OrderStatus::New => OrderStatus::Completed,
            OrderStatus::Completed => OrderStatus::New,
        }
    }

    /// Arabic label shown in the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::New => "جديد",
            OrderStatus::Completed => "مكتمل",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::New
    }
}

// ---------------------------------------------------------------------------
// NewOrder
// ---------------------------------------------------------------------------

/// Order fields as produced by the capture adapter, before the store assigns
/// an id, a timestamp and the initial status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub branch: String,
    pub items: String,
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A stored customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Milliseconds since the Unix epoch at creation, as a decimal string.
    pub id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub items: String,
    /// Local creation time, formatted for display.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub status: OrderStatus,
}

impl Order {
    /// Build a stored order from adapter output.
    pub fn from_new(new: NewOrder, id: String, timestamp: String) -> Self {
        Self {
            id,
            customer_name: new.customer_name,
            phone: new.phone,
            address: new.address,
            branch: new.branch,
            items: new.items,
            timestamp,
            status: OrderStatus::New,
        }
    }

    /// Short display number: `#` followed by the last six characters of the id.
    ///
    /// ```
    /// use zamzami_assistant::store::{NewOrder, Order};
    ///
    /// let new = NewOrder {
    ///     customer_name: "a".into(),
    ///     phone: "b".into(),
    ///     address: "c".into(),
    ///     branch: "d".into(),
    ///     items: "e".into(),
    /// };
    /// let order = Order::from_new(new, "1718000123456".into(), String::new());
    /// assert_eq!(order.short_number(), "#123456");
    /// ```
    pub fn short_number(&self) -> String {
        let chars: Vec<char> = self.id.chars().collect();
        let start = chars.len().saturating_sub(6);
        let tail: String = chars[start..].iter().collect();
        format!("#{tail}")
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The single persisted aggregate: operator-editable business settings plus
/// the order collection.
///
/// Any field missing from a persisted record is back-filled from
/// [`Settings::default`]; in particular a legacy record without `orders`
/// (or with `orders: null`) loads with an empty list.  An order entry that
/// cannot be read is dropped with a warning instead of failing the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub welcome_message: String,
    pub contact_number: String,
    pub admin_user: String,
    pub admin_pass: String,
    /// Behavioural prompt sent to the remote model at session setup.
    pub system_instruction: String,
    /// Newest first.
    #[serde(deserialize_with = "lenient_orders")]
    pub orders: Vec<Order>,
}

fn lenient_orders<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Order>, D::Error> {
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            log::warn!("store: ignoring non-list orders field: {other}");
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Order>(item) {
            Ok(order) => Some(order),
            Err(e) => {
                log::warn!("store: skipping unreadable order #{index}: {e}");
                None
            }
        })
        .collect())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            welcome_message: defaults::WELCOME_MESSAGE.into(),
            contact_number: defaults::CONTACT_NUMBER.into(),
            admin_user: defaults::ADMIN_USER.into(),
            admin_pass: defaults::ADMIN_PASS.into(),
            system_instruction: defaults::SYSTEM_INSTRUCTION.into(),
            orders: Vec::new(),
        }
    }
}

/// The operator-editable part of [`Settings`] (everything except orders).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    pub welcome_message: String,
    pub contact_number: String,
    pub admin_user: String,
    pub admin_pass: String,
    pub system_instruction: String,
}

impl From<&Settings> for Profile {
    fn from(s: &Settings) -> Self {
        Self {
            welcome_message: s.welcome_message.clone(),
            contact_number: s.contact_number.clone(),
            admin_user: s.admin_user.clone(),
            admin_pass: s.admin_pass.clone(),
            system_instruction: s.system_instruction.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
