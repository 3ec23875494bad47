//! Order capture adapter.
//!
//! Turns the raw `recordOrder` function-call arguments produced by the remote
//! model into a [`NewOrder`].  Missing, null or blank fields are replaced by
//! fixed Arabic placeholders; numbers and booleans are stringified.  The
//! adapter never fails, since a partially captured order is still worth
//! saving for follow-up.

use serde_json::Value;

use crate::store::NewOrder;

pub const NAME_PLACEHOLDER: &str = "غير معروف";
pub const PHONE_PLACEHOLDER: &str = "غير معروف";
pub const ADDRESS_PLACEHOLDER: &str = "لم يحدد";
pub const BRANCH_PLACEHOLDER: &str = "غير محدد";
pub const ITEMS_PLACEHOLDER: &str = "لا توجد تفاصيل";

/// Normalize raw function-call arguments.
///
/// Non-object `args` yield an order made entirely of placeholders.
pub fn normalize(args: &Value) -> NewOrder {
    NewOrder {
        customer_name: field(args, "customerName", NAME_PLACEHOLDER),
        phone: field(args, "phone", PHONE_PLACEHOLDER),
        address: field(args, "address", ADDRESS_PLACEHOLDER),
        branch: field(args, "branch", BRANCH_PLACEHOLDER),
        items: field(args, "items", ITEMS_PLACEHOLDER),
    }
}

fn field(args: &Value, key: &str, placeholder: &str) -> String {
    let text = match args.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        // Arrays of items are joined, one per line.
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    };

    if text.is_empty() {
        placeholder.to_string()
    } else {
        text
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
