//! Function declarations offered to the model.

use serde_json::{json, Value};

/// Name of the order-capture function.
pub const RECORD_ORDER: &str = "recordOrder";

/// Result returned to the model once an order is stored.
pub const RECORD_ORDER_RESULT: &str = "تم الحفظ بنجاح في لوحة التحكم.";

/// The `tools` entry of the setup message.
pub fn tool_declarations() -> Value {
    json!({ "functionDeclarations": [record_order_declaration()] })
}

/// `recordOrder(customerName, phone, address?, branch, items)`.
pub fn record_order_declaration() -> Value {
    json!({
        "name": RECORD_ORDER,
        "description": "حفظ طلبية طبية جديدة في النظام عند اكتمال بيانات العميل والمنتجات المطلوبة.",
        "parameters": {
            "type": "OBJECT",
            "properties": {
                "customerName": { "type": "STRING", "description": "اسم العميل الكامل" },
                "phone": { "type": "STRING", "description": "رقم هاتف العميل" },
                "address": { "type": "STRING", "description": "العنوان أو المدينة بالتفصيل" },
                "branch": {
                    "type": "STRING",
                    "description": "الفرع المطلوب الاستلام منه (الخرطوم، عطبرة، أو مدني)"
                },
                "items": { "type": "STRING", "description": "قائمة بالأصناف والكميات المطلوبة" }
            },
            "required": ["customerName", "phone", "branch", "items"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_optional() {
        let decl = record_order_declaration();
        let required: Vec<&str> = decl["parameters"]["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["customerName", "phone", "branch", "items"]);
        assert!(decl["parameters"]["properties"]["address"].is_object());
    }

    #[test]
    fn declarations_wrap_record_order() {
        let tools = tool_declarations();
        assert_eq!(tools["functionDeclarations"][0]["name"], RECORD_ORDER);
    }
}
