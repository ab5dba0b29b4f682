use serde_json::Value;

/// Marker the upstream service uses for "present but unknown".
pub const MISSING_SENTINEL: &str = "N/A";

/// Property name that XML-to-JSON conversion uses for element text.
const TEXT_NODE: &str = "_text";

/// Non-failing path lookup over a JSON tree.
pub trait JsonPath {
    /// Follows `keys` through nested objects; `None` on any missing key or non-object.
    fn at_path(&self, keys: &[&str]) -> Option<&Value>;
}

impl JsonPath for Value {
    fn at_path(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().try_fold(self, |node, key| node.as_object()?.get(*key))
    }
}

/// Finds the consumer identifier in a stage-1 document.
///
/// Candidates are tried in order and the first usable one wins:
/// `mCustomerData.result.customerAccountNo`, then `customerNo` on the first
/// entry of `mOrderData.result.orders.order` (a lone object counts as the first entry).
pub fn extract(document: &Value) -> Option<String> {
    customer_account_no(document).or_else(|| order_customer_no(document))
}

fn customer_account_no(document: &Value) -> Option<String> {
    document
        .at_path(&["mCustomerData", "result", "customerAccountNo"])
        .and_then(normalize_field)
}

fn order_customer_no(document: &Value) -> Option<String> {
    let order = match document.at_path(&["mOrderData", "result", "orders", "order"])? {
        Value::Array(items) => items.first()?,
        single => single,
    };
    order.get("customerNo").and_then(normalize_field)
}

/// Normalizes one candidate value into a usable identifier.
///
/// Unwraps `{"_text": ...}` nodes, trims, and maps empty strings, `null`
/// and the `N/A` sentinel to `None`.
pub fn normalize_field(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.get(TEXT_NODE).and_then(normalize_scalar),
        other => normalize_scalar(other),
    }
}

fn normalize_scalar(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };

    if raw.is_empty() || raw == MISSING_SENTINEL {
        None
    } else {
        Some(raw)
    }
}
