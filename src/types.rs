use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use tabled::Tabled;

/// Product category lookup. Unrecognized or missing codes map to "Misc".
pub static CATEGORY_MAP: Lazy<HashMap<i64, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (1, "Electronics"),
        (2, "Apparel"),
        (3, "Books"),
        (4, "Home Goods"),
    ])
});

/// Map a raw category code onto its label.
///
/// Only integer codes hit the table (a float with no fractional part
/// counts as its integer); everything else, including absent fields,
/// falls back to "Misc".
pub fn category_label(raw: Option<&Value>) -> &'static str {
    let code = raw.and_then(|v| {
        v.as_i64().or_else(|| {
            v.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        })
    });
    code.and_then(|c| CATEGORY_MAP.get(&c).copied()).unwrap_or("Misc")
}

// Raw boundary structs. The record source is loosely typed, so every
// field stays a borrowed generic `Value` here; the flattener coerces
// each one into its canonical type before any business logic runs.
// Built by hand rather than through serde so that an absent field
// (`None`) stays distinguishable from an explicit JSON null
// (`Some(Value::Null)`) — the `orders` field needs the difference —
// and so that only actual mappings pass the boundary.
#[derive(Debug)]
pub struct RawCustomer<'a> {
    pub id: Option<&'a Value>,
    pub name: Option<&'a Value>,
    pub registration_date: Option<&'a Value>,
    pub orders: Option<&'a Value>,
}

impl<'a> RawCustomer<'a> {
    /// `None` when the record is not a mapping.
    pub fn from_value(value: &'a Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            id: obj.get("id"),
            name: obj.get("name"),
            registration_date: obj.get("registration_date"),
            orders: obj.get("orders"),
        })
    }
}

#[derive(Debug)]
pub struct RawOrder<'a> {
    pub order_id: Option<&'a Value>,
    pub order_date: Option<&'a Value>,
    pub items: Option<&'a Value>,
}

impl<'a> RawOrder<'a> {
    pub fn from_value(value: &'a Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            order_id: obj.get("order_id"),
            order_date: obj.get("order_date"),
            items: obj.get("items"),
        })
    }
}

#[derive(Debug)]
pub struct RawItem<'a> {
    pub item_id: Option<&'a Value>,
    pub product_name: Option<&'a Value>,
    pub category: Option<&'a Value>,
    pub price: Option<&'a Value>,
    pub quantity: Option<&'a Value>,
}

impl<'a> RawItem<'a> {
    pub fn from_value(value: &'a Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            item_id: obj.get("item_id"),
            product_name: obj.get("product_name"),
            category: obj.get("category"),
            price: obj.get("price"),
            quantity: obj.get("quantity"),
        })
    }
}

fn ser_opt_datetime<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(dt) => serializer.serialize_str(&dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        None => serializer.serialize_none(),
    }
}

/// One flattened row: one source line item, or the single placeholder
/// row an order with zero items produces (all item-level columns null).
/// Field order here is the exact column order of the output CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRow {
    pub customer_id: i64,
    pub customer_name: String,
    #[serde(serialize_with = "ser_opt_datetime")]
    pub registration_date: Option<NaiveDateTime>,
    pub is_vip: bool,
    pub order_id: i64,
    #[serde(serialize_with = "ser_opt_datetime")]
    pub order_date: Option<NaiveDateTime>,
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<f64>,
    pub item_quantity: Option<i64>,
    pub total_item_price: Option<f64>,
    pub total_order_value_percentage: Option<f64>,
}

/// Console rendering of an [`OutputRow`]; nulls show as empty cells.
#[derive(Debug, Clone, Tabled)]
pub struct PreviewRow {
    #[tabled(rename = "customer_id")]
    pub customer_id: i64,
    #[tabled(rename = "customer_name")]
    pub customer_name: String,
    #[tabled(rename = "registration_date")]
    pub registration_date: String,
    #[tabled(rename = "is_vip")]
    pub is_vip: bool,
    #[tabled(rename = "order_id")]
    pub order_id: i64,
    #[tabled(rename = "order_date")]
    pub order_date: String,
    #[tabled(rename = "product_id")]
    pub product_id: String,
    #[tabled(rename = "product_name")]
    pub product_name: String,
    #[tabled(rename = "category")]
    pub category: String,
    #[tabled(rename = "unit_price")]
    pub unit_price: String,
    #[tabled(rename = "item_quantity")]
    pub item_quantity: String,
    #[tabled(rename = "total_item_price")]
    pub total_item_price: String,
    #[tabled(rename = "total_order_value_percentage")]
    pub total_order_value_percentage: String,
}

impl From<&OutputRow> for PreviewRow {
    fn from(row: &OutputRow) -> Self {
        fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map(|x| x.to_string()).unwrap_or_default()
        }
        fn opt_dt(v: &Option<NaiveDateTime>) -> String {
            v.map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default()
        }
        PreviewRow {
            customer_id: row.customer_id,
            customer_name: row.customer_name.clone(),
            registration_date: opt_dt(&row.registration_date),
            is_vip: row.is_vip,
            order_id: row.order_id,
            order_date: opt_dt(&row.order_date),
            product_id: opt(&row.product_id),
            product_name: opt(&row.product_name),
            category: opt(&row.category),
            unit_price: opt(&row.unit_price),
            item_quantity: opt(&row.item_quantity),
            total_item_price: opt(&row.total_item_price),
            total_order_value_percentage: opt(&row.total_order_value_percentage),
        }
    }
}
