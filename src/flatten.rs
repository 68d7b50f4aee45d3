// The tolerant flattening engine.
//
// Walks customer -> order -> item, coercing every raw field on the way
// down, and emits one output row per line item (or one placeholder row
// for an order with zero items). A malformed leaf never aborts its
// siblings or ancestors: every drop is routed to the skip log at its
// own level, and every unparsable scalar resolves to a documented
// fallback instead of an error.
use crate::skiplog::SkipLog;
use crate::types::{category_label, OutputRow, RawCustomer, RawItem, RawOrder};
use crate::util::{self, Coerced};
use chrono::NaiveDateTime;
use serde_json::Value;
use std::collections::HashSet;

/// Upper bound for a believable line-item quantity. Zero is allowed: an
/// explicitly free line still gets its row.
pub const MAX_ITEM_QUANTITY: i64 = 10_000;

/// Counts accumulated during the walk that cannot be reconstructed from
/// the output table or the skip log alone.
#[derive(Debug, Default, Clone)]
pub struct TraversalStats {
    /// Records in the source sequence, valid or not.
    pub customer_records: usize,
    /// Distinct numeric customer ids seen in the source, including on
    /// customers that were later skipped.
    pub distinct_customer_ids: usize,
    /// Sum of order-list lengths over customers that passed the
    /// customer-level checks. Customers skipped wholesale contribute
    /// nothing; orders skipped at order level still count.
    pub orders_seen: usize,
}

/// Everything we can coerce out of one raw item, before deciding
/// whether it earns a row. `None` for an item that is not a mapping.
struct ItemFacts {
    product_id: Option<i64>,
    product_name: Option<String>,
    category: &'static str,
    price: Coerced<f64>,
    quantity: Coerced<i64>,
    raw_item_id: String,
}

/// Flatten the raw customer records into output rows.
///
/// `now` is the evaluation instant for the date range checks; tests pin
/// it, the binary passes the wall clock. Skip decisions accumulate in
/// `skips`; row emission and skip classification are independent.
pub fn flatten(
    customers: &[Value],
    vip: &HashSet<i64>,
    now: NaiveDateTime,
    skips: &mut SkipLog,
) -> (Vec<OutputRow>, TraversalStats) {
    let mut rows: Vec<OutputRow> = Vec::new();
    let mut stats = TraversalStats::default();
    let mut ids_seen: HashSet<i64> = HashSet::new();

    for (cust_idx, value) in customers.iter().enumerate() {
        stats.customer_records += 1;
        if let Some(id) = value.get("id").and_then(customer_id) {
            ids_seen.insert(id);
        }

        let Some(raw) = RawCustomer::from_value(value) else {
            skips.skip_customer(cust_idx, None, "record is not a mapping");
            continue;
        };

        let (Some(id_raw), Some(name_raw), Some(reg_raw)) = (
            util::present(raw.id),
            util::present(raw.name),
            util::present(raw.registration_date),
        ) else {
            let id = util::present(raw.id).and_then(customer_id);
            skips.skip_customer(cust_idx, id, "missing id, name, or registration_date");
            continue;
        };

        let Some(cust_id) = customer_id(id_raw) else {
            skips.skip_customer(cust_idx, None, "customer id is not numeric");
            continue;
        };
        let cust_name = util::text_of(name_raw);
        let reg_date = util::sanitize_date(
            reg_raw,
            now,
            &format!("customer {cust_id} registration_date"),
        );
        let is_vip = vip.contains(&cust_id);

        // An absent orders field means no orders; a present non-array
        // one (including an explicit null) means the whole record
        // cannot be trusted.
        let orders: &[Value] = match raw.orders {
            None => &[],
            Some(Value::Array(a)) => a,
            Some(_) => {
                skips.skip_customer(cust_idx, Some(cust_id), "orders field is not a sequence");
                continue;
            }
        };
        stats.orders_seen += orders.len();

        for (order_idx, order_value) in orders.iter().enumerate() {
            flatten_order(
                cust_id, &cust_name, reg_date, is_vip, order_idx, order_value, now, skips,
                &mut rows,
            );
        }
    }

    stats.distinct_customer_ids = ids_seen.len();
    if rows.is_empty() {
        tracing::warn!("no valid data rows extracted");
    }
    (rows, stats)
}

#[allow(clippy::too_many_arguments)]
fn flatten_order(
    cust_id: i64,
    cust_name: &str,
    reg_date: Option<NaiveDateTime>,
    is_vip: bool,
    order_idx: usize,
    order_value: &Value,
    now: NaiveDateTime,
    skips: &mut SkipLog,
    rows: &mut Vec<OutputRow>,
) {
    let Some(raw) = RawOrder::from_value(order_value) else {
        skips.skip_order(cust_id, order_idx, String::new(), "record is not a mapping");
        return;
    };

    let order_id = util::present(raw.order_id).and_then(util::extract_id);
    let date_raw = util::present(raw.order_date);
    let (Some(order_id), Some(date_raw)) = (order_id, date_raw) else {
        skips.skip_order(
            cust_id,
            order_idx,
            util::raw_snippet(util::present(raw.order_id)),
            "missing or unresolvable order_id/order_date",
        );
        return;
    };
    let order_date = util::sanitize_date(
        date_raw,
        now,
        &format!("customer {cust_id} order {order_id} order_date"),
    );

    // A malformed items field downgrades to an empty list; the order
    // survives as a zero-item order.
    let items: &[Value] = match raw.items {
        None => &[],
        Some(Value::Array(a)) => a,
        Some(_) => {
            tracing::warn!(
                customer_id = cust_id,
                order_id,
                "items field malformed, treating as empty"
            );
            &[]
        }
    };

    let facts: Vec<Option<ItemFacts>> = items.iter().map(item_facts).collect();

    // Order total, computed over every item the coercers can resolve.
    // An item whose price or quantity is missing (or whose quantity is
    // out of range) contributes zero; it is excluded from row emission
    // by the same coercion, so sum and rows stay consistent.
    let total_order_value: f64 = facts
        .iter()
        .map(|f| match f {
            Some(f) => match (f.price.resolve(), f.quantity.resolve()) {
                (Some(p), Some(q)) if (0..=MAX_ITEM_QUANTITY).contains(&q) => p * q as f64,
                _ => 0.0,
            },
            None => 0.0,
        })
        .sum();

    let base = OutputRow {
        customer_id: cust_id,
        customer_name: cust_name.to_string(),
        registration_date: reg_date,
        is_vip,
        order_id,
        order_date,
        product_id: None,
        product_name: None,
        category: None,
        unit_price: None,
        item_quantity: None,
        total_item_price: None,
        total_order_value_percentage: None,
    };

    if facts.is_empty() {
        // Zero-item order: exactly one placeholder row.
        rows.push(base);
        return;
    }

    for (item_idx, fact) in facts.into_iter().enumerate() {
        let Some(f) = fact else {
            skips.skip_item(cust_id, order_id, item_idx, String::new(), "record is not a mapping");
            continue;
        };
        let (Some(product_id), Some(product_name)) = (f.product_id, f.product_name) else {
            skips.skip_item(
                cust_id,
                order_id,
                item_idx,
                f.raw_item_id,
                "missing or unresolvable item_id/product_name",
            );
            continue;
        };
        let (Some(unit_price), Some(quantity)) = (f.price.resolve(), f.quantity.resolve()) else {
            skips.skip_item(
                cust_id,
                order_id,
                item_idx,
                f.raw_item_id,
                "unparsable price/quantity",
            );
            continue;
        };
        if !(0..=MAX_ITEM_QUANTITY).contains(&quantity) {
            skips.skip_item(
                cust_id,
                order_id,
                item_idx,
                f.raw_item_id,
                "quantity out of range",
            );
            continue;
        }

        let line_total = unit_price * quantity as f64;
        let unit_price = util::round2(unit_price);
        let percentage = if total_order_value > 0.0 {
            Some(util::round2(line_total / total_order_value * 100.0))
        } else {
            None
        };
        rows.push(OutputRow {
            product_id: Some(product_id),
            product_name: Some(product_name),
            category: Some(f.category.to_string()),
            unit_price: Some(unit_price),
            item_quantity: Some(quantity),
            total_item_price: Some(util::round2(unit_price * quantity as f64)),
            total_order_value_percentage: percentage,
            ..base.clone()
        });
    }
}

fn item_facts(value: &Value) -> Option<ItemFacts> {
    let raw = RawItem::from_value(value)?;
    Some(ItemFacts {
        product_id: util::present(raw.item_id).and_then(util::extract_id),
        product_name: util::present(raw.product_name).map(util::text_of),
        category: category_label(util::present(raw.category)),
        price: util::parse_price(util::present(raw.price)),
        quantity: util::parse_quantity(util::present(raw.quantity)),
        raw_item_id: util::raw_snippet(util::present(raw.item_id)),
    })
}

/// Customer ids are not digit-extracted like order and product ids: the
/// field must itself be numeric (or a numeric string) to be usable.
fn customer_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-06-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn run(customers: Value, vip: &[i64]) -> (Vec<OutputRow>, TraversalStats, SkipLog) {
        let mut skips = SkipLog::default();
        let vip: HashSet<i64> = vip.iter().copied().collect();
        let customers = customers.as_array().unwrap().clone();
        let (rows, stats) = flatten(&customers, &vip, now(), &mut skips);
        (rows, stats, skips)
    }

    #[test]
    fn end_to_end_scenario() {
        let (rows, _, skips) = run(
            json!([{
                "id": 7, "name": "A", "registration_date": "2020-01-01",
                "orders": [{
                    "order_id": "ORD-9", "order_date": "2021-05-05",
                    "items": [
                        {"item_id": "P-1", "product_name": "Widget", "category": 1,
                         "price": "$10.00", "quantity": 2},
                        {"item_id": "P-2", "product_name": "Gadget", "category": 99,
                         "price": "FREE", "quantity": 1},
                    ],
                }],
            }]),
            &[7],
        );

        assert!(skips.customers().is_empty());
        assert!(skips.orders().is_empty());
        assert!(skips.items().is_empty());
        assert_eq!(rows.len(), 2);

        let widget = &rows[0];
        assert_eq!(widget.customer_id, 7);
        assert!(widget.is_vip);
        assert_eq!(widget.order_id, 9);
        assert_eq!(widget.product_id, Some(1));
        assert_eq!(widget.category.as_deref(), Some("Electronics"));
        assert_eq!(widget.unit_price, Some(10.0));
        assert_eq!(widget.item_quantity, Some(2));
        assert_eq!(widget.total_item_price, Some(20.0));
        assert_eq!(widget.total_order_value_percentage, Some(100.0));

        let gadget = &rows[1];
        assert_eq!(gadget.product_id, Some(2));
        assert_eq!(gadget.category.as_deref(), Some("Misc"));
        // FREE is an explicit zero: the row is kept, worth nothing.
        assert_eq!(gadget.unit_price, Some(0.0));
        assert_eq!(gadget.total_item_price, Some(0.0));
        assert_eq!(gadget.total_order_value_percentage, Some(0.0));
    }

    #[test]
    fn zero_item_order_emits_one_placeholder_row() {
        let (rows, _, skips) = run(
            json!([{
                "id": 1, "name": "B", "registration_date": "2019-03-03",
                "orders": [{"order_id": 5, "order_date": "2020-01-01", "items": []}],
            }]),
            &[],
        );
        assert!(skips.orders().is_empty());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.customer_id, 1);
        assert_eq!(row.order_id, 5);
        assert!(row.order_date.is_some());
        assert_eq!(row.product_id, None);
        assert_eq!(row.product_name, None);
        assert_eq!(row.unit_price, None);
        assert_eq!(row.total_order_value_percentage, None);
    }

    #[test]
    fn malformed_items_field_downgrades_to_zero_item_order() {
        let (rows, _, skips) = run(
            json!([{
                "id": 1, "name": "B", "registration_date": "2019-03-03",
                "orders": [{"order_id": 5, "order_date": "2020-01-01", "items": "oops"}],
            }]),
            &[],
        );
        // The order is kept, not skipped.
        assert!(skips.orders().is_empty());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].product_id, None);
    }

    #[test]
    fn customer_missing_fields_is_skipped_wholesale() {
        let (rows, _, skips) = run(
            json!([
                {"id": 1, "name": "no reg date",
                 "orders": [{"order_id": 1, "order_date": "2020-01-01", "items": []}]},
                {"id": 2, "name": null, "registration_date": "2020-01-01"},
                "not even a mapping",
            ]),
            &[],
        );
        assert!(rows.is_empty());
        assert_eq!(skips.customers().len(), 3);
        assert_eq!(skips.customers()[0].customer_id, Some(1));
        assert_eq!(skips.customers()[2].reason, "record is not a mapping");
    }

    #[test]
    fn malformed_orders_field_skips_customer_with_distinct_reason() {
        let (rows, _, skips) = run(
            json!([{"id": 3, "name": "C", "registration_date": "2020-01-01", "orders": "nope"}]),
            &[],
        );
        assert!(rows.is_empty());
        assert_eq!(skips.customers().len(), 1);
        assert_eq!(skips.customers()[0].reason, "orders field is not a sequence");
    }

    #[test]
    fn bad_order_skips_without_descending_into_items() {
        let (rows, _, skips) = run(
            json!([{
                "id": 4, "name": "D", "registration_date": "2020-01-01",
                "orders": [
                    {"order_id": "no digits here", "order_date": "2020-01-01",
                     "items": [{"item_id": 1, "product_name": "x", "price": 1, "quantity": 1}]},
                    {"order_id": "ORD-2",
                     "items": [{"item_id": 1, "product_name": "x", "price": 1, "quantity": 1}]},
                    {"order_id": "ORD-3", "order_date": "2021-01-01",
                     "items": [{"item_id": 8, "product_name": "kept", "price": 4, "quantity": 1}]},
                ],
            }]),
            &[],
        );
        assert_eq!(skips.orders().len(), 2);
        // Items of skipped orders were never examined.
        assert!(skips.items().is_empty());
        // The healthy sibling order is unaffected.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_id, 3);
        assert_eq!(rows[0].product_id, Some(8));
    }

    #[test]
    fn bad_item_skips_without_affecting_siblings() {
        let (rows, _, skips) = run(
            json!([{
                "id": 5, "name": "E", "registration_date": "2020-01-01",
                "orders": [{
                    "order_id": 1, "order_date": "2020-06-01",
                    "items": [
                        {"item_id": 1, "product_name": "ok", "price": "5.00", "quantity": 2},
                        // Null price is missing, not zero: item dropped.
                        {"item_id": 2, "product_name": "bad", "price": null, "quantity": 1},
                        {"item_id": "???", "product_name": "no id", "price": "FREE", "quantity": 1},
                        42,
                    ],
                }],
            }]),
            &[],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].product_id, Some(1));
        // The dropped items contribute nothing to the denominator here,
        // so the survivor owns 100%.
        assert_eq!(rows[0].total_order_value_percentage, Some(100.0));
        assert_eq!(skips.items().len(), 3);
        assert_eq!(skips.items()[0].reason, "unparsable price/quantity");
        assert_eq!(skips.items()[1].reason, "missing or unresolvable item_id/product_name");
        assert_eq!(skips.items()[2].reason, "record is not a mapping");
    }

    #[test]
    fn priced_item_dropped_for_identity_still_feeds_the_denominator() {
        // The order total is computed from price/quantity coercion alone,
        // before the identity checks. An item with a good price but no
        // name contributes to the denominator even though it gets no row.
        let (rows, _, skips) = run(
            json!([{
                "id": 6, "name": "F", "registration_date": "2020-01-01",
                "orders": [{
                    "order_id": 1, "order_date": "2020-06-01",
                    "items": [
                        {"item_id": 1, "product_name": "kept", "price": 10, "quantity": 1},
                        {"item_id": 2, "price": 10, "quantity": 1},
                    ],
                }],
            }]),
            &[],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(skips.items().len(), 1);
        assert_eq!(rows[0].total_order_value_percentage, Some(50.0));
    }

    #[test]
    fn all_zero_order_has_null_percentages() {
        let (rows, _, _) = run(
            json!([{
                "id": 8, "name": "G", "registration_date": "2020-01-01",
                "orders": [{
                    "order_id": 1, "order_date": "2020-06-01",
                    "items": [
                        {"item_id": 1, "product_name": "a", "price": "FREE", "quantity": 3},
                        {"item_id": 2, "product_name": "b", "price": 0, "quantity": 2},
                    ],
                }],
            }]),
            &[],
        );
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.unit_price, Some(0.0));
            assert_eq!(row.total_order_value_percentage, None);
        }
    }

    #[test]
    fn out_of_range_quantity_is_skipped_and_contributes_nothing() {
        let (rows, _, skips) = run(
            json!([{
                "id": 9, "name": "H", "registration_date": "2020-01-01",
                "orders": [{
                    "order_id": 1, "order_date": "2020-06-01",
                    "items": [
                        {"item_id": 1, "product_name": "ok", "price": 10, "quantity": 1},
                        {"item_id": 2, "product_name": "bulk", "price": 10, "quantity": 20_000},
                        {"item_id": 3, "product_name": "neg", "price": 10, "quantity": -2},
                    ],
                }],
            }]),
            &[],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_order_value_percentage, Some(100.0));
        assert_eq!(skips.items().len(), 2);
        assert!(skips.items().iter().all(|s| s.reason == "quantity out of range"));
    }

    #[test]
    fn future_registration_date_becomes_null_not_fatal() {
        let (rows, _, skips) = run(
            json!([{
                "id": 10, "name": "I", "registration_date": "2024-06-02",
                "orders": [{"order_id": 1, "order_date": "2020-06-01", "items": []}],
            }]),
            &[],
        );
        // The customer survives; only the date is nulled.
        assert!(skips.customers().is_empty());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].registration_date, None);
        assert!(rows[0].order_date.is_some());
    }

    #[test]
    fn order_date_sanitized_independently_of_registration_date() {
        let (rows, _, _) = run(
            json!([{
                "id": 11, "name": "J", "registration_date": "garbage",
                "orders": [{"order_id": 1, "order_date": "1850-01-01", "items": []}],
            }]),
            &[],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].registration_date, None);
        assert_eq!(rows[0].order_date, None);
    }

    #[test]
    fn orders_seen_preserves_the_level_asymmetry() {
        let (_, stats, skips) = run(
            json!([
                // Skipped at customer level: its orders never counted.
                {"name": "no id", "registration_date": "2020-01-01",
                 "orders": [{"order_id": 1, "order_date": "2020-01-01", "items": []}]},
                // Passes customer checks; one order skipped at order level
                // still counts toward orders seen.
                {"id": 1, "name": "K", "registration_date": "2020-01-01",
                 "orders": [
                     {"order_id": 1, "order_date": "2020-01-01", "items": []},
                     {"order_id": "bad"},
                 ]},
            ]),
            &[],
        );
        assert_eq!(stats.customer_records, 2);
        assert_eq!(stats.distinct_customer_ids, 1);
        assert_eq!(stats.orders_seen, 2);
        assert_eq!(skips.customers().len(), 1);
        assert_eq!(skips.orders().len(), 1);
    }

    #[test]
    fn numeric_string_customer_id_is_accepted() {
        let (rows, _, _) = run(
            json!([{
                "id": "12", "name": "L", "registration_date": "2020-01-01",
                "orders": [{"order_id": 1, "order_date": "2020-01-01", "items": []}],
            }]),
            &[12],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].customer_id, 12);
        assert!(rows[0].is_vip);
    }

    #[test]
    fn non_numeric_customer_id_is_a_customer_skip() {
        let (rows, _, skips) = run(
            json!([{"id": "C-9", "name": "M", "registration_date": "2020-01-01", "orders": []}]),
            &[],
        );
        assert!(rows.is_empty());
        assert_eq!(skips.customers()[0].reason, "customer id is not numeric");
    }
}
