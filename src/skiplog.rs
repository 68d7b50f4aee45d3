// Skip classification sink.
//
// Every record the flattener drops lands here, in one of three
// append-only logs (customer / order / item level). Entries are never
// mutated or deduplicated; insertion order is the order the decisions
// were made in. The log is passed into the traversal by `&mut`, so
// tests can assert on the entries directly instead of parsing log text.
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CustomerSkip {
    /// Index of the record in the source sequence; the only stable key
    /// when the customer id itself is the missing field.
    pub customer_index: usize,
    pub customer_id: Option<i64>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderSkip {
    pub customer_id: i64,
    pub order_index: usize,
    pub raw_order_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemSkip {
    pub customer_id: i64,
    pub order_id: i64,
    pub item_index: usize,
    pub raw_item_id: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct SkipLog {
    customers: Vec<CustomerSkip>,
    orders: Vec<OrderSkip>,
    items: Vec<ItemSkip>,
}

impl SkipLog {
    pub fn skip_customer(&mut self, customer_index: usize, customer_id: Option<i64>, reason: &str) {
        tracing::warn!(customer_index, customer_id, reason, "skipping customer");
        self.customers.push(CustomerSkip {
            customer_index,
            customer_id,
            reason: reason.to_string(),
        });
    }

    pub fn skip_order(
        &mut self,
        customer_id: i64,
        order_index: usize,
        raw_order_id: String,
        reason: &str,
    ) {
        tracing::warn!(customer_id, order_index, %raw_order_id, reason, "skipping order");
        self.orders.push(OrderSkip {
            customer_id,
            order_index,
            raw_order_id,
            reason: reason.to_string(),
        });
    }

    pub fn skip_item(
        &mut self,
        customer_id: i64,
        order_id: i64,
        item_index: usize,
        raw_item_id: String,
        reason: &str,
    ) {
        tracing::warn!(customer_id, order_id, item_index, %raw_item_id, reason, "skipping item");
        self.items.push(ItemSkip {
            customer_id,
            order_id,
            item_index,
            raw_item_id,
            reason: reason.to_string(),
        });
    }

    pub fn customers(&self) -> &[CustomerSkip] {
        &self.customers
    }

    pub fn orders(&self) -> &[OrderSkip] {
        &self.orders
    }

    pub fn items(&self) -> &[ItemSkip] {
        &self.items
    }
}
