// Final table assembly.
//
// Column order and nullability are fixed by the `OutputRow` struct;
// this module owns the final sort. Null product ids (placeholder rows
// for zero-item orders) sort last within their order, and that policy
// is part of the output contract.
use crate::types::OutputRow;
use std::cmp::Ordering;

#[derive(Debug, Default)]
pub struct FlatTable {
    rows: Vec<OutputRow>,
}

impl FlatTable {
    /// Sort rows ascending by `(customer_id, order_id, product_id)`,
    /// nulls last, and wrap them. An empty row list is a valid empty
    /// table, not an error.
    pub fn assemble(mut rows: Vec<OutputRow>) -> Self {
        rows.sort_by(|a, b| {
            (a.customer_id, a.order_id)
                .cmp(&(b.customer_id, b.order_id))
                .then_with(|| cmp_nulls_last(a.product_id, b.product_id))
        });
        FlatTable { rows }
    }

    pub fn rows(&self) -> &[OutputRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows carrying a real line item.
    pub fn item_rows(&self) -> impl Iterator<Item = &OutputRow> {
        self.rows.iter().filter(|r| r.product_id.is_some())
    }

    /// Placeholder rows emitted for zero-item orders.
    pub fn placeholder_rows(&self) -> impl Iterator<Item = &OutputRow> {
        self.rows.iter().filter(|r| r.product_id.is_none())
    }
}

fn cmp_nulls_last(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}
