// Data-quality report.
//
// Aggregates the traversal counters, the skip log, and the final table
// into one fixed-format text summary. Everything counted here is
// re-derivable from the skip log plus the table (given the traversal
// counters), which the tests cross-check.
use crate::flatten::TraversalStats;
use crate::skiplog::SkipLog;
use crate::table::FlatTable;
use crate::util::{format_int, format_pct, round2};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone)]
pub struct QualityReport {
    pub customer_records: usize,
    pub distinct_customer_ids: usize,
    pub customers_skipped: usize,
    pub orders_seen: usize,
    pub orders_skipped: usize,
    pub items_emitted: usize,
    pub items_skipped: usize,
    pub vip_customers: usize,
    pub zero_item_orders: usize,
    /// Distribution over all rows, descending by count then label; the
    /// `(none)` bucket appears only when placeholder rows exist.
    pub categories: Vec<CategoryCount>,
}

impl QualityReport {
    pub fn build(stats: &TraversalStats, skips: &SkipLog, table: &FlatTable) -> QualityReport {
        let items_emitted = table.item_rows().count();
        let zero_item_orders = table.placeholder_rows().count();

        let vip_customers = table
            .rows()
            .iter()
            .filter(|r| r.is_vip)
            .map(|r| r.customer_id)
            .collect::<HashSet<_>>()
            .len();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for row in table.rows() {
            let label = row.category.clone().unwrap_or_else(|| "(none)".to_string());
            *counts.entry(label).or_insert(0) += 1;
        }
        let total_rows = table.len();
        let mut categories: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(label, count)| CategoryCount {
                label,
                count,
                percentage: if total_rows > 0 {
                    round2(count as f64 / total_rows as f64 * 100.0)
                } else {
                    0.0
                },
            })
            .collect();
        categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

        QualityReport {
            customer_records: stats.customer_records,
            distinct_customer_ids: stats.distinct_customer_ids,
            customers_skipped: skips.customers().len(),
            orders_seen: stats.orders_seen,
            orders_skipped: skips.orders().len(),
            items_emitted,
            items_skipped: skips.items().len(),
            vip_customers,
            zero_item_orders,
            categories,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Customer Order Data Quality Report ===");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Customers: {} records in source ({} distinct ids), {} skipped",
            format_int(self.customer_records as i64),
            format_int(self.distinct_customer_ids as i64),
            format_int(self.customers_skipped as i64),
        );
        let _ = writeln!(
            out,
            "Orders:    {} seen, {} skipped",
            format_int(self.orders_seen as i64),
            format_int(self.orders_skipped as i64),
        );
        let _ = writeln!(
            out,
            "Items:     {} emitted, {} skipped",
            format_int(self.items_emitted as i64),
            format_int(self.items_skipped as i64),
        );
        let _ = writeln!(
            out,
            "VIP customers in output: {}",
            format_int(self.vip_customers as i64)
        );
        let _ = writeln!(
            out,
            "Zero-item orders: {}",
            format_int(self.zero_item_orders as i64)
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Category distribution:");
        if self.categories.is_empty() {
            let _ = writeln!(out, "  (no rows)");
        }
        for cat in &self.categories {
            let _ = writeln!(
                out,
                "  {:<12} {:>6} ({})",
                cat.label,
                format_int(cat.count as i64),
                format_pct(cat.percentage),
            );
        }
        out
    }
}
