use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::model::{
    ClusterCapacity, Measure, ResourceTotals, RowKind, SortKey, TableRow, UsageTotals,
};

pub const TOTAL_USED_LABEL: &str = "Total Used";
pub const TOTAL_CAPACITY_LABEL: &str = "Total Capacity";

/// One row per namespace with declared resources. Namespaces that only show
/// up in `usage` are left out.
pub fn build_rows(
    totals: &BTreeMap<String, ResourceTotals>,
    usage: &BTreeMap<String, UsageTotals>,
    capacity: &ClusterCapacity,
) -> Vec<TableRow> {
    for namespace in usage.keys().filter(|namespace| !totals.contains_key(*namespace)) {
        debug!(%namespace, "dropping namespace with metrics but no running pods");
    }

    totals
        .iter()
        .map(|(namespace, resources)| {
            let used = usage.get(namespace).copied().unwrap_or_default();
            TableRow {
                namespace: namespace.clone(),
                kind: RowKind::Namespace,
                cpu_request: Measure::of(resources.cpu_request, capacity.cpu),
                cpu_limit: Measure::of(resources.cpu_limit, capacity.cpu),
                cpu_usage: Measure::of(used.cpu_usage, capacity.cpu),
                mem_request: Measure::of(resources.mem_request, capacity.memory),
                mem_limit: Measure::of(resources.mem_limit, capacity.memory),
                mem_usage: Measure::of(used.mem_usage, capacity.memory),
                storage_request: Measure::of(resources.storage_request, capacity.storage),
                storage_limit: Measure::of(resources.storage_limit, capacity.storage),
            }
        })
        .collect()
}

/// Stable ascending sort. `None` orders by namespace name.
pub fn sort_rows(rows: &mut [TableRow], key: Option<SortKey>) {
    match key.unwrap_or(SortKey::Name) {
        SortKey::Name => rows.sort_by(|left, right| left.namespace.cmp(&right.namespace)),
        key => rows.sort_by_key(|row| key.amount(row).unwrap_or_default()),
    }
}

/// Resolves a user supplied sort token, falling back to name order.
pub fn resolve_sort_key(token: Option<&str>) -> Option<SortKey> {
    let token = token?;
    let key = SortKey::from_token(token);
    if key.is_none() {
        warn!(%token, "unknown sort key, sorting by namespace name");
    }
    key
}

/// Appends the column-wise sum of the namespace rows. Percentages are summed
/// as well, which equals the percentage of the summed amount.
pub fn add_total_row(rows: &mut Vec<TableRow>) {
    let mut total = TableRow::empty(TOTAL_USED_LABEL, RowKind::TotalUsed);
    for row in rows.iter().filter(|row| !row.kind.is_summary()) {
        total.accumulate(row);
    }
    rows.push(total);
}

/// Appends the cluster capacity with requests and limits at 100% and usage at 0.
pub fn add_capacity_row(rows: &mut Vec<TableRow>, capacity: &ClusterCapacity) {
    let mut row = TableRow::empty(TOTAL_CAPACITY_LABEL, RowKind::TotalCapacity);
    row.cpu_request = Measure::full(capacity.cpu);
    row.cpu_limit = Measure::full(capacity.cpu);
    row.mem_request = Measure::full(capacity.memory);
    row.mem_limit = Measure::full(capacity.memory);
    row.storage_request = Measure::full(capacity.storage);
    row.storage_limit = Measure::full(capacity.storage);
    rows.push(row);
}

/// Sorts the namespace rows, then appends Total Used and Total Capacity.
pub fn assemble_table(
    mut rows: Vec<TableRow>,
    key: Option<SortKey>,
    capacity: &ClusterCapacity,
) -> Vec<TableRow> {
    rows.retain(|row| !row.kind.is_summary());
    sort_rows(&mut rows, key);
    add_total_row(&mut rows);
    add_capacity_row(&mut rows, capacity);
    rows
}
