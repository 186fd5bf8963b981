use crate::models::{DashboardRow, MergedStrikeRow};

pub const TAG_PE_WRITING: &str = "PE_WRITING";
pub const TAG_PE_UNWINDING: &str = "PE_UNWINDING";
pub const TAG_CE_WRITING: &str = "CE_WRITING";
pub const TAG_CE_UNWINDING: &str = "CE_UNWINDING";

/// Append one instrument's active strikes to the cross-instrument
/// dashboard: keep rows with at least one flag set, replace each set flag
/// with its semantic tag, carry the symbol on every row. Rows land in the
/// order they arrive and nothing already in the dashboard moves, so the
/// empty table is the identity for this operation.
pub fn append_to_dashboard(
    dashboard: &mut Vec<DashboardRow>,
    symbol: &str,
    rows: &[MergedStrikeRow],
) {
    for row in rows {
        if !row.flags.any() {
            continue;
        }
        dashboard.push(DashboardRow {
            symbol: symbol.to_string(),
            strike_price: row.strike_price,
            pe_writing: tag(row.flags.pe_writing, TAG_PE_WRITING),
            pe_unwinding: tag(row.flags.pe_unwinding, TAG_PE_UNWINDING),
            ce_writing: tag(row.flags.ce_writing, TAG_CE_WRITING),
            ce_unwinding: tag(row.flags.ce_unwinding, TAG_CE_UNWINDING),
        });
    }
}

fn tag(flag: bool, name: &str) -> Option<String> {
    flag.then(|| name.to_string())
}
