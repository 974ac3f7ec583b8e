//! Customer identifier handling

/// Column that keys the customer store
pub const ID_COLUMN: &str = "ID_CLIENTE";

/// Identifier column names recognized when a store is opened, in priority order
pub const ID_COLUMN_CANDIDATES: [&str; 5] =
    ["ID_CLIENTE", "ID", "CLIENTE", "COD_CLIENTE", "CODIGO_CLIENTE"];

/// Canonical form of a customer identifier.
///
/// Trims whitespace, drops everything from the first `.` (spreadsheet exports
/// turn `123` into `123.0`) and strips leading zeros. An id made only of
/// zeros normalizes to `"0"`.
pub fn normalize_id(raw: &str) -> String {
    let head = raw.trim().split('.').next().unwrap_or_default().trim();
    let stripped = head.trim_start_matches('0');
    if stripped.is_empty() && !head.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// First recognized identifier column among `headers`
pub fn detect_id_column<'a, I>(headers: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let headers: Vec<&str> = headers.into_iter().map(str::trim).collect();
    ID_COLUMN_CANDIDATES
        .iter()
        .find(|candidate| headers.contains(*candidate))
        .map(|candidate| candidate.to_string())
}
