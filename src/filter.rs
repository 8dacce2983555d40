//! Role resolution and the cascading filter engine.
//!
//! The spreadsheet is free to name its columns in Portuguese or English.
//! Each semantic role carries an ordered alias list; `resolve` binds every
//! role to the first matching header once per load. `apply_filters` derives
//! the visible row set and the dropdown options from the loaded columns and
//! the current selection. Both functions are pure.

use crate::table::Column;

/// Semantic meaning of a column, independent of the literal header text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Company,
    Identification,
    Equipment,
    Status,
    RowId,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Company,
        Role::Identification,
        Role::Equipment,
        Role::Status,
        Role::RowId,
    ];

    /// Roles the user can filter on. `RowId` only feeds the download contract.
    pub const FILTERS: [Role; 4] = [
        Role::Company,
        Role::Identification,
        Role::Equipment,
        Role::Status,
    ];

    /// Accepted header names, upper case, in priority order.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Role::Company => &["EMPRESA", "COMPANY"],
            Role::Identification => &["IDENTIFICAÇÃO", "IDENTIFICACAO"],
            Role::Equipment => &["EQUIPAMENTO", "EQUIPMENT"],
            Role::Status => &["STATUS DA ANÁLISE", "ANALYSIS STATUS"],
            Role::RowId => &["ID"],
        }
    }

    /// Header a role keeps when no alias matches. Such a header is then simply
    /// not found in the table and the role degrades to a no-op.
    pub fn fallback_header(self) -> &'static str {
        self.aliases()[0]
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Company => "Company",
            Role::Identification => "Identification",
            Role::Equipment => "Equipment",
            Role::Status => "Status",
            Role::RowId => "ID",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Status values that get auto-selected right after a load, lower case.
const APPROVED_STATUSES: [&str; 2] = ["aprovado", "approved"];

#[derive(Debug, Clone)]
pub struct Binding {
    pub header: String,
    pub column: Option<usize>,
}

/// Role to column binding, resolved once per load and immutable afterwards.
#[derive(Debug, Clone)]
pub struct RoleMap {
    bindings: [Binding; 5],
}

impl RoleMap {
    pub fn empty() -> Self {
        RoleMap {
            bindings: Role::ALL.map(|role| Binding {
                header: role.fallback_header().to_string(),
                column: None,
            }),
        }
    }

    pub fn column(&self, role: Role) -> Option<usize> {
        self.bindings[role.slot()].column
    }

    pub fn header(&self, role: Role) -> &str {
        &self.bindings[role.slot()].header
    }
}

/// Selected filter value per role. `None` means "no filter for this role".
#[derive(Debug, Clone, Default)]
pub struct Selection {
    values: [Option<String>; 4],
}

impl Selection {
    pub fn get(&self, role: Role) -> Option<&str> {
        self.values[role.slot()].as_deref()
    }

    /// An empty string counts as "no filter", like an untouched dropdown.
    pub fn set(&mut self, role: Role, value: Option<String>) {
        self.values[role.slot()] = value.filter(|v| !v.is_empty());
    }

    pub fn clear(&mut self) {
        self.values = Default::default();
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|v| v.is_none())
    }
}

/// Derived view. Never stored across edits, recomputed on every change.
#[derive(Debug, Clone, Default)]
pub struct FilterView {
    /// Indices into the loaded table, in table order. Always a subset.
    pub rows: Vec<usize>,
    options: [Vec<String>; 4],
}

impl FilterView {
    pub fn options(&self, role: Role) -> &[String] {
        &self.options[role.slot()]
    }
}

/// Bind each role to the first header matching one of its aliases,
/// case-insensitively and ignoring surrounding whitespace. Never fails.
pub fn resolve(columns: &[Column]) -> RoleMap {
    let headers: Vec<String> = columns
        .iter()
        .map(|c| c.name.trim().to_uppercase())
        .collect();

    RoleMap {
        bindings: Role::ALL.map(|role| {
            for alias in role.aliases() {
                if let Some(idx) = headers.iter().position(|h| h == alias) {
                    return Binding {
                        header: columns[idx].name.clone(),
                        column: Some(idx),
                    };
                }
            }
            Binding {
                header: role.fallback_header().to_string(),
                column: None,
            }
        }),
    }
}

/// Apply the selection to the table and rebuild the dropdown options.
///
/// A role's options are computed against the rows filtered by every *other*
/// role's selection, ignoring its own. The user can therefore always relax
/// their own choice while the other dropdowns funnel down.
pub fn apply_filters(columns: &[Column], map: &RoleMap, selection: &Selection) -> FilterView {
    let rows = filter_rows(columns, map, selection, None);

    let mut options: [Vec<String>; 4] = Default::default();
    for role in Role::FILTERS {
        if let Some(cidx) = map.column(role) {
            let base = filter_rows(columns, map, selection, Some(role));
            options[role.slot()] = distinct_sorted(&columns[cidx], &base);
        }
    }

    FilterView { rows, options }
}

/// Pick the status value that gets auto-selected after a load, if any.
pub fn default_status(options: &[String]) -> Option<&String> {
    options.iter().find(|value| {
        let lower = value.to_lowercase();
        APPROVED_STATUSES.iter().any(|approved| lower == *approved)
    })
}

// Row indices matching every applied selection, except the ignored role.
// Roles without a resolved column or without a selection pass through.
fn filter_rows(
    columns: &[Column],
    map: &RoleMap,
    selection: &Selection,
    ignore: Option<Role>,
) -> Vec<usize> {
    let nrows = columns.first().map(|c| c.data.len()).unwrap_or(0);
    let mut rows: Vec<usize> = (0..nrows).collect();

    for role in Role::FILTERS {
        if ignore == Some(role) {
            continue;
        }
        let Some(selected) = selection.get(role) else {
            continue;
        };
        let Some(cidx) = map.column(role) else {
            continue;
        };
        let data = &columns[cidx].data;
        rows.retain(|&ridx| data[ridx] == selected);
    }
    rows
}

fn distinct_sorted(column: &Column, rows: &[usize]) -> Vec<String> {
    let mut values: Vec<String> = rows.iter().map(|&ridx| column.data[ridx].clone()).collect();
    values.sort_unstable();
    values.dedup();
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, values: &[&str]) -> Column {
        Column::from_values(name, values.iter().map(|v| v.to_string()).collect())
    }

    fn sample() -> Vec<Column> {
        vec![
            col("Id", &["1", "2", "3", "4", "5"]),
            col("Empresa", &["Acme", "Acme", "Borealis", "Borealis", "Cetus"]),
            col("Identificação", &["WTG-01", "WTG-02", "WTG-07", "WTG-07", "WTG-11"]),
            col("Equipamento", &["Gearbox", "Blade", "Gearbox", "Blade", "Generator"]),
            col(
                "Status da Análise",
                &["Aprovado", "Pendente", "Aprovado", "Reprovado", "Aprovado"],
            ),
        ]
    }

    fn select(role: Role, value: &str) -> Selection {
        let mut selection = Selection::default();
        selection.set(role, Some(value.to_string()));
        selection
    }

    #[test]
    fn resolve_matches_aliases_case_insensitively() {
        let columns = sample();
        let map = resolve(&columns);

        assert_eq!(map.column(Role::Company), Some(1));
        assert_eq!(map.header(Role::Company), "Empresa");
        assert_eq!(map.column(Role::Identification), Some(2));
        assert_eq!(map.column(Role::Equipment), Some(3));
        assert_eq!(map.column(Role::Status), Some(4));
        assert_eq!(map.column(Role::RowId), Some(0));
    }

    #[test]
    fn resolve_respects_alias_priority() {
        // Both aliases present: the first one in priority order wins.
        let columns = vec![
            col("COMPANY", &["a"]),
            col("EMPRESA", &["b"]),
        ];
        let map = resolve(&columns);
        assert_eq!(map.column(Role::Company), Some(1));
        assert_eq!(map.header(Role::Company), "EMPRESA");
    }

    #[test]
    fn resolve_trims_headers() {
        let columns = vec![col("  empresa ", &["a"])];
        let map = resolve(&columns);
        assert_eq!(map.column(Role::Company), Some(0));
        assert_eq!(map.header(Role::Company), "  empresa ");
    }

    #[test]
    fn resolve_falls_back_to_default_header() {
        let columns = vec![col("Empresa", &["a"])];
        let map = resolve(&columns);
        assert_eq!(map.column(Role::Equipment), None);
        assert_eq!(map.header(Role::Equipment), "EQUIPAMENTO");
    }

    #[test]
    fn empty_selection_returns_all_rows_and_full_options() {
        let columns = sample();
        let map = resolve(&columns);
        let view = apply_filters(&columns, &map, &Selection::default());

        assert_eq!(view.rows, vec![0, 1, 2, 3, 4]);
        assert_eq!(view.options(Role::Company), ["Acme", "Borealis", "Cetus"]);
        assert_eq!(
            view.options(Role::Status),
            ["Aprovado", "Pendente", "Reprovado"]
        );
    }

    #[test]
    fn selection_keeps_matching_rows_only() {
        let columns = sample();
        let map = resolve(&columns);
        let view = apply_filters(&columns, &map, &select(Role::Company, "Acme"));
        assert_eq!(view.rows, vec![0, 1]);
    }

    #[test]
    fn apply_is_idempotent() {
        let columns = sample();
        let map = resolve(&columns);
        let selection = select(Role::Status, "Aprovado");

        let first = apply_filters(&columns, &map, &selection);
        let second = apply_filters(&columns, &map, &selection);
        assert_eq!(first.rows, second.rows);
    }

    #[test]
    fn adding_a_selection_never_grows_the_row_set() {
        let columns = sample();
        let map = resolve(&columns);

        let mut selection = select(Role::Company, "Borealis");
        let before = apply_filters(&columns, &map, &selection);
        selection.set(Role::Equipment, Some("Gearbox".to_string()));
        let after = apply_filters(&columns, &map, &selection);

        assert!(after.rows.len() <= before.rows.len());
        assert!(after.rows.iter().all(|r| before.rows.contains(r)));
    }

    #[test]
    fn options_cascade_through_other_roles() {
        let columns = sample();
        let map = resolve(&columns);
        let view = apply_filters(&columns, &map, &select(Role::Company, "Acme"));

        assert_eq!(view.options(Role::Identification), ["WTG-01", "WTG-02"]);
        assert_eq!(view.options(Role::Status), ["Aprovado", "Pendente"]);
    }

    #[test]
    fn own_selection_does_not_narrow_own_options() {
        let columns = sample();
        let map = resolve(&columns);
        let view = apply_filters(&columns, &map, &select(Role::Company, "Acme"));

        // The company dropdown still offers every company, so the user can
        // switch or relax their own choice.
        assert_eq!(view.options(Role::Company), ["Acme", "Borealis", "Cetus"]);
    }

    #[test]
    fn selection_for_missing_column_is_ignored() {
        let columns = vec![
            col("Empresa", &["Acme", "Borealis"]),
            col("Id", &["1", "2"]),
        ];
        let map = resolve(&columns);
        let view = apply_filters(&columns, &map, &select(Role::Equipment, "Gearbox"));

        assert_eq!(view.rows, vec![0, 1]);
        assert!(view.options(Role::Equipment).is_empty());
    }

    #[test]
    fn empty_string_selection_means_no_filter() {
        let columns = sample();
        let map = resolve(&columns);
        let mut selection = Selection::default();
        selection.set(Role::Company, Some(String::new()));

        assert!(selection.is_empty());
        let view = apply_filters(&columns, &map, &selection);
        assert_eq!(view.rows.len(), 5);
    }

    #[test]
    fn default_status_matches_case_insensitively() {
        let options = vec!["Pendente".to_string(), "APROVADO".to_string()];
        assert_eq!(default_status(&options), Some(&"APROVADO".to_string()));

        let options = vec!["Rejected".to_string(), "Approved".to_string()];
        assert_eq!(default_status(&options), Some(&"Approved".to_string()));

        let options = vec!["Pendente".to_string()];
        assert_eq!(default_status(&options), None);
    }

    #[test]
    fn options_are_sorted_and_distinct() {
        let columns = vec![col("Empresa", &["Cetus", "Acme", "Cetus", "Borealis"])];
        let map = resolve(&columns);
        let view = apply_filters(&columns, &map, &Selection::default());
        assert_eq!(view.options(Role::Company), ["Acme", "Borealis", "Cetus"]);
    }
}
