// Property-based tests for filtering, sorting and selection.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use labgrid_engine::*;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Raw row: (client, status index, seats, due date)
type RawRow = (String, usize, Option<f64>, String);

fn arb_client() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => r"[A-Za-z ]{0,12}",
        1 => Just("".to_string()),
    ]
}

fn arb_seats() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        4 => (0u32..200).prop_map(|n| Some(n as f64)),
        1 => Just(None),
    ]
}

/// Mostly valid dates, sometimes garbage
fn arb_date() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (2024i32..2028, 1u32..13, 1u32..29)
            .prop_map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}")),
        1 => r"[a-z/ ]{0,8}",
    ]
}

fn arb_rows() -> impl Strategy<Value = Vec<RawRow>> {
    prop::collection::vec(
        (arb_client(), 0usize..6, arb_seats(), arb_date()),
        0..40,
    )
}

fn build_records(rows: &[RawRow]) -> Vec<Record> {
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    rows.iter()
        .enumerate()
        .map(|(i, (client, status, seats, due))| {
            let mut fields = Fields::new();
            fields.insert("lab_name".into(), Value::from(format!("Lab {i}")));
            fields.insert("client".into(), Value::from(client.as_str()));
            fields.insert(
                "status".into(),
                Value::from(column::SOLUTION_STATUSES[*status]),
            );
            fields.insert(
                "seats".into(),
                seats.map(Value::Number).unwrap_or_else(|| Value::from("")),
            );
            fields.insert("due_date".into(), Value::from(due.as_str()));
            Record::new(format!("r{i}"), fields, base + Duration::minutes(i as i64))
        })
        .collect()
}

/// A filter state over the Solution registry
fn arb_filters() -> impl Strategy<Value = Vec<(String, FilterValue)>> {
    let one = prop_oneof![
        (0usize..6).prop_map(|s| (
            "status".to_string(),
            FilterValue::matching(column::SOLUTION_STATUSES[s])
        )),
        r"[a-z]{1,2}".prop_map(|s| ("client".to_string(), FilterValue::matching(s))),
        (prop::option::of(0u32..200), prop::option::of(0u32..200)).prop_map(|(lo, hi)| (
            "seats".to_string(),
            FilterValue::range(lo.map(f64::from), hi.map(f64::from))
        )),
        (2024i32..2028, 1u32..13).prop_map(|(y, m)| (
            "due_date".to_string(),
            FilterValue::date_range(chrono::NaiveDate::from_ymd_opt(y, m, 1), None)
        )),
    ];
    prop::collection::vec(one, 0..4)
}

fn filter_state(registry: &ColumnRegistry, filters: &[(String, FilterValue)]) -> FilterState {
    let mut state = FilterState::new();
    for (column, value) in filters {
        state.update(registry, column, value.clone()).unwrap();
    }
    state
}

fn ids_of(records: &[Record]) -> Vec<RecordId> {
    records.iter().map(|r| r.id.clone()).collect()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    /// apply(apply(R, F), F) == apply(R, F)
    #[test]
    fn filter_is_idempotent(rows in arb_rows(), filters in arb_filters()) {
        let registry = RecordType::Solution.registry();
        let records = build_records(&rows);
        let state = filter_state(&registry, &filters);

        let once = state.apply(&registry, &records);
        let twice = state.apply(&registry, &once);
        prop_assert_eq!(ids_of(&once), ids_of(&twice));
    }

    /// Filtering never reorders and only keeps input records
    #[test]
    fn filter_preserves_relative_order(rows in arb_rows(), filters in arb_filters()) {
        let registry = RecordType::Solution.registry();
        let records = build_records(&rows);
        let state = filter_state(&registry, &filters);

        let indices = state.apply_indices(&registry, &records);
        prop_assert!(indices.windows(2).all(|w| w[0] < w[1]));
    }

    /// After a filter removes a selected record, its id is no longer selected
    #[test]
    fn filter_prunes_hidden_selection(rows in arb_rows(), filters in arb_filters()) {
        let records = build_records(&rows);
        let mut grid = GridController::for_record_type(RecordType::Solution, records);
        grid.select_all();

        for (column, value) in &filters {
            grid.set_filter(column, value.clone()).unwrap();
        }

        let visible = grid.visible_ids().to_vec();
        prop_assert_eq!(grid.selected_ids(), visible.clone());
        prop_assert_eq!(grid.selection_len(), visible.len());
        for record in grid.records() {
            if !visible.contains(&record.id) {
                prop_assert!(!grid.is_selected(&record.id));
            }
        }
    }

    /// Equal keys keep input order in both directions
    #[test]
    fn sort_is_stable_on_constant_key(
        n in 0usize..30,
        status in 0usize..6,
        column in prop_oneof![Just("status"), Just("seats"), Just("due_date"), Just("client")],
        descending in any::<bool>(),
    ) {
        let registry = RecordType::Solution.registry();
        let rows: Vec<RawRow> = (0..n)
            .map(|_| ("Acme".to_string(), status, Some(12.0), "2026-05-01".to_string()))
            .collect();
        let records = build_records(&rows);

        let sort = SortState {
            field: Some(column.to_string()),
            direction: if descending { SortDirection::Desc } else { SortDirection::Asc },
        };
        prop_assert_eq!(ids_of(&sort.apply(&registry, &records)), ids_of(&records));
    }

    /// Sorted output is a permutation, and present keys are ordered
    #[test]
    fn sort_orders_numbers_with_missing_last(rows in arb_rows(), descending in any::<bool>()) {
        let registry = RecordType::Solution.registry();
        let records = build_records(&rows);
        let sort = SortState {
            field: Some("seats".to_string()),
            direction: if descending { SortDirection::Desc } else { SortDirection::Asc },
        };
        let sorted = sort.apply(&registry, &records);
        prop_assert_eq!(sorted.len(), records.len());

        let keys: Vec<Option<f64>> = sorted
            .iter()
            .map(|r| r.get("seats").and_then(Value::as_number))
            .collect();
        let first_missing = keys.iter().position(Option::is_none).unwrap_or(keys.len());
        prop_assert!(keys[first_missing..].iter().all(Option::is_none));

        let present: Vec<f64> = keys[..first_missing].iter().flatten().copied().collect();
        let ordered = present.windows(2).all(|w| {
            if descending { w[0] >= w[1] } else { w[0] <= w[1] }
        });
        prop_assert!(ordered);
    }

    /// set_sort(c) x2 -> desc, x3 -> asc
    #[test]
    fn sort_toggle_cycles(column in prop_oneof![
        Just("lab_name"), Just("client"), Just("status"), Just("seats"), Just("due_date")
    ]) {
        let registry = RecordType::Solution.registry();
        let mut sort = SortState::new();

        sort.set_sort(&registry, column).unwrap();
        sort.set_sort(&registry, column).unwrap();
        prop_assert_eq!(sort.direction, SortDirection::Desc);
        sort.set_sort(&registry, column).unwrap();
        prop_assert_eq!(sort.direction, SortDirection::Asc);
        prop_assert_eq!(sort.field.as_deref(), Some(column));
    }

    /// toggle_select_all once selects N and is_all_selected; twice clears
    #[test]
    fn select_all_toggles(rows in arb_rows(), filters in arb_filters()) {
        let records = build_records(&rows);
        let mut grid = GridController::for_record_type(RecordType::Solution, records);
        for (column, value) in &filters {
            grid.set_filter(column, value.clone()).unwrap();
        }
        let n = grid.visible_len();

        grid.toggle_select_all();
        prop_assert_eq!(grid.selection_len(), n);
        prop_assert_eq!(grid.is_all_selected(), n > 0);

        grid.toggle_select_all();
        prop_assert_eq!(grid.selection_len(), 0);
    }
}
