use std::collections::{BTreeMap, BTreeSet};

use matbench_core::SettingValue;
use matbench_exec::Combinations;
use proptest::prelude::*;

fn axes_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<SettingValue>>> {
    prop::collection::btree_map(
        "[a-e]{1,3}",
        prop::collection::vec((0i64..50).prop_map(SettingValue::Int), 1..4),
        0..4,
    )
}

proptest! {
    #[test]
    fn yields_exactly_total_distinct_combinations(axes in axes_strategy()) {
        let expected: usize = axes.values().map(Vec::len).product();
        let combinations = Combinations::new(axes.clone());
        prop_assert_eq!(combinations.total(), expected);
        let keys: Vec<String> = combinations.map(|settings| settings.key()).collect();
        prop_assert_eq!(keys.len(), expected);
        let distinct: BTreeSet<&String> = keys.iter().collect();
        let duplicated_values = axes.values().any(|values| {
            values.iter().collect::<BTreeSet<_>>().len() != values.len()
        });
        if !duplicated_values {
            prop_assert_eq!(distinct.len(), expected);
        }
    }

    #[test]
    fn first_combination_takes_first_values(axes in axes_strategy()) {
        if let Some(first) = Combinations::new(axes.clone()).next() {
            for (name, values) in &axes {
                prop_assert_eq!(first.get(name), values.first());
            }
        }
    }
}
