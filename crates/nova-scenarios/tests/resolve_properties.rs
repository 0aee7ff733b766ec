use nova_core::{KeyPath, Node};
use nova_scenarios::{resolve, DefaultTemplate, ScenarioDefinition};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn leaf_map() -> impl Strategy<Value = BTreeMap<(String, String), i64>> {
    prop::collection::btree_map(("[a-d]", "[a-e]"), any::<i64>(), 0..12)
}

fn path_of((section, field): &(String, String)) -> KeyPath {
    KeyPath::from_segments([section, field]).unwrap()
}

fn template_from(leaves: &BTreeMap<(String, String), i64>) -> DefaultTemplate {
    let mut root = Node::empty_map();
    for (key, value) in leaves {
        root.set_path(&path_of(key), Node::from(*value)).unwrap();
    }
    DefaultTemplate::new(root, Vec::new()).unwrap()
}

proptest! {
    #[test]
    fn overlay_keeps_overrides_and_untouched_defaults(
        defaults in leaf_map(),
        overrides in leaf_map(),
    ) {
        let template = template_from(&defaults);
        let mut definition = ScenarioDefinition::new("scenario");
        for (key, value) in &overrides {
            definition.overrides.push((path_of(key), Node::from(*value)));
        }
        let resolved = resolve(&template, &definition).unwrap();

        for (key, value) in &overrides {
            prop_assert_eq!(resolved.get(&path_of(key)), Some(&Node::from(*value)));
        }
        for (key, value) in defaults.iter().filter(|(key, _)| !overrides.contains_key(*key)) {
            prop_assert_eq!(resolved.get(&path_of(key)), Some(&Node::from(*value)));
        }
        prop_assert_eq!(resolved.body.leaves().len(), defaults.keys().chain(overrides.keys()).collect::<std::collections::BTreeSet<_>>().len());
    }

    #[test]
    fn empty_definition_is_identity(defaults in leaf_map()) {
        let template = template_from(&defaults);
        let resolved = resolve(&template, &ScenarioDefinition::new("baseline")).unwrap();
        prop_assert_eq!(&resolved.body, template.root());
    }

    #[test]
    fn later_duplicates_win(first in any::<i64>(), second in any::<i64>()) {
        let template = template_from(&BTreeMap::new());
        let path = KeyPath::parse("PV.max_kw").unwrap();
        let mut definition = ScenarioDefinition::new("pv");
        definition.overrides.push((path.clone(), Node::from(first)));
        definition.overrides.push((path.clone(), Node::from(second)));
        let resolved = resolve(&template, &definition).unwrap();
        prop_assert_eq!(resolved.get(&path), Some(&Node::from(second)));
    }
}
