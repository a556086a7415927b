#[cfg(test)]
mod tests {
    use crate::graph::adapter::*;
    use crate::graph::cursor::GraphObjectCursor;
    use crate::graph::object::GraphObject;
    use crate::graph::types::GraphError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Helper to build a named graph object
    fn person(id: &str, name: &str) -> GraphObject {
        GraphObject::new()
            .with_property("id", id)
            .with_property("name", name)
    }

    fn cursor_of(objects: Vec<GraphObject>, more: bool) -> GraphObjectCursor {
        let mut cursor = GraphObjectCursor::new();
        cursor.add_graph_objects(objects, false);
        cursor.set_more_objects_available(more);
        cursor
    }

    fn grouped_adapter() -> GraphObjectAdapter {
        GraphObjectAdapter::new(
            AdapterConfig {
                sort_fields: vec!["name".to_string()],
                group_by_field: Some("name".to_string()),
                show_pictures: false,
                max_prefetched_pictures: 20,
            },
            None,
        )
    }

    fn names_in_order(adapter: &GraphObjectAdapter) -> Vec<String> {
        (0..adapter.count())
            .filter_map(|position| adapter.item(position))
            .map(|object| object.name().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_collator_ignores_case_first() {
        use std::cmp::Ordering;

        assert_eq!(collate("ann", "Bob"), Ordering::Less);
        assert_eq!(collate("Bob", "ann"), Ordering::Greater);
        assert_eq!(collate("", "A"), Ordering::Less);
        assert_ne!(collate("ann", "Ann"), Ordering::Equal);
    }

    #[test]
    fn test_sections_from_first_letter() {
        let mut adapter = grouped_adapter();
        let cursor = cursor_of(vec![person("1", "Bob"), person("2", "ann")], false);
        assert!(adapter.change_cursor(Some(cursor)).unwrap());

        assert!(adapter.is_displaying_sections());
        assert_eq!(adapter.sections(), vec!["A".to_string(), "B".to_string()]);
        // Two headers plus two objects.
        assert_eq!(adapter.count(), 4);
        assert_eq!(
            adapter.section_and_item(0),
            Some(SectionAndItem::SectionHeader("A".to_string()))
        );
        assert_eq!(adapter.item(1).unwrap().name(), Some("ann"));
        assert_eq!(
            adapter.section_and_item(2),
            Some(SectionAndItem::SectionHeader("B".to_string()))
        );
        assert_eq!(adapter.item(3).unwrap().name(), Some("Bob"));
        assert!(adapter.section_and_item(4).is_none());
    }

    #[test]
    fn test_same_letter_regardless_of_case_shares_section() {
        let mut adapter = grouped_adapter();
        let cursor = cursor_of(
            vec![person("1", "Bob"), person("2", "ann"), person("3", "Al")],
            false,
        );
        adapter.change_cursor(Some(cursor)).unwrap();

        assert_eq!(adapter.sections(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(names_in_order(&adapter), vec!["Al", "ann", "Bob"]);
    }

    #[test]
    fn test_missing_group_field_uses_empty_section() {
        let mut adapter = grouped_adapter();
        let nameless = GraphObject::new().with_property("id", "9");
        let cursor = cursor_of(vec![person("1", "Bob"), nameless], false);
        adapter.change_cursor(Some(cursor)).unwrap();

        assert_eq!(adapter.sections(), vec!["".to_string(), "B".to_string()]);
        // Missing sort values sort first, and "" sorts before letters.
        assert_eq!(adapter.item(1).unwrap().id().unwrap(), "9");
    }

    #[test]
    fn test_single_section_has_no_headers() {
        let mut adapter = GraphObjectAdapter::new(
            AdapterConfig {
                sort_fields: vec!["name".to_string()],
                ..Default::default()
            },
            None,
        );
        let cursor = cursor_of(vec![person("1", "Bob"), person("2", "Carl"), person("3", "ann")], false);
        adapter.change_cursor(Some(cursor)).unwrap();

        assert!(!adapter.is_displaying_sections());
        assert!(adapter.sections().is_empty());
        assert_eq!(adapter.count(), 3);
        assert!(adapter.are_all_items_enabled());
        assert_eq!(names_in_order(&adapter), vec!["ann", "Bob", "Carl"]);
    }

    #[test]
    fn test_sort_fields_in_order() {
        let mut adapter = GraphObjectAdapter::new(
            AdapterConfig {
                sort_fields: vec!["last".to_string(), "first".to_string()],
                ..Default::default()
            },
            None,
        );
        let make = |id: &str, first: &str, last: &str| {
            GraphObject::new()
                .with_property("id", id)
                .with_property("first", first)
                .with_property("last", last)
                .with_property("name", format!("{} {}", first, last))
        };
        let cursor = cursor_of(
            vec![
                make("1", "Zed", "Adams"),
                make("2", "Amy", "Adams"),
                make("3", "Bea", "Brown"),
            ],
            false,
        );
        adapter.change_cursor(Some(cursor)).unwrap();

        assert_eq!(
            names_in_order(&adapter),
            vec!["Amy Adams", "Zed Adams", "Bea Brown"]
        );
    }

    #[test]
    fn test_partition_and_idempotent_rebuild() {
        let mut adapter = grouped_adapter();
        let objects = vec![
            person("1", "Dora"),
            person("2", "bill"),
            person("3", "Ava"),
            person("4", "dan"),
            person("5", "Bob"),
        ];
        adapter.change_cursor(Some(cursor_of(objects, false))).unwrap();

        let first = names_in_order(&adapter);
        let sections = adapter.sections();
        let mut sorted = sections.clone();
        sorted.sort();
        assert_eq!(sections, sorted);
        assert_eq!(first.len(), 5);

        adapter.rebuild_sections().unwrap();
        assert_eq!(names_in_order(&adapter), first);
        assert_eq!(adapter.sections(), sections);

        // Each object sits in exactly one section.
        let mut ids: Vec<String> = (0..adapter.count())
            .filter_map(|p| adapter.item(p))
            .map(|o| o.id().unwrap().to_string())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_filter_hides_objects() {
        let mut adapter = grouped_adapter();
        adapter.set_filter(Some(Arc::new(|object: &GraphObject| {
            object.name().is_some_and(|name| !name.starts_with('B'))
        })));
        let cursor = cursor_of(vec![person("1", "Bob"), person("2", "ann"), person("3", "Al")], false);
        adapter.change_cursor(Some(cursor)).unwrap();

        // Only the "A" section is left, so no headers are shown.
        assert!(adapter.sections().is_empty());
        assert_eq!(names_in_order(&adapter), vec!["Al", "ann"]);
        assert!(adapter.graph_objects_by_id(["1"]).is_empty());
    }

    #[test]
    fn test_missing_id_is_a_hard_failure() {
        let mut adapter = grouped_adapter();
        let anonymous = GraphObject::new().with_property("name", "Nobody");
        let result = adapter.change_cursor(Some(cursor_of(vec![anonymous], false)));
        assert!(matches!(result, Err(GraphError::MissingId)));
    }

    #[test]
    fn test_same_cursor_is_not_rebuilt() {
        let mut adapter = grouped_adapter();
        let cursor = cursor_of(vec![person("1", "Bob")], false);
        assert!(adapter.change_cursor(Some(cursor.clone())).unwrap());
        assert!(!adapter.change_cursor(Some(cursor)).unwrap());
        assert!(adapter.change_cursor(None).unwrap());
        assert!(adapter.is_empty());
        assert_eq!(adapter.count(), 0);
    }

    #[test]
    fn test_positions_and_section_index() {
        let mut adapter = grouped_adapter();
        let ann = person("2", "ann");
        let bob = person("1", "Bob");
        let cursor = cursor_of(vec![bob.clone(), ann.clone(), person("3", "Cy")], false);
        adapter.change_cursor(Some(cursor)).unwrap();

        assert_eq!(adapter.position_of("A", None), Some(0));
        assert_eq!(adapter.position_of("A", Some(&ann)), Some(1));
        assert_eq!(adapter.position_of("B", None), Some(2));
        assert_eq!(adapter.position_of("B", Some(&bob)), Some(3));
        assert_eq!(adapter.position_of("Z", None), None);
        assert_eq!(adapter.position_of("A", Some(&bob)), None);

        assert_eq!(adapter.position_for_section(1), 2);
        assert_eq!(adapter.position_for_section(99), 4);
        assert_eq!(adapter.section_for_position(3), 1);
        assert_eq!(adapter.section_for_position(5), 2);

        assert!(!adapter.is_enabled(0));
        assert!(adapter.is_enabled(1));
        // Header rows are disabled, so not every item is enabled.
        assert!(!adapter.are_all_items_enabled());
        assert_eq!(adapter.item_view_type(0), Some(ViewType::SectionHeader));
        assert_eq!(adapter.item_view_type(1), Some(ViewType::GraphObject));
        assert_eq!(adapter.item_id(1), 2);
        assert_eq!(adapter.item_id(0), 0);
    }

    #[test]
    fn test_activity_row_requests_more_data() {
        let mut adapter = GraphObjectAdapter::new(AdapterConfig::default(), None);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        adapter.set_data_needed_listener(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        let cursor = cursor_of(vec![person("1", "Bob"), person("2", "ann")], true);
        adapter.change_cursor(Some(cursor)).unwrap();

        assert_eq!(adapter.count(), 3);
        assert_eq!(adapter.item_view_type(2), Some(ViewType::ActivityCircle));
        assert!(matches!(adapter.row(0), Some(Row::GraphObject(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(adapter.row(2), Some(Row::ActivityCircle));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_activity_row_without_listener() {
        let mut adapter = GraphObjectAdapter::new(AdapterConfig::default(), None);
        adapter.change_cursor(Some(cursor_of(vec![person("1", "Bob")], true))).unwrap();
        assert_eq!(adapter.count(), 1);
    }

    #[test]
    fn test_graph_objects_by_id() {
        let mut adapter = grouped_adapter();
        adapter
            .change_cursor(Some(cursor_of(vec![person("1", "Bob"), person("2", "ann")], false)))
            .unwrap();

        let found = adapter.graph_objects_by_id(["2", "missing", "2", "1"]);
        let ids: Vec<&str> = found.iter().map(|o| o.id().unwrap()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }
}
