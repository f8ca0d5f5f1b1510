//! Update passes against the in-memory host: observers, dedup, list
//! reconciliation and animation.

use std::time::Duration;

use spark_bind::component::reconcile;
use spark_bind::engine::registry;
use spark_bind::engine::scope::{self, ScopeBinding};
use spark_bind::host::memory::{MemoryTree, Template};
use spark_bind::pipeline::mount::{self, MountHandle};
use spark_bind::state::{animate, events, MemoryPreferences, Store};
use spark_bind::{Component, LocalContext, Mutation, NativeId, RuntimeConfig, Value};

fn todo(id: i32) -> Value {
    Value::map([("id", Value::from(id)), ("text", Value::from(format!("todo {}", id)))])
}

fn todos(ids: &[i32]) -> Value {
    Value::List(ids.iter().map(|id| todo(*id)).collect())
}

fn mount_inline(tree: &MemoryTree, state: Value) -> MountHandle {
    let store = Store::new(state, MemoryPreferences::new(), "state");
    mount::mount(tree.clone(), store, RuntimeConfig::inline()).unwrap()
}

fn component(node: NativeId) -> Component {
    Component::from_handle(registry::get_handle(node).unwrap()).unwrap()
}

fn label_texts(tree: &MemoryTree, list: NativeId) -> Vec<String> {
    tree.children_of(list)
        .into_iter()
        .map(|row| {
            let label = tree.find_in(row, "label").unwrap();
            tree.props(label).unwrap().text
        })
        .collect()
}

/// A `todos` container whose rows show their record's text.
fn todo_list(tree: &MemoryTree) -> NativeId {
    tree.register_template(
        "todos_adapter",
        Template::container("row").child(Template::text("label")),
    );
    let _ = events::observe("todos", |component, _, global| {
        component.set("data", global.get("todos").cloned())
    });
    let _ = events::observe("label", |component, local, _| {
        component.set("text", local.state.get("text").cloned())
    });
    tree.build(&Template::container("screen").child(Template::container("todos")))
}

#[test]
fn test_repeated_passes_are_idempotent() {
    let tree = MemoryTree::new();
    let handle = mount_inline(&tree, Value::map([("title", "Todos")]));
    let _ = events::observe("title", |component, _, global| {
        component.set("text", global.get("title").cloned())?;
        component.set("visible", true)?;
        component.set("color", "#336699")
    });

    let root = tree.build(&Template::container("screen").child(Template::text("title")));
    mount::initialize_global(root).unwrap();
    let title = tree.find("title").unwrap();
    assert_eq!(tree.mutations_for(title).len(), 3);
    assert_eq!(tree.props(title).unwrap().text, "Todos");

    tree.clear_mutations();
    for _ in 0..5 {
        mount::update_all("data").unwrap();
    }
    assert!(tree.mutations().is_empty());
    assert_eq!(mount::update_count(), 6);

    handle.unmount();
}

#[test]
fn test_list_preserves_identity_of_survivors() {
    let tree = MemoryTree::new();
    let handle = mount_inline(&tree, Value::map([("todos", todos(&[1, 2, 3]))]));
    let root = todo_list(&tree);
    mount::initialize_global(root).unwrap();

    let list = tree.find("todos").unwrap();
    let before = tree.children_of(list);
    assert_eq!(before.len(), 3);
    assert_eq!(label_texts(&tree, list), vec!["todo 1", "todo 2", "todo 3"]);

    handle.store().write(|state| state.set("todos", todos(&[2, 3, 4])));
    mount::update_all("onClick").unwrap();

    let after = tree.children_of(list);
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[1]);
    assert_eq!(after[1], before[2]);
    assert!(!before.contains(&after[2]));
    assert!(!tree.contains(before[0]));
    assert_eq!(label_texts(&tree, list), vec!["todo 2", "todo 3", "todo 4"]);

    handle.unmount();
}

#[test]
fn test_removed_rows_release_their_bindings() {
    let tree = MemoryTree::new();
    let handle = mount_inline(&tree, Value::map([("todos", todos(&[1, 2]))]));
    let root = todo_list(&tree);
    mount::initialize_global(root).unwrap();

    // screen, todos and two rows of (row, label).
    assert_eq!(registry::allocated_count(), 6);
    let observers = events::observer_count();

    handle.store().write(|state| state.set("todos", todos(&[])));
    mount::update_all("onClick").unwrap();

    assert!(tree.children_of(tree.find("todos").unwrap()).is_empty());
    assert_eq!(registry::allocated_count(), 2);
    assert_eq!(events::observer_count(), observers - 2);

    handle.unmount();
}

#[test]
fn test_removal_runs_in_reverse_index_order() {
    let tree = MemoryTree::new();
    tree.register_template("list_adapter", Template::container("row"));
    let handle = mount_inline(&tree, Value::empty_map());
    let root = tree.build(&Template::container("list"));
    mount::initialize_global(root).unwrap();

    let list = component(root);
    let all = todos(&[0, 1, 2, 3, 4]);
    let report = reconcile(&list, &all).unwrap().unwrap();
    assert_eq!(report.added, vec![0, 1, 2, 3, 4]);
    let rows = tree.children_of(root);

    let kept = todos(&[1, 3]);
    let report = reconcile(&list, &kept).unwrap().unwrap();
    assert_eq!(report.removed, vec![4, 2, 0]);
    assert!(report.added.is_empty());
    assert_eq!(report.rebound, 2);
    assert_eq!(tree.children_of(root), vec![rows[1], rows[3]]);

    handle.unmount();
}

#[test]
fn test_insertion_lands_at_target_index() {
    let tree = MemoryTree::new();
    tree.register_template("list_adapter", Template::container("row"));
    let handle = mount_inline(&tree, Value::empty_map());
    let root = tree.build(&Template::container("list"));
    mount::initialize_global(root).unwrap();

    let list = component(root);
    let before = todos(&[1, 3]);
    reconcile(&list, &before).unwrap();
    let rows = tree.children_of(root);

    let after = todos(&[1, 2, 3, 4]);
    let report = reconcile(&list, &after).unwrap().unwrap();
    assert_eq!(report.added, vec![1, 3]);

    let now = tree.children_of(root);
    assert_eq!(now.len(), 4);
    assert_eq!(now[0], rows[0]);
    assert_eq!(now[2], rows[1]);

    handle.unmount();
}

#[test]
fn test_missing_template_skips_item() {
    let tree = MemoryTree::new();
    tree.register_template("list_adapter", Template::container("row"));
    let handle = mount_inline(&tree, Value::empty_map());
    let root = tree.build(&Template::container("list"));
    mount::initialize_global(root).unwrap();

    let records = Value::List(vec![
        Value::map([("id", 1)]),
        Value::map([("id", Value::from(2)), ("adapter", Value::from("ghost"))]),
        Value::map([("id", 3)]),
    ]);
    let report = reconcile(&component(root), &records).unwrap().unwrap();
    assert_eq!(report.added, vec![0, 2]);
    assert_eq!(report.skipped, vec![1]);
    assert_eq!(tree.children_of(root).len(), 2);

    handle.unmount();
}

#[test]
fn test_skipped_item_does_not_shift_later_slots() {
    let tree = MemoryTree::new();
    tree.register_template("list_adapter", Template::container("row"));
    let handle = mount_inline(&tree, Value::empty_map());
    let root = tree.build(&Template::container("list"));
    mount::initialize_global(root).unwrap();
    let list = component(root);

    let ghost = Value::map([("id", Value::from(1)), ("adapter", Value::from("ghost"))]);
    let first = Value::List(vec![ghost.clone(), todo(3)]);
    let report = reconcile(&list, &first).unwrap().unwrap();
    assert_eq!(report.skipped, vec![0]);
    let rows = tree.children_of(root);
    assert_eq!(rows.len(), 1);

    // Record 3 keeps its row; record 2 lands in front of it.
    let second = Value::List(vec![ghost, todo(2), todo(3)]);
    let report = reconcile(&list, &second).unwrap().unwrap();
    assert!(report.removed.is_empty());
    assert_eq!(report.added, vec![1]);
    let now = tree.children_of(root);
    assert_eq!(now.len(), 2);
    assert_eq!(now[1], rows[0]);

    // Removing the skipped record leaves both rows in place.
    let third = todos(&[2, 3]);
    let report = reconcile(&list, &third).unwrap().unwrap();
    assert!(report.removed.is_empty());
    assert!(report.added.is_empty());
    assert_eq!(tree.children_of(root), now);

    let scope = scope::scope_for_root(rows[0]).unwrap();
    assert_eq!(
        scope::binding(scope),
        Some(ScopeBinding::Local(LocalContext::new(todo(3), 1.0)))
    );

    handle.unmount();
}

#[test]
fn test_non_list_data_is_noop() {
    let tree = MemoryTree::new();
    let handle = mount_inline(&tree, Value::empty_map());
    let root = tree.build(&Template::container("list"));
    mount::initialize_global(root).unwrap();

    assert_eq!(reconcile(&component(root), &Value::from("nope")).unwrap(), None);
    handle.unmount();
}

#[test]
fn test_width_change_starts_from_previous() {
    let tree = MemoryTree::new();
    let store = Store::new(Value::map([("w", 10)]), MemoryPreferences::new(), "state");
    let config = RuntimeConfig {
        animation_ms: Some(40),
        frame_interval_ms: 5,
        ..RuntimeConfig::inline()
    };
    let handle = mount::mount(tree.clone(), store, config).unwrap();
    let _ = events::observe("panel", |component, _, global| {
        component.set("width", global.get("w").cloned())
    });

    let root = tree.build(&Template::container("panel"));
    mount::initialize_global(root).unwrap();
    assert_eq!(tree.mutations_for(root), vec![Mutation::SetWidth(10)]);
    assert!(!animate::is_animating());

    tree.clear_mutations();
    handle.store().write(|state| state.set("w", 30));
    mount::update_all("onClick").unwrap();

    // Progress 0 is applied when the ramp starts.
    assert_eq!(tree.mutations_for(root), vec![Mutation::SetWidth(10)]);
    assert!(animate::is_animating());

    assert!(mount::settle(&handle, Duration::from_secs(2)).unwrap());
    assert_eq!(tree.mutations_for(root).last(), Some(&Mutation::SetWidth(30)));
    assert_eq!(tree.props(root).unwrap().width, Some(30));

    handle.unmount();
}
