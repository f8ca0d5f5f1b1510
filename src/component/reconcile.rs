//! List Reconciler - keeps a container's children in step with a record list.
//!
//! Records are matched across updates by identity (`key`, else `id`, else
//! `value`) against the records the container's children currently hold. A
//! pass has three steps:
//! 1. Remove children whose record left the list, highest slot first, so
//!    earlier removals never shift the slot of a later one
//! 2. Inflate a template for every record that is new, at its target slot
//! 3. Rebind the scope of the child in every slot to the record now in it
//!
//! A record whose template is missing gets no child, and later slots close
//! up around it.
//!
//! Surviving children are never moved. When records are reordered the views
//! stay put and their scopes are rebound, so each slot shows the right record
//! but view-local state does not travel with it.
//!
//! Records without identity, including later duplicates of an identifier,
//! never match and always get a fresh child.

use tracing::{debug, warn};

use super::Component;
use crate::engine::scope::{self, ScopeBinding};
use crate::error::Result;
use crate::host::with_host;
use crate::state::events;
use crate::types::{LocalContext, NativeId, Value, ViewKey};

/// What one reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Child slots removed, in removal order (descending).
    pub removed: Vec<usize>,
    /// Indices into the new list that got a child.
    pub added: Vec<usize>,
    /// Indices into the new list whose template could not be inflated.
    pub skipped: Vec<usize>,
    /// Slots whose scope was rebound.
    pub rebound: usize,
}

/// Which previous indices to remove and which new indices to add.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Ascending.
    pub remove: Vec<usize>,
    /// Ascending.
    pub add: Vec<usize>,
}

/// Stable identity per record; duplicates after the first become `None`.
fn identities(records: &[Value]) -> Vec<Option<&Value>> {
    let mut seen: Vec<&Value> = Vec::new();
    records
        .iter()
        .map(|record| {
            let id = record.identifier()?;
            if seen.contains(&id) {
                warn!(%id, "duplicate identifier in list; treated as new");
                return None;
            }
            seen.push(id);
            Some(id)
        })
        .collect()
}

/// Compute removals and additions between two record lists.
pub fn plan(previous: &[Value], next: &[Value]) -> Plan {
    fn matched(id: Option<&Value>, other: &[Option<&Value>]) -> bool {
        id.is_some_and(|id| other.iter().flatten().any(|o| *o == id))
    }

    let before = identities(previous);
    let after = identities(next);

    Plan {
        remove: (0..previous.len())
            .filter(|&i| !matched(before[i], &after))
            .collect(),
        add: (0..next.len()).filter(|&j| !matched(after[j], &before)).collect(),
    }
}

/// Template a record inflates: `<container key>_<adapter>`, adapter
/// defaulting to `"adapter"`.
pub fn template_name(container: &ViewKey, record: &Value) -> String {
    let adapter = record
        .get("adapter")
        .and_then(Value::as_str)
        .unwrap_or("adapter");
    format!("{}_{}", container, adapter)
}

/// Records the children of `container` currently show, one per child, read
/// from each child's scope. A child without a local scope holds no record.
fn rendered_records(container: NativeId) -> Result<Vec<Value>> {
    let children = with_host(|h| h.children(container))?;
    Ok(children
        .into_iter()
        .map(|child| match scope::scope_for_root(child).and_then(scope::binding) {
            Some(ScopeBinding::Local(local)) => local.state,
            _ => Value::Null,
        })
        .collect())
}

/// Reconcile the children of `parent` to `records`.
///
/// The records a container already shows are read from its children, so an
/// item that was skipped earlier never shifts the slots of the others.
/// Returns `None` without touching anything when `records` is not a list.
pub fn reconcile(parent: &Component, records: &Value) -> Result<Option<ReconcileReport>> {
    let Some(next) = records.as_list() else {
        return Ok(None);
    };
    let container = parent.native();
    let rendered = rendered_records(container)?;
    let plan = plan(&rendered, next);
    let mut report = ReconcileReport::default();

    for &slot in plan.remove.iter().rev() {
        remove_child(container, slot)?;
        report.removed.push(slot);
    }

    // Whether each new record has a child. Survivors do; additions only when
    // their template inflates.
    let mut present = vec![true; next.len()];
    for &index in &plan.add {
        let record = &next[index];
        let template = template_name(parent.key(), record);
        let at = present[..index].iter().filter(|p| **p).count();
        let child = with_host(|h| h.inflate(container, &template, at))?;
        match child {
            Some(child) => {
                let local = LocalContext::new(record.clone(), index as f64);
                events::bind_subtree(child, ScopeBinding::Local(local))?;
                report.added.push(index);
            }
            None => {
                warn!(%template, index, "list item template not found; item skipped");
                present[index] = false;
                report.skipped.push(index);
            }
        }
    }

    let children = with_host(|h| h.children(container))?;
    let shown = (0..next.len()).filter(|&index| present[index]);
    for (child, index) in children.into_iter().zip(shown) {
        let Some(scope) = scope::scope_for_root(child) else {
            continue;
        };
        scope::rebind(scope, next[index].clone(), index as f64);
        report.rebound += 1;
    }

    debug!(
        container = %parent.key(),
        removed = report.removed.len(),
        added = report.added.len(),
        skipped = report.skipped.len(),
        rebound = report.rebound,
        "reconciled"
    );
    Ok(Some(report))
}

fn remove_child(container: NativeId, slot: usize) -> Result<()> {
    let child = with_host(|h| h.children(container).get(slot).copied())?;
    let Some(child) = child else {
        warn!(%container, slot, "no child in slot; nothing removed");
        return Ok(());
    };
    events::release_subtree(child)?;
    with_host(|h| h.remove_child(container, slot))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(values: &[i32]) -> Vec<Value> {
        values.iter().map(|id| Value::map([("id", *id)])).collect()
    }

    #[test]
    fn test_plan_shifted_window() {
        let plan = plan(&ids(&[1, 2, 3]), &ids(&[2, 3, 4]));
        assert_eq!(plan.remove, vec![0]);
        assert_eq!(plan.add, vec![2]);
    }

    #[test]
    fn test_plan_empty_new_removes_all() {
        let plan = plan(&ids(&[1, 2, 3]), &[]);
        assert_eq!(plan.remove, vec![0, 1, 2]);
        assert!(plan.add.is_empty());
    }

    #[test]
    fn test_plan_identity_precedence() {
        let previous = vec![Value::map([("key", "a"), ("id", "x")])];
        // Same `id` but a different `key`: not the same record.
        let next = vec![Value::map([("key", "b"), ("id", "x")])];
        let plan = plan(&previous, &next);
        assert_eq!(plan.remove, vec![0]);
        assert_eq!(plan.add, vec![0]);
    }

    #[test]
    fn test_plan_identityless_always_new() {
        let anonymous = vec![Value::map([("name", "x")])];
        let plan = plan(&anonymous, &anonymous);
        assert_eq!(plan.remove, vec![0]);
        assert_eq!(plan.add, vec![0]);
    }

    #[test]
    fn test_plan_duplicates_first_wins() {
        let plan = plan(&ids(&[1]), &ids(&[1, 1]));
        assert!(plan.remove.is_empty());
        assert_eq!(plan.add, vec![1]);
    }

    #[test]
    fn test_template_name() {
        let container = ViewKey::from("items");
        assert_eq!(template_name(&container, &Value::map([("id", 1)])), "items_adapter");
        assert_eq!(
            template_name(&container, &Value::map([("adapter", "header")])),
            "items_header"
        );
        assert_eq!(template_name(&container, &Value::from(3)), "items_adapter");
    }

    /// Apply a plan to a list of child identities the way `reconcile` applies
    /// it to native children. New children are `None`.
    fn simulate(previous: &[i32], next: &[Value], plan: &Plan) -> Vec<Option<i32>> {
        let mut children: Vec<Option<i32>> = previous.iter().copied().map(Some).collect();
        for &index in plan.remove.iter().rev() {
            children.remove(index);
        }
        for &index in &plan.add {
            let at = index.min(children.len());
            children.insert(at, None);
        }
        assert_eq!(children.len(), next.len());
        children
    }

    proptest! {
        #[test]
        fn prop_child_count_matches(
            previous in proptest::collection::vec(0..8i32, 0..12),
            next in proptest::collection::vec(0..8i32, 0..12),
        ) {
            let mut seen = Vec::new();
            let previous: Vec<i32> = previous.into_iter().filter(|id| {
                let fresh = !seen.contains(id);
                seen.push(*id);
                fresh
            }).collect();
            let next_records = ids(&next);
            let plan = plan(&ids(&previous), &next_records);
            let children = simulate(&previous, &next_records, &plan);
            prop_assert_eq!(children.len(), next.len());
        }

        #[test]
        fn prop_order_preserving_updates_keep_identity(
            keep in proptest::collection::vec(any::<bool>(), 0..12),
            inserts in proptest::collection::vec((0..16usize, 100..200i32), 0..6),
        ) {
            let previous: Vec<i32> = (0..keep.len() as i32).collect();
            let mut next: Vec<i32> = previous
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(id, _)| *id)
                .collect();
            for (at, id) in inserts {
                if !next.contains(&id) {
                    let at = at.min(next.len());
                    next.insert(at, id);
                }
            }

            let next_records = ids(&next);
            let plan = plan(&ids(&previous), &next_records);
            let children = simulate(&previous, &next_records, &plan);

            for (slot, id) in next.iter().enumerate() {
                if previous.contains(id) {
                    // A surviving record keeps the child it had.
                    prop_assert_eq!(children[slot], Some(*id));
                } else {
                    prop_assert_eq!(children[slot], None);
                }
            }
        }
    }
}
