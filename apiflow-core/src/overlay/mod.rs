//! Resolution of a delta example against its origin.
//!
//! A delta example stores three correlated collections per part kind: order
//! rows (final position), state rows (per-origin overrides or suppression) and
//! its own rows (either overrides of an origin row, via `delta_parent_id`, or
//! parts that exist only in the delta). [`resolve`] folds them into the list of
//! effective parts.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::Id;
use crate::types::{Assertion, ExampleParam, OrderRow, RawBody, RefKind, StateRow};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    #[error("order row for {ref_id} belongs to example {found}, expected {expected}")]
    ForeignOrderRow { ref_id: Id, found: Id, expected: Id },
    #[error("delta row {0} shadows an origin row with the same id")]
    IdCollision(Id),
}

/// A row type that can take part in overlay resolution.
pub trait OverlayPart: Clone {
    fn id(&self) -> Id;
    fn delta_parent_id(&self) -> Option<Id>;
    fn set_delta_parent_id(&mut self, parent: Option<Id>);
    /// Re-home an origin row into `example_id`, keeping `origin_id` as both
    /// its id and its parent.
    fn rebase(&self, origin_id: Id, example_id: Id) -> Self;
    /// Apply non-null override fields.
    fn apply_state(&mut self, state: &StateRow);
}

impl OverlayPart for ExampleParam {
    fn id(&self) -> Id {
        self.id
    }

    fn delta_parent_id(&self) -> Option<Id> {
        self.delta_parent_id
    }

    fn set_delta_parent_id(&mut self, parent: Option<Id>) {
        self.delta_parent_id = parent;
    }

    fn rebase(&self, origin_id: Id, example_id: Id) -> Self {
        Self {
            id: origin_id,
            example_id,
            delta_parent_id: Some(origin_id),
            ..self.clone()
        }
    }

    fn apply_state(&mut self, state: &StateRow) {
        if let Some(key) = &state.key {
            self.key = key.clone();
        }
        if let Some(value) = &state.value {
            self.value = value.clone();
        }
        if let Some(description) = &state.description {
            self.description = description.clone();
        }
        if let Some(enabled) = state.enabled {
            self.enabled = enabled;
        }
    }
}

impl OverlayPart for Assertion {
    fn id(&self) -> Id {
        self.id
    }

    fn delta_parent_id(&self) -> Option<Id> {
        self.delta_parent_id
    }

    fn set_delta_parent_id(&mut self, parent: Option<Id>) {
        self.delta_parent_id = parent;
    }

    fn rebase(&self, origin_id: Id, example_id: Id) -> Self {
        Self {
            id: origin_id,
            example_id,
            delta_parent_id: Some(origin_id),
            ..self.clone()
        }
    }

    // Assertions carry their expression in the state row's `value`.
    fn apply_state(&mut self, state: &StateRow) {
        if let Some(value) = &state.value {
            self.condition.expression = value.clone();
        }
        if let Some(enabled) = state.enabled {
            self.enabled = enabled;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartSource {
    Origin,
    Delta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub part: T,
    pub source: PartSource,
}

/// Inputs for one part kind of one delta example.
#[derive(Debug, Clone, Copy)]
pub struct OverlayInput<'a, T> {
    pub origin: &'a [T],
    pub delta: &'a [T],
    pub order: &'a [OrderRow],
    pub states: &'a [StateRow],
    pub delta_example_id: Id,
}

/// Produce the effective parts of a delta example, in display order.
pub fn resolve<T: OverlayPart>(input: OverlayInput<'_, T>) -> Result<Vec<Resolved<T>>, OverlayError> {
    let OverlayInput {
        origin,
        delta,
        order,
        states,
        delta_example_id,
    } = input;

    let origin_by_id: BTreeMap<Id, &T> = origin.iter().map(|p| (p.id(), p)).collect();
    let mut delta_by_id: BTreeMap<Id, &T> = BTreeMap::new();
    let mut parent_to_delta: BTreeMap<Id, &T> = BTreeMap::new();
    for part in delta {
        if origin_by_id.contains_key(&part.id()) {
            return Err(OverlayError::IdCollision(part.id()));
        }
        delta_by_id.insert(part.id(), part);
        if let Some(parent) = part.delta_parent_id() {
            parent_to_delta.insert(parent, part);
        }
    }
    let state_by_origin: BTreeMap<Id, &StateRow> = states
        .iter()
        .filter(|s| s.example_id == delta_example_id)
        .map(|s| (s.origin_id, s))
        .collect();

    let walk = effective_order(order, origin, delta_example_id)?;

    let mut touched: BTreeSet<Id> = BTreeSet::new();
    let mut out = Vec::with_capacity(walk.len());

    for (ref_kind, ref_id) in walk {
        match ref_kind {
            RefKind::Origin => {
                let base = match (parent_to_delta.get(&ref_id), origin_by_id.get(&ref_id)) {
                    (Some(d), _) => {
                        touched.insert(d.id());
                        (*d).clone()
                    }
                    (None, Some(o)) => o.rebase(ref_id, delta_example_id),
                    (None, None) => {
                        tracing::debug!(%ref_id, example = %delta_example_id, "overlay origin ref has no row; skipping");
                        continue;
                    }
                };
                let mut part = base;
                if let Some(state) = state_by_origin.get(&ref_id) {
                    if state.suppressed {
                        continue;
                    }
                    part.apply_state(state);
                }
                out.push(Resolved {
                    part,
                    source: PartSource::Origin,
                });
            }
            RefKind::Delta => {
                let Some(d) = delta_by_id.get(&ref_id) else {
                    tracing::debug!(%ref_id, example = %delta_example_id, "overlay delta ref has no row; skipping");
                    continue;
                };
                touched.insert(ref_id);
                let mut part = (*d).clone();
                part.set_delta_parent_id(None);
                out.push(Resolved {
                    part,
                    source: PartSource::Delta,
                });
            }
        }
    }

    out.extend(
        delta
            .iter()
            .filter(|p| !touched.contains(&p.id()))
            .map(|p| Resolved {
                part: p.clone(),
                source: PartSource::Delta,
            }),
    );
    Ok(out)
}

/// Convenience wrapper that drops the source tags.
pub fn merge<T: OverlayPart>(input: OverlayInput<'_, T>) -> Result<Vec<T>, OverlayError> {
    Ok(resolve(input)?.into_iter().map(|r| r.part).collect())
}

/// The ordered `(ref_kind, ref_id)` walk. Re-ranked refs keep only their highest
/// revision; with no order rows at all, origin rows are walked in stored order.
fn effective_order<T: OverlayPart>(
    order: &[OrderRow],
    origin: &[T],
    delta_example_id: Id,
) -> Result<Vec<(RefKind, Id)>, OverlayError> {
    if order.is_empty() {
        return Ok(origin.iter().map(|p| (RefKind::Origin, p.id())).collect());
    }

    let mut latest: BTreeMap<(RefKind, Id), &OrderRow> = BTreeMap::new();
    for row in order {
        if row.example_id != delta_example_id {
            return Err(OverlayError::ForeignOrderRow {
                ref_id: row.ref_id,
                found: row.example_id,
                expected: delta_example_id,
            });
        }
        latest
            .entry((row.ref_kind, row.ref_id))
            .and_modify(|cur| {
                if row.revision > cur.revision {
                    *cur = row;
                }
            })
            .or_insert(row);
    }

    let mut rows: Vec<&OrderRow> = latest.into_values().collect();
    rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    Ok(rows.into_iter().map(|r| (r.ref_kind, r.ref_id)).collect())
}

/// A delta raw body replaces the origin one only when it carries data.
pub fn resolve_raw_body(origin: Option<RawBody>, delta: Option<RawBody>) -> Option<RawBody> {
    match delta {
        Some(d) if !d.data.is_empty() => Some(d),
        _ => origin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PartKind;

    fn param(example: Id, key: &str, value: &str) -> ExampleParam {
        ExampleParam::new(example, key, value)
    }

    #[test]
    fn highest_revision_wins_on_rerank() {
        let ex = Id::new();
        let a = Id::new();
        let b = Id::new();
        let mut a_old = OrderRow::new(ex, PartKind::Header, RefKind::Origin, a, "a");
        a_old.revision = 1;
        let mut a_new = OrderRow::new(ex, PartKind::Header, RefKind::Origin, a, "c");
        a_new.revision = 2;
        let b_row = OrderRow::new(ex, PartKind::Header, RefKind::Origin, b, "b");

        let walk =
            effective_order::<ExampleParam>(&[a_old, b_row, a_new], &[], ex).unwrap();
        assert_eq!(walk, vec![(RefKind::Origin, b), (RefKind::Origin, a)]);
    }

    #[test]
    fn rank_ties_break_on_revision() {
        let ex = Id::new();
        let (a, b) = (Id::new(), Id::new());
        let mut ra = OrderRow::new(ex, PartKind::Query, RefKind::Delta, a, "m");
        ra.revision = 5;
        let mut rb = OrderRow::new(ex, PartKind::Query, RefKind::Delta, b, "m");
        rb.revision = 3;
        let walk = effective_order::<ExampleParam>(&[ra, rb], &[], ex).unwrap();
        assert_eq!(walk, vec![(RefKind::Delta, b), (RefKind::Delta, a)]);
    }

    #[test]
    fn foreign_order_row_is_rejected() {
        let ex = Id::new();
        let row = OrderRow::new(Id::new(), PartKind::Header, RefKind::Origin, Id::new(), "a");
        assert!(matches!(
            effective_order::<ExampleParam>(&[row], &[], ex),
            Err(OverlayError::ForeignOrderRow { .. })
        ));
    }

    #[test]
    fn delta_override_row_is_the_base() {
        let origin_ex = Id::new();
        let delta_ex = Id::new();
        let h1 = param(origin_ex, "Accept", "json");
        let mut over = param(delta_ex, "Accept", "text");
        over.delta_parent_id = Some(h1.id);

        let out = merge(OverlayInput {
            origin: std::slice::from_ref(&h1),
            delta: std::slice::from_ref(&over),
            order: &[],
            states: &[],
            delta_example_id: delta_ex,
        })
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, over.id);
        assert_eq!(out[0].value, "text");
    }

    #[test]
    fn raw_body_delta_wins_only_when_non_empty() {
        let origin = RawBody {
            data: b"origin".to_vec(),
            ..RawBody::empty(Id::new())
        };
        let empty_delta = RawBody::empty(Id::new());
        assert_eq!(
            resolve_raw_body(Some(origin.clone()), Some(empty_delta)).unwrap().data,
            b"origin"
        );
        let delta = RawBody {
            data: b"delta".to_vec(),
            ..RawBody::empty(Id::new())
        };
        assert_eq!(resolve_raw_body(Some(origin), Some(delta)).unwrap().data, b"delta");
    }
}
