use apiflow_core::overlay::{merge, resolve, OverlayInput, PartSource};
use apiflow_core::types::{Assertion, ExampleParam, OrderRow, PartKind, RefKind, StateRow};
use apiflow_core::Id;

struct Setup {
    origin_ex: Id,
    delta_ex: Id,
}

impl Setup {
    fn new() -> Self {
        Self {
            origin_ex: Id::new(),
            delta_ex: Id::new(),
        }
    }

    fn origin(&self, key: &str, value: &str) -> ExampleParam {
        ExampleParam::new(self.origin_ex, key, value)
    }

    fn delta(&self, key: &str, value: &str) -> ExampleParam {
        ExampleParam::new(self.delta_ex, key, value)
    }

    fn order(&self, kind: RefKind, id: Id, rank: &str) -> OrderRow {
        OrderRow::new(self.delta_ex, PartKind::Header, kind, id, rank)
    }
}

#[test]
fn suppressed_origin_header_is_dropped() {
    let s = Setup::new();
    let h1 = s.origin("Accept", "json");
    let h2 = s.origin("Authorization", "X");
    let h3 = s.delta("X-Trace", "1");
    let states = [StateRow::suppress(s.delta_ex, PartKind::Header, h2.id)];
    let order = [
        s.order(RefKind::Origin, h1.id, "a"),
        s.order(RefKind::Delta, h3.id, "b"),
    ];

    let out = resolve(OverlayInput {
        origin: &[h1.clone(), h2],
        delta: std::slice::from_ref(&h3),
        order: &order,
        states: &states,
        delta_example_id: s.delta_ex,
    })
    .unwrap();

    let keys: Vec<_> = out.iter().map(|r| r.part.key.as_str()).collect();
    assert_eq!(keys, ["Accept", "X-Trace"]);
    assert_eq!(out[0].source, PartSource::Origin);
    assert_eq!(out[0].part.id, h1.id);
    assert_eq!(out[1].source, PartSource::Delta);
    assert_eq!(out[1].part.id, h3.id);
    assert_eq!(out[1].part.delta_parent_id, None);
}

#[test]
fn state_override_rewrites_value() {
    let s = Setup::new();
    let h1 = s.origin("Accept", "json");
    let states = [StateRow::override_value(
        s.delta_ex,
        PartKind::Header,
        h1.id,
        "xml",
    )];
    let order = [s.order(RefKind::Origin, h1.id, "a")];

    let out = merge(OverlayInput {
        origin: std::slice::from_ref(&h1),
        delta: &[],
        order: &order,
        states: &states,
        delta_example_id: s.delta_ex,
    })
    .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].key, "Accept");
    assert_eq!(out[0].value, "xml");
    assert_eq!(out[0].id, h1.id);
    assert_eq!(out[0].delta_parent_id, Some(h1.id));
    assert_eq!(out[0].example_id, s.delta_ex);
}

#[test]
fn empty_overlay_reproduces_origin() {
    let s = Setup::new();
    let origin: Vec<_> = (0..5)
        .map(|i| {
            let mut p = s.origin(&format!("k{i}"), &format!("v{i}"));
            p.enabled = i % 2 == 0;
            p.description = format!("d{i}");
            p
        })
        .collect();
    let order: Vec<_> = origin
        .iter()
        .enumerate()
        .map(|(i, p)| s.order(RefKind::Origin, p.id, &format!("r{i:03}")))
        .collect();

    for order in [order.as_slice(), &[][..]] {
        let out = merge(OverlayInput {
            origin: &origin,
            delta: &[],
            order,
            states: &[],
            delta_example_id: s.delta_ex,
        })
        .unwrap();
        assert_eq!(out.len(), origin.len());
        for (got, want) in out.iter().zip(&origin) {
            assert_eq!(got.id, want.id);
            assert_eq!(got.key, want.key);
            assert_eq!(got.value, want.value);
            assert_eq!(got.enabled, want.enabled);
            assert_eq!(got.description, want.description);
        }
    }
}

#[test]
fn suppression_removes_every_marked_part() {
    let s = Setup::new();
    let origin: Vec<_> = (0..6).map(|i| s.origin(&format!("k{i}"), "v")).collect();
    let order: Vec<_> = origin
        .iter()
        .enumerate()
        .map(|(i, p)| s.order(RefKind::Origin, p.id, &format!("{i}")))
        .collect();

    for mask in [0b000001u32, 0b101010, 0b111111, 0b010000] {
        let states: Vec<_> = origin
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, p)| {
                // Overrides on a suppressed row must not resurrect it.
                StateRow {
                    value: Some("override".to_string()),
                    ..StateRow::suppress(s.delta_ex, PartKind::Header, p.id)
                }
            })
            .collect();
        let out = merge(OverlayInput {
            origin: &origin,
            delta: &[],
            order: &order,
            states: &states,
            delta_example_id: s.delta_ex,
        })
        .unwrap();

        for st in &states {
            assert!(out.iter().all(|p| p.id != st.origin_id));
        }
        assert_eq!(out.len(), origin.len() - mask.count_ones() as usize);
    }
}

#[test]
fn untouched_delta_rows_are_appended() {
    let s = Setup::new();
    let h1 = s.origin("A", "1");
    let d1 = s.delta("B", "2");
    let d2 = s.delta("C", "3");
    let order = [
        s.order(RefKind::Delta, d2.id, "a"),
        s.order(RefKind::Origin, h1.id, "b"),
    ];

    let out = merge(OverlayInput {
        origin: std::slice::from_ref(&h1),
        delta: &[d1, d2],
        order: &order,
        states: &[],
        delta_example_id: s.delta_ex,
    })
    .unwrap();
    let keys: Vec<_> = out.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, ["C", "A", "B"]);
}

#[test]
fn dangling_refs_are_skipped() {
    let s = Setup::new();
    let h1 = s.origin("A", "1");
    let order = [
        s.order(RefKind::Origin, Id::new(), "a"),
        s.order(RefKind::Delta, Id::new(), "b"),
        s.order(RefKind::Origin, h1.id, "c"),
    ];
    let out = merge(OverlayInput {
        origin: std::slice::from_ref(&h1),
        delta: &[],
        order: &order,
        states: &[],
        delta_example_id: s.delta_ex,
    })
    .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].key, "A");
}

#[test]
fn assertion_expression_override_and_disable() {
    let s = Setup::new();
    let a1 = Assertion::new(s.origin_ex, "response.status == 200");
    let a2 = Assertion::new(s.origin_ex, "response.body.ok == true");
    let states = [
        StateRow::override_value(s.delta_ex, PartKind::Assertion, a1.id, "response.status == 201"),
        StateRow {
            enabled: Some(false),
            ..StateRow::new(s.delta_ex, PartKind::Assertion, a2.id)
        },
    ];
    let out = merge(OverlayInput {
        origin: &[a1, a2],
        delta: &[],
        order: &[],
        states: &states,
        delta_example_id: s.delta_ex,
    })
    .unwrap();
    assert_eq!(out[0].condition.expression, "response.status == 201");
    assert!(out[0].enabled);
    assert!(!out[1].enabled);
}
