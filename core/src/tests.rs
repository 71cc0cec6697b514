//! Engine-level tests.
//!
//! These exercise the store, topology, prop sources and hydrator together and
//! pin down the properties every read path relies on: storage order does not
//! matter, nothing leaks out of or into the hydrated tree, and one broken
//! instance never takes the page down.

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};
use trellis_url::Url;

use crate::prop_source::{
    Cardinality, DefaultRelativeUrlPropSource, StaticPropSource, StaticShape,
};
use crate::{
    ComponentDefinition, ComponentInstance, ComponentSchema, ComponentTree, ContractViolation,
    DefinitionSet, Error, EvaluationContext, HydratedComponent, HydratedTree, HydrationFailure,
    Hydrator, InstanceId, JsonEntity, PropDefinition, PropSource, PropSourceError, PropSourceKind,
    Provider, ROOT_UUID, Slot, StructuralViolation, TopologyError, validate,
};

// ============================================================================
// Test Infrastructure
// ============================================================================

fn string_shape() -> StaticShape {
    StaticShape::new("string", Cardinality::SINGLE)
}

/// Three components: a section with `content`, a card with `items`, a leaf.
///
/// The card has two versions; `v2` renamed `title` to `heading`.
fn definitions() -> DefinitionSet {
    let section = ComponentDefinition::new(
        "sdc.test.section",
        Provider::Theme("olivero".into()),
        "v1",
        ComponentSchema::new()
            .with_prop("title", PropDefinition::new().with_shape(string_shape()))
            .with_slot("content"),
    );
    let card = ComponentDefinition::new(
        "sdc.test.card",
        Provider::Module("sdc_test".into()),
        "v1",
        ComponentSchema::new()
            .with_prop("title", PropDefinition::required().with_shape(string_shape()))
            .with_prop(
                "image",
                PropDefinition::new().with_default(DefaultRelativeUrlPropSource::new(
                    json!("card.png"),
                    json!({"type": "string", "format": "uri-reference"}),
                    "sdc.test.card",
                )),
            )
            .with_prop("link", PropDefinition::new())
            .with_slot("items"),
    )
    .with_base_path("/modules/sdc_test/components/card/")
    .with_version(
        "v2",
        ComponentSchema::new()
            .with_prop("heading", PropDefinition::required().with_shape(string_shape()))
            .with_slot("items"),
    );
    let leaf = ComponentDefinition::new(
        "sdc.test.leaf",
        Provider::Module("sdc_test".into()),
        "v1",
        ComponentSchema::new().with_prop("text", PropDefinition::new().with_shape(string_shape())),
    );
    [section, card, leaf].into_iter().collect()
}

fn section(uuid: &str) -> ComponentInstance {
    ComponentInstance::new(uuid, "sdc.test.section", "v1")
}

fn card(uuid: &str) -> ComponentInstance {
    ComponentInstance::new(uuid, "sdc.test.card", "v1").with_input("title", json!(uuid))
}

fn leaf(uuid: &str) -> ComponentInstance {
    ComponentInstance::new(uuid, "sdc.test.leaf", "v1")
}

fn tree(instances: impl IntoIterator<Item = ComponentInstance>) -> ComponentTree {
    ComponentTree::from_instances(instances).unwrap()
}

/// Scenario 1: children listed before their parents.
fn scenario() -> ComponentTree {
    tree([
        leaf("C").in_slot("B", "items"),
        section("A"),
        card("B").in_slot("A", "content"),
    ])
}

/// Reduces a component to its slot structure: `{slots: {name: {uuid: …}}}`,
/// or `{}` for a component without slots.
fn shape(component: &HydratedComponent) -> Value {
    let mut out = Map::new();
    if !component.slots().is_empty() {
        let slots: Map<String, Value> = component
            .slots()
            .iter()
            .map(|(name, slot)| {
                let children: Map<String, Value> = slot
                    .children()
                    .map(|(uuid, child)| (uuid.to_string(), shape(child)))
                    .collect();
                (name.clone(), Value::Object(children))
            })
            .collect();
        out.insert("slots".to_owned(), Value::Object(slots));
    }
    Value::Object(out)
}

fn tree_shape(tree: &HydratedTree) -> Value {
    Value::Object(
        tree.roots()
            .iter()
            .map(|(uuid, root)| (uuid.to_string(), shape(root)))
            .collect(),
    )
}

fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let first = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, first.clone());
            out.push(tail);
        }
    }
    out
}

/// True if siblings sharing a parent and slot keep their relative order.
fn keeps_sibling_order(original: &[ComponentInstance], candidate: &[ComponentInstance]) -> bool {
    let position = |uuid: &InstanceId| candidate.iter().position(|i| i.uuid() == uuid);
    original.iter().enumerate().all(|(i, a)| {
        original[i + 1..].iter().all(|b| {
            a.parent_uuid() != b.parent_uuid()
                || a.slot() != b.slot()
                || position(a.uuid()) < position(b.uuid())
        })
    })
}

// ============================================================================
// Concrete Scenarios
// ============================================================================

#[test]
fn scenario_children_before_parents() {
    let definitions = definitions();
    let hydration = Hydrator::new(&definitions).hydrate(&scenario()).unwrap();

    assert!(hydration.failures.is_empty());
    assert!(hydration.violations.is_empty());
    assert_eq!(
        tree_shape(&hydration.tree),
        json!({"A": {"slots": {"content": {"B": {"slots": {"items": {"C": {}}}}}}}})
    );
}

#[test]
fn scenario_cascade_removal_leaves_empty_slot() {
    let mut tree = scenario();
    let removed = tree.remove(&"B".into()).unwrap();
    assert_eq!(
        removed,
        BTreeSet::from([InstanceId::from("B"), InstanceId::from("C")])
    );

    let definitions = definitions();
    let hydration = Hydrator::new(&definitions).hydrate(&tree).unwrap();
    assert_eq!(
        tree_shape(&hydration.tree),
        json!({"A": {"slots": {"content": {}}}})
    );
    let a = hydration.tree.get(&"A".into()).unwrap();
    assert_eq!(a.slot("content"), Some(&Slot::Default));
}

#[test]
fn scenario_static_and_dynamic_sources() {
    let ctx = EvaluationContext::new();

    let hello = PropSource::from(StaticPropSource::new("string", json!("Hello")));
    assert_eq!(hello.evaluate(&ctx, true), Ok(json!("Hello")));
    assert!(hello.calculate_dependencies(&ctx).is_empty());

    let dynamic = PropSource::parse(&json!({
        "sourceType": "dynamic",
        "expression": "entity:node:article/title"
    }))
    .unwrap();
    assert_eq!(
        dynamic.evaluate(&ctx, true),
        Err(PropSourceError::MissingHostContext)
    );
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn storage_order_does_not_matter() {
    let definitions = definitions();
    let hydrator = Hydrator::new(&definitions);
    let original = vec![
        section("A"),
        card("B").in_slot("A", "content"),
        leaf("C").in_slot("B", "items"),
        card("D").in_slot("A", "content"),
        section("E"),
    ];
    let reference = tree(original.clone());
    let expected_order: Vec<InstanceId> = reference.topology().unwrap().canonical_order().cloned().collect();
    let expected_tree = hydrator.hydrate(&reference).unwrap().tree;

    let mut checked = 0;
    for candidate in permutations(&original) {
        if !keeps_sibling_order(&original, &candidate) {
            continue;
        }
        let permuted = tree(candidate);
        let order: Vec<InstanceId> = permuted.topology().unwrap().canonical_order().cloned().collect();
        assert_eq!(order, expected_order);
        let hydrated = hydrator.hydrate(&permuted).unwrap().tree;
        assert_eq!(hydrated.uuids(), expected_tree.uuids());
        assert_eq!(
            serde_json::to_value(&hydrated).unwrap(),
            serde_json::to_value(&expected_tree).unwrap()
        );
        checked += 1;
    }
    // B and D are siblings, A and E are roots: 120 / 2 / 2
    assert_eq!(checked, 30);
}

#[test]
fn reflattening_reproduces_canonical_order() {
    let tree = tree([
        leaf("C").in_slot("B", "items"),
        card("D").in_slot("A", "content"),
        section("A"),
        card("B").in_slot("A", "content"),
        leaf("F").in_slot("D", "items"),
    ]);
    let definitions = definitions();
    let hydrated = Hydrator::new(&definitions).hydrate(&tree).unwrap().tree;

    let topology = tree.topology().unwrap();
    let expected: Vec<(&str, Option<&str>, Option<&str>)> = topology
        .canonical_order()
        .map(|uuid| {
            let instance = tree.get(uuid).unwrap();
            (
                uuid.as_str(),
                instance.parent_uuid().map(InstanceId::as_str),
                instance.slot(),
            )
        })
        .collect();
    let flattened: Vec<(&str, Option<&str>, Option<&str>)> = hydrated
        .flatten()
        .into_iter()
        .map(|entry| {
            (
                entry.uuid.as_str(),
                entry.parent_uuid.map(InstanceId::as_str),
                entry.slot,
            )
        })
        .collect();
    assert_eq!(flattened, expected);
    assert_eq!(
        flattened.iter().map(|e| e.0).collect::<Vec<_>>(),
        ["A", "D", "F", "B", "C"]
    );
}

#[test]
fn nothing_leaks_in_or_out() {
    let tree = tree([
        section("A"),
        card("B").in_slot("A", "content"),
        leaf("X").in_slot("ghost", "content"),
        leaf("Y").in_slot("X", "items"),
        ComponentInstance::new("M", "sdc.test.missing", "v1").in_slot("A", "content"),
        leaf("N").in_slot("M", "whatever"),
    ]);
    let definitions = definitions();
    let hydration = Hydrator::new(&definitions).hydrate(&tree).unwrap();

    let dropped: BTreeSet<&InstanceId> = hydration
        .violations
        .iter()
        .map(StructuralViolation::uuid)
        .collect();
    let expected: BTreeSet<&InstanceId> = tree
        .iter()
        .map(ComponentInstance::uuid)
        .filter(|uuid| !dropped.contains(uuid))
        .collect();
    let reachable: BTreeSet<&InstanceId> = hydration.tree.uuids().into_iter().collect();

    assert_eq!(reachable, expected);
    assert_eq!(
        dropped,
        BTreeSet::from([&InstanceId::from("X"), &InstanceId::from("Y")])
    );
    assert_eq!(hydration.tree.len(), 4);

    // a missing definition degrades to a placeholder that keeps its children
    let missing = hydration.tree.get(&"M".into()).unwrap();
    assert_eq!(
        missing.error(),
        Some(&HydrationFailure::MissingComponentDefinition("sdc.test.missing".into()))
    );
    assert_eq!(missing.slot("whatever").unwrap().len(), 1);
}

#[test]
fn cycles_never_reach_the_hydrator() {
    let tree = tree([
        section("A"),
        section("B").in_slot("C", "content"),
        section("C").in_slot("B", "content"),
    ]);
    let definitions = definitions();
    let error = Hydrator::new(&definitions).hydrate(&tree).unwrap_err();
    assert_eq!(
        error,
        Error::Topology(TopologyError::CycleDetected {
            cycle: vec!["B".into(), "C".into()]
        })
    );

    let self_parent = self::tree([section("A").in_slot("A", "content")]);
    assert!(matches!(
        Hydrator::new(&definitions).hydrate(&self_parent),
        Err(Error::Topology(_))
    ));
}

// ============================================================================
// Sibling Order
// ============================================================================

#[test]
fn siblings_follow_relative_storage_order() {
    // ties cannot happen: position is only ever relative flat-list order
    let mut tree = tree([
        section("A"),
        card("first").in_slot("A", "content"),
        card("second").in_slot("A", "content"),
    ]);
    let definitions = definitions();
    let order = |tree: &ComponentTree| -> Vec<String> {
        let hydrated = Hydrator::new(&definitions).hydrate(tree).unwrap().tree;
        hydrated
            .get(&"A".into())
            .unwrap()
            .slot("content")
            .unwrap()
            .children()
            .map(|(uuid, _)| uuid.to_string())
            .collect()
    };
    assert_eq!(order(&tree), ["first", "second"]);

    tree.move_instance(&"first".into(), Some(("A".into(), "content".into())))
        .unwrap();
    assert_eq!(order(&tree), ["second", "first"]);

    // a second claim on an existing uuid is rejected, not merged
    assert!(tree.append(card("first").in_slot("A", "content")).is_err());
    assert_eq!(order(&tree), ["second", "first"]);
}

// ============================================================================
// Prop Resolution
// ============================================================================

#[test]
fn props_resolve_through_every_source_kind() {
    let definitions = definitions();
    let base = Url::parse("https://example.com").unwrap();
    let host = JsonEntity::new("node", "article")
        .with_id("3")
        .with_path("/node/3")
        .with_field("title", json!([{"value": "From the article"}]));

    let tree = tree([
        section("A").with_input(
            "title",
            json!({"sourceType": "dynamic", "expression": "entity:node:article/title"}),
        ),
        card("B")
            .in_slot("A", "content")
            .with_input("link", json!({"sourceType": "host-entity-url", "absolute": true})),
    ]);
    let hydration = Hydrator::new(&definitions)
        .with_host(&host)
        .with_base_url(&base)
        .hydrate(&tree)
        .unwrap();
    assert!(hydration.failures.is_empty());

    let a = hydration.tree.get(&"A".into()).unwrap();
    assert_eq!(a.props()["title"], json!("From the article"));
    let b = hydration.tree.get(&"B".into()).unwrap();
    assert_eq!(b.props()["title"], json!("B"));
    assert_eq!(
        b.props()["image"],
        json!("https://example.com/modules/sdc_test/components/card/card.png")
    );
    assert_eq!(b.props()["link"], json!("https://example.com/node/3"));
    assert_eq!(b.props().keys().collect::<Vec<_>>(), ["title", "image", "link"]);
}

#[test]
fn host_dependent_props_without_host() {
    let definitions = definitions();
    let tree = tree([
        // optional: left out
        section("A").with_input(
            "title",
            json!({"sourceType": "dynamic", "expression": "entity:node:article/title"}),
        ),
        // required: placeholder
        ComponentInstance::new("B", "sdc.test.card", "v1")
            .in_slot("A", "content")
            .with_input(
                "title",
                json!({"sourceType": "dynamic", "expression": "entity:node:article/title"}),
            ),
    ]);
    let base = Url::parse("https://example.com").unwrap();
    let hydration = Hydrator::new(&definitions)
        .with_base_url(&base)
        .hydrate(&tree)
        .unwrap();

    let a = hydration.tree.get(&"A".into()).unwrap();
    assert!(!a.is_failed());
    assert!(!a.props().contains_key("title"));

    assert_eq!(hydration.failures.len(), 1);
    assert_eq!(hydration.failures[0].uuid, InstanceId::from("B"));
    assert_eq!(
        hydration.failures[0].failure,
        HydrationFailure::Evaluation {
            prop: "title".into(),
            kind: PropSourceKind::Dynamic,
            source: PropSourceError::MissingHostContext
        }
    );
}

#[test]
fn pinned_version_selects_schema() {
    let definitions = definitions();
    let tree = tree([
        card("old"),
        ComponentInstance::new("new", "sdc.test.card", "v2").with_input("heading", json!("Hi")),
        ComponentInstance::new("future", "sdc.test.card", "v3"),
    ]);
    let hydration = Hydrator::new(&definitions).hydrate(&tree).unwrap();

    let old = hydration.tree.get(&"old".into()).unwrap();
    assert_eq!(old.props()["title"], json!("old"));
    let new = hydration.tree.get(&"new".into()).unwrap();
    assert_eq!(new.props()["heading"], json!("Hi"));
    assert!(!new.props().contains_key("title"));

    let future = hydration.tree.get(&"future".into()).unwrap();
    assert_eq!(
        future.error(),
        Some(&HydrationFailure::UnknownComponentVersion {
            component: "sdc.test.card".into(),
            version: "v3".into()
        })
    );
}

#[test]
fn collapsed_and_tagged_inputs_hydrate_alike() {
    let definitions = definitions();
    let collapsed = tree([card("B")]);
    let tagged = tree([ComponentInstance::new("B", "sdc.test.card", "v1").with_input(
        "title",
        json!({"sourceType": "static:field_item:string", "value": "B"}),
    )]);
    let hydrator = Hydrator::new(&definitions);
    let base = Url::parse("https://example.com").unwrap();
    let hydrator = hydrator.with_base_url(&base);
    assert_eq!(
        hydrator.hydrate(&collapsed).unwrap(),
        hydrator.hydrate(&tagged).unwrap()
    );
}

// ============================================================================
// Validation Contract
// ============================================================================

#[test]
fn validated_tree_hydrates_strictly() {
    let definitions = definitions();
    let validated = validate(scenario(), &definitions).unwrap();
    let base = Url::parse("https://example.com").unwrap();

    let hydrated = Hydrator::new(&definitions)
        .with_base_url(&base)
        .hydrate_validated(&validated)
        .unwrap();
    assert_eq!(hydrated.len(), 3);

    // hydrating against a loader that disagrees with validation is a bug
    let empty = DefinitionSet::new();
    let error = Hydrator::new(&empty)
        .hydrate_validated(&validated)
        .unwrap_err();
    assert!(matches!(
        error,
        Error::Contract(ContractViolation::FailedAfterValidation { .. })
    ));
}

#[test]
fn validated_tree_without_host_is_a_caller_error() {
    let definitions = definitions();
    let tree = tree([ComponentInstance::new("B", "sdc.test.card", "v1").with_input(
        "title",
        json!({"sourceType": "dynamic", "expression": "entity:node:article/title"}),
    )]);
    let validated = validate(tree, &definitions).unwrap();
    let base = Url::parse("https://example.com").unwrap();

    let error = Hydrator::new(&definitions)
        .with_base_url(&base)
        .hydrate_validated(&validated)
        .unwrap_err();
    assert_eq!(
        error,
        Error::Hydration {
            uuid: "B".into(),
            failure: HydrationFailure::Evaluation {
                prop: "title".into(),
                kind: PropSourceKind::Dynamic,
                source: PropSourceError::MissingHostContext,
            },
        }
    );

    let host = JsonEntity::new("node", "article").with_field("title", json!([{"value": "Hello"}]));
    let hydrated = Hydrator::new(&definitions)
        .with_base_url(&base)
        .with_host(&host)
        .hydrate_validated(&validated)
        .unwrap();
    assert_eq!(
        hydrated.get(&"B".into()).unwrap().props()["title"],
        json!("Hello")
    );
}

#[test]
fn hydrated_output_is_keyed_by_root() {
    let definitions = definitions();
    let tree = tree([leaf("L").with_label("Fine print")]);
    let hydrated = Hydrator::new(&definitions).hydrate(&tree).unwrap().tree;
    assert_eq!(
        serde_json::to_value(&hydrated).unwrap(),
        json!({ROOT_UUID: {"L": {
            "component": "sdc.test.leaf",
            "version": "v1",
            "label": "Fine print",
            "props": {},
            "slots": {}
        }}})
    );
}
