//! End-to-end behavior of `Store`: commits, notifications, queries, patches
//! and failure handling.

use methodical::{
    args, impl_draftable_via_serde, path, Actions, ListenerFailurePolicy, Methods, Node, Op,
    OperationError, Outcome, Patch, Queries, Store, StoreConfig, StoreError,
};
use methodical_state::apply_patch;
use serde::Serialize;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Counter {
    count: i64,
}

impl_draftable_via_serde!(Counter);

fn counter_methods() -> Methods<Counter> {
    Methods::<Counter>::builder()
        .method("increment", |draft, args| {
            draft.count += args.get::<i64>(0)?;
            Ok(Outcome::Mutated)
        })
        .method("reset", |_, _| Ok(Outcome::Replace(Counter { count: 0 })))
        .method("touch", |_, _| Ok(Outcome::Mutated))
        .method("increment_then_fail", |draft, args| {
            draft.count += args.get::<i64>(0)?;
            Err(OperationError::new("refusing to finish"))
        })
        .build()
        .unwrap()
}

fn counter_queries() -> Queries<Counter> {
    Queries::<Counter>::builder()
        .query("get_count", |state, _| Ok(state.count))
        .query("is_above", |state, args| Ok(state.count > args.get::<i64>(0)?))
        .build()
        .unwrap()
}

fn counter_store() -> Store<Counter> {
    Store::builder(counter_methods(), Counter { count: 0 })
        .queries(counter_queries())
        .build()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records the level and message of every event seen while installed.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<(tracing::Level, String)>>>);

impl Captured {
    fn messages_at(&self, level: tracing::Level) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: tracing::Subscriber> Layer<S> for Captured {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

fn capture_logs() -> (tracing::subscriber::DefaultGuard, Captured) {
    let captured = Captured::default();
    let subscriber = tracing_subscriber::registry::Registry::default().with(captured.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (guard, captured)
}

fn counting_listener(store: &Store<Counter>) -> Rc<Cell<usize>> {
    let calls = Rc::new(Cell::new(0));
    let sink = Rc::clone(&calls);
    let _ = store.subscribe(move || sink.set(sink.get() + 1));
    calls
}

// ============================================================================
// Commits and history
// ============================================================================

#[test]
fn test_increment_five_then_three() {
    init_tracing();
    let store = counter_store();
    let actions = store.actions();

    actions.call("increment", args![5]).unwrap();
    actions.call("increment", args![3]).unwrap();

    let state = store.get_state();
    assert_eq!(*state.current, Counter { count: 8 });
    assert_eq!(*state.previous, Counter { count: 5 });
    assert_eq!(store.query().call_as::<i64>("get_count", args![]).unwrap(), 8);
}

#[test]
fn test_current_is_left_fold_of_transitions() {
    let store = counter_store();
    let steps: [(&str, Option<i64>); 5] = [
        ("increment", Some(2)),
        ("increment", Some(7)),
        ("reset", None),
        ("increment", Some(4)),
        ("touch", None),
    ];

    let mut expected = 0;
    for (name, by) in steps {
        let before = store.current();
        let args = by.map(|n| args![n]).unwrap_or_default();
        store.dispatch(name, args).unwrap();

        expected = match name {
            "increment" => expected + by.unwrap_or(0),
            "reset" => 0,
            _ => expected,
        };
        assert_eq!(store.current().count, expected);
        assert_eq!(*store.previous(), *before);
    }
}

#[test]
fn test_every_action_notifies_even_without_change() {
    let store = counter_store();
    let calls = counting_listener(&store);

    store.dispatch("touch", args![]).unwrap();
    assert_eq!(calls.get(), 1);
    let state = store.get_state();
    assert_eq!(state.previous, state.current);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_unknown_operation_changes_nothing() {
    let store = counter_store();
    store.dispatch("increment", args![1]).unwrap();
    let calls = counting_listener(&store);
    let before = store.get_state();

    let err = store.actions().call("decrement", args![1]).unwrap_err();
    assert!(matches!(err, StoreError::UnknownOperation { ref name } if name == "decrement"));

    let err = store.dispatch("decrement", args![1]).unwrap_err();
    assert!(matches!(err, StoreError::UnknownOperation { .. }));

    let after = store.get_state();
    assert!(Rc::ptr_eq(&before.current, &after.current));
    assert!(Rc::ptr_eq(&before.previous, &after.previous));
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_failing_operation_commits_nothing() {
    let store = counter_store();
    store.dispatch("increment", args![2]).unwrap();
    let calls = counting_listener(&store);

    let err = store
        .dispatch("increment_then_fail", args![10])
        .unwrap_err();
    match err {
        StoreError::OperationFailure { name, source } => {
            assert_eq!(name, "increment_then_fail");
            assert_eq!(source.message(), "refusing to finish");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(store.current().count, 2);
    assert_eq!(store.previous().count, 0);
    assert_eq!(calls.get(), 0);
}

#[test]
fn test_bad_arguments_surface_as_operation_failure() {
    let store = counter_store();
    let err = store.dispatch("increment", args!["lots"]).unwrap_err();
    let StoreError::OperationFailure { source, .. } = err else {
        panic!("expected an operation failure");
    };
    assert!(source.source_as::<methodical::ArgsError>().is_some());
    assert_eq!(store.current().count, 0);
}

#[test]
fn test_actions_report_disposed_after_store_drop() {
    let store = counter_store();
    let actions = store.actions();
    let queries = store.query();
    store.dispatch("increment", args![4]).unwrap();
    drop(store);

    assert!(matches!(
        actions.call("increment", args![1]),
        Err(StoreError::Disposed)
    ));
    assert_eq!(queries.call_as::<i64>("get_count", args![]).unwrap(), 4);
}

// ============================================================================
// Listeners
// ============================================================================

#[test]
fn test_listeners_run_once_each_in_order() {
    let store = counter_store();
    let order = Rc::new(RefCell::new(Vec::new()));
    let subs: Vec<_> = (0..4)
        .map(|i| {
            let order = Rc::clone(&order);
            store.subscribe(move || order.borrow_mut().push(i))
        })
        .collect();

    store.dispatch("increment", args![1]).unwrap();
    assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);

    subs[2].unsubscribe();
    subs[2].unsubscribe();
    order.borrow_mut().clear();
    store.dispatch("increment", args![1]).unwrap();
    assert_eq!(*order.borrow(), vec![0, 1, 3]);
    assert_eq!(store.listener_count(), 3);
}

#[test]
fn test_unsubscribed_listener_is_not_called() {
    let store = counter_store();
    let calls = Rc::new(Cell::new(0));
    let sink = Rc::clone(&calls);
    let sub = store.subscribe(move || sink.set(sink.get() + 1));
    sub.unsubscribe();

    store.dispatch("increment", args![1]).unwrap();
    assert_eq!(calls.get(), 0);
    assert!(!sub.is_active());
}

#[test]
fn test_listener_reads_committed_state() {
    let store = Rc::new(counter_store());
    let seen = Rc::new(RefCell::new(Vec::new()));

    let weak = Rc::downgrade(&store);
    let sink = Rc::clone(&seen);
    let _sub = store.subscribe(move || {
        if let Some(store) = weak.upgrade() {
            let state = store.get_state();
            sink.borrow_mut()
                .push((state.previous.count, state.current.count));
        }
    });

    store.dispatch("increment", args![5]).unwrap();
    store.dispatch("increment", args![3]).unwrap();
    assert_eq!(*seen.borrow(), vec![(0, 5), (5, 8)]);
}

#[test]
fn test_listener_may_dispatch_after_commit() {
    let store = Rc::new(counter_store());
    let actions = store.actions();
    let weak = Rc::downgrade(&store);
    let _sub = store.subscribe(move || {
        if let Some(store) = weak.upgrade() {
            if store.current().count < 3 {
                actions.call("increment", args![1]).unwrap();
            }
        }
    });

    store.dispatch("increment", args![1]).unwrap();
    assert_eq!(store.current().count, 3);
    assert_eq!(store.previous().count, 2);
}

#[test]
fn test_panicking_listener_is_isolated_and_logged() {
    let (_guard, logs) = capture_logs();
    let store = counter_store();
    let _bad = store.subscribe(|| panic!("render failed"));
    let calls = counting_listener(&store);

    store.dispatch("increment", args![1]).unwrap();
    store.dispatch("increment", args![1]).unwrap();

    assert_eq!(calls.get(), 2);
    assert_eq!(store.current().count, 2);
    assert_eq!(
        logs.messages_at(tracing::Level::ERROR),
        vec!["store listener panicked", "store listener panicked"]
    );
}

#[test]
fn test_propagate_policy_unwinds_after_commit() {
    let store = Store::builder(counter_methods(), Counter { count: 0 })
        .listener_failure(ListenerFailurePolicy::Propagate)
        .build();
    let _bad = store.subscribe(|| panic!("render failed"));
    let calls = counting_listener(&store);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        store.dispatch("increment", args![1])
    }));
    assert!(outcome.is_err());
    assert_eq!(store.current().count, 1);
    assert_eq!(calls.get(), 0);
    assert_eq!(store.previous().count, 0);
}

// ============================================================================
// Re-entrancy
// ============================================================================

#[test]
fn test_dispatch_from_inside_an_operation_is_rejected() {
    let (_guard, logs) = capture_logs();
    let slot: Rc<RefCell<Option<Actions>>> = Rc::default();
    let inner = Rc::clone(&slot);
    let methods = Methods::<Counter>::builder()
        .method("increment", |draft, args| {
            draft.count += args.get::<i64>(0)?;
            Ok(Outcome::Mutated)
        })
        .method("double_increment", move |draft, _| {
            draft.count += 1;
            if let Some(actions) = inner.borrow().as_ref() {
                actions.call("increment", args![1])?;
            }
            Ok(Outcome::Mutated)
        })
        .build()
        .unwrap();
    let store = Store::new(methods, Counter { count: 0 });
    *slot.borrow_mut() = Some(store.actions());

    let err = store.dispatch("double_increment", args![]).unwrap_err();
    let StoreError::OperationFailure { source, .. } = err else {
        panic!("expected an operation failure");
    };
    assert!(matches!(
        source.source_as::<StoreError>(),
        Some(StoreError::Reentrant { name, active })
            if name == "increment" && active == "double_increment"
    ));
    assert_eq!(store.current().count, 0);
    assert!(logs
        .messages_at(tracing::Level::WARN)
        .contains(&"rejected re-entrant dispatch".to_owned()));

    store.dispatch("increment", args![2]).unwrap();
    assert_eq!(store.current().count, 2);
}

#[test]
fn test_operation_panicking_mid_edit_leaves_store_usable() {
    let methods = Methods::<Counter>::builder()
        .method("increment", |draft, args| {
            draft.count += args.get::<i64>(0)?;
            Ok(Outcome::Mutated)
        })
        .method("explode", |draft, _| {
            draft.count += 100;
            panic!("operation bug");
        })
        .build()
        .unwrap();
    let store = Store::new(methods, Counter { count: 0 });
    let calls = counting_listener(&store);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| store.dispatch("explode", args![])));
    assert!(outcome.is_err());
    assert_eq!(store.current().count, 0);
    assert_eq!(calls.get(), 0);

    store.dispatch("increment", args![1]).unwrap();
    assert_eq!(store.current().count, 1);
    assert_eq!(store.previous().count, 0);
    assert_eq!(calls.get(), 1);
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_queries_track_live_state_without_rebinding() {
    let store = counter_store();
    let queries = store.query();
    assert!(!queries.call_as::<bool>("is_above", args![1]).unwrap());

    store.dispatch("increment", args![2]).unwrap();
    assert!(queries.call_as::<bool>("is_above", args![1]).unwrap());
    assert_eq!(
        queries.names().collect::<Vec<_>>(),
        ["get_count", "is_above"]
    );

    assert!(matches!(
        queries.call("is_below", args![]),
        Err(StoreError::UnknownQuery { .. })
    ));
}

#[test]
fn test_operation_queries_see_pre_transition_snapshot() {
    let methods = Methods::<Counter>::builder()
        .method_with_query("double", |draft, _, query| {
            let before: i64 = query.call_as("get_count", args![])?;
            draft.count += before;
            let still: i64 = query.call_as("get_count", args![])?;
            assert_eq!(before, still);
            Ok(Outcome::Mutated)
        })
        .build()
        .unwrap();
    let store = Store::builder(methods, Counter { count: 3 })
        .queries(counter_queries())
        .build();

    store.dispatch("double", args![]).unwrap();
    assert_eq!(store.current().count, 6);
}

// ============================================================================
// Tree-shaped state
// ============================================================================

fn board_methods() -> Methods<Node> {
    Methods::<Node>::builder()
        .method("rename", |draft, args| {
            let column: String = args.get(0)?;
            let title: String = args.get(1)?;
            draft.set(&path!("columns", column.as_str(), "title"), title)?;
            Ok(Outcome::Mutated)
        })
        .method("add_card", |draft, args| {
            let column: String = args.get(0)?;
            let card: Node = args.get(1)?;
            if draft.get(&path!("columns", column.as_str())).is_none() {
                return Err(OperationError::new(format!("no column named {column}")));
            }
            draft.push(&path!("columns", column.as_str(), "cards"), card)?;
            Ok(Outcome::Mutated)
        })
        .build()
        .unwrap()
}

fn board() -> Node {
    Node::from(json!({
        "columns": {
            "todo": {"title": "Todo", "cards": [{"id": 1}]},
            "done": {"title": "Done", "cards": []}
        },
        "owner": {"name": "ops"}
    }))
}

#[test]
fn test_untouched_branches_stay_shared_across_commits() {
    let store = Store::new(board_methods(), board());
    store
        .dispatch("rename", args!["todo", "Backlog"])
        .unwrap();

    let state = store.get_state();
    assert_eq!(state.current["columns"]["todo"]["title"].as_str(), Some("Backlog"));
    assert!(state.current["owner"].ptr_eq(&state.previous["owner"]));
    assert!(state.current["columns"]["done"].ptr_eq(&state.previous["columns"]["done"]));
    assert!(state.current["columns"]["todo"]["cards"]
        .ptr_eq(&state.previous["columns"]["todo"]["cards"]));
    assert!(!state.current["columns"].ptr_eq(&state.previous["columns"]));
}

#[test]
fn test_patch_listener_sees_each_transition_once() {
    let seen: Rc<RefCell<Vec<(Patch, Patch)>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let store = Store::builder(board_methods(), board())
        .patch_listener(move |patches, inverse| {
            sink.borrow_mut().push((patches.clone(), inverse.clone()))
        })
        .build();

    store
        .dispatch("add_card", args!["done", json!({"id": 2})])
        .unwrap();
    assert_eq!(seen.borrow().len(), 1);
    let (patches, inverse) = seen.borrow()[0].clone();
    assert_eq!(
        patches.ops(),
        &[Op::add(path!("columns", "done", "cards", 0), Node::from(json!({"id": 2})))]
    );

    let state = store.get_state();
    assert_eq!(apply_patch(&state.previous, &patches).unwrap(), *state.current);
    assert_eq!(apply_patch(&state.current, &inverse).unwrap(), *state.previous);

    assert!(store.dispatch("add_card", args!["archived", json!({"id": 3})]).is_err());
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn test_null_root_is_built_up_in_place() {
    let methods = Methods::<Node>::builder()
        .method("init", |draft, _| {
            draft.set(&path!("columns", "todo", "cards"), Node::array())?;
            Ok(Outcome::Mutated)
        })
        .build()
        .unwrap();
    let store = Store::new(methods, Node::Null);

    store.dispatch("init", args![]).unwrap();
    assert_eq!(
        store.current().to_value(),
        json!({"columns": {"todo": {"cards": []}}})
    );
    assert!(store.previous().is_null());
}

// ============================================================================
// State without a JSON form
// ============================================================================

#[derive(Clone, Debug, Serialize)]
struct Plot {
    scale: f64,
    grid: HashMap<(u8, u8), u8>,
}

impl_draftable_via_serde!(Plot);

fn plot_store(patches: Rc<RefCell<Vec<Patch>>>) -> Store<Plot> {
    let methods = Methods::<Plot>::builder()
        .method("place", |draft, args| {
            let cell = (args.get::<u8>(0)?, args.get::<u8>(1)?);
            draft.grid.insert(cell, args.get::<u8>(2)?);
            Ok(Outcome::Mutated)
        })
        .method("lose_scale", |draft, _| {
            draft.scale = f64::NAN;
            Ok(Outcome::Mutated)
        })
        .build()
        .unwrap();
    let queries = Queries::<Plot>::builder()
        .query("scale", |state, _| Ok(state.scale))
        .query("grid", |state, _| Ok(state.grid.clone()))
        .build()
        .unwrap();
    Store::builder(
        methods,
        Plot {
            scale: f64::INFINITY,
            grid: HashMap::new(),
        },
    )
    .queries(queries)
    .patch_listener(move |forward, _| patches.borrow_mut().push(forward.clone()))
    .build()
}

#[test]
fn test_patch_listener_handles_state_without_json_form() {
    let patches: Rc<RefCell<Vec<Patch>>> = Rc::default();
    let store = plot_store(Rc::clone(&patches));

    store.dispatch("place", args![1, 2, 7]).unwrap();
    store.dispatch("lose_scale", args![]).unwrap();

    let patches = patches.borrow();
    assert_eq!(patches.len(), 2);
    assert_eq!(patches[0].ops(), &[Op::add(path!("grid", "[1,2]"), 7)]);
    assert_eq!(patches[1].ops(), &[Op::replace(path!("scale"), "NaN")]);
    assert!(store.current().scale.is_nan());
}

#[test]
fn test_queries_return_values_json_cannot_hold() {
    let store = plot_store(Rc::default());
    let queries = store.query();

    assert_eq!(queries.call_as::<f64>("scale", args![]).unwrap(), f64::INFINITY);

    store.dispatch("place", args![3, 4, 1]).unwrap();
    let grid: HashMap<(u8, u8), u8> = queries.call_as("grid", args![]).unwrap();
    assert_eq!(grid.get(&(3, 4)), Some(&1));
    assert!(matches!(
        queries.call_json("grid", args![]),
        Err(StoreError::NoJsonForm { ref name, .. }) if name == "grid"
    ));

    store.dispatch("lose_scale", args![]).unwrap();
    assert!(queries.call_as::<f64>("scale", args![]).unwrap().is_nan());
    assert!(matches!(
        queries.call_as::<f32>("scale", args![]),
        Err(StoreError::QueryType { found: "f64", .. })
    ));
}

// ============================================================================
// Scalar state and configuration
// ============================================================================

#[test]
fn test_scalar_state_must_be_replaced() {
    let methods = Methods::<i64>::builder()
        .method("add", |draft, args| {
            Ok(Outcome::Replace(**draft + args.get::<i64>(0)?))
        })
        .method("add_in_place", |draft, args| {
            **draft += args.get::<i64>(0)?;
            Ok(Outcome::Mutated)
        })
        .build()
        .unwrap();
    let store = Store::new(methods, 10);

    store.dispatch("add", args![5]).unwrap();
    assert_eq!(*store.current(), 15);

    let err = store.dispatch("add_in_place", args![5]).unwrap_err();
    assert!(matches!(err, StoreError::ScalarMutation { ref name } if name == "add_in_place"));
    assert_eq!(*store.current(), 15);
    assert_eq!(*store.previous(), 10);
}

#[test]
fn test_config_from_json() {
    let config: StoreConfig = serde_json::from_value(json!({
        "label": "counter",
        "listener_failure": "isolate"
    }))
    .unwrap();
    let store = Store::builder(counter_methods(), Counter { count: 0 })
        .config(config)
        .build();

    assert_eq!(store.label(), Some("counter"));
    assert_eq!(
        store.actions().names().collect::<Vec<_>>(),
        ["increment", "reset", "touch", "increment_then_fail"]
    );
}
