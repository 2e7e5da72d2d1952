//! Integration Tests for the Rendering Runtime
//!
//! These tests mount components into an in-memory document and verify the
//! host tree, the mutation counters, and the runtime's bookkeeping.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use futures_util::future::{FutureExt, LocalBoxFuture};
use tokio::task::LocalSet;

use trellis_core::host::HostId;
use trellis_core::{
    children, h, use_effect, use_ref, use_state, Cleanup, Component, Document, ErrorSurface,
    HookError, HostNode, Memo, PropValue, Props, RenderError, RenderResult, Runtime, Signal,
    VNode,
};

// ----------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------

fn runtime() -> (Runtime, HostNode) {
    let runtime = Runtime::new(Document::new());
    let root = runtime.document().body().clone();
    (runtime, root)
}

fn shared<T: 'static>(value: Rc<T>) -> PropValue {
    PropValue::Any(value)
}

fn bump(props: &Props, name: &str) {
    if let Some(counter) = props.get_any::<Cell<usize>>(name) {
        counter.set(counter.get() + 1);
    }
}

fn counter(_: &Props) -> RenderResult {
    let count = use_state(0)?;
    let click = count.clone();
    Ok(h(
        "button",
        Props::new().on("click", move |_| click.update(|n| n + 1)),
        children![count.get()],
    ))
}

const COUNTER: Component = Component::new("Counter", counter);

fn store_view(props: &Props) -> RenderResult {
    bump(props, "renders");
    let value = props
        .get_any::<Signal<i32>>("store")
        .map(|store| store.get())
        .unwrap_or_default();
    Ok(h("span", Props::new(), children![value]))
}

const STORE_VIEW: Component = Component::new("StoreView", store_view);

fn store_parent(props: &Props) -> RenderResult {
    let value = props
        .get_any::<Signal<i32>>("store")
        .map(|store| store.get())
        .unwrap_or_default();
    let mut child_props = Props::new();
    for name in ["store", "renders"] {
        if let Some(value) = props.get(name) {
            child_props = child_props.with(name, value.clone());
        }
    }
    Ok(h(
        "section",
        Props::new().with("data-value", value),
        children![h(STORE_VIEW, child_props, children![])],
    ))
}

const STORE_PARENT: Component = Component::new("StoreParent", store_parent);

/// Reads a memo over `store`; seeing 1 writes 2 back mid-render.
fn memo_view(props: &Props) -> RenderResult {
    bump(props, "renders");
    let value = props
        .get_any::<Memo<i32>>("memo")
        .and_then(|memo| memo.get())
        .unwrap_or_default();
    if value == 1 {
        if let Some(store) = props.get_any::<Signal<i32>>("store") {
            store.set(2);
        }
    }
    Ok(h("span", Props::new(), children![value]))
}

const MEMO_VIEW: Component = Component::new("MemoView", memo_view);

fn tracked_item(props: &Props) -> RenderResult {
    let cleanups = props.get_any::<Cell<usize>>("cleanups");
    use_effect((), move || {
        Some(Box::new(move || {
            if let Some(cleanups) = cleanups {
                cleanups.set(cleanups.get() + 1);
            }
        }) as Cleanup)
    })?;
    Ok(h(
        "li",
        Props::new(),
        children![props.get_int("n").unwrap_or_default()],
    ))
}

const TRACKED_ITEM: Component = Component::new("TrackedItem", tracked_item);

fn slow(_: &Props) -> LocalBoxFuture<'static, RenderResult> {
    async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(h("p", Props::new(), children!["ready"]))
    }
    .boxed_local()
}

const SLOW: Component = Component::deferred("Slow", slow);

fn rejecting(_: &Props) -> LocalBoxFuture<'static, RenderResult> {
    async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Err(RenderError::msg("fetch failed"))
    }
    .boxed_local()
}

const REJECTING: Component = Component::deferred("Rejecting", rejecting);

fn rejecting_panel(_: &Props) -> RenderResult {
    Ok(h(
        "main",
        Props::new(),
        children![
            h(REJECTING, Props::new(), children![]),
            h("p", Props::new(), children!["sib"]),
        ],
    ))
}

const REJECTING_PANEL: Component = Component::new("RejectingPanel", rejecting_panel);

fn unstable(props: &Props) -> RenderResult {
    let flipped = props
        .get_any::<Signal<bool>>("flip")
        .map(|flip| flip.get())
        .unwrap_or(false);
    if flipped {
        let _ = use_ref(0)?;
    } else {
        let _ = use_state(0)?;
    }
    Ok(h("p", Props::new(), children!["ok"]))
}

const UNSTABLE: Component = Component::new("Unstable", unstable);

fn failing(_: &Props) -> RenderResult {
    Err(RenderError::msg("backend unavailable"))
}

const FAILING: Component = Component::new("Failing", failing);

#[derive(Default)]
struct RecordingSurface {
    errors: RefCell<Vec<String>>,
    clears: Cell<usize>,
}

impl ErrorSurface for RecordingSurface {
    fn report_render_error(&self, error: &RenderError) {
        self.errors.borrow_mut().push(error.to_string());
    }

    fn clear_render_error(&self) {
        self.clears.set(self.clears.get() + 1);
    }
}

fn keyed_list(keys: &[i64]) -> VNode {
    let items: Vec<VNode> = keys
        .iter()
        .map(|key| h("li", Props::new().key(*key), children![key.to_string()]))
        .collect();
    h("ul", Props::new(), children![items])
}

fn child_ids(node: &HostNode) -> Vec<HostId> {
    node.children().iter().map(HostNode::id).collect()
}

// ----------------------------------------------------------------------
// Components and events
// ----------------------------------------------------------------------

#[tokio::test]
async fn clicking_a_counter_updates_its_text() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            runtime.mount(COUNTER, &root, Props::new());

            let button = root.find_by_tag("button").unwrap();
            assert_eq!(button.text(), "0");

            assert!(runtime.document().dispatch("click", &button));
            runtime.settle().await;

            assert_eq!(button.text(), "1");
            assert!(root.find_by_tag("button").unwrap().same(&button));
        })
        .await;
}

#[tokio::test]
async fn one_root_listener_per_event_kind() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            let clicked = Rc::new(RefCell::new(Vec::new()));
            let buttons: Vec<VNode> = (0..3)
                .map(|i| {
                    let clicked = clicked.clone();
                    h(
                        "button",
                        Props::new().on("click", move |_| clicked.borrow_mut().push(i)),
                        children![h("span", Props::new(), children![i])],
                    )
                })
                .collect();
            let tree = h("div", Props::new(), children![buttons]);
            runtime.patch(&root, Some(&tree), None).await;

            assert_eq!(runtime.document().listener_count(), 1);
            assert_eq!(runtime.handler_count(), 3);

            // Events raised on a descendant reach the nearest handler.
            let spans = root.find_all_by_tag("span");
            assert!(runtime.document().dispatch("click", &spans[1]));
            assert_eq!(*clicked.borrow(), vec![1]);

            runtime.patch(&root, None, Some(&tree)).await;
            assert_eq!(runtime.handler_count(), 0);
        })
        .await;
}

#[tokio::test]
async fn mounting_twice_patches_in_place() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            runtime.mount(COUNTER, &root, Props::new());
            let button = root.find_by_tag("button").unwrap();
            runtime.document().dispatch("click", &button);
            runtime.settle().await;

            runtime.document().reset_stats();
            runtime.mount(COUNTER, &root, Props::new());

            assert_eq!(root.child_count(), 1);
            assert!(root.find_by_tag("button").unwrap().same(&button));
            assert_eq!(button.text(), "1");
            assert_eq!(runtime.document().stats().created, 0);
            assert_eq!(runtime.context_count(), 1);
        })
        .await;
}

#[tokio::test]
async fn unmount_runs_cleanups_and_releases_everything() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            runtime.mount(COUNTER, &root, Props::new());
            assert_eq!(runtime.context_count(), 1);
            assert_eq!(runtime.handler_count(), 1);

            runtime.unmount(&root);

            assert_eq!(root.child_count(), 0);
            assert_eq!(runtime.context_count(), 0);
            assert_eq!(runtime.handler_count(), 0);
            assert!(runtime.mounted(&root).is_none());
        })
        .await;
}

// ----------------------------------------------------------------------
// Reconciliation
// ----------------------------------------------------------------------

#[tokio::test]
async fn keyed_reorder_moves_existing_nodes() {
    let (runtime, root) = runtime();
    let first = keyed_list(&[1, 2, 3]);
    runtime.patch(&root, Some(&first), None).await;

    let ul = root.find_by_tag("ul").unwrap();
    let before = child_ids(&ul);
    runtime.document().reset_stats();

    let second = keyed_list(&[3, 1, 2]);
    runtime.patch(&root, Some(&second), Some(&first)).await;

    let stats = runtime.document().stats();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.removed, 0);
    assert_eq!(stats.moved, 1);
    assert_eq!(stats.text_updates, 0);
    assert_eq!(ul.text(), "312");
    assert_eq!(child_ids(&ul), vec![before[2], before[0], before[1]]);
}

#[tokio::test]
async fn keyed_insert_and_remove_touch_only_changed_items() {
    let (runtime, root) = runtime();
    let first = keyed_list(&[1, 2, 3]);
    runtime.patch(&root, Some(&first), None).await;
    runtime.document().reset_stats();

    let second = keyed_list(&[1, 4, 3]);
    runtime.patch(&root, Some(&second), Some(&first)).await;

    let stats = runtime.document().stats();
    assert_eq!(stats.removed, 1);
    // One <li> plus its text node.
    assert_eq!(stats.created, 2);
    assert_eq!(root.find_by_tag("ul").unwrap().text(), "143");
}

#[tokio::test]
async fn shrinking_an_unkeyed_list_unmounts_the_tail() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            let cleanups = Rc::new(Cell::new(0usize));
            let list = |n: i64| {
                let items: Vec<VNode> = (0..n)
                    .map(|i| {
                        h(
                            TRACKED_ITEM,
                            Props::new()
                                .with("n", i)
                                .with("cleanups", shared(cleanups.clone())),
                            children![],
                        )
                    })
                    .collect();
                h("ul", Props::new(), children![items])
            };

            let first = list(3);
            runtime.patch(&root, Some(&first), None).await;
            assert_eq!(runtime.context_count(), 3);
            runtime.document().reset_stats();

            let second = list(1);
            runtime.patch(&root, Some(&second), Some(&first)).await;

            let stats = runtime.document().stats();
            assert_eq!(stats.removed, 2);
            assert_eq!(stats.created, 0);
            assert_eq!(cleanups.get(), 2);
            assert_eq!(runtime.context_count(), 1);
            assert_eq!(root.find_by_tag("ul").unwrap().text(), "0");
        })
        .await;
}

#[tokio::test]
async fn host_nodes_survive_repeated_patches() {
    let (runtime, root) = runtime();
    let tree = |text: &str| {
        h(
            "div",
            Props::new().with("id", "panel"),
            children![h("span", Props::new(), children![text])],
        )
    };

    let a = tree("a");
    runtime.patch(&root, Some(&a), None).await;
    let span = a.children()[0].host().unwrap();
    runtime.document().reset_stats();

    let b = tree("b");
    runtime.patch(&root, Some(&b), Some(&a)).await;
    let c = tree("c");
    runtime.patch(&root, Some(&c), Some(&b)).await;

    assert!(c.children()[0].host().unwrap().same(&span));
    assert_eq!(span.text(), "c");
    let stats = runtime.document().stats();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.text_updates, 2);
    assert_eq!(stats.attribute_writes, 0);
}

#[tokio::test]
async fn changing_the_tag_replaces_the_node() {
    let (runtime, root) = runtime();
    let a = h("div", Props::new(), children!["x"]);
    runtime.patch(&root, Some(&a), None).await;
    runtime.document().reset_stats();

    let b = h("section", Props::new(), children!["x"]);
    runtime.patch(&root, Some(&b), Some(&a)).await;

    assert_eq!(runtime.document().stats().replaced, 1);
    assert_eq!(root.inner_html(), "<section>x</section>");
    assert!(a.host().is_none());
}

#[tokio::test]
async fn fragments_patch_their_children_in_place() {
    let (runtime, root) = runtime();
    let a = trellis_core::fragment(children!["one", h("b", Props::new(), children!["two"])]);
    runtime.patch(&root, Some(&a), None).await;
    assert_eq!(root.inner_html(), "one<b>two</b>");
    runtime.document().reset_stats();

    let b = trellis_core::fragment(children!["uno", h("b", Props::new(), children!["two"])]);
    runtime.patch(&root, Some(&b), Some(&a)).await;

    assert_eq!(root.inner_html(), "uno<b>two</b>");
    assert_eq!(runtime.document().stats().created, 0);
}

// ----------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------

#[tokio::test]
async fn script_injection_is_refused() {
    let (runtime, root) = runtime();
    let tree = h(
        "div",
        Props::new()
            .with("innerHTML", "<img src=x onerror=alert(1)>")
            .with("title", "\"><script>"),
        children![
            h(
                "a",
                Props::new().with("href", " javascript:alert(1)"),
                children!["bad"]
            ),
            h("a", Props::new().with("href", "/safe"), children!["good"]),
            "<script>alert(1)</script>",
        ],
    );
    runtime.patch(&root, Some(&tree), None).await;

    let html = root.inner_html();
    assert!(!html.contains("<img"));
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;"));

    let links = root.find_all_by_tag("a");
    assert_eq!(links[0].attribute("href"), None);
    assert_eq!(links[1].attribute("href").as_deref(), Some("/safe"));
    assert_eq!(root.find_by_tag("div").unwrap().attribute("innerHTML"), None);
}

#[tokio::test]
async fn attributes_follow_their_kind_rules() {
    let (runtime, root) = runtime();
    let a = h(
        "input",
        Props::new()
            .with("disabled", true)
            .with("value", "hello")
            .with("data-state", "open")
            .with("aria-hidden", false)
            .with("style", PropValue::style([("color", "red"), ("margin", "0")])),
        children![],
    );
    runtime.patch(&root, Some(&a), None).await;

    let input = root.find_by_tag("input").unwrap();
    assert_eq!(input.attribute("disabled").as_deref(), Some(""));
    assert_eq!(
        input.property("value"),
        Some(trellis_core::host::HostValue::Text("hello".into()))
    );
    assert_eq!(input.attribute("data-state").as_deref(), Some("open"));
    assert_eq!(input.attribute("aria-hidden"), None);
    assert_eq!(input.style("color").as_deref(), Some("red"));

    let b = h(
        "input",
        Props::new()
            .with("disabled", false)
            .with("style", PropValue::style([("color", "blue")])),
        children![],
    );
    runtime.patch(&root, Some(&b), Some(&a)).await;

    assert_eq!(input.attribute("disabled"), None);
    assert_eq!(input.property("value"), None);
    assert_eq!(input.attribute("data-state"), None);
    assert_eq!(input.style("color").as_deref(), Some("blue"));
    assert_eq!(input.style("margin"), None);
}

#[tokio::test]
async fn class_signals_update_without_rerender() {
    let (runtime, root) = runtime();
    let class = Signal::new("idle".to_string());
    let tree = h("div", Props::new().with("class", class.clone()), children![]);
    runtime.patch(&root, Some(&tree), None).await;

    let div = root.find_by_tag("div").unwrap();
    assert_eq!(div.attribute("class").as_deref(), Some("idle"));
    assert_eq!(runtime.class_binding_count(), 1);

    class.set("busy".to_string());
    assert_eq!(div.attribute("class").as_deref(), Some("busy"));

    runtime.patch(&root, None, Some(&tree)).await;
    assert_eq!(runtime.class_binding_count(), 0);
    assert_eq!(class.subscriber_count(), 0);
}

// ----------------------------------------------------------------------
// Scheduling
// ----------------------------------------------------------------------

#[tokio::test]
async fn writes_in_one_stack_coalesce_into_one_render() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            let store = Rc::new(Signal::new(0));
            let renders = Rc::new(Cell::new(0usize));
            runtime.mount(
                STORE_VIEW,
                &root,
                Props::new()
                    .with("store", shared(store.clone()))
                    .with("renders", shared(renders.clone())),
            );
            assert_eq!(renders.get(), 1);

            store.set(1);
            store.set(2);
            store.set(3);
            assert!(!runtime.is_idle());
            runtime.settle().await;

            assert_eq!(renders.get(), 2);
            assert_eq!(root.text(), "3");
        })
        .await;
}

#[tokio::test]
async fn parents_render_before_children_and_children_once() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            let store = Rc::new(Signal::new(0));
            let renders = Rc::new(Cell::new(0usize));
            runtime.mount(
                STORE_PARENT,
                &root,
                Props::new()
                    .with("store", shared(store.clone()))
                    .with("renders", shared(renders.clone())),
            );
            assert_eq!(renders.get(), 1);

            store.set(7);
            runtime.settle().await;

            // The parent's re-render patched the child; the child's own
            // queued re-render was skipped.
            assert_eq!(renders.get(), 2);
            let section = root.find_by_tag("section").unwrap();
            assert_eq!(section.attribute("data-value").as_deref(), Some("7"));
            assert_eq!(section.text(), "7");
        })
        .await;
}

#[tokio::test]
async fn memo_write_during_render_is_not_lost() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            let store = Rc::new(Signal::new(0));
            let memo = Rc::new(Memo::new({
                let store = store.clone();
                move || store.get()
            }));
            let renders = Rc::new(Cell::new(0usize));
            runtime.mount(
                MEMO_VIEW,
                &root,
                Props::new()
                    .with("store", shared(store.clone()))
                    .with("memo", shared(memo.clone()))
                    .with("renders", shared(renders.clone())),
            );
            assert_eq!(root.text(), "0");

            // The render that sees 1 writes 2; that write lands after it.
            store.set(1);
            runtime.settle().await;
            assert_eq!(store.get_untracked(), 2);
            assert_eq!(root.text(), "2");
            assert_eq!(renders.get(), 3);

            store.set(3);
            runtime.settle().await;
            assert_eq!(root.text(), "3");

            store.set(4);
            runtime.settle().await;
            assert_eq!(root.text(), "4");
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn deferred_component_replaces_its_placeholder_once() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            runtime.mount(SLOW, &root, Props::new());
            assert_eq!(root.text(), "Loading...");
            runtime.document().reset_stats();

            runtime.settle().await;

            assert_eq!(root.inner_html(), "<p>ready</p>");
            assert_eq!(runtime.document().stats().replaced, 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn rejected_deferred_component_renders_error_in_place() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            let surface = Rc::new(RecordingSurface::default());
            runtime.set_error_surface(surface.clone());

            runtime.mount(REJECTING_PANEL, &root, Props::new());
            assert_eq!(root.inner_html(), "<main>Loading...<p>sib</p></main>");
            let sibling = root.find_by_tag("p").unwrap();
            runtime.document().reset_stats();

            runtime.settle().await;

            assert_eq!(
                root.inner_html(),
                r#"<main><div class="render-error" role="alert">fetch failed</div><p>sib</p></main>"#
            );
            assert!(root.find_by_tag("p").unwrap().same(&sibling));
            assert_eq!(runtime.document().stats().replaced, 1);
            assert_eq!(*surface.errors.borrow(), vec!["fetch failed".to_string()]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn unmounted_deferred_component_discards_its_result() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            runtime.mount(SLOW, &root, Props::new());
            runtime.unmount(&root);

            runtime.settle().await;

            assert_eq!(root.child_count(), 0);
            assert_eq!(runtime.context_count(), 0);
        })
        .await;
}

// ----------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------

#[test]
fn hooks_outside_components_fail() {
    assert!(matches!(
        use_state(0),
        Err(HookError::OutsideComponent { hook: "use_state" })
    ));
}

#[tokio::test]
async fn hook_order_violation_renders_error_node() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            let surface = Rc::new(RecordingSurface::default());
            runtime.set_error_surface(surface.clone());
            let flip = Rc::new(Signal::new(false));
            runtime.mount(UNSTABLE, &root, Props::new().with("flip", shared(flip.clone())));
            assert_eq!(root.text(), "ok");

            flip.set(true);
            runtime.settle().await;

            let alert = root.find_by_tag("div").unwrap();
            assert_eq!(alert.attribute("class").as_deref(), Some("render-error"));
            assert_eq!(alert.attribute("role").as_deref(), Some("alert"));
            assert!(alert.text().contains("use_ref"));
            assert_eq!(surface.errors.borrow().len(), 1);
        })
        .await;
}

#[tokio::test]
async fn failing_component_is_contained() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            let surface = Rc::new(RecordingSurface::default());
            runtime.set_error_surface(surface.clone());

            let tree = h(
                "main",
                Props::new(),
                children![
                    h(FAILING, Props::new(), children![]),
                    h("p", Props::new(), children!["sibling"]),
                ],
            );
            runtime.patch(&root, Some(&tree), None).await;

            assert_eq!(
                root.inner_html(),
                r#"<main><div class="render-error" role="alert">backend unavailable</div><p>sibling</p></main>"#
            );
            assert_eq!(*surface.errors.borrow(), vec!["backend unavailable".to_string()]);
        })
        .await;
}

#[tokio::test]
async fn successful_mount_clears_the_error_surface() {
    LocalSet::new()
        .run_until(async {
            let (runtime, root) = runtime();
            let surface = Rc::new(RecordingSurface::default());
            runtime.set_error_surface(surface.clone());

            runtime.mount(FAILING, &root, Props::new());
            assert_eq!(surface.clears.get(), 0);

            runtime.mount(COUNTER, &root, Props::new());
            assert_eq!(surface.clears.get(), 1);
            assert!(root.find_by_tag("button").is_some());
        })
        .await;
}
