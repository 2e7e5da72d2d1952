//! Hooks
//!
//! Per-instance state for component bodies. Every hook claims the next slot
//! of the component that is currently rendering and fails with
//! [`HookError::OutsideComponent`] when none is.
//!
//! ```rust,ignore
//! fn counter(_: &Props) -> RenderResult {
//!     let count = use_state(0)?;
//!     let click = count.clone();
//!     Ok(h(
//!         "button",
//!         Props::new().on("click", move |_| click.update(|n| n + 1)),
//!         children![count.get()],
//!     ))
//! }
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::context::{ComponentContext, HookSlot, PendingEffect};
use crate::error::HookError;
use crate::reactive::{current_component, Memo, Signal};

/// Undo function returned by an effect.
pub type Cleanup = Box<dyn FnOnce()>;

fn active(hook: &'static str) -> Result<Rc<ComponentContext>, HookError> {
    current_component().ok_or(HookError::OutsideComponent { hook })
}

// ----------------------------------------------------------------------
// use_state
// ----------------------------------------------------------------------

struct StateSlot<T: Clone + PartialEq + 'static>(Signal<T>);

impl<T: Clone + PartialEq + 'static> HookSlot for StateSlot<T> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn teardown(&mut self) {
        self.0.destroy();
    }
}

/// A signal owned by this instance, created from `initial` on first render.
///
/// Reading it during render subscribes the component; writing it schedules
/// a re-render. The signal is destroyed when the instance unmounts.
pub fn use_state<T>(initial: T) -> Result<Signal<T>, HookError>
where
    T: Clone + PartialEq + 'static,
{
    let context = active("use_state")?;
    let index = context.next_slot();
    if let Some(signal) = context.with_slot(index, "use_state", |slot: &mut StateSlot<T>| {
        slot.0.clone()
    })? {
        return Ok(signal);
    }
    let signal = Signal::new(initial);
    context.push_slot(index, Box::new(StateSlot(signal.clone())));
    Ok(signal)
}

// ----------------------------------------------------------------------
// use_derived
// ----------------------------------------------------------------------

struct DerivedSlot<T: Clone + 'static>(Memo<T>);

impl<T: Clone + 'static> HookSlot for DerivedSlot<T> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn teardown(&mut self) {
        self.0.destroy();
    }
}

/// A memo owned by this instance. `compute` is captured on first render
/// only; later renders return the same memo.
pub fn use_derived<T, F>(compute: F) -> Result<Memo<T>, HookError>
where
    T: Clone + 'static,
    F: Fn() -> T + 'static,
{
    let context = active("use_derived")?;
    let index = context.next_slot();
    if let Some(memo) = context.with_slot(index, "use_derived", |slot: &mut DerivedSlot<T>| {
        slot.0.clone()
    })? {
        return Ok(memo);
    }
    let memo = Memo::new(compute);
    context.push_slot(index, Box::new(DerivedSlot(memo.clone())));
    Ok(memo)
}

// ----------------------------------------------------------------------
// use_effect
// ----------------------------------------------------------------------

struct EffectSlot<D: 'static> {
    deps: D,
    cleanup: Option<Cleanup>,
}

impl<D: 'static> HookSlot for EffectSlot<D> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn take_cleanup(&mut self) -> Option<Cleanup> {
        self.cleanup.take()
    }

    fn set_cleanup(&mut self, cleanup: Cleanup) {
        self.cleanup = Some(cleanup);
    }
}

/// Run `effect` after the commit whenever `deps` differs from the previous
/// render, and on the first render.
///
/// The cleanup it returns runs before the next run and on unmount.
pub fn use_effect<D, F>(deps: D, effect: F) -> Result<(), HookError>
where
    D: PartialEq + 'static,
    F: FnOnce() -> Option<Cleanup> + 'static,
{
    let context = active("use_effect")?;
    let index = context.next_slot();
    let mut deps = Some(deps);
    let changed = context.with_slot(index, "use_effect", |slot: &mut EffectSlot<D>| {
        match deps.take() {
            Some(next) if slot.deps != next => {
                slot.deps = next;
                true
            }
            _ => false,
        }
    })?;

    match (changed, deps) {
        (Some(false), _) => return Ok(()),
        (None, Some(deps)) => context.push_slot(index, Box::new(EffectSlot { deps, cleanup: None })),
        _ => {}
    }
    context.queue_effect(PendingEffect {
        slot: index,
        run: Box::new(effect),
    });
    Ok(())
}

// ----------------------------------------------------------------------
// use_memo / use_callback
// ----------------------------------------------------------------------

struct CachedSlot<T: 'static, D: 'static> {
    deps: D,
    value: T,
}

impl<T: 'static, D: 'static> HookSlot for CachedSlot<T, D> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Look up the cached value for `deps`, or compute and store a new one.
fn cached<T, D>(
    hook: &'static str,
    deps: D,
    compute: impl FnOnce() -> T,
) -> Result<T, HookError>
where
    T: Clone + 'static,
    D: PartialEq + 'static,
{
    let context = active(hook)?;
    let index = context.next_slot();
    let mut deps = Some(deps);
    let hit = context.with_slot(index, hook, |slot: &mut CachedSlot<T, D>| {
        let next = deps.take()?;
        if slot.deps == next {
            Some(slot.value.clone())
        } else {
            deps = Some(next);
            None
        }
    })?;

    match (hit, deps) {
        (Some(Some(value)), _) => Ok(value),
        (Some(None), Some(deps)) => {
            let value = compute();
            context.with_slot(index, hook, |slot: &mut CachedSlot<T, D>| {
                slot.deps = deps;
                slot.value = value.clone();
            })?;
            Ok(value)
        }
        (_, deps) => {
            let value = compute();
            if let Some(deps) = deps {
                context.push_slot(
                    index,
                    Box::new(CachedSlot {
                        deps,
                        value: value.clone(),
                    }),
                );
            }
            Ok(value)
        }
    }
}

/// A value recomputed only when `deps` changes.
pub fn use_memo<T, D, F>(deps: D, compute: F) -> Result<T, HookError>
where
    T: Clone + 'static,
    D: PartialEq + 'static,
    F: FnOnce() -> T,
{
    cached("use_memo", deps, compute)
}

/// A stable handle to `callback`, replaced only when `deps` changes.
pub fn use_callback<F, D>(deps: D, callback: F) -> Result<Rc<F>, HookError>
where
    F: 'static,
    D: PartialEq + 'static,
{
    cached("use_callback", deps, || Rc::new(callback))
}

// ----------------------------------------------------------------------
// use_ref
// ----------------------------------------------------------------------

/// A mutable box that survives re-renders without triggering them.
pub struct HookRef<T>(Rc<RefCell<T>>);

impl<T> HookRef<T> {
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    pub fn replace(&self, value: T) -> T {
        self.0.replace(value)
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl<T> Clone for HookRef<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: fmt::Debug> fmt::Debug for HookRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HookRef").field(&self.0.borrow()).finish()
    }
}

struct RefSlot<T: 'static>(HookRef<T>);

impl<T: 'static> HookSlot for RefSlot<T> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A [`HookRef`] initialized with `initial` on first render.
pub fn use_ref<T: 'static>(initial: T) -> Result<HookRef<T>, HookError> {
    let context = active("use_ref")?;
    let index = context.next_slot();
    if let Some(handle) = context.with_slot(index, "use_ref", |slot: &mut RefSlot<T>| slot.0.clone())? {
        return Ok(handle);
    }
    let handle = HookRef(Rc::new(RefCell::new(initial)));
    context.push_slot(index, Box::new(RefSlot(handle.clone())));
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, RenderResult};
    use crate::error::RenderError;
    use crate::reactive::{Observer, TrackingScope};
    use crate::vdom::{construct, Props, VNode};
    use crate::children;

    fn render_with<R>(context: &Rc<ComponentContext>, f: impl FnOnce() -> R) -> R {
        context.begin_pass();
        let scope = TrackingScope::enter(Observer::Component(context.clone()));
        let result = f();
        scope.finish();
        result
    }

    fn empty(_: &Props) -> RenderResult {
        Ok(VNode::text(""))
    }

    fn context() -> (VNode, Rc<ComponentContext>) {
        let component = Component::new("Empty", empty);
        let node = construct(component, Props::new(), children![]);
        let context = ComponentContext::new(std::rc::Weak::new(), component, &node, 0, true);
        (node, context)
    }

    #[test]
    fn hooks_fail_outside_components() {
        assert_eq!(
            use_state(0).unwrap_err(),
            HookError::OutsideComponent { hook: "use_state" }
        );
        assert!(use_ref(0).is_err());
        assert!(use_effect((), || None).is_err());
    }

    #[test]
    fn hooks_fail_inside_derived_computations() {
        let memo = Memo::new(|| use_state(1).is_err());
        assert_eq!(memo.get(), Some(true));
    }

    #[test]
    fn state_survives_renders() {
        let (_node, context) = context();
        let first = render_with(&context, || use_state(1).unwrap());
        first.set(5);
        let second = render_with(&context, || use_state(1).unwrap());

        assert_eq!(first, second);
        assert_eq!(second.get_untracked(), 5);
    }

    #[test]
    fn slot_type_mismatch_is_reported() {
        let (_node, context) = context();
        render_with(&context, || use_state(1).unwrap());
        let err = render_with(&context, || use_ref(1).unwrap_err());
        assert_eq!(err, HookError::SlotMismatch { index: 0, hook: "use_ref" });
    }

    #[test]
    fn memo_recomputes_when_deps_change() {
        let (_node, context) = context();
        let runs = Rc::new(RefCell::new(0));

        for deps in [1, 1, 2] {
            let runs = runs.clone();
            render_with(&context, || {
                use_memo(deps, move || {
                    *runs.borrow_mut() += 1;
                    deps * 10
                })
                .unwrap()
            });
        }
        assert_eq!(*runs.borrow(), 2);
    }

    #[test]
    fn callback_identity_is_stable() {
        let (_node, context) = context();
        let handles: Vec<_> = (0..2)
            .map(|_| render_with(&context, || use_callback("x", || 1).unwrap()))
            .collect();
        assert!(Rc::ptr_eq(&handles[0], &handles[1]));
    }

    #[test]
    fn effects_run_on_dep_change_with_cleanup() {
        let (_node, context) = context();
        let log = Rc::new(RefCell::new(Vec::new()));

        for deps in ["a", "a", "b"] {
            let log = log.clone();
            render_with(&context, || {
                use_effect(deps, move || {
                    log.borrow_mut().push(format!("run {deps}"));
                    let log = log.clone();
                    Some(Box::new(move || log.borrow_mut().push(format!("cleanup {deps}"))) as Cleanup)
                })
                .unwrap()
            });
            context.run_effects();
        }
        context.destroy();

        assert_eq!(
            *log.borrow(),
            vec!["run a", "cleanup a", "run b", "cleanup b"]
        );
    }

    #[test]
    fn destroy_releases_owned_cells() {
        let (_node, context) = context();
        let state = render_with(&context, || use_state(0).unwrap());
        context.destroy();
        context.destroy();
        assert!(state.is_destroyed());
    }

    #[test]
    fn failing_body_returns_its_error() {
        fn misuse(_: &Props) -> RenderResult {
            let _ = use_state(0)?;
            Err(RenderError::msg("unreachable"))
        }
        let component = Component::new("Misuse", misuse);
        let node = construct(component, Props::new(), children![]);
        let context = ComponentContext::new(std::rc::Weak::new(), component, &node, 0, true);
        let err = context.render(&Props::new()).err().unwrap();
        assert_eq!(err, RenderError::msg("unreachable"));
    }
}
