//! # State nodes
//!
//! A built form is a tree of [`StateNode`]s mirroring its schema:
//!
//! - [`FormControl`] — leaf holding one [`FormValue`] plus its validators.
//! - [`FormGroup`] — named children, aggregate value is a `Map`.
//! - [`FormArray`] — ordered children, aggregate value is a `List`.
//!
//! All three are cheap `Rc` handles; cloning shares the node.
//!
//! ## Invariants
//!
//! 1. The shape is fixed at construction. Mutations replace leaf values, they
//!    never add, remove, or swap children.
//! 2. A leaf's errors are `None` iff every validator passes on its current
//!    value. They are recomputed on every value change.
//! 3. Composite validity, errors, and dirtiness are folds over the children,
//!    computed on read, so they can never be stale.
//! 4. `touched` is a per-node flag. Marking a composite touched marks its
//!    whole subtree; a touched child does not make its parent touched.
//! 5. Every mutation notifies each changed node (children before parents)
//!    and then every ancestor of the mutated node, once each, after the whole
//!    mutation has been applied.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::effects::Subscription;
use crate::error::ValueError;
use crate::signal::Signal;
use crate::validation::{ValidationErrors, Validator, run_validators};
use crate::value::FormValue;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        const TOUCHED = 1 << 0;
        const DIRTY = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Valid,
    Invalid,
}

struct NodeCore {
    flags: Cell<NodeFlags>,
    parent: RefCell<Option<ParentRef>>,
    /// Bumped once per notification; subscribers hang off this signal.
    version: Signal<u64>,
}

impl NodeCore {
    fn new() -> Self {
        Self {
            flags: Cell::new(NodeFlags::empty()),
            parent: RefCell::new(None),
            version: Signal::new(0),
        }
    }

    fn has(&self, flag: NodeFlags) -> bool {
        self.flags.get().contains(flag)
    }

    /// Returns whether the flags actually changed.
    fn set_flag(&self, flag: NodeFlags, on: bool) -> bool {
        let before = self.flags.get();
        let mut after = before;
        after.set(flag, on);
        self.flags.set(after);
        before != after
    }

    fn set_parent(&self, parent: ParentRef) {
        *self.parent.borrow_mut() = Some(parent);
    }

    fn bump(&self) {
        self.version.update(|v| *v = v.wrapping_add(1));
    }
}

enum ParentRef {
    Group(Weak<GroupInner>),
    Array(Weak<ArrayInner>),
}

impl ParentRef {
    fn upgrade(&self) -> Option<StateNode> {
        match self {
            ParentRef::Group(w) => w.upgrade().map(|inner| StateNode::Group(FormGroup(inner))),
            ParentRef::Array(w) => w.upgrade().map(|inner| StateNode::Array(FormArray(inner))),
        }
    }
}

enum WeakNode {
    Control(Weak<ControlInner>),
    Group(Weak<GroupInner>),
    Array(Weak<ArrayInner>),
}

impl WeakNode {
    fn upgrade(&self) -> Option<StateNode> {
        match self {
            WeakNode::Control(w) => w.upgrade().map(|i| StateNode::Control(FormControl(i))),
            WeakNode::Group(w) => w.upgrade().map(|i| StateNode::Group(FormGroup(i))),
            WeakNode::Array(w) => w.upgrade().map(|i| StateNode::Array(FormArray(i))),
        }
    }
}

/// Leaf node: one value, its validators, and their current verdict.
#[derive(Clone)]
pub struct FormControl(Rc<ControlInner>);

struct ControlInner {
    core: NodeCore,
    initial: FormValue,
    value: RefCell<FormValue>,
    validators: Vec<Validator>,
    errors: RefCell<Option<ValidationErrors>>,
}

impl FormControl {
    /// Validators run once here, so a fresh control already carries its
    /// initial errors.
    pub fn new(initial: impl Into<FormValue>, validators: impl IntoIterator<Item = Validator>) -> Self {
        let initial = initial.into();
        let validators: Vec<Validator> = validators.into_iter().collect();
        let errors = run_validators(&validators, &initial);
        Self(Rc::new(ControlInner {
            core: NodeCore::new(),
            value: RefCell::new(initial.clone()),
            initial,
            validators,
            errors: RefCell::new(errors),
        }))
    }

    pub fn value(&self) -> FormValue {
        self.0.value.borrow().clone()
    }

    pub fn with_value<R>(&self, f: impl FnOnce(&FormValue) -> R) -> R {
        f(&self.0.value.borrow())
    }

    pub fn value_as<T>(&self) -> Result<T, ValueError>
    where
        T: TryFrom<FormValue, Error = ValueError>,
    {
        T::try_from(self.value())
    }

    pub fn initial_value(&self) -> &FormValue {
        &self.0.initial
    }

    pub fn has_error(&self, rule: &str) -> bool {
        self.0
            .errors
            .borrow()
            .as_ref()
            .is_some_and(|e| e.contains_key(rule))
    }

    pub fn validators(&self) -> &[Validator] {
        &self.0.validators
    }

    /// Replace the value, revalidate, mark dirty, and notify.
    ///
    /// Setting the value it already holds is a no-op.
    pub fn set_value(&self, value: impl Into<FormValue>) {
        self.node().patch_value(value);
    }

    /// Re-run the validators against the current value, e.g. after a
    /// validator's external inputs changed. Notifies only if the verdict
    /// changed.
    pub fn revalidate(&self) {
        if self.recompute_errors() {
            let node = self.node();
            node.deliver(vec![node.clone()]);
        }
    }

    fn recompute_errors(&self) -> bool {
        let errors = {
            let value = self.0.value.borrow();
            run_validators(&self.0.validators, &value)
        };
        let changed = *self.0.errors.borrow() != errors;
        *self.0.errors.borrow_mut() = errors;
        changed
    }

    fn assign(&self, value: FormValue, mark_dirty: bool) -> bool {
        if *self.0.value.borrow() == value {
            return false;
        }
        *self.0.value.borrow_mut() = value;
        self.recompute_errors();
        if mark_dirty {
            self.0.core.set_flag(NodeFlags::DIRTY, true);
        }
        true
    }
}

/// Named composite. Iteration follows schema insertion order; lookup is by
/// name.
#[derive(Clone)]
pub struct FormGroup(Rc<GroupInner>);

struct GroupInner {
    core: NodeCore,
    children: IndexMap<String, StateNode>,
}

impl FormGroup {
    /// A later child with an already-used name replaces the earlier one.
    pub fn new<K: Into<String>>(children: impl IntoIterator<Item = (K, StateNode)>) -> Self {
        let children: IndexMap<String, StateNode> =
            children.into_iter().map(|(k, c)| (k.into(), c)).collect();
        let inner = Rc::new(GroupInner {
            core: NodeCore::new(),
            children,
        });
        for child in inner.children.values() {
            child.core().set_parent(ParentRef::Group(Rc::downgrade(&inner)));
        }
        Self(inner)
    }

    pub fn get(&self, name: &str) -> Option<StateNode> {
        self.0.children.get(name).cloned()
    }

    pub fn control(&self, name: &str) -> Option<FormControl> {
        self.0.children.get(name).and_then(StateNode::as_control).cloned()
    }

    pub fn group(&self, name: &str) -> Option<FormGroup> {
        self.0.children.get(name).and_then(StateNode::as_group).cloned()
    }

    pub fn array(&self, name: &str) -> Option<FormArray> {
        self.0.children.get(name).and_then(StateNode::as_array).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.children.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.children.keys().map(String::as_str)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &StateNode)> {
        self.0.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.children.is_empty()
    }
}

/// Ordered composite, index-addressed.
#[derive(Clone)]
pub struct FormArray(Rc<ArrayInner>);

struct ArrayInner {
    core: NodeCore,
    items: Vec<StateNode>,
}

impl FormArray {
    pub fn new(items: impl IntoIterator<Item = StateNode>) -> Self {
        let inner = Rc::new(ArrayInner {
            core: NodeCore::new(),
            items: items.into_iter().collect(),
        });
        for item in &inner.items {
            item.core().set_parent(ParentRef::Array(Rc::downgrade(&inner)));
        }
        Self(inner)
    }

    pub fn at(&self, index: usize) -> Option<StateNode> {
        self.0.items.get(index).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateNode> {
        self.0.items.iter()
    }

    pub fn len(&self) -> usize {
        self.0.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.is_empty()
    }
}

/// Any node of a built form.
#[derive(Clone)]
pub enum StateNode {
    Control(FormControl),
    Group(FormGroup),
    Array(FormArray),
}

impl StateNode {
    fn core(&self) -> &NodeCore {
        match self {
            StateNode::Control(c) => &c.0.core,
            StateNode::Group(g) => &g.0.core,
            StateNode::Array(a) => &a.0.core,
        }
    }

    fn downgrade(&self) -> WeakNode {
        match self {
            StateNode::Control(c) => WeakNode::Control(Rc::downgrade(&c.0)),
            StateNode::Group(g) => WeakNode::Group(Rc::downgrade(&g.0)),
            StateNode::Array(a) => WeakNode::Array(Rc::downgrade(&a.0)),
        }
    }

    fn for_each_child(&self, mut f: impl FnMut(&StateNode)) {
        match self {
            StateNode::Control(_) => {}
            StateNode::Group(g) => g.0.children.values().for_each(&mut f),
            StateNode::Array(a) => a.0.items.iter().for_each(&mut f),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StateNode::Control(_) => "control",
            StateNode::Group(_) => "group",
            StateNode::Array(_) => "array",
        }
    }

    pub fn as_control(&self) -> Option<&FormControl> {
        match self {
            StateNode::Control(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&FormGroup> {
        match self {
            StateNode::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&FormArray> {
        match self {
            StateNode::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &StateNode) -> bool {
        match (self, other) {
            (StateNode::Control(a), StateNode::Control(b)) => Rc::ptr_eq(&a.0, &b.0),
            (StateNode::Group(a), StateNode::Group(b)) => Rc::ptr_eq(&a.0, &b.0),
            (StateNode::Array(a), StateNode::Array(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }

    pub fn value(&self) -> FormValue {
        match self {
            StateNode::Control(c) => c.value(),
            StateNode::Group(g) => FormValue::Map(
                g.0.children
                    .iter()
                    .map(|(k, c)| (k.clone(), c.value()))
                    .collect(),
            ),
            StateNode::Array(a) => FormValue::List(a.0.items.iter().map(StateNode::value).collect()),
        }
    }

    /// Leaf: the merged validator report. Composite: failing children keyed
    /// by name (or index), each mapped to its own errors.
    pub fn errors(&self) -> Option<ValidationErrors> {
        match self {
            StateNode::Control(c) => c.0.errors.borrow().clone(),
            StateNode::Group(g) => {
                collect_errors(g.0.children.iter().map(|(k, c)| (k.clone(), c)))
            }
            StateNode::Array(a) => {
                collect_errors(a.0.items.iter().enumerate().map(|(i, c)| (i.to_string(), c)))
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            StateNode::Control(c) => c.0.errors.borrow().is_none(),
            StateNode::Group(g) => g.0.children.values().all(StateNode::is_valid),
            StateNode::Array(a) => a.0.items.iter().all(StateNode::is_valid),
        }
    }

    pub fn status(&self) -> NodeStatus {
        if self.is_valid() {
            NodeStatus::Valid
        } else {
            NodeStatus::Invalid
        }
    }

    pub fn touched(&self) -> bool {
        self.core().has(NodeFlags::TOUCHED)
    }

    /// Own dirty flag, or any dirty descendant.
    pub fn dirty(&self) -> bool {
        if self.core().has(NodeFlags::DIRTY) {
            return true;
        }
        match self {
            StateNode::Control(_) => false,
            StateNode::Group(g) => g.0.children.values().any(StateNode::dirty),
            StateNode::Array(a) => a.0.items.iter().any(StateNode::dirty),
        }
    }

    /// This node's own flags, without folding in descendants.
    pub fn flags(&self) -> NodeFlags {
        self.core().flags.get()
    }

    /// Notification counter; advances once per delivered change.
    pub fn version(&self) -> u64 {
        self.core().version.get()
    }

    pub fn parent(&self) -> Option<StateNode> {
        self.core().parent.borrow().as_ref().and_then(ParentRef::upgrade)
    }

    pub fn root(&self) -> StateNode {
        let mut node = self.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            StateNode::Control(_) => 1,
            _ => {
                let mut n = 0;
                self.for_each_child(|c| n += c.leaf_count());
                n
            }
        }
    }

    /// Dotted path lookup, e.g. `"address.street"` or `"items.0.name"`.
    /// The empty path is the node itself.
    pub fn find(&self, path: &str) -> Option<StateNode> {
        let segments: SmallVec<[&str; 8]> = path.split('.').filter(|s| !s.is_empty()).collect();
        let mut node = self.clone();
        for segment in segments {
            node = match &node {
                StateNode::Group(g) => g.get(segment)?,
                StateNode::Array(a) => a.at(segment.parse().ok()?)?,
                StateNode::Control(_) => return None,
            };
        }
        Some(node)
    }

    /// Apply a (partial) value atomically.
    ///
    /// Leaves take the value as is; groups take a `Map` and patch only the
    /// named children; arrays take a `List` and patch by position. Unknown
    /// names, surplus items, and kind mismatches are logged and skipped. All
    /// leaves are updated before any subscriber hears about it.
    pub fn patch_value(&self, value: impl Into<FormValue>) {
        let mut changed = Vec::new();
        self.apply(value.into(), &mut changed);
        self.deliver(changed);
    }

    /// Restore initial values and clear touched/dirty across the subtree.
    pub fn reset(&self) {
        let mut changed = Vec::new();
        self.reset_inner(&mut changed);
        self.deliver(changed);
    }

    pub fn mark_as_touched(&self) {
        self.set_flag_recursive(NodeFlags::TOUCHED, true);
    }

    pub fn mark_as_untouched(&self) {
        self.set_flag_recursive(NodeFlags::TOUCHED, false);
    }

    pub fn mark_as_dirty(&self) {
        if self.core().set_flag(NodeFlags::DIRTY, true) {
            self.deliver(vec![self.clone()]);
        }
    }

    pub fn mark_as_pristine(&self) {
        self.set_flag_recursive(NodeFlags::DIRTY, false);
    }

    /// Call `f` after every change to this node or anything below it.
    pub fn subscribe(&self, f: impl Fn(&StateNode) + 'static) -> Subscription {
        let weak = self.downgrade();
        let version = self.core().version.clone();
        let id = version.subscribe(move |_| {
            if let Some(node) = weak.upgrade() {
                f(&node)
            }
        });
        Subscription::new(move || {
            version.unsubscribe(id);
        })
    }

    fn apply(&self, value: FormValue, changed: &mut Vec<StateNode>) -> bool {
        let did_change = match self {
            StateNode::Control(c) => c.assign(value, true),
            StateNode::Group(g) => match value {
                FormValue::Map(entries) => {
                    let mut any = false;
                    for (name, v) in entries {
                        match g.0.children.get(&name) {
                            Some(child) => any |= child.apply(v, changed),
                            None => log::warn!("patch: group has no child `{name}`; ignored"),
                        }
                    }
                    any
                }
                other => {
                    log::warn!("patch: group expects a map, got {}; ignored", other.kind());
                    false
                }
            },
            StateNode::Array(a) => match value {
                FormValue::List(items) => {
                    if items.len() > a.len() {
                        log::warn!(
                            "patch: {} items for an array of {}; surplus ignored",
                            items.len(),
                            a.len()
                        );
                    }
                    let mut any = false;
                    for (child, v) in a.0.items.iter().zip(items) {
                        any |= child.apply(v, changed);
                    }
                    any
                }
                other => {
                    log::warn!("patch: array expects a list, got {}; ignored", other.kind());
                    false
                }
            },
        };
        if did_change {
            changed.push(self.clone());
        }
        did_change
    }

    fn reset_inner(&self, changed: &mut Vec<StateNode>) -> bool {
        let mut any = self.core().set_flag(NodeFlags::all(), false);
        match self {
            StateNode::Control(c) => any |= c.assign(c.0.initial.clone(), false),
            _ => self.for_each_child(|child| any |= child.reset_inner(changed)),
        }
        if any {
            changed.push(self.clone());
        }
        any
    }

    fn set_flag_recursive(&self, flag: NodeFlags, on: bool) {
        fn walk(node: &StateNode, flag: NodeFlags, on: bool, changed: &mut Vec<StateNode>) -> bool {
            let mut any = false;
            node.for_each_child(|child| any |= walk(child, flag, on, changed));
            any |= node.core().set_flag(flag, on);
            if any {
                changed.push(node.clone());
            }
            any
        }

        let mut changed = Vec::new();
        walk(self, flag, on, &mut changed);
        self.deliver(changed);
    }

    /// Notify `changed` (already ordered children-first), then every
    /// ancestor of `self`.
    fn deliver(&self, changed: Vec<StateNode>) {
        if changed.is_empty() {
            return;
        }
        for node in &changed {
            node.core().bump();
        }
        let mut ancestor = self.parent();
        while let Some(node) = ancestor {
            node.core().bump();
            ancestor = node.parent();
        }
    }
}

fn collect_errors<'a>(
    children: impl Iterator<Item = (String, &'a StateNode)>,
) -> Option<ValidationErrors> {
    let out: ValidationErrors = children
        .filter_map(|(k, c)| c.errors().map(|e| (k, FormValue::Map(e))))
        .collect();
    (!out.is_empty()).then_some(out)
}

macro_rules! node_handle {
    ($ty:ident, $variant:ident) => {
        impl $ty {
            pub fn node(&self) -> StateNode {
                StateNode::$variant(self.clone())
            }

            pub fn ptr_eq(&self, other: &Self) -> bool {
                Rc::ptr_eq(&self.0, &other.0)
            }

            pub fn errors(&self) -> Option<ValidationErrors> {
                self.node().errors()
            }

            pub fn is_valid(&self) -> bool {
                self.node().is_valid()
            }

            pub fn status(&self) -> NodeStatus {
                self.node().status()
            }

            pub fn touched(&self) -> bool {
                self.0.core.has(NodeFlags::TOUCHED)
            }

            pub fn dirty(&self) -> bool {
                self.node().dirty()
            }

            pub fn version(&self) -> u64 {
                self.0.core.version.get()
            }

            pub fn parent(&self) -> Option<StateNode> {
                self.node().parent()
            }

            pub fn patch_value(&self, value: impl Into<FormValue>) {
                self.node().patch_value(value)
            }

            pub fn reset(&self) {
                self.node().reset()
            }

            pub fn mark_as_touched(&self) {
                self.node().mark_as_touched()
            }

            pub fn mark_as_untouched(&self) {
                self.node().mark_as_untouched()
            }

            pub fn mark_as_dirty(&self) {
                self.node().mark_as_dirty()
            }

            pub fn mark_as_pristine(&self) {
                self.node().mark_as_pristine()
            }

            pub fn subscribe(&self, f: impl Fn(&StateNode) + 'static) -> Subscription {
                self.node().subscribe(f)
            }
        }

        impl From<$ty> for StateNode {
            fn from(n: $ty) -> Self {
                StateNode::$variant(n)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&self.node(), f)
            }
        }
    };
}

node_handle!(FormControl, Control);
node_handle!(FormGroup, Group);
node_handle!(FormArray, Array);

impl FormGroup {
    pub fn value(&self) -> FormValue {
        self.node().value()
    }

    pub fn find(&self, path: &str) -> Option<StateNode> {
        self.node().find(path)
    }
}

impl FormArray {
    pub fn value(&self) -> FormValue {
        self.node().value()
    }

    pub fn find(&self, path: &str) -> Option<StateNode> {
        self.node().find(path)
    }
}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateNode::Control(_) => "FormControl",
            StateNode::Group(_) => "FormGroup",
            StateNode::Array(_) => "FormArray",
        };
        let value = self.value();
        f.debug_struct(name)
            .field("value", &format_args!("{value}"))
            .field("status", &self.status())
            .field("touched", &self.touched())
            .field("dirty", &self.dirty())
            .finish()
    }
}
