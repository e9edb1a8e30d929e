use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use super::value::Value;

/// Index of a live object in the arena. Indices are stable: a slot is
/// reused only after its object has been swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(u32);

/// A nullable object handle. `None` stands both for the empty list and for
/// the "no value" result of side-effecting forms.
pub type Node = Option<NodeRef>;

struct Slot {
    value: Value,
    marked: bool,
}

#[derive(Default)]
struct Store {
    slots: Vec<Option<Slot>>,
    free: Vec<u32>,
    // Multiset of explicit roots; scopes hold one entry per binding.
    roots: HashMap<NodeRef, usize>,
}

/// Owner of every runtime value. Cheap to clone; all clones share one
/// arena.
#[derive(Clone, Default)]
pub struct Heap {
    store: Rc<RefCell<Store>>,
}

impl Heap {
    pub fn new() -> Heap {
        Heap::default()
    }

    /// Append a value to the arena. The new object is not rooted; the
    /// caller must attach it to a reachable structure before the next
    /// collection.
    pub fn allocate(&self, value: Value) -> NodeRef {
        let mut store = self.store.borrow_mut();
        let slot = Slot {
            value,
            marked: false,
        };
        match store.free.pop() {
            Some(index) => {
                store.slots[index as usize] = Some(slot);
                NodeRef(index)
            }
            None => {
                store.slots.push(Some(slot));
                NodeRef(store.slots.len() as u32 - 1)
            }
        }
    }

    pub fn add_root(&self, node: Node) {
        if let Some(root) = node {
            *self.store.borrow_mut().roots.entry(root).or_insert(0) += 1;
        }
    }

    pub fn remove_root(&self, node: Node) {
        if let Some(root) = node {
            let mut store = self.store.borrow_mut();
            if let Some(count) = store.roots.get_mut(&root) {
                *count -= 1;
                if *count == 0 {
                    store.roots.remove(&root);
                }
            }
        }
    }

    /// Clone the value behind a handle out of the arena.
    pub fn get(&self, node: NodeRef) -> Value {
        let store = self.store.borrow();
        let NodeRef(index) = node;
        let slot = store.slots[index as usize]
            .as_ref()
            .expect("dangling handle");
        slot.value.clone()
    }

    fn with_value<R>(&self, node: Node, f: impl FnOnce(&Value) -> Option<R>) -> Option<R> {
        let store = self.store.borrow();
        let NodeRef(index) = node?;
        let slot = store.slots.get(index as usize)?.as_ref()?;
        f(&slot.value)
    }

    pub fn number(&self, node: Node) -> Option<i64> {
        self.with_value(node, |value| match value {
            Value::Number(n) => Some(*n),
            _ => None,
        })
    }

    pub fn symbol_name(&self, node: Node) -> Option<String> {
        self.with_value(node, |value| match value {
            Value::Symbol(name) => Some(name.clone()),
            _ => None,
        })
    }

    /// The `(car, cdr)` slots when `node` is a pair.
    pub fn pair(&self, node: Node) -> Option<(Node, Node)> {
        self.with_value(node, |value| match value {
            Value::Pair { car, cdr } => Some((*car, *cdr)),
            _ => None,
        })
    }

    pub fn set_car(&self, pair: NodeRef, node: Node) {
        let mut store = self.store.borrow_mut();
        let NodeRef(index) = pair;
        if let Some(Some(slot)) = store.slots.get_mut(index as usize) {
            if let Value::Pair { car, .. } = &mut slot.value {
                *car = node;
            }
        }
    }

    pub fn set_cdr(&self, pair: NodeRef, node: Node) {
        let mut store = self.store.borrow_mut();
        let NodeRef(index) = pair;
        if let Some(Some(slot)) = store.slots.get_mut(index as usize) {
            if let Value::Pair { cdr, .. } = &mut slot.value {
                *cdr = node;
            }
        }
    }

    /// Mark everything reachable from the roots, then drop the rest,
    /// repeating until a pass reclaims nothing.
    ///
    /// Each pass drops the reclaimed values after the arena borrow is
    /// released: dropping a closure releases its captured frame, and the
    /// frame re-enters the heap to withdraw its bindings' roots. The next
    /// pass then picks up whatever those withdrawals freed, so a dead
    /// closure, its frame and the frame's values all go within one
    /// collection.
    pub fn collect(&self) {
        let mut reclaimed = 0;
        loop {
            let dead = {
                let mut store = self.store.borrow_mut();
                store.mark();
                store.sweep()
            };
            if dead.is_empty() {
                break;
            }
            reclaimed += dead.len();
            drop(dead);
        }
        debug!("gc reclaimed {} objects", reclaimed);
    }

    /// Drop every object regardless of reachability. Used on interpreter
    /// teardown; the root registry is cleared so late unroots from dying
    /// scopes are no-ops.
    pub fn shutdown(&self) {
        let dead = {
            let mut store = self.store.borrow_mut();
            store.roots.clear();
            store.free.clear();
            std::mem::take(&mut store.slots)
        };
        drop(dead);
    }

    /// Number of live objects in the arena.
    pub fn len(&self) -> usize {
        self.store
            .borrow()
            .slots
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store {
    fn mark(&mut self) {
        let mut pending: Vec<NodeRef> = self.roots.keys().copied().collect();

        while let Some(NodeRef(index)) = pending.pop() {
            let slot = match self.slots.get_mut(index as usize) {
                Some(Some(slot)) => slot,
                _ => continue,
            };
            if slot.marked {
                continue;
            }
            slot.marked = true;

            // Outgoing edges are recomputed from the current slots, so a
            // mutated pair is traced through its new car/cdr. A closure
            // keeps both its body and its whole captured frame chain
            // alive.
            match &slot.value {
                Value::Pair { car, cdr } => {
                    pending.extend(car.iter().copied());
                    pending.extend(cdr.iter().copied());
                }
                Value::Closure { scope, body, .. } => {
                    pending.extend(body.iter().copied());
                    scope.trace(&mut pending);
                }
                Value::Number(_) | Value::Symbol(_) | Value::Builtin(_) => {}
            }
        }
    }

    fn sweep(&mut self) -> Vec<Value> {
        let mut dead = Vec::new();
        for (index, entry) in self.slots.iter_mut().enumerate() {
            let keep = match entry {
                Some(slot) => {
                    let marked = slot.marked;
                    slot.marked = false;
                    marked
                }
                None => true,
            };
            if !keep {
                if let Some(slot) = entry.take() {
                    dead.push(slot.value);
                    self.free.push(index as u32);
                }
            }
        }
        dead
    }
}
