use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Error;

use super::heap::{Heap, Node, NodeRef};

/// One frame of the lexical chain. Every binding in a live frame is a GC
/// root; dropping the frame unregisters them.
pub struct Scope {
    heap: Heap,
    parent: Option<Rc<Scope>>,
    bindings: RefCell<HashMap<String, Node>>,
}

impl Scope {
    /// The root frame. Installs the whole builtin vocabulary and the
    /// shared boolean symbols.
    pub fn global(heap: &Heap) -> Rc<Scope> {
        let scope = Rc::new(Scope {
            heap: heap.clone(),
            parent: None,
            bindings: RefCell::new(HashMap::new()),
        });
        super::builtins::install(&scope);
        scope
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            heap: parent.heap.clone(),
            parent: Some(parent.clone()),
            bindings: RefCell::new(HashMap::new()),
        })
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Insert or overwrite a binding in this frame. The displaced handle
    /// (if any) is unrooted, the new one rooted.
    pub fn define(&self, name: &str, node: Node) {
        let old = self.bindings.borrow_mut().insert(name.to_string(), node);
        if let Some(old) = old {
            self.heap.remove_root(old);
        }
        self.heap.add_root(node);
    }

    /// Overwrite the binding in the nearest enclosing frame that has one.
    pub fn set(&self, name: &str, node: Node) -> Result<(), Error> {
        {
            let mut bindings = self.bindings.borrow_mut();
            if let Some(bound) = bindings.get_mut(name) {
                self.heap.remove_root(*bound);
                *bound = node;
                self.heap.add_root(node);
                return Ok(());
            }
        }
        match &self.parent {
            Some(parent) => parent.set(name, node),
            None => Err(Error::Name(format!(
                "Can't set value of undefined symbol {}",
                name
            ))),
        }
    }

    /// Append every binding of this frame chain to the mark worklist.
    /// The collector calls this for each live closure, so a closure's
    /// captured environment is a dependant of the closure itself.
    pub(super) fn trace(&self, pending: &mut Vec<NodeRef>) {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            pending.extend(scope.bindings.borrow().values().filter_map(|node| *node));
            frame = scope.parent.as_deref();
        }
    }

    /// Nearest-enclosing lookup.
    pub fn resolve(&self, name: &str) -> Result<Node, Error> {
        if let Some(node) = self.bindings.borrow().get(name) {
            return Ok(*node);
        }
        match &self.parent {
            Some(parent) => parent.resolve(name),
            None => Err(Error::Name(format!("Symbol not found: {}", name))),
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        for node in self.bindings.get_mut().values() {
            self.heap.remove_root(*node);
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::value::Value;
    use super::*;

    #[test]
    fn define_then_resolve() {
        let heap = Heap::new();
        let global = Scope::global(&heap);
        let n = heap.allocate(Value::Number(42));
        global.define("x", Some(n));

        assert_eq!(heap.number(global.resolve("x").unwrap()), Some(42));
        assert!(matches!(global.resolve("missing"), Err(Error::Name(_))));
    }

    #[test]
    fn child_shadows_parent() {
        let heap = Heap::new();
        let global = Scope::global(&heap);
        global.define("x", Some(heap.allocate(Value::Number(1))));

        let child = Scope::child(&global);
        child.define("x", Some(heap.allocate(Value::Number(2))));

        assert_eq!(heap.number(child.resolve("x").unwrap()), Some(2));
        assert_eq!(heap.number(global.resolve("x").unwrap()), Some(1));
    }

    #[test]
    fn set_walks_to_the_owning_frame() {
        let heap = Heap::new();
        let global = Scope::global(&heap);
        global.define("x", Some(heap.allocate(Value::Number(1))));

        let child = Scope::child(&global);
        child
            .set("x", Some(heap.allocate(Value::Number(2))))
            .unwrap();

        assert_eq!(heap.number(global.resolve("x").unwrap()), Some(2));
        assert!(child.bindings.borrow().is_empty());
    }

    #[test]
    fn set_of_undefined_symbol_is_a_name_error() {
        let heap = Heap::new();
        let global = Scope::global(&heap);
        let child = Scope::child(&global);

        let result = child.set("x", Some(heap.allocate(Value::Number(1))));
        assert!(matches!(result, Err(Error::Name(_))));
    }

    #[test]
    fn bindings_root_their_values() {
        let heap = Heap::new();
        let global = Scope::global(&heap);
        let baseline = {
            heap.collect();
            heap.len()
        };

        let child = Scope::child(&global);
        child.define("x", Some(heap.allocate(Value::Number(1))));
        heap.collect();
        assert_eq!(heap.len(), baseline + 1);

        // Dropping the frame unroots the binding.
        drop(child);
        heap.collect();
        assert_eq!(heap.len(), baseline);
    }

    #[test]
    fn redefinition_unroots_the_old_value() {
        let heap = Heap::new();
        let global = Scope::global(&heap);
        heap.collect();
        let baseline = heap.len();

        let child = Scope::child(&global);
        child.define("x", Some(heap.allocate(Value::Number(1))));
        child.define("x", Some(heap.allocate(Value::Number(2))));
        heap.collect();
        assert_eq!(heap.len(), baseline + 1);
        assert_eq!(heap.number(child.resolve("x").unwrap()), Some(2));
    }
}
