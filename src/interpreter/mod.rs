use std::rc::Rc;

use log::debug;

use crate::error::Error;
use crate::reader;

mod builtins;
mod heap;
mod scope;
mod value;


pub use self::heap::{Heap, Node, NodeRef};
pub use self::scope::Scope;
pub use self::value::{Builtin, BuiltinFn, Value};

/// Recursive walk over the object graph.
///
/// Special forms are recognized by head symbol before any lookup; every
/// other head must resolve (or evaluate) to something callable.
pub fn evaluate(scope: &Rc<Scope>, node: Node) -> Result<Node, Error> {
    let heap = scope.heap();
    let handle = match node {
        Some(handle) => handle,
        None => return Err(Error::Runtime("Evaluating null not allowed".into())),
    };

    match heap.get(handle) {
        Value::Number(_) => Ok(node),
        Value::Symbol(name) => scope.resolve(&name),
        Value::Pair { car, cdr } => {
            if let Some(name) = heap.symbol_name(car) {
                if let Some(run) = builtins::special_form(&name) {
                    return run(scope, cdr);
                }
                match resolved_value(scope, &name)? {
                    Some(Value::Builtin(builtin)) => (builtin.run)(scope, cdr),
                    Some(Value::Closure {
                        scope: captured,
                        params,
                        body,
                    }) => apply_closure(scope, &captured, &params, body, cdr),
                    _ => Err(Error::Runtime("Object not callable".into())),
                }
            } else {
                let head = evaluate(scope, car)?;
                match head.map(|h| heap.get(h)) {
                    Some(Value::Closure {
                        scope: captured,
                        params,
                        body,
                    }) => apply_closure(scope, &captured, &params, body, cdr),
                    _ => Err(Error::Runtime("Function name has to be a symbol".into())),
                }
            }
        }
        Value::Builtin(_) | Value::Closure { .. } => {
            Err(Error::Runtime("Unknown object type to evaluate".into()))
        }
    }
}

fn resolved_value(scope: &Rc<Scope>, name: &str) -> Result<Option<Value>, Error> {
    let head = scope.resolve(name)?;
    Ok(head.map(|handle| scope.heap().get(handle)))
}

/// Call a closure: arguments are evaluated in the caller's scope and bound
/// in a fresh child of the captured scope, which is dropped on exit.
fn apply_closure(
    caller: &Rc<Scope>,
    captured: &Rc<Scope>,
    params: &[String],
    body: Node,
    args_tree: Node,
) -> Result<Node, Error> {
    let heap = caller.heap();
    let local = Scope::child(captured);

    let mut rest = args_tree;
    for name in params {
        let (arg, tail) = heap.pair(rest).ok_or_else(|| {
            Error::Runtime("Incorrect number of arguments for lambda function".into())
        })?;
        local.define(name, evaluate(caller, arg)?);
        rest = tail;
    }
    if rest.is_some() {
        return Err(Error::Runtime(
            "Incorrect number of arguments for lambda function".into(),
        ));
    }

    let mut result = None;
    let mut cur = body;
    while let Some((form, tail)) = heap.pair(cur) {
        result = evaluate(&local, form)?;
        cur = tail;
    }
    Ok(result)
}

/// Serialize a value graph back to source text.
pub fn print(heap: &Heap, node: Node) -> Result<String, Error> {
    let handle = match node {
        Some(handle) => handle,
        None => return Ok("()".to_string()),
    };

    match heap.get(handle) {
        Value::Number(n) => Ok(n.to_string()),
        Value::Symbol(name) => Ok(name),
        Value::Pair { .. } => {
            let mut out = String::from("(");
            let mut cur = node;
            loop {
                match heap.pair(cur) {
                    Some((head, tail)) => {
                        if out.len() > 1 {
                            out.push(' ');
                        }
                        out.push_str(&print(heap, head)?);
                        cur = tail;
                    }
                    None => {
                        if cur.is_some() {
                            out.push_str(" . ");
                            out.push_str(&print(heap, cur)?);
                        }
                        break;
                    }
                }
            }
            out.push(')');
            Ok(out)
        }
        Value::Builtin(_) | Value::Closure { .. } => {
            Err(Error::Runtime("Unprintable object".into()))
        }
    }
}

/// A self-contained interpreter instance: one heap, one global scope.
/// Definitions persist across `run` calls; dropping the instance tears
/// the heap down.
pub struct Interpreter {
    heap: Heap,
    global: Rc<Scope>,
}

impl Interpreter {
    pub fn new() -> Interpreter {
        let heap = Heap::new();
        let global = Scope::global(&heap);
        Interpreter { heap, global }
    }

    /// Evaluate a single expression and print the result. The heap is
    /// collected on the way out, on success and on error alike, so
    /// values that were not committed to a scope are reclaimed.
    pub fn run(&mut self, program: &str) -> Result<String, Error> {
        debug!("run: {:?}", program);
        let result = self.run_inner(program);
        self.heap.collect();
        result
    }

    fn run_inner(&mut self, program: &str) -> Result<String, Error> {
        let node = reader::read_program(&self.heap, program)?;
        let result = evaluate(&self.global, node)?;
        print(&self.heap, result)
    }
}

impl Default for Interpreter {
    fn default() -> Interpreter {
        Interpreter::new()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.heap.shutdown();
    }
}
