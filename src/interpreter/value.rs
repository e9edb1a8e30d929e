use std::fmt;
use std::rc::Rc;

use crate::error::Error;

use super::heap::Node;
use super::scope::Scope;

/// Signature shared by every primitive. The operand tree is handed over
/// raw; applicative primitives evaluate it through `parse_args`, special
/// forms pick it apart themselves.
pub type BuiltinFn = fn(&Rc<Scope>, Node) -> Result<Node, Error>;

/// A primitive procedure together with its surface name.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub run: BuiltinFn,
}

/// A runtime value. Pairs are the only variant with mutable slots; they
/// are rewritten in place by `set-car!` and `set-cdr!`.
#[derive(Clone)]
pub enum Value {
    Number(i64),
    Symbol(String),
    Pair { car: Node, cdr: Node },
    Builtin(Builtin),
    Closure {
        scope: Rc<Scope>,
        params: Vec<String>,
        body: Node,
    },
}

impl fmt::Debug for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => write!(fmt, "Number({})", n),
            Value::Symbol(name) => write!(fmt, "Symbol({})", name),
            Value::Pair { car, cdr } => write!(fmt, "Pair({:?}, {:?})", car, cdr),
            Value::Builtin(builtin) => write!(fmt, "Builtin({})", builtin.name),
            Value::Closure { params, body, .. } => {
                write!(fmt, "Closure({:?}, {:?})", params, body)
            }
        }
    }
}
