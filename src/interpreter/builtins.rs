use std::collections::HashSet;
use std::rc::Rc;

use crate::error::Error;

use super::evaluate;
use super::heap::{Heap, Node};
use super::scope::Scope;
use super::value::{Builtin, BuiltinFn, Value};

/// Forms that receive their operand tree unevaluated. The evaluator
/// dispatches these by head symbol before any scope lookup.
pub(super) const SPECIAL_FORMS: [(&str, BuiltinFn); 9] = [
    ("quote", quote),
    ("define", define),
    ("set!", set),
    ("set-car!", set_car),
    ("set-cdr!", set_cdr),
    ("if", if_form),
    ("lambda", lambda),
    ("and", and),
    ("or", or),
];

/// Procedures that evaluate every operand before running.
pub(super) const BUILTINS: [(&str, BuiltinFn); 25] = [
    ("number?", is_number),
    ("symbol?", is_symbol),
    ("boolean?", is_boolean),
    ("null?", is_null),
    ("pair?", is_pair),
    ("list?", is_list),
    ("cons", cons),
    ("list", list),
    ("car", car),
    ("cdr", cdr),
    ("list-ref", list_ref),
    ("list-tail", list_tail),
    ("not", not),
    ("+", plus),
    ("-", minus),
    ("*", mult),
    ("/", div),
    ("=", is_equal),
    (">", is_greater),
    ("<", is_smaller),
    (">=", is_geq),
    ("<=", is_leq),
    ("max", max),
    ("min", min),
    ("abs", abs),
];

/// Populate the global frame: every primitive plus the boolean symbols.
pub(super) fn install(scope: &Rc<Scope>) {
    let heap = scope.heap().clone();
    for &(name, run) in SPECIAL_FORMS.iter().chain(BUILTINS.iter()) {
        let node = heap.allocate(Value::Builtin(Builtin { name, run }));
        scope.define(name, Some(node));
    }
    for name in ["#t", "#f"] {
        let node = heap.allocate(Value::Symbol(name.to_string()));
        scope.define(name, Some(node));
    }
}

pub(super) fn special_form(name: &str) -> Option<BuiltinFn> {
    SPECIAL_FORMS
        .iter()
        .find(|&&(form, _)| form == name)
        .map(|&(_, run)| run)
}

/// The shared boolean symbols live in the global frame.
fn boolean(scope: &Rc<Scope>, value: bool) -> Result<Node, Error> {
    scope.resolve(if value { "#t" } else { "#f" })
}

/// Everything is truthy except the symbol `#f`.
pub(super) fn is_truthy(heap: &Heap, node: Node) -> bool {
    !matches!(heap.symbol_name(node).as_deref(), Some("#f"))
}

/// Evaluate the operand tree into a flat argument list. Elements are
/// evaluated left-to-right; a non-list tail is evaluated as one trailing
/// argument. A literal `quote` head short-circuits with the quoted value
/// untouched, mirroring the special form inline.
fn parse_args(scope: &Rc<Scope>, tree: Node) -> Result<Vec<Node>, Error> {
    let heap = scope.heap();
    let mut args = Vec::new();
    let mut cur = tree;
    loop {
        if cur.is_none() {
            return Ok(args);
        }
        match heap.pair(cur) {
            None => {
                args.push(evaluate(scope, cur)?);
                return Ok(args);
            }
            Some((head, tail)) => {
                if heap.symbol_name(head).as_deref() == Some("quote") {
                    match heap.pair(tail) {
                        Some((quoted, _)) => args.push(quoted),
                        None => args.push(tail),
                    }
                    return Ok(args);
                }
                args.push(evaluate(scope, head)?);
                cur = tail;
            }
        }
    }
}

/// Flatten the tree's cars without evaluating anything; used for `lambda`
/// parameter lists.
fn parse_args_noeval(heap: &Heap, tree: Node) -> Vec<Node> {
    let mut args = Vec::new();
    let mut cur = tree;
    while let Some((head, tail)) = heap.pair(cur) {
        args.push(head);
        cur = tail;
    }
    args
}

fn require_arity(args: &[Node], min: usize, max: usize) -> Result<(), Error> {
    if args.len() < min || args.len() > max {
        return Err(Error::Runtime("Incorrect number of arguments".into()));
    }
    Ok(())
}

fn numbers(heap: &Heap, args: &[Node]) -> Result<Vec<i64>, Error> {
    args.iter()
        .map(|&arg| {
            heap.number(arg)
                .ok_or_else(|| Error::Runtime("Number argument required".into()))
        })
        .collect()
}

//////////////////////////////////////////////////////////////////////
// checkers

fn is_number(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 1, 1)?;
    boolean(scope, scope.heap().number(args[0]).is_some())
}

fn is_symbol(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 1, 1)?;
    boolean(scope, scope.heap().symbol_name(args[0]).is_some())
}

fn is_boolean(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 1, 1)?;
    let name = scope.heap().symbol_name(args[0]);
    boolean(scope, matches!(name.as_deref(), Some("#t") | Some("#f")))
}

fn is_null(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 1, 1)?;
    let empty = match args[0] {
        None => true,
        Some(_) => matches!(scope.heap().pair(args[0]), Some((None, _))),
    };
    boolean(scope, empty)
}

/// Measure a structure the way the runtime counts elements: one per pair
/// car, plus one for a non-null non-pair tail. A pair met twice (a cycle
/// edge) terminates the walk and counts as a trailing value.
fn chain_length(heap: &Heap, node: Node) -> usize {
    let mut seen = HashSet::new();
    let mut count = 0;
    let mut cur = node;
    loop {
        let handle = match cur {
            Some(handle) => handle,
            None => return count,
        };
        match heap.pair(cur) {
            Some((_, tail)) => {
                if !seen.insert(handle) {
                    return count + 1;
                }
                count += 1;
                cur = tail;
            }
            None => return count + 1,
        }
    }
}

fn is_pair(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 1, 1)?;
    boolean(scope, chain_length(scope.heap(), args[0]) == 2)
}

fn is_list(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 1, 1)?;
    let heap = scope.heap();

    let mut seen = HashSet::new();
    let mut cur = args[0];
    let proper = loop {
        let handle = match cur {
            Some(handle) => handle,
            None => break true,
        };
        if !seen.insert(handle) {
            break false;
        }
        match heap.pair(cur) {
            Some((_, tail)) => cur = tail,
            None => break false,
        }
    };
    boolean(scope, proper)
}

//////////////////////////////////////////////////////////////////////
// constructors

fn cons(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 2, 2)?;
    let pair = scope.heap().allocate(Value::Pair {
        car: args[0],
        cdr: args[1],
    });
    Ok(Some(pair))
}

fn list(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    let heap = scope.heap();
    let mut node: Node = None;
    for &arg in args.iter().rev() {
        node = Some(heap.allocate(Value::Pair {
            car: arg,
            cdr: node,
        }));
    }
    Ok(node)
}

//////////////////////////////////////////////////////////////////////
// getters

fn car(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 1, 1)?;
    match scope.heap().pair(args[0]) {
        Some((head, _)) => Ok(head),
        None => Err(Error::Runtime("Can't get head of empty list".into())),
    }
}

fn cdr(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 1, 1)?;
    match scope.heap().pair(args[0]) {
        Some((_, tail)) => Ok(tail),
        None => Err(Error::Runtime("Can't get tail of empty list".into())),
    }
}

fn list_ref(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 2, 2)?;
    let heap = scope.heap();
    let mut index = heap
        .number(args[1])
        .ok_or_else(|| Error::Runtime("Number argument required".into()))?;
    if index < 0 {
        return Err(Error::Runtime("List index out of bounds".into()));
    }

    let mut cur = args[0];
    while index > 0 {
        match heap.pair(cur) {
            Some((_, tail)) => cur = tail,
            None => break,
        }
        index -= 1;
    }
    match heap.pair(cur) {
        Some((head, _)) => Ok(head),
        None => Err(Error::Runtime("List index out of bounds".into())),
    }
}

fn list_tail(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 2, 2)?;
    let heap = scope.heap();
    let mut index = heap
        .number(args[1])
        .ok_or_else(|| Error::Runtime("Number argument required".into()))?;
    if index < 0 {
        return Err(Error::Runtime("List index out of bounds".into()));
    }

    let mut cur = args[0];
    while index > 0 {
        match heap.pair(cur) {
            Some((_, tail)) => cur = tail,
            None => break,
        }
        index -= 1;
    }
    if index > 0 {
        return Err(Error::Runtime("List index out of bounds".into()));
    }
    Ok(cur)
}

//////////////////////////////////////////////////////////////////////
// logic

fn not(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 1, 1)?;
    boolean(scope, !is_truthy(scope.heap(), args[0]))
}

fn and(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let heap = scope.heap();
    let mut last = boolean(scope, true)?;
    let mut cur = tree;
    loop {
        match heap.pair(cur) {
            Some((head, tail)) => {
                last = evaluate(scope, head)?;
                if !is_truthy(heap, last) {
                    return boolean(scope, false);
                }
                cur = tail;
            }
            None => {
                if cur.is_some() {
                    last = evaluate(scope, cur)?;
                    if !is_truthy(heap, last) {
                        return boolean(scope, false);
                    }
                }
                return Ok(last);
            }
        }
    }
}

fn or(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let heap = scope.heap();
    let mut cur = tree;
    loop {
        match heap.pair(cur) {
            Some((head, tail)) => {
                let value = evaluate(scope, head)?;
                if is_truthy(heap, value) {
                    return Ok(value);
                }
                cur = tail;
            }
            None => {
                if cur.is_some() {
                    let value = evaluate(scope, cur)?;
                    if is_truthy(heap, value) {
                        return Ok(value);
                    }
                }
                return boolean(scope, false);
            }
        }
    }
}

//////////////////////////////////////////////////////////////////////
// arithmetic

/// Left-fold evaluated numeric arguments. With no arguments the identity
/// is returned when the operation has one, otherwise it is an error.
fn fold_numbers(
    scope: &Rc<Scope>,
    tree: Node,
    identity: Option<i64>,
    fold: impl Fn(i64, i64) -> Result<i64, Error>,
) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    let heap = scope.heap();
    let values = numbers(heap, &args)?;

    let mut iter = values.into_iter();
    let mut acc = match iter.next() {
        Some(first) => first,
        None => match identity {
            Some(identity) => identity,
            None => {
                return Err(Error::Runtime(
                    "No neutral element for arithmetic operation".into(),
                ))
            }
        },
    };
    for value in iter {
        acc = fold(acc, value)?;
    }
    Ok(Some(heap.allocate(Value::Number(acc))))
}

fn plus(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    fold_numbers(scope, tree, Some(0), |a, b| Ok(a.wrapping_add(b)))
}

fn minus(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    fold_numbers(scope, tree, None, |a, b| Ok(a.wrapping_sub(b)))
}

fn mult(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    fold_numbers(scope, tree, Some(1), |a, b| Ok(a.wrapping_mul(b)))
}

fn div(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    fold_numbers(scope, tree, None, |a, b| {
        a.checked_div(b)
            .ok_or_else(|| Error::Runtime("Division by zero".into()))
    })
}

fn max(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    fold_numbers(scope, tree, None, |a, b| Ok(a.max(b)))
}

fn min(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    fold_numbers(scope, tree, None, |a, b| Ok(a.min(b)))
}

fn abs(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    require_arity(&args, 1, 1)?;
    let heap = scope.heap();
    let values = numbers(heap, &args)?;
    Ok(Some(heap.allocate(Value::Number(values[0].wrapping_abs()))))
}

//////////////////////////////////////////////////////////////////////
// comparisons

/// Chained pairwise comparison over numbers; trivially true for fewer
/// than two arguments.
fn compare(
    scope: &Rc<Scope>,
    tree: Node,
    ordered: impl Fn(i64, i64) -> bool,
) -> Result<Node, Error> {
    let args = parse_args(scope, tree)?;
    let values = numbers(scope.heap(), &args)?;
    let holds = values.windows(2).all(|pair| ordered(pair[0], pair[1]));
    boolean(scope, holds)
}

fn is_equal(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    compare(scope, tree, |a, b| a == b)
}

fn is_greater(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    compare(scope, tree, |a, b| a > b)
}

fn is_smaller(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    compare(scope, tree, |a, b| a < b)
}

fn is_geq(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    compare(scope, tree, |a, b| a >= b)
}

fn is_leq(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    compare(scope, tree, |a, b| a <= b)
}

//////////////////////////////////////////////////////////////////////
// variable manipulation

fn define(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let heap = scope.heap();
    let (target, rest) = heap
        .pair(tree)
        .ok_or_else(|| Error::Syntax("Define requires 2 arguments".into()))?;

    // (define (name params…) body…) is sugar over lambda.
    if let Some((name_node, params)) = heap.pair(target) {
        let name = heap
            .symbol_name(name_node)
            .ok_or_else(|| Error::Syntax("Bad argument to define".into()))?;
        let body = if heap.pair(rest).is_some() {
            rest
        } else {
            Some(heap.allocate(Value::Pair {
                car: rest,
                cdr: None,
            }))
        };
        let closure = lambda(
            scope,
            Some(heap.allocate(Value::Pair {
                car: params,
                cdr: body,
            })),
        )?;
        scope.define(&name, closure);
        return Ok(None);
    }

    let name = heap
        .symbol_name(target)
        .ok_or_else(|| Error::Syntax("Bad argument to define".into()))?;
    let (expr, extra) = heap
        .pair(rest)
        .ok_or_else(|| Error::Syntax("Define requires 2 arguments".into()))?;
    if extra.is_some() {
        return Err(Error::Syntax("Define requires 2 arguments".into()));
    }

    let value = evaluate(scope, expr)?;
    scope.define(&name, value);
    Ok(None)
}

fn set(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let heap = scope.heap();
    let (target, rest) = heap
        .pair(tree)
        .ok_or_else(|| Error::Syntax("Set requires 2 arguments".into()))?;
    let name = heap
        .symbol_name(target)
        .ok_or_else(|| Error::Syntax("Bad argument to set".into()))?;
    let (expr, extra) = heap
        .pair(rest)
        .ok_or_else(|| Error::Syntax("Set requires 2 arguments".into()))?;
    if extra.is_some() {
        return Err(Error::Syntax("Set requires 2 arguments".into()));
    }

    let value = evaluate(scope, expr)?;
    scope.set(&name, value)?;
    Ok(None)
}

/// Split `tree` into the two operand expressions of a mutating form.
fn mutation_operands(heap: &Heap, tree: Node, form: &str) -> Result<(Node, Node), Error> {
    let bad = || Error::Syntax(format!("{} requires 2 arguments", form));
    let (target, rest) = heap.pair(tree).ok_or_else(bad)?;
    let (value, extra) = heap.pair(rest).ok_or_else(bad)?;
    if extra.is_some() {
        return Err(bad());
    }
    Ok((target, value))
}

fn set_car(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let heap = scope.heap();
    let (target_expr, value_expr) = mutation_operands(heap, tree, "set-car!")?;
    let target = evaluate(scope, target_expr)?;
    let value = evaluate(scope, value_expr)?;
    match target {
        Some(handle) if heap.pair(target).is_some() => {
            heap.set_car(handle, value);
            Ok(None)
        }
        _ => Err(Error::Runtime("set-car! expects a pair".into())),
    }
}

fn set_cdr(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let heap = scope.heap();
    let (target_expr, value_expr) = mutation_operands(heap, tree, "set-cdr!")?;
    let target = evaluate(scope, target_expr)?;
    let value = evaluate(scope, value_expr)?;
    match target {
        Some(handle) if heap.pair(target).is_some() => {
            heap.set_cdr(handle, value);
            Ok(None)
        }
        _ => Err(Error::Runtime("set-cdr! expects a pair".into())),
    }
}

//////////////////////////////////////////////////////////////////////
// control flow

fn if_form(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let heap = scope.heap();
    let bad = || Error::Syntax("If requires 2 or 3 arguments".into());

    let (condition, rest) = heap.pair(tree).ok_or_else(bad)?;
    let (consequent, rest) = heap.pair(rest).ok_or_else(bad)?;
    if consequent.is_none() {
        return Err(bad());
    }
    let alternative = match rest {
        None => None,
        Some(_) => {
            let (alternative, extra) = heap.pair(rest).ok_or_else(bad)?;
            if extra.is_some() {
                return Err(bad());
            }
            Some(alternative)
        }
    };

    if is_truthy(heap, evaluate(scope, condition)?) {
        evaluate(scope, consequent)
    } else {
        match alternative {
            Some(alternative) => evaluate(scope, alternative),
            None => Ok(None),
        }
    }
}

//////////////////////////////////////////////////////////////////////
// lambda and quote

fn lambda(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    let heap = scope.heap();
    let (params_tree, body) = heap.pair(tree).ok_or_else(|| {
        Error::Syntax("Invalid number of arguments for lambda construction".into())
    })?;
    if params_tree.is_some() && heap.pair(params_tree).is_none() {
        return Err(Error::Syntax(
            "Argument list required for lambda construction".into(),
        ));
    }
    if heap.pair(body).is_none() {
        return Err(Error::Syntax("Can't create empty lambda".into()));
    }

    let mut params = Vec::new();
    for node in parse_args_noeval(heap, params_tree) {
        match heap.symbol_name(node) {
            Some(name) => params.push(name),
            None => {
                return Err(Error::Syntax("Lambda parameters have to be symbols".into()));
            }
        }
    }

    let closure = heap.allocate(Value::Closure {
        scope: scope.clone(),
        params,
        body,
    });
    Ok(Some(closure))
}

fn quote(scope: &Rc<Scope>, tree: Node) -> Result<Node, Error> {
    match scope.heap().pair(tree) {
        Some((quoted, _)) => Ok(quoted),
        None => Err(Error::Syntax("Quote requires an operand".into())),
    }
}
