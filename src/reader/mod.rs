//! Convert tokens into the S-expression graph.
use fallible_iterator::{FallibleIterator, Peekable};

use crate::error::Error;
use crate::interpreter::{Heap, Node, Value};
use crate::lexer::{Token, TokenizerError, Tokens};

pub struct Reader<T>
where
    T: FallibleIterator<Item = Token, Error = TokenizerError>,
{
    tokens: Peekable<T>,
    heap: Heap,
}

impl<T> Reader<T>
where
    T: FallibleIterator<Item = Token, Error = TokenizerError>,
{
    pub fn new(heap: &Heap, tokens: T) -> Reader<T> {
        Reader {
            tokens: tokens.peekable(),
            heap: heap.clone(),
        }
    }

    fn peek(&mut self) -> Result<Option<Token>, Error> {
        Ok(self.tokens.peek()?.cloned())
    }

    /// Parse one expression off the token stream.
    pub fn read(&mut self) -> Result<Node, Error> {
        if let Some(Token::Open) = self.peek()? {
            return self.read_list();
        }
        match self.tokens.next()? {
            Some(Token::Number(value)) => Ok(Some(self.heap.allocate(Value::Number(value)))),
            Some(Token::Symbol(name)) => Ok(Some(self.heap.allocate(Value::Symbol(name)))),
            Some(Token::Quote) => {
                // 'x reads as (quote x).
                let quoted = self.read()?;
                let tail = self.heap.allocate(Value::Pair {
                    car: quoted,
                    cdr: None,
                });
                let symbol = self.heap.allocate(Value::Symbol("quote".to_string()));
                Ok(Some(self.heap.allocate(Value::Pair {
                    car: Some(symbol),
                    cdr: Some(tail),
                })))
            }
            _ => Err(Error::Syntax("Invalid syntax".into())),
        }
    }

    /// Parse a parenthesized list, including the `(a . b)` dotted form.
    fn read_list(&mut self) -> Result<Node, Error> {
        match self.tokens.next()? {
            Some(Token::Open) => {}
            _ => return Err(Error::Syntax("Invalid syntax".into())),
        }
        if let Some(Token::Close) = self.peek()? {
            self.tokens.next()?;
            return Ok(None);
        }

        let first = self.heap.allocate(Value::Pair {
            car: None,
            cdr: None,
        });
        let mut cur = first;
        loop {
            let element = self.read()?;
            self.heap.set_car(cur, element);

            match self.peek()? {
                Some(Token::Close) => {
                    self.tokens.next()?;
                    break;
                }
                Some(Token::Dot) => {
                    self.tokens.next()?;
                    let tail = self.read()?;
                    self.heap.set_cdr(cur, tail);
                    match self.tokens.next()? {
                        Some(Token::Close) => break,
                        _ => return Err(Error::Syntax("Invalid syntax".into())),
                    }
                }
                Some(_) => {
                    let next = self.heap.allocate(Value::Pair {
                        car: None,
                        cdr: None,
                    });
                    self.heap.set_cdr(cur, Some(next));
                    cur = next;
                }
                None => return Err(Error::Syntax("Invalid syntax".into())),
            }
        }
        Ok(Some(first))
    }

    fn read_single(&mut self) -> Result<Node, Error> {
        let node = self.read()?;
        if self.peek()?.is_some() {
            return Err(Error::Syntax("Single expression required".into()));
        }
        Ok(node)
    }
}

/// Parse exactly one expression from `source`. On failure the heap is
/// collected first, so partially built structure is reclaimed.
pub fn read_program(heap: &Heap, source: &str) -> Result<Node, Error> {
    let mut reader = Reader::new(heap, Tokens::new(source.chars()));
    match reader.read_single() {
        Ok(node) => Ok(node),
        Err(error) => {
            heap.collect();
            Err(error)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::interpreter::print;

    fn read_to_text(source: &str) -> Result<String, Error> {
        let heap = Heap::new();
        let node = read_program(&heap, source)?;
        print(&heap, node)
    }

    fn assert_reads(source: &str, printed: &str) {
        assert_eq!(read_to_text(source).expect("valid read"), printed);
    }

    fn assert_syntax_error(source: &str) {
        match read_to_text(source) {
            Err(Error::Syntax(_)) => {}
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn atoms_test() {
        assert_reads("42", "42");
        assert_reads("-42", "-42");
        assert_reads("foo", "foo");
        assert_reads("#t", "#t");
    }

    #[test]
    fn lists_test() {
        assert_reads("()", "()");
        assert_reads("(1 2 3)", "(1 2 3)");
        assert_reads("( 1 ( 2 ) 3 )", "(1 (2) 3)");
        assert_reads("(())", "(())");
    }

    #[test]
    fn dotted_pairs_test() {
        assert_reads("(1 . 2)", "(1 . 2)");
        assert_reads("(1 2 . 3)", "(1 2 . 3)");
        assert_reads("(1 . (2 . ()))", "(1 2)");
    }

    #[test]
    fn quote_sugar_test() {
        assert_reads("'a", "(quote a)");
        assert_reads("'(1 2)", "(quote (1 2))");
        assert_reads("''a", "(quote (quote a))");
    }

    #[test]
    fn print_is_idempotent_on_printed_output() {
        for source in ["(1 (2 3) . 4)", "(quote (a b))", "(() ())"] {
            let once = read_to_text(source).expect("valid read");
            assert_eq!(read_to_text(&once).expect("valid reread"), once);
        }
    }

    #[test]
    fn unterminated_list_test() {
        assert_syntax_error("(");
        assert_syntax_error("(1 2");
        assert_syntax_error("(1 . 2");
    }

    #[test]
    fn stray_tokens_test() {
        assert_syntax_error(")");
        assert_syntax_error(".");
        assert_syntax_error("");
        assert_syntax_error("(1 . 2 3)");
        assert_syntax_error("'");
    }

    #[test]
    fn single_expression_rule_test() {
        assert_syntax_error("1 2");
        assert_syntax_error("(+ 1 2) (+ 3 4)");
    }

    #[test]
    fn bad_characters_surface_as_syntax_errors() {
        assert_syntax_error(",x");
        assert_syntax_error("(1 , 2)");
    }

    #[test]
    fn errors_reclaim_partial_structure() {
        let heap = Heap::new();
        assert!(read_program(&heap, "(1 (2 3) ").is_err());
        assert!(heap.is_empty());
    }
}
