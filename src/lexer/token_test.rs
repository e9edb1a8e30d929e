use super::chars::Chars;
use super::token::next_token;
use super::*;

fn assert_next(code: &str, token: Token) {
    let result = next_token(&mut Chars::from(code.chars()))
        .expect("valid token")
        .expect("non-empty");
    assert_eq!(result, token);
}

fn assert_symbol(code: &str, name: &str) {
    assert_next(code, Token::Symbol(name.to_string()));
}

fn assert_tokens(code: &str, tokens: &[Token]) {
    let mut stream = Chars::from(code.chars());
    for token in tokens {
        let result = next_token(&mut stream).expect("valid token").expect("non-empty");
        assert_eq!(&result, token);
    }
    let next = next_token(&mut stream).expect("valid tail");
    assert!(next.is_none(), "unfinished stream: {:?}", next);
}

#[test]
fn whitespace_test() {
    assert_next(" (", Token::Open);
    assert_next("\n (", Token::Open);
    assert_next("\t\r(", Token::Open);
    assert_tokens("  ", &[]);
}

#[test]
fn brackets_test() {
    assert_next("(asdd", Token::Open);
    assert_next(")#12", Token::Close);
    assert_tokens("()", &[Token::Open, Token::Close]);
}

#[test]
fn quote_dot_test() {
    assert_next("'(a)", Token::Quote);
    assert_next(". b", Token::Dot);
}

#[test]
fn numbers_test() {
    assert_next("13", Token::Number(13));
    assert_next("+5 a", Token::Number(5));
    assert_next("-5)", Token::Number(-5));
    assert_next("007", Token::Number(7));
}

#[test]
fn sign_ambiguity_test() {
    assert_symbol("+", "+");
    assert_symbol("+ 1", "+");
    assert_symbol("-", "-");
    assert_symbol("- 1", "-");
    assert_tokens(
        "(+ 1 -2)",
        &[
            Token::Open,
            Token::Symbol("+".to_string()),
            Token::Number(1),
            Token::Number(-2),
            Token::Close,
        ],
    );
}

#[test]
fn symbols_test() {
    assert_symbol("a", "a");
    assert_symbol("abc def", "abc");
    assert_symbol("set-cdr!", "set-cdr!");
    assert_symbol("list?", "list?");
    assert_symbol("<=", "<=");
    assert_symbol("*", "*");
    assert_symbol("#t", "#t");
    assert_symbol("#f)", "#f");
    assert_symbol("x2", "x2");
}

#[test]
fn symbol_break_test() {
    // A symbol ends at the first character outside its class.
    assert_tokens(
        "a(b",
        &[
            Token::Symbol("a".to_string()),
            Token::Open,
            Token::Symbol("b".to_string()),
        ],
    );
}

#[test]
fn quote_sugar_test() {
    assert_tokens(
        "'(1 . 2)",
        &[
            Token::Quote,
            Token::Open,
            Token::Number(1),
            Token::Dot,
            Token::Number(2),
            Token::Close,
        ],
    );
}

#[test]
fn unexpected_character_test() {
    assert!(next_token(&mut Chars::from(",".chars())).is_err());
    assert!(next_token(&mut Chars::from("[".chars())).is_err());
    assert!(next_token(&mut Chars::from("%".chars())).is_err());
}

#[test]
fn overflow_test() {
    assert_next("9223372036854775807", Token::Number(i64::MAX));
    assert!(next_token(&mut Chars::from("9223372036854775808".chars())).is_err());
}
