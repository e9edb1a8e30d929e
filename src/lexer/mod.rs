#[macro_use]
mod macros;

mod chars;
mod token;

#[cfg(test)]
mod token_test;

pub use self::chars::Chars;
pub use self::token::{next_token, Token, TokenErrorClass, TokenizerError, Tokens};
