macro_rules! ret_err {
    ($err:ident) => {
        return Err(TokenizerError {
            error: TokenErrorClass::$err,
        })
    };
}

macro_rules! is_blank {
    ($x:expr) => {
        $x == ' ' || $x == '\n' || $x == '\t' || $x == '\r'
    };
}
