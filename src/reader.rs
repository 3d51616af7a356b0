//! The reader turns the lexer's tokens into values, desugaring the sigils
//! (`'` `^` `~` `~@` `@`) and literal brackets as it goes.
use lasso::Rodeo;
use logos::Lexer;

use crate::{
    lexer::{LexerError, Quoted, Span, Token},
    stack::ensure_sufficient_stack,
    value::{List, ListKind, RegexValue, Value},
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SyntaxErrorKind {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error("premature end of input")]
    UnexpectedEof,
    #[error("unexpected `{0}`")]
    Unexpected(Box<str>),
    #[error("expected `{expected}` but found `{found}`")]
    Mismatched {
        expected: &'static str,
        found: Box<str>,
    },
    #[error("hash-map literal requires an even number of forms")]
    OddMapLiteral,
    #[error("invalid regex: {0}")]
    InvalidRegex(Box<str>),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("syntax error: {kind}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    /// Byte range of the offending token
    pub span: Span,
}

impl SyntaxError {
    fn new(kind: SyntaxErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether more input could still complete the source: a form or a
    /// string literal was left open.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self.kind,
            SyntaxErrorKind::UnexpectedEof | SyntaxErrorKind::Lexer(LexerError::UnterminatedString)
        )
    }
}

/// Reads the first form of `source`, returning it along with the byte offset
/// just past it. `None` when there is nothing left but whitespace and comments.
pub fn read_one(source: &str, rodeo: &mut Rodeo) -> Result<Option<(Value, usize)>, SyntaxError> {
    let mut reader = Reader::new(source, rodeo);
    let form = reader.read()?;
    Ok(form.map(|form| (form, reader.position())))
}

/// Reads every top-level form of `source`, in order.
pub fn read_all(source: &str, rodeo: &mut Rodeo) -> Result<Vec<Value>, SyntaxError> {
    let mut reader = Reader::new(source, rodeo);
    let mut forms = vec![];
    while let Some(form) = reader.read()? {
        forms.push(form);
    }
    Ok(forms)
}

struct Reader<'src, 'r> {
    lexer: Lexer<'src, Token>,
    rodeo: &'r mut Rodeo,
}

impl<'src, 'r> Reader<'src, 'r> {
    fn new(source: &'src str, rodeo: &'r mut Rodeo) -> Self {
        Self {
            lexer: Token::lexer(source),
            rodeo,
        }
    }

    fn position(&self) -> usize {
        self.lexer.span().end
    }

    fn end_of_input(&self) -> Span {
        let end = self.lexer.source().len();
        end..end
    }

    fn next_token(&mut self) -> Result<Option<(Token, Span)>, SyntaxError> {
        match self.lexer.next() {
            None => Ok(None),
            Some(Ok(token)) => Ok(Some((token, self.lexer.span()))),
            Some(Err(error)) => Err(SyntaxError::new(error.into(), self.lexer.span())),
        }
    }

    fn read(&mut self) -> Result<Option<Value>, SyntaxError> {
        match self.next_token()? {
            None => Ok(None),
            Some((token, span)) => self.read_form(token, span).map(Some),
        }
    }

    // a form is required here, end of input is an error
    fn read_required(&mut self) -> Result<Value, SyntaxError> {
        match self.next_token()? {
            None => Err(SyntaxError::new(
                SyntaxErrorKind::UnexpectedEof,
                self.end_of_input(),
            )),
            Some((token, span)) => self.read_form(token, span),
        }
    }

    fn read_form(&mut self, token: Token, span: Span) -> Result<Value, SyntaxError> {
        ensure_sufficient_stack(|| self.read_nested(token, span))
    }

    fn read_nested(&mut self, token: Token, span: Span) -> Result<Value, SyntaxError> {
        match token {
            Token::Quote => self.wrap("quote"),
            Token::Quasiquote => self.wrap("quasiquote"),
            Token::Unquote => self.wrap("unquote"),
            Token::SpliceUnquote => self.wrap("splice-unquote"),
            Token::Deref => self.wrap("deref"),
            Token::LParen => {
                let items = self.read_until(Token::RParen, ")")?;
                Ok(Value::List(List::new(ListKind::Invocation, items)))
            }
            Token::LBracket => {
                let items = self.read_until(Token::RBracket, "]")?;
                Ok(Value::List(List::new(ListKind::Sequence, items)))
            }
            Token::LBrace => {
                let mut items = self.read_until(Token::RBrace, "}")?;
                if items.len() % 2 != 0 {
                    return Err(SyntaxError::new(
                        SyntaxErrorKind::OddMapLiteral,
                        span.start..self.position(),
                    ));
                }
                items.insert(0, Value::Symbol(self.rodeo.get_or_intern_static("hash-map")));
                Ok(Value::List(List::invocation(items)))
            }
            Token::RParen | Token::RBracket | Token::RBrace => Err(SyntaxError::new(
                SyntaxErrorKind::Unexpected(token.describe().into()),
                span,
            )),
            Token::Quoted(quoted) => read_quoted(quoted, span),
            Token::Bare(text) => Ok(self.read_bare(&text)),
        }
    }

    fn wrap(&mut self, head: &'static str) -> Result<Value, SyntaxError> {
        let form = self.read_required()?;
        let head = Value::Symbol(self.rodeo.get_or_intern_static(head));
        Ok(Value::List(List::invocation(vec![head, form])))
    }

    fn read_until(&mut self, close: Token, expected: &'static str) -> Result<Vec<Value>, SyntaxError> {
        let mut items = vec![];
        loop {
            let Some((token, span)) = self.next_token()? else {
                return Err(SyntaxError::new(
                    SyntaxErrorKind::UnexpectedEof,
                    self.end_of_input(),
                ));
            };
            match token {
                token if token == close => return Ok(items),
                Token::RParen | Token::RBracket | Token::RBrace => {
                    return Err(SyntaxError::new(
                        SyntaxErrorKind::Mismatched {
                            expected,
                            found: token.describe().into(),
                        },
                        span,
                    ))
                }
                token => items.push(self.read_form(token, span)?),
            }
        }
    }

    fn read_bare(&mut self, text: &str) -> Value {
        match text {
            "nil" => Value::Nil,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => match parse_number(text) {
                Some(number) => Value::Number(number),
                None => Value::Symbol(self.rodeo.get_or_intern(text)),
            },
        }
    }
}

/// Numeric when led by a digit, or by a sign or dot followed by a digit.
/// Anything else (`-`, `->`, `+x`) is a symbol.
fn parse_number(text: &str) -> Option<f64> {
    let mut chars = text.chars();
    let leading = match chars.next()? {
        '+' | '-' => match chars.next()? {
            '.' => chars.next()?,
            c => c,
        },
        '.' => chars.next()?,
        c => c,
    };
    if !leading.is_ascii_digit() {
        return None;
    }
    text.parse().ok()
}

fn read_quoted(quoted: Quoted, span: Span) -> Result<Value, SyntaxError> {
    match quoted.flags.strip_prefix('r') {
        Some(flags) => RegexValue::new(&quoted.text, flags)
            .map(|regex| Value::Regex(regex.into()))
            .map_err(|error| {
                SyntaxError::new(SyntaxErrorKind::InvalidRegex(error.to_string().into()), span)
            }),
        // unknown prefixes are dropped, the literal is still a string
        None => Ok(Value::string(unescape(&quoted.text))),
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{read_all, read_one, SyntaxError, SyntaxErrorKind};
    use crate::{
        lexer::LexerError,
        value::{ListKind, Value},
    };
    use assert2::{check, let_assert};
    use lasso::Rodeo;

    fn read(source: &str) -> (Vec<Value>, Rodeo) {
        let mut rodeo = Rodeo::default();
        let_assert!(Ok(forms) = read_all(source, &mut rodeo));
        (forms, rodeo)
    }

    fn fail(source: &str) -> SyntaxError {
        let mut rodeo = Rodeo::default();
        let_assert!(Err(error) = read_all(source, &mut rodeo));
        error
    }

    fn symbol_name(value: &Value, rodeo: &Rodeo) -> String {
        let_assert!(Value::Symbol(symbol) = value);
        rodeo.resolve(symbol).to_string()
    }

    #[test]
    fn scalars() {
        let (forms, rodeo) = read("1 -2.5 .5 nil true false \"hi\" - -> +x");
        check!(forms[0] == Value::Number(1.0));
        check!(forms[1] == Value::Number(-2.5));
        check!(forms[2] == Value::Number(0.5));
        check!(forms[3] == Value::Nil);
        check!(forms[4] == Value::Bool(true));
        check!(forms[5] == Value::Bool(false));
        check!(forms[6] == Value::string("hi"));
        check!(symbol_name(&forms[7], &rodeo) == "-");
        check!(symbol_name(&forms[8], &rodeo) == "->");
        check!(symbol_name(&forms[9], &rodeo) == "+x");
    }

    #[test]
    fn strings_are_never_symbols() {
        let (forms, _) = read(r#""foo" "a\"b\n""#);
        check!(forms == vec![Value::string("foo"), Value::string("a\"b\n")]);
    }

    #[test]
    fn list_kinds() {
        let (forms, _) = read("(a b) [a b] ()");
        let_assert!([Value::List(call), Value::List(literal), Value::List(empty)] = forms.as_slice());
        check!(call.kind() == ListKind::Invocation);
        check!(literal.kind() == ListKind::Sequence);
        check!(empty.is_empty());
    }

    #[test]
    fn sigils_wrap_the_next_form() {
        let (forms, rodeo) = read("'a ^(b ~c ~@d) @e");
        let_assert!([Value::List(quote), Value::List(quasi), Value::List(deref)] = forms.as_slice());
        check!(symbol_name(&quote.items()[0], &rodeo) == "quote");
        check!(symbol_name(&quote.items()[1], &rodeo) == "a");
        check!(symbol_name(&quasi.items()[0], &rodeo) == "quasiquote");
        let_assert!(Value::List(template) = &quasi.items()[1]);
        let_assert!(Value::List(unquote) = &template.items()[1]);
        check!(symbol_name(&unquote.items()[0], &rodeo) == "unquote");
        let_assert!(Value::List(splice) = &template.items()[2]);
        check!(symbol_name(&splice.items()[0], &rodeo) == "splice-unquote");
        check!(symbol_name(&deref.items()[0], &rodeo) == "deref");
    }

    #[test]
    fn braces_build_hash_maps() {
        let (forms, rodeo) = read("{\"a\" 1 b 2}");
        let_assert!([Value::List(map)] = forms.as_slice());
        check!(map.kind() == ListKind::Invocation);
        check!(map.len() == 5);
        check!(symbol_name(&map.items()[0], &rodeo) == "hash-map");

        let error = fail("{a 1 b}");
        check!(error.kind == SyntaxErrorKind::OddMapLiteral);
        check!(error.span == (0..7));
    }

    #[test]
    fn regex_literals() {
        let (forms, _) = read(r#"r"^\d+$" ri"abc""#);
        let_assert!([Value::Regex(digits), Value::Regex(abc)] = forms.as_slice());
        check!(digits.regex().is_match("123"));
        check!(digits.pattern() == r"^\d+$");
        check!(abc.regex().is_match("ABC"));

        let_assert!(SyntaxErrorKind::InvalidRegex(_) = fail(r#"rq"a""#).kind);
        let_assert!(SyntaxErrorKind::InvalidRegex(_) = fail(r#"r"(""#).kind);
    }

    #[test]
    fn unbalanced_input() {
        let error = fail("(a (b c)");
        check!(error.kind == SyntaxErrorKind::UnexpectedEof);
        check!(error.to_string().contains("premature end of input"));
        check!(error.span == (8..8));

        check!(fail("a)").kind == SyntaxErrorKind::Unexpected(")".into()));
        check!(
            fail("(a]").kind
                == SyntaxErrorKind::Mismatched {
                    expected: ")",
                    found: "]".into()
                }
        );
        check!(fail("'").kind == SyntaxErrorKind::UnexpectedEof);
        check!(fail("\"abc").kind == SyntaxErrorKind::Lexer(LexerError::UnterminatedString));
    }

    #[test]
    fn deeply_nested_forms() {
        let depth = 100_000;
        let source = format!("'{}x{}", "(".repeat(depth), ")".repeat(depth));
        let (forms, rodeo) = read(&source);
        let_assert!([Value::List(quote)] = forms.as_slice());
        check!(symbol_name(&quote.items()[0], &rodeo) == "quote");

        let mut levels = 0;
        let mut current = &quote.items()[1];
        while let Value::List(list) = current {
            levels += 1;
            current = &list.items()[0];
        }
        check!(levels == depth);
        check!(symbol_name(current, &rodeo) == "x");

        let error = fail(&"[".repeat(depth));
        check!(error.kind == SyntaxErrorKind::UnexpectedEof);
    }

    #[test]
    fn open_forms_and_strings_are_incomplete() {
        check!(fail("(a (b c)").is_incomplete());
        check!(fail("(print \"first line\n").is_incomplete());
        check!(fail("\"abc").is_incomplete());
        check!(!fail("a)").is_incomplete());
        check!(!fail("{a 1 b}").is_incomplete());
    }

    #[test]
    fn read_one_reports_the_rest() {
        let mut rodeo = Rodeo::default();
        let source = "(+ 1 2) tail";
        let_assert!(Ok(Some((form, position))) = read_one(source, &mut rodeo));
        let_assert!(Value::List(list) = form);
        check!(list.len() == 3);
        check!(&source[position..] == " tail");
        let_assert!(Ok(None) = read_one("  ; only a comment", &mut rodeo));
    }
}
