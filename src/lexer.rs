pub use logos::Span;
use logos::{Lexer, Logos};

/// A double-quoted literal, optionally led by a run of flag characters
/// (`r"^a+$"`, `ri"abc"`).
///
/// The text is kept exactly as written between the quotes, escapes included;
/// string literals and regex literals interpret it differently.
#[derive(Debug, Clone, PartialEq)]
pub struct Quoted {
    pub flags: Box<str>,
    pub text: Box<str>,
}

fn process_quoted(lexer: &mut Lexer<Token>) -> Quoted {
    // The regex guarantees an opening quote, and a closing one at the very end
    let (flags, rest) = lexer.slice().split_once('"').unwrap_or(("", ""));
    let text = rest.strip_suffix('"').unwrap_or(rest);
    Quoted {
        flags: Box::from(flags),
        text: Box::from(text),
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("invalid token encountered")]
    Invalid,
    #[error("unterminated string literal")]
    UnterminatedString,
}

/// Tokens are lexed lazily from some source. Whitespace, commas and line
/// comments never reach the reader.
#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(error = LexerError)]
#[logos(skip r"([ \t\r\n,]+|;[^\n]*)")]
pub enum Token {
    #[token("~@")]
    SpliceUnquote,

    #[regex(r#"[a-zA-Z0-9_]*"([^"\\]|\\.)*""#, process_quoted)]
    #[regex(r#"[a-zA-Z0-9_]*"([^"\\]|\\.)*"#, |_| Err(LexerError::UnterminatedString))]
    Quoted(Quoted),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("'")]
    Quote,
    #[token("^")]
    Quasiquote,
    #[token("~")]
    Unquote,
    #[token("@")]
    Deref,

    /// Numbers, booleans, nil and symbols all start out as a bare run of
    /// symbol characters, the reader classifies them.
    #[regex(r"[a-zA-Z0-9_%+*/#$&!?<>=.\-]+", |l| Box::from(l.slice()))]
    Bare(Box<str>),
}

impl Token {
    pub fn lexer(source: &str) -> Lexer<Self> {
        <Self as Logos>::lexer(source)
    }

    /// Text used when a token shows up somewhere it shouldn't
    pub fn describe(&self) -> String {
        match self {
            Self::SpliceUnquote => "~@".to_string(),
            Self::Quoted(quoted) => format!("{}\"{}\"", quoted.flags, quoted.text),
            Self::LParen => "(".to_string(),
            Self::RParen => ")".to_string(),
            Self::LBracket => "[".to_string(),
            Self::RBracket => "]".to_string(),
            Self::LBrace => "{".to_string(),
            Self::RBrace => "}".to_string(),
            Self::Quote => "'".to_string(),
            Self::Quasiquote => "^".to_string(),
            Self::Unquote => "~".to_string(),
            Self::Deref => "@".to_string(),
            Self::Bare(text) => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LexerError, Quoted, Token};
    use assert2::{check, let_assert};

    fn tokens(source: &str) -> Vec<Result<Token, LexerError>> {
        Token::lexer(source).collect()
    }

    fn bare(text: &str) -> Result<Token, LexerError> {
        Ok(Token::Bare(Box::from(text)))
    }

    #[test]
    fn sigils() {
        check!(
            tokens("'a ^b ~c ~@d @e")
                == vec![
                    Ok(Token::Quote),
                    bare("a"),
                    Ok(Token::Quasiquote),
                    bare("b"),
                    Ok(Token::Unquote),
                    bare("c"),
                    Ok(Token::SpliceUnquote),
                    bare("d"),
                    Ok(Token::Deref),
                    bare("e"),
                ]
        );
    }

    #[test]
    fn delimiters_and_separators() {
        check!(
            tokens("([{}]) , x")
                == vec![
                    Ok(Token::LParen),
                    Ok(Token::LBracket),
                    Ok(Token::LBrace),
                    Ok(Token::RBrace),
                    Ok(Token::RBracket),
                    Ok(Token::RParen),
                    bare("x"),
                ]
        );
    }

    #[test]
    fn bare_runs() {
        check!(tokens("-12.5e3") == vec![bare("-12.5e3")]);
        check!(
            tokens("swap! ->> <= a.b foo#")
                == vec![
                    bare("swap!"),
                    bare("->>"),
                    bare("<="),
                    bare("a.b"),
                    bare("foo#"),
                ]
        );
    }

    #[test]
    fn quoted_literals() {
        let plain = tokens(r#""hello \"world\"""#);
        let_assert!([Ok(Token::Quoted(plain))] = plain.as_slice());
        check!(plain.flags.as_ref() == "");
        check!(plain.text.as_ref() == r#"hello \"world\""#);

        let flagged = tokens(r#"ri"^\d+$""#);
        let_assert!([Ok(Token::Quoted(Quoted { flags, text }))] = flagged.as_slice());
        check!(flags.as_ref() == "ri");
        check!(text.as_ref() == r"^\d+$");
    }

    #[test]
    fn comments_are_skipped() {
        check!(
            tokens("; nothing here\n(a ; trailing\n b)")
                == vec![
                    Ok(Token::LParen),
                    bare("a"),
                    bare("b"),
                    Ok(Token::RParen),
                ]
        );
        check!(tokens("").is_empty());
    }

    #[test]
    fn unterminated_string() {
        check!(tokens(r#""abc"#) == vec![Err(LexerError::UnterminatedString)]);
    }
}
