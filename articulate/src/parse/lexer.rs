//! Tokenizer for definition files
use super::Diagnostic;
use std::{iter::Peekable, str::Chars};

/// Punctuation recognized by the tokenizer
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::Display)]
pub enum Symbol {
    #[strum(to_string = "{{")]
    OpenBrace,
    #[strum(to_string = "}}")]
    CloseBrace,
    #[strum(to_string = "(")]
    OpenParen,
    #[strum(to_string = ")")]
    CloseParen,
    #[strum(to_string = "=")]
    Equals,
    #[strum(to_string = "/")]
    Slash,
    #[strum(to_string = ";")]
    Semicolon,
    #[strum(to_string = ",")]
    Comma,
    #[strum(to_string = "-")]
    Minus,
    #[strum(to_string = "+")]
    Plus,
}

impl Symbol {
    fn from_char(c: char) -> Option<Self> {
        let s = match c {
            '{' => Symbol::OpenBrace,
            '}' => Symbol::CloseBrace,
            '(' => Symbol::OpenParen,
            ')' => Symbol::CloseParen,
            '=' => Symbol::Equals,
            '/' => Symbol::Slash,
            ';' => Symbol::Semicolon,
            ',' => Symbol::Comma,
            '-' => Symbol::Minus,
            '+' => Symbol::Plus,
            _ => return None,
        };
        Some(s)
    }
}

/// Token payload
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword; keywords are recognized by the grammar
    Word(String),
    /// Unsigned decimal number
    Number(f64),
    /// Punctuation
    Symbol(Symbol),
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Word(w) => write!(f, "'{w}'"),
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::Symbol(s) => write!(f, "'{s}'"),
        }
    }
}

/// A token and the position of its first character
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// Payload
    pub kind: TokenKind,
    /// Line, starting at 1
    pub line: usize,
    /// Column, starting at 1
    pub col: usize,
}

fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn take_digits(
    s: &mut String,
    chars: &mut Peekable<Chars<'_>>,
    col: &mut usize,
) {
    while let Some(&c) = chars.peek().filter(|c| c.is_ascii_digit()) {
        s.push(c);
        chars.next();
        *col += 1;
    }
}

/// Splits a definition file into tokens
///
/// Characters that cannot start a token are reported and skipped.  Returns
/// the tokens, any diagnostics, and the position just past the end of input.
pub fn tokenize(text: &str) -> (Vec<Token>, Vec<Diagnostic>, (usize, usize)) {
    let mut out = vec![];
    let mut errs = vec![];

    let mut line = 1;
    let mut col = 1;
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        let (start_line, start_col) = (line, col);
        if c == '\n' {
            chars.next();
            line += 1;
            col = 1;
            continue;
        } else if c.is_whitespace() {
            chars.next();
            col += 1;
            continue;
        } else if c == '#' {
            while chars.peek().is_some_and(|c| *c != '\n') {
                chars.next();
                col += 1;
            }
            continue;
        }

        let kind = if is_word_start(c) {
            let mut w = String::new();
            while let Some(&c) = chars.peek().filter(|c| is_word(**c)) {
                w.push(c);
                chars.next();
                col += 1;
            }
            TokenKind::Word(w)
        } else if c.is_ascii_digit() || c == '.' {
            let mut s = String::new();
            take_digits(&mut s, &mut chars, &mut col);
            if chars.peek() == Some(&'.') {
                s.push('.');
                chars.next();
                col += 1;
                take_digits(&mut s, &mut chars, &mut col);
            }
            // exponent, only if digits follow
            if matches!(chars.peek(), Some('e' | 'E')) {
                let mut ahead = chars.clone();
                ahead.next();
                let sign = ahead.next_if(|c| *c == '-' || *c == '+');
                if ahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                    s.push('e');
                    chars.next();
                    col += 1;
                    if let Some(sign) = sign {
                        s.push(sign);
                        chars.next();
                        col += 1;
                    }
                    take_digits(&mut s, &mut chars, &mut col);
                }
            }
            match s.parse::<f64>() {
                Ok(v) => TokenKind::Number(v),
                Err(_) => {
                    errs.push(Diagnostic::error(
                        start_line,
                        start_col,
                        format!("malformed number '{s}'"),
                    ));
                    continue;
                }
            }
        } else if let Some(s) = Symbol::from_char(c) {
            chars.next();
            col += 1;
            TokenKind::Symbol(s)
        } else {
            chars.next();
            col += 1;
            errs.push(Diagnostic::error(
                start_line,
                start_col,
                format!("unexpected character '{c}'"),
            ));
            continue;
        };
        out.push(Token {
            kind,
            line: start_line,
            col: start_col,
        });
    }
    (out, errs, (line, col))
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(s: &str) -> Vec<TokenKind> {
        let (t, e, _) = tokenize(s);
        assert!(e.is_empty(), "{e:?}");
        t.into_iter().map(|t| t.kind).collect()
    }

    fn word(s: &str) -> TokenKind {
        TokenKind::Word(s.to_owned())
    }

    #[test]
    fn words_and_symbols() {
        assert_eq!(
            kinds("path = base/arm1-arm.2;"),
            vec![
                word("path"),
                TokenKind::Symbol(Symbol::Equals),
                word("base"),
                TokenKind::Symbol(Symbol::Slash),
                word("arm1"),
                TokenKind::Symbol(Symbol::Minus),
                word("arm.2"),
                TokenKind::Symbol(Symbol::Semicolon),
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("-5, 2.5e3, .5 25.4mm 3e"),
            vec![
                TokenKind::Symbol(Symbol::Minus),
                TokenKind::Number(5.0),
                TokenKind::Symbol(Symbol::Comma),
                TokenKind::Number(2500.0),
                TokenKind::Symbol(Symbol::Comma),
                TokenKind::Number(0.5),
                TokenKind::Number(25.4),
                word("mm"),
                TokenKind::Number(3.0),
                word("e"),
            ]
        );
    }

    #[test]
    fn symbol_text() {
        assert_eq!(Symbol::OpenBrace.to_string(), "{");
        assert_eq!(TokenKind::Symbol(Symbol::CloseBrace).to_string(), "'}'");
        assert_eq!(TokenKind::Symbol(Symbol::Equals).to_string(), "'='");
    }

    #[test]
    fn positions_and_comments() {
        let (t, e, end) = tokenize("# header\njoint  a {\n}\n");
        assert!(e.is_empty());
        assert_eq!((t[0].line, t[0].col), (2, 1));
        assert_eq!((t[1].line, t[1].col), (2, 8));
        assert_eq!((t[3].line, t[3].col), (3, 1));
        assert_eq!(end, (4, 1));
    }

    #[test]
    fn bad_characters() {
        let (t, e, _) = tokenize("a @ b");
        assert_eq!(t.len(), 2);
        assert_eq!(e.len(), 1);
        assert_eq!((e[0].line, e[0].col), (1, 3));
    }
}
