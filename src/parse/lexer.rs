use winnow::combinator::alt;
use winnow::error::ModalResult;
use winnow::prelude::*;
use winnow::token::{any, one_of, take_while};

use super::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind<'i> {
    Open,
    Close,
    /// A bare run of text: attribute, keyword or unquoted literal.
    Word(&'i str),
    /// A run of comparator characters such as `>` or `>=`.
    Symbol(&'i str),
    /// A quoted literal with quotes removed and escapes resolved.
    Quoted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token<'i> {
    pub(crate) kind: TokenKind<'i>,
    /// Byte offset of the token in the rule text.
    pub(crate) offset: usize,
    /// The token exactly as written.
    pub(crate) raw: &'i str,
}

// -- Whitespace -------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

// -- Words ------------------------------------------------------------------

fn is_comparator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '!')
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !is_comparator_char(c) && !matches!(c, '(' | ')' | '\'' | '"')
}

fn word<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., is_word_char).parse_next(input)
}

/// Comparator symbols lex on their own so `age>30` splits into three tokens.
/// Runs like `>=` stay together and are rejected later as unsupported.
fn comparator<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., is_comparator_char).parse_next(input)
}

// -- Quoted literals --------------------------------------------------------

fn quoted(input: &mut &str) -> ModalResult<String> {
    let quote = one_of(['\'', '"']).parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = any.parse_next(input)?;
        match ch {
            c if c == quote => return Ok(s),
            '\\' => {
                let esc = any.parse_next(input)?;
                match esc {
                    '\'' | '"' | '\\' => s.push(esc),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn token_kind<'i>(input: &mut &'i str) -> ModalResult<TokenKind<'i>> {
    alt((
        '('.value(TokenKind::Open),
        ')'.value(TokenKind::Close),
        quoted.map(TokenKind::Quoted),
        comparator.map(TokenKind::Symbol),
        word.map(TokenKind::Word),
    ))
    .parse_next(input)
}

/// Split rule text into tokens. Whitespace separates tokens and is otherwise
/// dropped, so keyword detection works on whole words only.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut input = source;
    let mut tokens = Vec::new();

    loop {
        // `ws` accepts zero characters and cannot fail.
        let _ = ws.parse_next(&mut input);
        if input.is_empty() {
            break;
        }

        let offset = source.len() - input.len();
        let before = input;
        match token_kind.parse_next(&mut input) {
            Ok(kind) => {
                let raw = &before[..before.len() - input.len()];
                tokens.push(Token { kind, offset, raw });
            }
            // Every other character starts a word, so only an unclosed
            // quote can fail here.
            Err(_) => return Err(ParseError::UnterminatedString { offset }),
        }
    }

    Ok(tokens)
}
