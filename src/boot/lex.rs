//! Tokenizing boot records.
//!
//! This module holds the tokens that make up a boot record stream ([`Token`]).
//! A boot record stream is a sequence of whitespace-separated hex values,
//! some tagged with a one-character flag:
//!
//! ```text
//! =0100          set the write cursor to 0x100
//! 4E71 4E75      poke two words at the cursor
//! P0104          set a breakpoint at 0x104
//! !              dump everything written so far
//! ...            end of stream
//! ```
//!
//! Runs of one or two dots are invisible anywhere in a stream, even inside a value
//! (`12.34` is `1234`). They are removed by [`squeeze_dots`] before lexing.

use std::borrow::Cow;

use logos::{Lexer, Logos};

use crate::err::BootLexErr;

/// A unit of information in a boot record stream.
#[derive(Debug, Logos, PartialEq, Eq, Clone, Copy)]
#[logos(skip r"[ \t\r\n]+", error = BootLexErr)]
pub enum Token {
    /// Set the write cursor (e.g., `=2000`).
    #[regex(r"=[0-9A-Fa-f]*", lex_flagged)]
    Cursor(u32),

    /// A discarded address (e.g., `%2000`).
    #[regex(r"%[0-9A-Fa-f]*", lex_flagged)]
    Mark(u32),

    /// Set a breakpoint (e.g., `P2000`).
    #[regex(r"P[0-9A-Fa-f]*", lex_flagged)]
    Break(u32),

    /// Set a breakpoint and trace the word containing it (e.g., `Q2000`).
    #[regex(r"Q[0-9A-Fa-f]*", lex_flagged)]
    Trace(u32),

    /// Set a breakpoint and report the next word each time it's hit (e.g., `R2000`).
    #[regex(r"R[0-9A-Fa-f]*", lex_flagged)]
    DoNext(u32),

    /// A data word (e.g., `4E71`).
    #[regex(r"[0-9A-Fa-f]+", |lx| hex_value(lx.slice()))]
    Data(u32),

    /// Dump the memory written so far.
    #[token("!")]
    Dump,

    /// Stop reading this stream.
    #[token("...")]
    End,
}

impl Token {
    /// Whether this token carries a hex value.
    pub fn has_value(&self) -> bool {
        !matches!(self, Token::Dump | Token::End)
    }
}

/// Drops every run of one or two dots, and cuts the stream off after the first run of three.
///
/// ```
/// use sbc68k::boot::lex::squeeze_dots;
///
/// assert_eq!(squeeze_dots("12.34 5..6"), "1234 56");
/// assert_eq!(squeeze_dots("AB ....CD"), "AB ...");
/// ```
pub fn squeeze_dots(src: &str) -> Cow<'_, str> {
    if !src.contains('.') {
        return Cow::Borrowed(src);
    }

    let mut out = String::with_capacity(src.len());
    let mut dots = 0;
    for c in src.chars() {
        if c != '.' {
            dots = 0;
            out.push(c);
            continue;
        }

        dots += 1;
        if dots == 3 {
            out.push_str("...");
            break;
        }
    }
    Cow::Owned(out)
}

/// Accumulates hex digits, keeping the low 32 bits.
fn hex_value(digits: &str) -> u32 {
    digits.chars()
        .filter_map(|c| c.to_digit(16))
        .fold(0u32, |acc, d| acc.wrapping_shl(4) | d)
}

fn lex_flagged(lx: &Lexer<'_, Token>) -> Result<u32, BootLexErr> {
    match &lx.slice()[1..] {
        "" => Err(BootLexErr::MissingDigits),
        digits => Ok(hex_value(digits)),
    }
}

#[cfg(test)]
mod tests {
    use logos::Logos;

    use std::borrow::Cow;

    use super::{squeeze_dots, Token};
    use crate::err::BootLexErr;

    #[test]
    fn test_records() {
        let mut tokens = Token::lexer("=0010 00FF\t1234\r\n!");
        assert_eq!(tokens.next(), Some(Ok(Token::Cursor(0x10))));
        assert_eq!(tokens.next(), Some(Ok(Token::Data(0xFF))));
        assert_eq!(tokens.next(), Some(Ok(Token::Data(0x1234))));
        assert_eq!(tokens.next(), Some(Ok(Token::Dump)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_flags() {
        let mut tokens = Token::lexer("%1 P2000 Q20a0 R2fF0");
        assert_eq!(tokens.next(), Some(Ok(Token::Mark(1))));
        assert_eq!(tokens.next(), Some(Ok(Token::Break(0x2000))));
        assert_eq!(tokens.next(), Some(Ok(Token::Trace(0x20A0))));
        assert_eq!(tokens.next(), Some(Ok(Token::DoNext(0x2FF0))));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_missing_digits() {
        let mut tokens = Token::lexer("= 12 P");
        assert_eq!(tokens.next(), Some(Err(BootLexErr::MissingDigits)));
        assert_eq!(tokens.next(), Some(Ok(Token::Data(0x12))));
        assert_eq!(tokens.next(), Some(Err(BootLexErr::MissingDigits)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_squeeze_dots() {
        assert!(matches!(squeeze_dots("12 34"), Cow::Borrowed("12 34")));
        assert_eq!(squeeze_dots("12.34"), "1234");
        assert_eq!(squeeze_dots("P.2..0.0"), "P200");
        assert_eq!(squeeze_dots("56... 78"), "56...");
        assert_eq!(squeeze_dots("1.. .2"), "1 2");

        let src = squeeze_dots("=1.0 12..34 ...");
        let mut tokens = Token::lexer(&*src);
        assert_eq!(tokens.next(), Some(Ok(Token::Cursor(0x10))));
        assert_eq!(tokens.next(), Some(Ok(Token::Data(0x1234))));
        assert_eq!(tokens.next(), Some(Ok(Token::End)));
        assert_eq!(tokens.next(), None);
    }

    #[test]
    fn test_dump_lookahead() {
        // `!` right after a value is not swallowed by it
        let mut tokens = Token::lexer("1234!");
        assert_eq!(tokens.next(), Some(Ok(Token::Data(0x1234))));
        assert_eq!(tokens.next(), Some(Ok(Token::Dump)));
    }

    #[test]
    fn test_wrapping() {
        let mut tokens = Token::lexer("123456789");
        assert_eq!(tokens.next(), Some(Ok(Token::Data(0x23456789))));
    }

    #[test]
    fn test_invalid_symbol() {
        let mut tokens = Token::lexer("x 1");
        assert_eq!(tokens.next(), Some(Err(BootLexErr::InvalidSymbol)));
        assert_eq!(tokens.next(), Some(Ok(Token::Data(1))));
        assert_eq!(tokens.next(), None);
    }
}
