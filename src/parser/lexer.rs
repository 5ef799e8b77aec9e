//! `logos`-derived tokenizer for a single, comment-stripped source line.
//!
//! The Cell Parser (§4.2) does not need a full grammar — only enough token
//! structure to tell a definition context from a reference context. This
//! lexer produces a flat token stream; `analysis.rs` walks it with a small
//! scope-tracking pass.

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t]+")]
pub enum Token {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, priority = 3)]
    #[regex(r"'([^'\\]|\\.)*'", priority = 3)]
    Str,

    #[regex(r"[0-9][0-9_]*(\.[0-9_]+)?([eE][+-]?[0-9]+)?")]
    Number,

    #[token(":=")]
    Walrus,

    #[token("==")]
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    Comparison,

    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("//=")]
    #[token("%=")]
    #[token("**=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token(">>=")]
    #[token("<<=")]
    AugAssign,

    #[token("=")]
    Equals,

    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

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

    #[token("*")]
    Star,

    #[token("**")]
    DoubleStar,

    #[regex(r"[+\-/%<>&|^~!@]")]
    Op,
}

/// Tokenize a single preprocessed line. Returns `None` on a lex error so the
/// caller can fall back to treating the cell as unparseable (spec §4.2: on a
/// scan error the parser returns an empty analysis, never raises).
pub fn tokenize_line(line: &str) -> Option<Vec<Token>> {
    let mut lexer = Token::lexer(line);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(tok) => tokens.push(tok),
            Err(_) => return None,
        }
    }
    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_assignment() {
        let tokens = tokenize_line("x = y + 1").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("x".into()),
                Token::Equals,
                Token::Ident("y".into()),
                Token::Op,
                Token::Number,
            ]
        );
    }

    #[test]
    fn distinguishes_aug_assign_from_equals() {
        let tokens = tokenize_line("x += 1").unwrap();
        assert_eq!(tokens, vec![Token::Ident("x".into()), Token::AugAssign, Token::Number]);
    }

    #[test]
    fn distinguishes_walrus_from_equals() {
        let tokens = tokenize_line("if (n := len(a)) > 0:").unwrap();
        assert!(tokens.contains(&Token::Walrus));
    }
}
