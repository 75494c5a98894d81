//! SQL lexer for a single statement or definition item.
//!
//! Tokens keep their byte span so the parser can lift type names and
//! default expressions out of the source verbatim.

use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare identifier or keyword, as typed.
    Word(String),
    /// `"identifier"` with doubled quotes unescaped.
    Quoted(String),
    /// `'literal'` with doubled quotes unescaped.
    Str(String),
    Num(String),

    LParen,
    RParen,
    Comma,
    Dot,
    Semicolon,
    /// Operators and other punctuation (`::`, `=`, `[`, ...).
    Symbol(char),
}

impl Token {
    /// Case-insensitive keyword test; quoted identifiers never match.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated quoted identifier")]
    UnterminatedIdentifier,
    #[error("unterminated block comment")]
    UnterminatedComment,
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    /// Byte offset of the next unread character.
    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |&(i, _)| i)
    }

    fn second_char(&self, at: usize) -> Option<char> {
        self.input[at..].chars().nth(1)
    }

    fn skip_line_comment(&mut self) {
        for (_, c) in self.chars.by_ref() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        // opening "/*" already consumed
        let mut prev = '\0';
        for (_, c) in self.chars.by_ref() {
            if prev == '*' && c == '/' {
                return Ok(());
            }
            prev = c;
        }
        Err(LexError::UnterminatedComment)
    }

    /// Read up to the closing `quote`, treating a doubled quote as a literal one.
    fn read_quoted(&mut self, quote: char) -> Option<String> {
        let mut s = String::new();
        while let Some((_, c)) = self.chars.next() {
            if c == quote {
                if self.peek_char() == Some(quote) {
                    s.push(quote);
                    self.chars.next();
                } else {
                    return Some(s);
                }
            } else {
                s.push(c);
            }
        }
        None
    }

    fn read_while(&mut self, first: char, keep: impl Fn(char) -> bool) -> String {
        let mut s = String::from(first);
        while let Some(c) = self.peek_char() {
            if keep(c) {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s
    }

    pub fn next_token(&mut self) -> Result<Option<Spanned>, LexError> {
        loop {
            let Some((start, c)) = self.chars.next() else {
                return Ok(None);
            };

            let token = match c {
                c if c.is_whitespace() => continue,
                '-' if self.second_char(start) == Some('-') => {
                    self.skip_line_comment();
                    continue;
                }
                '/' if self.second_char(start) == Some('*') => {
                    self.chars.next();
                    self.skip_block_comment()?;
                    continue;
                }
                '(' => Token::LParen,
                ')' => Token::RParen,
                ',' => Token::Comma,
                '.' => Token::Dot,
                ';' => Token::Semicolon,
                '"' => Token::Quoted(
                    self.read_quoted('"')
                        .ok_or(LexError::UnterminatedIdentifier)?,
                ),
                '\'' => Token::Str(self.read_quoted('\'').ok_or(LexError::UnterminatedString)?),
                c if c.is_ascii_digit() => {
                    Token::Num(self.read_while(c, |c| c.is_ascii_digit() || c == '.'))
                }
                c if c.is_alphabetic() || c == '_' => Token::Word(
                    self.read_while(c, |c| c.is_alphanumeric() || c == '_' || c == '$'),
                ),
                other => Token::Symbol(other),
            };

            let end = self.offset();
            return Ok(Some(Spanned { token, start, end }));
        }
    }

    /// Collect all tokens.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LexError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_simple_create_table() {
        assert_eq!(
            tokens("CREATE TABLE users (id INT);"),
            vec![
                Token::Word("CREATE".into()),
                Token::Word("TABLE".into()),
                Token::Word("users".into()),
                Token::LParen,
                Token::Word("id".into()),
                Token::Word("INT".into()),
                Token::RParen,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_quoted_identifiers_and_strings() {
        assert_eq!(
            tokens(r#""public"."User ""A""" IS 'it''s'"#),
            vec![
                Token::Quoted("public".into()),
                Token::Dot,
                Token::Quoted("User \"A\"".into()),
                Token::Word("IS".into()),
                Token::Str("it's".into()),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            tokens("-- comment\nCREATE /* block */ SCHEMA s -- trailing"),
            vec![
                Token::Word("CREATE".into()),
                Token::Word("SCHEMA".into()),
                Token::Word("s".into()),
            ]
        );
    }

    #[test]
    fn test_spans_cover_source() {
        let input = "price numeric(10, 2) DEFAULT 0.5";
        let spanned = Lexer::new(input).tokenize().unwrap();
        let default = spanned.last().unwrap();
        assert_eq!(default.token, Token::Num("0.5".into()));
        assert_eq!(&input[default.start..default.end], "0.5");
        assert_eq!(&input[spanned[1].start..spanned[6].end], "numeric(10, 2)");
    }

    #[test]
    fn test_symbols() {
        assert_eq!(
            tokens("'a'::text"),
            vec![
                Token::Str("a".into()),
                Token::Symbol(':'),
                Token::Symbol(':'),
                Token::Word("text".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated() {
        assert_eq!(
            Lexer::new("'abc").tokenize(),
            Err(LexError::UnterminatedString)
        );
        assert_eq!(
            Lexer::new("\"abc").tokenize(),
            Err(LexError::UnterminatedIdentifier)
        );
        assert_eq!(
            Lexer::new("/* abc").tokenize(),
            Err(LexError::UnterminatedComment)
        );
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        assert!(Token::Word("create".into()).is_keyword("CREATE"));
        assert!(!Token::Quoted("create".into()).is_keyword("CREATE"));
    }
}
