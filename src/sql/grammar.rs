//! Keyword rule tables and a token cursor for the DDL parser.
//!
//! Dispatch walks a rule table in order and the first rule whose keyword
//! prefix matches wins. Each kind's required captures are read afterwards
//! through [`Cursor`].

use super::lexer::{Spanned, Token};
use crate::model::{DEFAULT_SCHEMA, FkAction};
use std::fmt;

#[derive(Debug, Clone, Copy)]
pub struct Rule<K: 'static> {
    pub keywords: &'static [&'static str],
    pub kind: K,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CreateSchema,
    CreateType,
    CreateTable,
    CommentOnTable,
    CommentOnColumn,
}

pub const STATEMENT_RULES: &[Rule<StatementKind>] = &[
    Rule { keywords: &["CREATE", "SCHEMA"], kind: StatementKind::CreateSchema },
    Rule { keywords: &["CREATE", "TYPE"], kind: StatementKind::CreateType },
    Rule { keywords: &["CREATE", "TABLE"], kind: StatementKind::CreateTable },
    Rule { keywords: &["COMMENT", "ON", "TABLE"], kind: StatementKind::CommentOnTable },
    Rule { keywords: &["COMMENT", "ON", "COLUMN"], kind: StatementKind::CommentOnColumn },
];

/// Table body item kinds. Anything no rule matches is a column definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Named,
    Unsupported,
}

pub const ITEM_RULES: &[Rule<ItemKind>] = &[
    Rule { keywords: &["PRIMARY", "KEY"], kind: ItemKind::PrimaryKey },
    Rule { keywords: &["UNIQUE"], kind: ItemKind::Unique },
    Rule { keywords: &["FOREIGN", "KEY"], kind: ItemKind::ForeignKey },
    Rule { keywords: &["CONSTRAINT"], kind: ItemKind::Named },
    Rule { keywords: &["CHECK"], kind: ItemKind::Unsupported },
    Rule { keywords: &["EXCLUDE"], kind: ItemKind::Unsupported },
    Rule { keywords: &["LIKE"], kind: ItemKind::Unsupported },
];

/// Keywords that end a column's type and open a column clause.
pub const COLUMN_CLAUSES: &[&str] = &[
    "NOT",
    "NULL",
    "DEFAULT",
    "PRIMARY",
    "UNIQUE",
    "REFERENCES",
    "CHECK",
    "CONSTRAINT",
    "COLLATE",
    "GENERATED",
];

/// First rule in `rules` whose keywords prefix `tokens`, with the number of
/// tokens its keywords cover.
pub fn dispatch<K: Copy>(rules: &[Rule<K>], tokens: &[Spanned]) -> Option<(K, usize)> {
    rules.iter().find_map(|rule| {
        let matched = rule.keywords.len() <= tokens.len()
            && rule
                .keywords
                .iter()
                .zip(tokens)
                .all(|(kw, t)| t.token.is_keyword(kw));
        matched.then_some((rule.kind, rule.keywords.len()))
    })
}

/// A `schema.name` pair; unqualified names live in `public`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    /// Last part is the name, the one before it the schema.
    pub fn from_parts(mut parts: Vec<String>) -> Option<Self> {
        let name = parts.pop()?;
        let schema = parts.pop().unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        Some(Self { schema, name })
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// What the parser was looking for when a statement stopped matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected(pub String);

impl Expected {
    pub fn new(what: impl Into<String>) -> Self {
        Self(what.into())
    }
}

pub type Capture<T> = Result<T, Expected>;

pub struct Cursor<'a> {
    src: &'a str,
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str, tokens: &'a [Spanned]) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
        }
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n).map(|s| &s.token)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.tokens.len());
    }

    /// Source text of the next token in backticks.
    pub fn describe_next(&self) -> String {
        match self.tokens.get(self.pos) {
            Some(s) => format!("`{}`", &self.src[s.start..s.end]),
            None => "end of statement".to_string(),
        }
    }

    fn fail<T>(&self, what: &str) -> Capture<T> {
        Err(Expected::new(format!(
            "expected {}, found {}",
            what,
            self.describe_next()
        )))
    }

    pub fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume the whole keyword sequence or nothing.
    pub fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        let matched = keywords
            .iter()
            .enumerate()
            .all(|(i, kw)| self.peek_nth(i).is_some_and(|t| t.is_keyword(kw)));
        if matched {
            self.pos += keywords.len();
        }
        matched
    }

    pub fn expect_keywords(&mut self, keywords: &[&str]) -> Capture<()> {
        if self.eat_keywords(keywords) {
            Ok(())
        } else {
            self.fail(&keywords.join(" "))
        }
    }

    pub fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, token: &Token, what: &str) -> Capture<()> {
        if self.eat(token) {
            Ok(())
        } else {
            self.fail(what)
        }
    }

    pub fn ident(&mut self, what: &str) -> Capture<String> {
        match self.peek() {
            Some(Token::Word(s)) | Some(Token::Quoted(s)) => {
                self.pos += 1;
                Ok(s.clone())
            }
            _ => self.fail(what),
        }
    }

    /// `ident (. ident)*`
    pub fn dotted(&mut self, what: &str) -> Capture<Vec<String>> {
        let mut parts = vec![self.ident(what)?];
        while self.eat(&Token::Dot) {
            parts.push(self.ident(what)?);
        }
        Ok(parts)
    }

    pub fn qualified(&mut self, what: &str) -> Capture<QualifiedName> {
        let parts = self.dotted(what)?;
        QualifiedName::from_parts(parts).ok_or_else(|| Expected::new(what))
    }

    pub fn string(&mut self, what: &str) -> Capture<String> {
        match self.peek() {
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(s.clone())
            }
            _ => self.fail(what),
        }
    }

    /// `( ident, ... )`
    pub fn ident_list(&mut self, what: &str) -> Capture<Vec<String>> {
        self.expect(&Token::LParen, &format!("`(` before {}", what))?;
        let mut names = vec![self.ident(what)?];
        while self.eat(&Token::Comma) {
            names.push(self.ident(what)?);
        }
        self.expect(&Token::RParen, &format!("`)` after {}", what))?;
        Ok(names)
    }

    pub fn referential_action(&mut self) -> Capture<FkAction> {
        FkAction::ALL
            .into_iter()
            .find(|action| self.eat_keywords(action.keywords()))
            .map_or_else(
                || self.fail("NO ACTION, RESTRICT, CASCADE, SET NULL or SET DEFAULT"),
                Ok,
            )
    }

    /// Index of the `)` closing the `(` at the current position.
    pub fn matching_paren(&self) -> Option<usize> {
        let mut depth = 0usize;
        for (i, s) in self.tokens.iter().enumerate().skip(self.pos) {
            match s.token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Source text from the start of token `from` to the end of token `to`, inclusive.
    pub fn text(&self, from: usize, to: usize) -> &'a str {
        &self.src[self.tokens[from].start..self.tokens[to].end]
    }

    /// Source text strictly between tokens `open` and `close`.
    pub fn inner_text(&self, open: usize, close: usize) -> &'a str {
        &self.src[self.tokens[open].end..self.tokens[close].start]
    }

    /// Only an optional `;` remains.
    pub fn is_done(&self) -> bool {
        match self.peek() {
            None => true,
            Some(Token::Semicolon) => self.pos + 1 == self.tokens.len(),
            Some(_) => false,
        }
    }

    pub fn finish(&self, what: &str) -> Capture<()> {
        if self.is_done() {
            Ok(())
        } else {
            self.fail(&format!("end of {}", what))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::lexer::Lexer;

    fn lex(input: &str) -> Vec<Spanned> {
        Lexer::new(input).tokenize().unwrap()
    }

    #[test]
    fn test_dispatch_first_match_wins() {
        let tokens = lex("create table t ()");
        assert_eq!(
            dispatch(STATEMENT_RULES, &tokens),
            Some((StatementKind::CreateTable, 2))
        );
        assert_eq!(dispatch(STATEMENT_RULES, &lex("CREATE INDEX i ON t (a)")), None);
        assert_eq!(dispatch(STATEMENT_RULES, &lex("CREATE")), None);
    }

    #[test]
    fn test_dispatch_ignores_quoted_keywords() {
        assert_eq!(dispatch(ITEM_RULES, &lex("\"unique\" text")), None);
        assert_eq!(
            dispatch(ITEM_RULES, &lex("unique (a)")),
            Some((ItemKind::Unique, 1))
        );
    }

    #[test]
    fn test_qualified_names() {
        let tokens = lex(r#""sales"."Order" users db.app.items"#);
        let mut cursor = Cursor::new("", &tokens);
        assert_eq!(
            cursor.qualified("name").unwrap(),
            QualifiedName { schema: "sales".into(), name: "Order".into() }
        );
        assert_eq!(cursor.qualified("name").unwrap().to_string(), "public.users");
        assert_eq!(cursor.qualified("name").unwrap().to_string(), "app.items");
    }

    #[test]
    fn test_referential_action() {
        let src = "SET NULL no action CASCADE SET";
        let tokens = lex(src);
        let mut cursor = Cursor::new(src, &tokens);
        assert_eq!(cursor.referential_action(), Ok(FkAction::SetNull));
        assert_eq!(cursor.referential_action(), Ok(FkAction::NoAction));
        assert_eq!(cursor.referential_action(), Ok(FkAction::Cascade));
        assert!(cursor.referential_action().is_err());
    }

    #[test]
    fn test_matching_paren_and_inner_text() {
        let src = "t (a numeric(10,2), b int) ;";
        let tokens = lex(src);
        let mut cursor = Cursor::new(src, &tokens);
        cursor.skip(1);
        let close = cursor.matching_paren().unwrap();
        assert_eq!(cursor.inner_text(1, close), "a numeric(10,2), b int");
        cursor.skip(close);
        assert!(cursor.is_done());
    }

    #[test]
    fn test_failure_describes_next_token() {
        let src = "CREATE SCHEMA ;";
        let tokens = lex(src);
        let mut cursor = Cursor::new(src, &tokens);
        cursor.skip(2);
        assert_eq!(
            cursor.ident("schema name"),
            Err(Expected::new("expected schema name, found `;`"))
        );
    }
}
