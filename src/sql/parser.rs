//! DDL parser: statements to table, type and schema drafts.
//!
//! Foreign keys and comments are only recorded here; [`super::resolver`]
//! attaches them once every table in the script is known.

use super::grammar::{
    COLUMN_CLAUSES, Capture, Cursor, Expected, ITEM_RULES, ItemKind, QualifiedName,
    STATEMENT_RULES, StatementKind, dispatch,
};
use super::lexer::{Lexer, Spanned, Token};
use super::resolver;
use super::splitter::{Statement, split_definition_list, split_statements};
use crate::id::new_id;
use crate::model::{Column, CustomType, DEFAULT_SCHEMA, DbModel, FkAction, Schema, Table, TypeKind};
use thiserror::Error;
use tracing::{debug, warn};

/// Column name treated as an implicit primary key.
const GENERIC_PK_NAME: &str = "id";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("constraint \"{constraint}\" references missing object {target}")]
    Reference { constraint: String, target: String },
    #[error("comment targets missing object {target}")]
    CommentTarget { target: String },
}

impl ParseError {
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Syntax { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Unresolved foreign-key or comment target.
    pub fn is_reference(&self) -> bool {
        !matches!(self, ParseError::Syntax { .. })
    }
}

/// What to do with input outside the supported grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Skip unrecognized statements and unsupported table items.
    #[default]
    Lenient,
    /// Reject them as syntax errors.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub mode: ParseMode,
    /// Mark any column literally named `id` as primary key.
    pub infer_id_primary_key: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            mode: ParseMode::Lenient,
            infer_id_primary_key: true,
        }
    }
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self {
            mode: ParseMode::Strict,
            ..Self::default()
        }
    }
}

/// Parse SQL DDL into a model using the default options.
pub fn parse_sql(sql: &str) -> Result<DbModel, ParseError> {
    parse_sql_with(sql, &ParseOptions::default())
}

pub fn parse_sql_with(sql: &str, options: &ParseOptions) -> Result<DbModel, ParseError> {
    let mut parser = Parser::new(*options);
    for statement in split_statements(sql) {
        parser.statement(&statement)?;
    }
    resolver::resolve(parser.drafts)
}

/// Foreign key waiting for its target table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FkDraft {
    pub name: String,
    pub from_column: String,
    pub target: QualifiedName,
    pub target_column: String,
    pub on_delete: Option<FkAction>,
    pub on_update: Option<FkAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TableDraft {
    pub key: QualifiedName,
    pub table: Table,
    pub foreign_keys: Vec<FkDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CommentTarget {
    Table(QualifiedName),
    Column(QualifiedName, String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommentDraft {
    pub target: CommentTarget,
    /// `None` for `IS NULL`.
    pub text: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct Drafts {
    pub schemas: Vec<Schema>,
    pub types: Vec<CustomType>,
    pub tables: Vec<TableDraft>,
    pub comments: Vec<CommentDraft>,
}

impl Drafts {
    fn ensure_schema(&mut self, name: &str) -> String {
        if let Some(schema) = self.schemas.iter().find(|s| s.name == name) {
            return schema.id.clone();
        }
        let id = new_id();
        self.schemas.push(Schema {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }
}

struct Parser {
    options: ParseOptions,
    drafts: Drafts,
}

/// A statement's tokens plus its source line, for error reporting.
struct Source<'a> {
    text: &'a str,
    tokens: Vec<Spanned>,
    line: usize,
}

impl<'a> Source<'a> {
    fn lex(text: &'a str, line: usize) -> Result<Self, ParseError> {
        let tokens = Lexer::new(text).tokenize().map_err(|e| ParseError::Syntax {
            line,
            message: e.to_string(),
        })?;
        Ok(Self { text, tokens, line })
    }

    fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self.text, &self.tokens)
    }

    fn syntax(&self, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    /// Attach the line and statement kind to a failed capture.
    fn wrap<T>(&self, context: &str, capture: Capture<T>) -> Result<T, ParseError> {
        capture.map_err(|Expected(what)| self.syntax(format!("{}: {}", context, what)))
    }
}

impl Parser {
    fn new(options: ParseOptions) -> Self {
        let mut drafts = Drafts::default();
        drafts.ensure_schema(DEFAULT_SCHEMA);
        Self { options, drafts }
    }

    fn strict(&self) -> bool {
        self.options.mode == ParseMode::Strict
    }

    fn statement(&mut self, statement: &Statement) -> Result<(), ParseError> {
        let source = Source::lex(&statement.text, statement.start_line)?;
        if source.tokens.iter().all(|t| t.token == Token::Semicolon) {
            return Ok(());
        }

        let Some((kind, consumed)) = dispatch(STATEMENT_RULES, &source.tokens) else {
            return self.unsupported(&source, "statement");
        };
        debug!(line = source.line, ?kind, "parsing statement");

        let mut cursor = source.cursor();
        cursor.skip(consumed);
        match kind {
            StatementKind::CreateSchema => self.create_schema(&source, cursor),
            StatementKind::CreateType => self.create_type(&source, cursor),
            StatementKind::CreateTable => self.create_table(&source, cursor),
            StatementKind::CommentOnTable => self.comment_on_table(&source, cursor),
            StatementKind::CommentOnColumn => self.comment_on_column(&source, cursor),
        }
    }

    fn unsupported(&self, source: &Source<'_>, what: &str) -> Result<(), ParseError> {
        let head: String = source.text.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
        if self.strict() {
            return Err(source.syntax(format!("unsupported {} `{}`", what, head)));
        }
        warn!(line = source.line, "skipping unsupported {} `{}`", what, head);
        Ok(())
    }

    fn create_schema(&mut self, source: &Source<'_>, mut cursor: Cursor<'_>) -> Result<(), ParseError> {
        let context = "CREATE SCHEMA";
        cursor.eat_keywords(&["IF", "NOT", "EXISTS"]);
        let name = source.wrap(context, cursor.ident("schema name"))?;
        if cursor.eat_keyword("AUTHORIZATION") {
            source.wrap(context, cursor.ident("role name"))?;
        }
        source.wrap(context, cursor.finish("statement"))?;
        self.drafts.ensure_schema(&name);
        Ok(())
    }

    fn create_type(&mut self, source: &Source<'_>, mut cursor: Cursor<'_>) -> Result<(), ParseError> {
        let context = "CREATE TYPE";
        let name = source.wrap(context, cursor.qualified("type name"))?;
        source.wrap(context, cursor.expect_keywords(&["AS"]))?;
        if !cursor.eat_keyword("ENUM") {
            return self.unsupported(source, "type definition");
        }

        source.wrap(context, cursor.expect(&Token::LParen, "`(` before enum values"))?;
        let mut values = Vec::new();
        if !cursor.eat(&Token::RParen) {
            loop {
                values.push(source.wrap(context, cursor.string("quoted enum value"))?);
                if cursor.eat(&Token::RParen) {
                    break;
                }
                source.wrap(context, cursor.expect(&Token::Comma, "`,` or `)`"))?;
            }
        }
        source.wrap(context, cursor.finish("statement"))?;

        if values.is_empty() {
            return Err(source.syntax(format!("enum type {} needs at least one value", name)));
        }

        let schema_id = self.drafts.ensure_schema(&name.schema);
        self.drafts.types.push(CustomType {
            id: new_id(),
            schema_id,
            name: name.name,
            kind: TypeKind::Enum,
            values,
        });
        Ok(())
    }

    fn create_table(&mut self, source: &Source<'_>, mut cursor: Cursor<'_>) -> Result<(), ParseError> {
        let context = "CREATE TABLE";
        cursor.eat_keywords(&["IF", "NOT", "EXISTS"]);
        let key = source.wrap(context, cursor.qualified("table name"))?;

        let open = cursor.position();
        let close = match (cursor.peek(), cursor.matching_paren()) {
            (Some(Token::LParen), Some(close)) => close,
            _ => {
                return Err(source.syntax(format!(
                    "could not read CREATE TABLE {}: expected `CREATE TABLE <name> ( ... );`",
                    key
                )));
            }
        };
        cursor.skip(close + 1 - open);
        source.wrap(context, cursor.finish("statement after the column list"))?;

        if self.drafts.tables.iter().any(|d| d.key == key) {
            return Err(source.syntax(format!("table {} is already defined", key)));
        }

        let body = cursor.inner_text(open, close);
        let schema_id = self.drafts.ensure_schema(&key.schema);
        let mut builder = TableBuilder {
            key: key.clone(),
            table: Table::new(schema_id, key.name.clone()),
            primary_key: Vec::new(),
            unique: Vec::new(),
            foreign_keys: Vec::new(),
        };

        for item in split_definition_list(body) {
            let item_source = Source::lex(&item, source.line)?;
            self.table_item(&item_source, &mut builder)?;
        }

        let draft = builder.finish(self.strict(), source)?;
        debug!(table = %draft.key, columns = draft.table.columns.len(), "table parsed");
        self.drafts.tables.push(draft);
        Ok(())
    }

    fn table_item(&self, source: &Source<'_>, builder: &mut TableBuilder) -> Result<(), ParseError> {
        let mut cursor = source.cursor();
        let Some((kind, consumed)) = dispatch(ITEM_RULES, &source.tokens) else {
            return self.column(source, cursor, builder);
        };
        cursor.skip(consumed);

        match kind {
            ItemKind::PrimaryKey => builder.primary_key_clause(source, &mut cursor),
            ItemKind::Unique => builder.unique_clause(source, &mut cursor),
            ItemKind::ForeignKey => builder.foreign_key_clause(source, &mut cursor, None),
            ItemKind::Named => {
                let name = source.wrap("CONSTRAINT", cursor.ident("constraint name"))?;
                if cursor.eat_keywords(&["FOREIGN", "KEY"]) {
                    builder.foreign_key_clause(source, &mut cursor, Some(name))
                } else if cursor.eat_keywords(&["PRIMARY", "KEY"]) {
                    builder.primary_key_clause(source, &mut cursor)
                } else if cursor.eat_keyword("UNIQUE") {
                    builder.unique_clause(source, &mut cursor)
                } else if cursor.at_keyword("CHECK") || cursor.at_keyword("EXCLUDE") {
                    self.unsupported(source, "table constraint")
                } else {
                    Err(source.syntax(format!(
                        "constraint \"{}\" not recognized: expected FOREIGN KEY, PRIMARY KEY or UNIQUE",
                        name
                    )))
                }
            }
            ItemKind::Unsupported => self.unsupported(source, "table item"),
        }
    }

    fn column(
        &self,
        source: &Source<'_>,
        mut cursor: Cursor<'_>,
        builder: &mut TableBuilder,
    ) -> Result<(), ParseError> {
        let context = format!("column definition in {}", builder.key);
        let name = source.wrap(&context, cursor.ident("column name"))?;
        let context = format!("column \"{}\" in {}", name, builder.key);

        let type_start = cursor.position();
        let mut depth = 0usize;
        while let Some(token) = cursor.peek() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                t if depth == 0 && COLUMN_CLAUSES.iter().any(|kw| t.is_keyword(kw)) => break,
                _ => {}
            }
            cursor.skip(1);
        }
        if cursor.position() == type_start {
            return Err(source.syntax(format!("{}: expected a data type", context)));
        }
        let typ = cursor.text(type_start, cursor.position() - 1).to_string();

        let mut column = Column::new(name, typ);
        if self.options.infer_id_primary_key && column.name == GENERIC_PK_NAME {
            column.is_primary_key = true;
            column.is_unique = true;
            column.nullable = false;
        }

        while !cursor.is_done() {
            if cursor.eat_keywords(&["NOT", "NULL"]) {
                column.nullable = false;
            } else if cursor.eat_keyword("NULL") {
                column.nullable = !column.is_primary_key;
            } else if cursor.eat_keyword("DEFAULT") {
                column.default_value = Some(source.wrap(&context, default_expression(&mut cursor))?);
            } else if cursor.eat_keywords(&["PRIMARY", "KEY"]) {
                column.is_primary_key = true;
                column.is_unique = true;
                column.nullable = false;
            } else if cursor.eat_keyword("UNIQUE") {
                column.is_unique = true;
            } else {
                let head = cursor.describe_next();
                if self.strict() {
                    return Err(source.syntax(format!("{}: unsupported column clause {}", context, head)));
                }
                warn!(line = source.line, "{}: ignoring unsupported clause {}", context, head);
                skip_column_clause(&mut cursor);
            }
        }

        builder.table.columns.push(column);
        Ok(())
    }

    fn comment_on_table(&mut self, source: &Source<'_>, mut cursor: Cursor<'_>) -> Result<(), ParseError> {
        let context = "COMMENT ON TABLE";
        let key = source.wrap(context, cursor.qualified("table name"))?;
        let text = source.wrap(context, comment_body(&mut cursor))?;
        self.drafts.comments.push(CommentDraft {
            target: CommentTarget::Table(key),
            text,
        });
        Ok(())
    }

    fn comment_on_column(&mut self, source: &Source<'_>, mut cursor: Cursor<'_>) -> Result<(), ParseError> {
        let context = "COMMENT ON COLUMN";
        let mut parts = source.wrap(context, cursor.dotted("column name"))?;
        if parts.len() < 2 {
            return Err(source.syntax(format!("{}: expected <table>.<column>", context)));
        }
        let column = parts.pop().unwrap_or_default();
        let key = QualifiedName::from_parts(parts)
            .ok_or_else(|| source.syntax(format!("{}: expected <table>.<column>", context)))?;
        let text = source.wrap(context, comment_body(&mut cursor))?;
        self.drafts.comments.push(CommentDraft {
            target: CommentTarget::Column(key, column),
            text,
        });
        Ok(())
    }
}

/// `IS 'literal'` or `IS NULL`, then end of statement. An empty literal drops
/// the comment, as PostgreSQL does.
fn comment_body(cursor: &mut Cursor<'_>) -> Capture<Option<String>> {
    cursor.expect_keywords(&["IS"])?;
    let text = if cursor.eat_keyword("NULL") {
        None
    } else {
        Some(cursor.string("quoted comment text or NULL")?).filter(|text| !text.is_empty())
    };
    cursor.finish("statement")?;
    Ok(text)
}

/// Steps over one unsupported column clause: its head token, then everything
/// up to the next column clause keyword at depth 0. A keyword right after
/// `SET` or `BY` stays inside the clause (`ON DELETE SET NULL`,
/// `GENERATED BY DEFAULT AS IDENTITY`).
fn skip_column_clause(cursor: &mut Cursor<'_>) {
    let mut depth = 0usize;
    let mut previous: Option<&Token> = None;
    while let Some(token) = cursor.peek() {
        let bound = previous.is_some_and(|p| p.is_keyword("SET") || p.is_keyword("BY"));
        if depth == 0 && previous.is_some() && !bound && COLUMN_CLAUSES.iter().any(|kw| token.is_keyword(kw)) {
            break;
        }
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        previous = Some(token);
        cursor.skip(1);
    }
}

/// Verbatim expression up to the next column clause at depth 0.
fn default_expression(cursor: &mut Cursor<'_>) -> Capture<String> {
    let start = cursor.position();
    let mut depth = 0usize;
    while let Some(token) = cursor.peek() {
        let first = cursor.position() == start;
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Semicolon if depth == 0 => break,
            t if depth == 0 && !first && ends_default(t, cursor.peek_nth(1)) => break,
            _ => {}
        }
        cursor.skip(1);
    }
    if cursor.position() == start {
        return Err(Expected::new("expected an expression after DEFAULT"));
    }
    Ok(cursor.text(start, cursor.position() - 1).to_string())
}

fn ends_default(token: &Token, next: Option<&Token>) -> bool {
    if token.is_keyword("NOT") {
        return next.is_some_and(|t| t.is_keyword("NULL"));
    }
    ["NULL", "PRIMARY", "UNIQUE", "REFERENCES", "CHECK", "CONSTRAINT", "COLLATE", "GENERATED"]
        .iter()
        .any(|kw| token.is_keyword(kw))
}

/// Accumulates one `CREATE TABLE` body. Key lists are applied after all
/// columns are known so their position in the body does not matter.
struct TableBuilder {
    key: QualifiedName,
    table: Table,
    primary_key: Vec<String>,
    unique: Vec<String>,
    foreign_keys: Vec<FkDraft>,
}

impl TableBuilder {
    fn primary_key_clause(&mut self, source: &Source<'_>, cursor: &mut Cursor<'_>) -> Result<(), ParseError> {
        let columns = source.wrap("PRIMARY KEY", cursor.ident_list("primary key columns"))?;
        source.wrap("PRIMARY KEY", cursor.finish("PRIMARY KEY clause"))?;
        self.primary_key.extend(columns);
        Ok(())
    }

    fn unique_clause(&mut self, source: &Source<'_>, cursor: &mut Cursor<'_>) -> Result<(), ParseError> {
        let columns = source.wrap("UNIQUE", cursor.ident_list("unique columns"))?;
        source.wrap("UNIQUE", cursor.finish("UNIQUE clause"))?;
        self.unique.extend(columns);
        Ok(())
    }

    /// `(col) REFERENCES target (col) [ON DELETE action] [ON UPDATE action]`,
    /// positioned after `FOREIGN KEY`.
    fn foreign_key_clause(
        &mut self,
        source: &Source<'_>,
        cursor: &mut Cursor<'_>,
        name: Option<String>,
    ) -> Result<(), ParseError> {
        let context = match &name {
            Some(name) => format!("constraint \"{}\"", name),
            None => format!("foreign key in {}", self.key),
        };
        let from = source.wrap(&context, cursor.ident_list("foreign key column"))?;
        source.wrap(&context, cursor.expect_keywords(&["REFERENCES"]))?;
        let target = source.wrap(&context, cursor.qualified("referenced table"))?;
        let to = source.wrap(&context, cursor.ident_list("referenced column"))?;
        if from.len() != 1 || to.len() != 1 {
            return Err(source.syntax(format!("{}: composite foreign keys are not supported", context)));
        }

        let mut on_delete = None;
        let mut on_update = None;
        while cursor.eat_keyword("ON") {
            if cursor.eat_keyword("DELETE") {
                on_delete = Some(source.wrap(&context, cursor.referential_action())?);
            } else if cursor.eat_keyword("UPDATE") {
                on_update = Some(source.wrap(&context, cursor.referential_action())?);
            } else {
                return Err(source.syntax(format!("{}: expected DELETE or UPDATE after ON", context)));
            }
        }
        source.wrap(&context, cursor.finish("foreign key clause"))?;

        let from_column = from.into_iter().next().unwrap_or_default();
        let name = name.unwrap_or_else(|| format!("{}_{}_fkey", self.key.name, from_column));
        self.foreign_keys.push(FkDraft {
            name,
            from_column,
            target,
            target_column: to.into_iter().next().unwrap_or_default(),
            on_delete,
            on_update,
        });
        Ok(())
    }

    fn finish(mut self, strict: bool, source: &Source<'_>) -> Result<TableDraft, ParseError> {
        for name in &self.primary_key {
            match self.table.columns.iter_mut().find(|c| &c.name == name) {
                Some(column) => {
                    column.is_primary_key = true;
                    column.is_unique = true;
                    column.nullable = false;
                }
                None => unknown_key_column(strict, source, &self.key, name, "PRIMARY KEY")?,
            }
        }
        for name in &self.unique {
            match self.table.columns.iter_mut().find(|c| &c.name == name) {
                Some(column) => {
                    if !column.is_primary_key {
                        column.is_unique = true;
                    }
                }
                None => unknown_key_column(strict, source, &self.key, name, "UNIQUE")?,
            }
        }

        Ok(TableDraft {
            key: self.key,
            table: self.table,
            foreign_keys: self.foreign_keys,
        })
    }
}

fn unknown_key_column(
    strict: bool,
    source: &Source<'_>,
    table: &QualifiedName,
    column: &str,
    clause: &str,
) -> Result<(), ParseError> {
    if strict {
        return Err(source.syntax(format!("{} names unknown column \"{}\" in {}", clause, column, table)));
    }
    warn!(line = source.line, "{} names unknown column \"{}\" in {}; ignored", clause, column, table);
    Ok(())
}
