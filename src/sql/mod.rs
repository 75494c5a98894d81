//! PostgreSQL DDL to model conversion.

mod grammar;
mod lexer;
mod parser;
mod resolver;
mod splitter;

pub use parser::{ParseError, ParseMode, ParseOptions, parse_sql, parse_sql_with};
pub use splitter::{Statement, split_definition_list, split_statements};
