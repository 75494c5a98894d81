//! Top-level statement and definition-list splitting.

/// One top-level statement and the 1-based line of its first non-blank character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub text: String,
    pub start_line: usize,
}

/// Quote and comment state shared by both splitters.
#[derive(Debug, Default)]
struct ScanState {
    in_single: bool,
    in_double: bool,
    in_line_comment: bool,
    in_block_comment: bool,
}

impl ScanState {
    /// Feed `c` (with lookahead `next`). Returns `true` when `next` belongs to
    /// a two-character token (a doubled quote, `--`, `/*` or `*/`) and must be
    /// consumed by the caller.
    fn feed(&mut self, c: char, next: Option<char>) -> bool {
        if self.in_line_comment {
            if c == '\n' {
                self.in_line_comment = false;
            }
            return false;
        }
        if self.in_block_comment {
            if c == '*' && next == Some('/') {
                self.in_block_comment = false;
                return true;
            }
            return false;
        }
        match c {
            '\'' if !self.in_double => {
                if next == Some('\'') {
                    return true;
                }
                self.in_single = !self.in_single;
            }
            '"' if !self.in_single => {
                if next == Some('"') {
                    return true;
                }
                self.in_double = !self.in_double;
            }
            '-' if !self.opaque() && next == Some('-') => {
                self.in_line_comment = true;
                return true;
            }
            '/' if !self.opaque() && next == Some('*') => {
                self.in_block_comment = true;
                return true;
            }
            _ => {}
        }
        false
    }

    fn opaque(&self) -> bool {
        self.in_single || self.in_double || self.in_line_comment || self.in_block_comment
    }
}

/// Split raw text on `;` at paren depth 0 outside quotes and comments.
///
/// The terminating `;` stays in the statement text. A trailing statement
/// without `;` is still emitted when non-blank.
pub fn split_statements(sql: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut start_line: Option<usize> = None;
    let mut depth: usize = 0;
    let mut scan = ScanState::default();
    let mut line = 1;

    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if start_line.is_none() && !c.is_whitespace() {
            start_line = Some(line);
        }
        current.push(c);

        if scan.feed(c, chars.peek().copied()) {
            if let Some(escaped) = chars.next() {
                current.push(escaped);
            }
            continue;
        }

        if c == '\n' {
            line += 1;
        }
        if scan.opaque() {
            continue;
        }

        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                push_statement(&mut statements, &current, start_line.unwrap_or(line));
                current.clear();
                start_line = None;
            }
            _ => {}
        }
    }

    push_statement(&mut statements, &current, start_line.unwrap_or(line));

    statements
}

/// Bare `;` runs are not statements.
fn push_statement(statements: &mut Vec<Statement>, raw: &str, start_line: usize) {
    let text = raw.trim();
    if !text.trim_end_matches(';').trim().is_empty() {
        statements.push(Statement {
            text: text.to_string(),
            start_line,
        });
    }
}

/// Split a parenthesized list body on `,` at depth 0. Items are trimmed and
/// blank items dropped. Quoted or commented commas and parens stay inside
/// their item.
pub fn split_definition_list(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut scan = ScanState::default();

    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if scan.feed(c, chars.peek().copied()) {
            current.push(c);
            if let Some(escaped) = chars.next() {
                current.push(escaped);
            }
            continue;
        }
        if scan.opaque() {
            current.push(c);
            continue;
        }

        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                push_item(&mut items, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    push_item(&mut items, &current);

    items
}

fn push_item(items: &mut Vec<String>, raw: &str) {
    let item = raw.trim();
    if !item.is_empty() {
        items.push(item.to_string());
    }
}
