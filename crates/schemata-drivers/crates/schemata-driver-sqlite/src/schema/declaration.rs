//! Reads the stored `CREATE TABLE` text for what the PRAGMAs leave out:
//! constraint names, CHECK expressions and AUTOINCREMENT.
//!
//! The reader is lenient. Anything it cannot follow is skipped, and a statement
//! that does not tokenize yields an empty declaration.

use sqlparser::dialect::SQLiteDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredKind {
    PrimaryKey,
    Unique,
    Check,
    Default,
    ForeignKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredConstraint {
    pub kind: DeclaredKind,
    pub name: Option<String>,
    /// Set when declared inside a column definition
    pub column: Option<String>,
    pub columns: Vec<String>,
    /// CHECK expression text, as written
    pub expression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDeclaration {
    pub constraints: Vec<DeclaredConstraint>,
    pub autoincrement_column: Option<String>,
}

impl TableDeclaration {
    pub fn parse(sql: &str) -> Self {
        let mut declaration = Self::default();
        let Some(mut cursor) = Cursor::new(sql) else {
            tracing::debug!("CREATE TABLE text did not tokenize");
            return declaration;
        };

        while let Some(token) = cursor.peek() {
            if *token == Token::LParen {
                break;
            }
            cursor.pos += 1;
        }
        if !cursor.eat(&Token::LParen) {
            return declaration;
        }

        while cursor.peek().is_some() {
            let is_table_constraint = ["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"]
                .iter()
                .any(|kw| cursor.at_keyword(kw));
            if is_table_constraint {
                declaration.table_constraint(&mut cursor);
            } else {
                declaration.column_definition(&mut cursor);
            }
            if !cursor.eat(&Token::Comma) {
                break;
            }
        }
        declaration
    }

    /// Declared name of a constraint of `kind` over exactly `columns`.
    pub fn name_for(&self, kind: DeclaredKind, columns: &[&str]) -> Option<&str> {
        self.constraints
            .iter()
            .filter(|c| c.kind == kind)
            .find(|c| {
                c.columns.len() == columns.len()
                    && c.columns
                        .iter()
                        .zip(columns)
                        .all(|(a, b)| a.eq_ignore_ascii_case(b))
            })
            .and_then(|c| c.name.as_deref())
    }

    pub fn checks(&self) -> impl Iterator<Item = &DeclaredConstraint> {
        self.constraints
            .iter()
            .filter(|c| c.kind == DeclaredKind::Check && c.expression.is_some())
    }

    fn push(
        &mut self,
        kind: DeclaredKind,
        name: Option<String>,
        column: Option<&str>,
        columns: Vec<String>,
        expression: Option<String>,
    ) {
        self.constraints.push(DeclaredConstraint {
            kind,
            name,
            column: column.map(str::to_string),
            columns,
            expression,
        });
    }

    fn column_definition(&mut self, cursor: &mut Cursor) {
        let Some(column) = cursor.identifier() else {
            cursor.skip_to_definition_end();
            return;
        };
        let own = || vec![column.clone()];
        let mut name: Option<String> = None;

        while !cursor.at_definition_end() {
            if cursor.eat_keyword("CONSTRAINT") {
                name = cursor.identifier();
            } else if cursor.eat_keyword("PRIMARY") {
                cursor.eat_keyword("KEY");
                self.push(DeclaredKind::PrimaryKey, name.take(), Some(&column), own(), None);
            } else if cursor.eat_keyword("AUTOINCREMENT") {
                self.autoincrement_column = Some(column.clone());
            } else if cursor.eat_keyword("UNIQUE") {
                self.push(DeclaredKind::Unique, name.take(), Some(&column), own(), None);
            } else if cursor.eat_keyword("CHECK") {
                let expression = cursor.group();
                self.push(DeclaredKind::Check, name.take(), Some(&column), own(), expression);
            } else if cursor.eat_keyword("DEFAULT") {
                cursor.skip_default_value();
                self.push(DeclaredKind::Default, name.take(), Some(&column), own(), None);
            } else if cursor.eat_keyword("REFERENCES") {
                cursor.identifier();
                cursor.column_list();
                cursor.skip_foreign_key_clauses();
                self.push(DeclaredKind::ForeignKey, name.take(), Some(&column), own(), None);
            } else if cursor.eat_keyword("NOT") {
                cursor.eat_keyword("NULL");
                name = None;
            } else if cursor.at(&Token::LParen) {
                cursor.group();
            } else {
                cursor.advance();
            }
        }
    }

    fn table_constraint(&mut self, cursor: &mut Cursor) {
        let mut name = None;
        if cursor.eat_keyword("CONSTRAINT") {
            name = cursor.identifier();
        }

        if cursor.eat_keyword("PRIMARY") {
            cursor.eat_keyword("KEY");
            let columns = cursor.column_list();
            self.push(DeclaredKind::PrimaryKey, name, None, columns, None);
        } else if cursor.eat_keyword("UNIQUE") {
            let columns = cursor.column_list();
            self.push(DeclaredKind::Unique, name, None, columns, None);
        } else if cursor.eat_keyword("CHECK") {
            let expression = cursor.group();
            self.push(DeclaredKind::Check, name, None, Vec::new(), expression);
        } else if cursor.eat_keyword("FOREIGN") {
            cursor.eat_keyword("KEY");
            let columns = cursor.column_list();
            if cursor.eat_keyword("REFERENCES") {
                cursor.identifier();
                cursor.column_list();
                cursor.skip_foreign_key_clauses();
            }
            self.push(DeclaredKind::ForeignKey, name, None, columns, None);
        }
        cursor.skip_to_definition_end();
    }
}

/// The `SELECT` of a stored `CREATE VIEW` statement.
pub fn view_body(sql: &str) -> Option<String> {
    let mut cursor = Cursor::new(sql)?;
    loop {
        if cursor.at(&Token::LParen) {
            cursor.group()?;
        } else if cursor.eat_keyword("AS") {
            let body: String = cursor.tokens[cursor.pos..]
                .iter()
                .filter(|t| **t != Token::EOF)
                .map(ToString::to_string)
                .collect();
            return Some(body.trim().trim_end_matches(';').trim_end().to_string());
        } else {
            cursor.advance()?;
        }
    }
}

struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor {
    fn new(sql: &str) -> Option<Self> {
        let dialect = SQLiteDialect {};
        let tokens = Tokenizer::new(&dialect, sql).tokenize().ok()?;
        Some(Self { tokens, pos: 0 })
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.tokens.get(self.pos), Some(Token::Whitespace(_))) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.skip_whitespace();
        self.tokens.get(self.pos).filter(|t| **t != Token::EOF)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek()?.clone();
        self.pos += 1;
        Some(token)
    }

    fn at(&mut self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Unquoted word matching `keyword`, ignoring case.
    fn at_keyword(&mut self, keyword: &str) -> bool {
        matches!(
            self.peek(),
            Some(Token::Word(w)) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(keyword)
        )
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// A bare or quoted name.
    fn identifier(&mut self) -> Option<String> {
        let name = match self.peek()? {
            Token::Word(w) => w.value.clone(),
            Token::SingleQuotedString(s) | Token::DoubleQuotedString(s) => s.clone(),
            _ => return None,
        };
        self.pos += 1;
        Some(name)
    }

    /// Consume a parenthesised group and return the text inside it.
    fn group(&mut self) -> Option<String> {
        if !self.eat(&Token::LParen) {
            return None;
        }
        let start = self.pos;
        let mut depth = 1;
        while let Some(token) = self.tokens.get(self.pos) {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        let text: String = self.tokens[start..self.pos]
                            .iter()
                            .map(ToString::to_string)
                            .collect();
                        self.pos += 1;
                        return Some(text.trim().to_string());
                    }
                }
                Token::EOF => break,
                _ => {}
            }
            self.pos += 1;
        }
        None
    }

    /// Names in an indexed-column list such as `("a" DESC, b COLLATE nocase)`.
    fn column_list(&mut self) -> Vec<String> {
        let mut columns = Vec::new();
        if !self.eat(&Token::LParen) {
            return columns;
        }
        let mut expect_name = true;
        loop {
            match self.peek() {
                None => break,
                Some(Token::RParen) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Comma) => {
                    self.pos += 1;
                    expect_name = true;
                }
                Some(Token::LParen) => {
                    self.group();
                }
                Some(_) if expect_name => {
                    match self.identifier() {
                        Some(name) => columns.push(name),
                        None => self.pos += 1,
                    }
                    expect_name = false;
                }
                Some(_) => self.pos += 1,
            }
        }
        columns
    }

    fn skip_default_value(&mut self) {
        if self.at(&Token::LParen) {
            self.group();
            return;
        }
        if matches!(self.peek(), Some(Token::Minus) | Some(Token::Plus)) {
            self.pos += 1;
        }
        self.advance();
    }

    fn skip_foreign_key_clauses(&mut self) {
        loop {
            if self.eat_keyword("ON") {
                // DELETE | UPDATE, then the action
                self.advance();
                if !self.eat_keyword("SET") {
                    self.eat_keyword("NO");
                }
                self.advance();
            } else if self.eat_keyword("MATCH") {
                self.advance();
            } else if self.eat_keyword("NOT") {
                if !self.eat_keyword("DEFERRABLE") {
                    self.eat_keyword("NULL");
                }
            } else if self.eat_keyword("DEFERRABLE") {
                if self.eat_keyword("INITIALLY") {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn at_definition_end(&mut self) -> bool {
        matches!(self.peek(), None | Some(Token::Comma) | Some(Token::RParen))
    }

    fn skip_to_definition_end(&mut self) {
        while !self.at_definition_end() {
            if self.at(&Token::LParen) {
                self.group();
            } else {
                self.pos += 1;
            }
        }
    }
}
