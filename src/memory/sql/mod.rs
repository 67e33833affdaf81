//! SQL text front end of the memory dialect.
//!
//! Accepts the statement subset the relational compiler renders through
//! [`crate::dialect::SqlFormatter`], plus the usual spellings found in
//! hand-written SQL (bare or bracketed identifiers, `AUTOINCREMENT`,
//! `MODIFY COLUMN`, table-level `PRIMARY KEY (...)`). Everything is parsed
//! into a [`Statement`]; nothing is executed from text directly.

mod values;
mod where_clause;

use regex::{Captures, Regex};

use crate::column::{Column, ColumnDef, ColumnType};
use crate::error::{invalid_statement, DbResult, SyntaxError};
use crate::memory::eval::cached_regex;
use crate::query::{Alteration, Ordering, SortDirection};
use crate::statement::{Operand, Predicate, Select, Statement};
use crate::value::Value;

use values::{parse_value, parse_values, split_top_level, unquote};

macro_rules! ident {
    () => {
        r#"(?:"(?:[^"]|"")*"|`[^`]*`|\[[^\]]*\]|[A-Za-z_][A-Za-z0-9_$]*)"#
    };
}

const CREATE_TABLE: &str = concat!(
    r"(?is)^create\s+table\s+(if\s+not\s+exists\s+)?(",
    ident!(),
    r")\s*\((.*)\)$"
);
const CREATE_INDEX: &str = concat!(
    r"(?is)^create\s+(unique\s+)?index\s+(if\s+not\s+exists\s+)?(",
    ident!(),
    r")\s+on\s+(",
    ident!(),
    r")\s*\((.*)\)$"
);
const INSERT: &str = concat!(
    r"(?is)^insert\s+into\s+(",
    ident!(),
    r")\s*\(([^)]*)\)\s*values\s*\((.*)\)$"
);
const SELECT: &str = concat!(r"(?is)^select\s+(.*?)\s+from\s+(", ident!(), r")(.*)$");
const UPDATE: &str = concat!(r"(?is)^update\s+(", ident!(), r")\s+set\s+(.*)$");
const DELETE: &str = concat!(r"(?is)^delete\s+from\s+(", ident!(), r")(.*)$");
const ALTER_TABLE: &str = concat!(r"(?is)^alter\s+table\s+(", ident!(), r")\s+(.*)$");
const DROP_TABLE: &str = concat!(r"(?is)^drop\s+table\s+(if\s+exists\s+)?(", ident!(), r")$");
const DROP_INDEX: &str = concat!(
    r"(?is)^drop\s+index\s+(if\s+exists\s+)?(",
    ident!(),
    r")\s+on\s+(",
    ident!(),
    r")$"
);

const COLUMN_DEF: &str = concat!(r"(?is)^(", ident!(), r")\s+(.+)$");
const COLUMN_SPEC: &str =
    r"(?is)^([A-Za-z]+(?:\s+precision|\s+varying)?)\s*(?:\(\s*(\d+)\s*(?:,\s*\d+\s*)?\))?(.*)$";
const DEFAULT_CLAUSE: &str = r#"(?is)\bdefault\s+('(?:[^'\\]|\\.|'')*'|"(?:[^"\\]|\\.)*"|\S+)"#;
const TABLE_PRIMARY_KEY: &str = r"(?is)^primary\s+key\s*\((.*)\)$";
const TABLE_UNIQUE: &str = r"(?is)^unique\s*\((.*)\)$";
const ASSIGNMENT: &str = concat!(r"(?is)^(", ident!(), r")\s*=\s*(.+)$");
const ORDER_TERM: &str = concat!(r"(?is)^(", ident!(), r")(?:\s+(asc|desc))?$");
const CLAUSE_KEYWORD: &str = r"(?i)^(where|group\s+by|order\s+by|limit|offset)\b";

const ADD_COLUMN: &str = r"(?is)^add\s+(?:column\s+)?(.+)$";
const DROP_COLUMN: &str = concat!(r"(?is)^drop\s+(?:column\s+)?(", ident!(), r")$");
const MODIFY_COLUMN: &str = concat!(
    r"(?is)^(?:alter|modify)\s+(?:column\s+)?(",
    ident!(),
    r")\s+(?:set\s+data\s+type\s+|type\s+)?(.+)$"
);

/// Numbers `?` placeholders across one statement, left to right.
#[derive(Debug, Default)]
pub(crate) struct Placeholders {
    next: usize,
}

impl Placeholders {
    pub fn next(&mut self) -> usize {
        let index = self.next;
        self.next += 1;
        index
    }

    fn operand(&mut self, value: Option<Value>) -> Operand {
        value.map_or_else(|| Operand::Param(self.next()), Operand::Literal)
    }
}

/// Parses one SQL statement. A trailing `;` is ignored.
pub(crate) fn parse(sql: &str) -> DbResult<Statement> {
    let text = sql.trim();
    let text = text.strip_suffix(';').unwrap_or(text).trim();
    let lowered = text.to_ascii_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().take(3).collect();

    match words.as_slice() {
        ["create", "table", ..] => create_table(text),
        ["create", "index", ..] | ["create", "unique", "index", ..] => create_index(text),
        ["insert", "into", ..] => insert(text),
        ["select", ..] => select(text),
        ["update", ..] => update(text),
        ["delete", "from", ..] => delete(text),
        ["alter", "table", ..] => alter_table(text),
        ["drop", "table", ..] => drop_table(text),
        ["drop", "index", ..] => drop_index(text),
        _ => Err(SyntaxError::UnsupportedSql {
            sql: sql.to_string(),
        }
        .into()),
    }
}

fn captures<'t>(pattern: &str, text: &'t str, statement: &'static str) -> DbResult<Captures<'t>> {
    let re: Regex = cached_regex(pattern)?;
    re.captures(text)
        .ok_or_else(|| invalid_statement(statement, text))
}

fn group<'t>(caps: &Captures<'t>, i: usize) -> &'t str {
    caps.get(i).map_or("", |m| m.as_str())
}

/// Strips identifier quoting: `"a"`, `` `a` `` or `[a]`.
fn ident(token: &str) -> String {
    let token = token.trim();
    if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return inner.to_string();
    }
    unquote(token).unwrap_or_else(|| token.to_string())
}

fn ident_list(text: &str) -> DbResult<Vec<String>> {
    Ok(split_top_level(text, ',')?.iter().map(|s| ident(s)).collect())
}

fn create_table(sql: &str) -> DbResult<Statement> {
    const KEYWORD: &str = "CREATE TABLE";
    let caps = captures(CREATE_TABLE, sql, KEYWORD)?;
    let if_not_exists = caps.get(1).is_some();
    let table = ident(group(&caps, 2));

    let mut columns: Vec<ColumnDef> = Vec::new();
    let mut primary: Vec<String> = Vec::new();
    let mut unique: Vec<String> = Vec::new();
    for piece in split_top_level(group(&caps, 3), ',')? {
        if let Some(pk) = cached_regex(TABLE_PRIMARY_KEY)?.captures(&piece) {
            primary.extend(ident_list(group(&pk, 1))?);
        } else if let Some(uq) = cached_regex(TABLE_UNIQUE)?.captures(&piece) {
            let cols = ident_list(group(&uq, 1))?;
            if cols.len() != 1 {
                return Err(crate::error::DbError::unsupported(
                    "multi-column UNIQUE constraint; create a unique index instead",
                ));
            }
            unique.extend(cols);
        } else {
            columns.push(column_def(&piece, KEYWORD)?);
        }
    }

    for name in &primary {
        let def = columns
            .iter_mut()
            .find(|c| c.name == *name)
            .ok_or_else(|| invalid_statement(KEYWORD, sql))?;
        def.column.primary = true;
        def.column.nullable = false;
    }
    for name in &unique {
        let def = columns
            .iter_mut()
            .find(|c| c.name == *name)
            .ok_or_else(|| invalid_statement(KEYWORD, sql))?;
        def.column.unique = true;
    }

    Ok(Statement::CreateTable {
        table,
        columns,
        if_not_exists,
    })
}

fn column_def(text: &str, statement: &'static str) -> DbResult<ColumnDef> {
    let caps = captures(COLUMN_DEF, text.trim(), statement)?;
    let name = ident(group(&caps, 1));
    let column = column_spec(group(&caps, 2), statement)?;
    Ok(ColumnDef::new(name, column))
}

/// Type, optional length and modifiers of one column.
fn column_spec(text: &str, statement: &'static str) -> DbResult<Column> {
    let caps = captures(COLUMN_SPEC, text.trim(), statement)?;
    let mut column = Column::new(ColumnType::from_sql_name(group(&caps, 1)));
    if let Some(len) = caps.get(2) {
        column.length = len.as_str().parse().ok();
    }

    let mut modifiers = group(&caps, 3).to_string();
    if let Some(default) = cached_regex(DEFAULT_CLAUSE)?.captures(&modifiers) {
        let literal = group(&default, 1);
        let value = parse_value(literal).ok_or_else(|| invalid_statement(statement, text))?;
        column.default = Some(value);
        let range = default.get(0).map_or(0..0, |m| m.range());
        modifiers.replace_range(range, " ");
    }

    if cached_regex(r"(?i)\bprimary\s+key\b")?.is_match(&modifiers) {
        column = column.primary();
    }
    if cached_regex(r"(?i)\bunique\b")?.is_match(&modifiers) {
        column = column.unique();
    }
    if cached_regex(r"(?i)\bnot\s+null\b")?.is_match(&modifiers) {
        column = column.not_null();
    }
    if cached_regex(r"(?i)\b(auto_increment|autoincrement)\b")?.is_match(&modifiers) {
        column = column.auto_increment();
    }
    Ok(column)
}

fn create_index(sql: &str) -> DbResult<Statement> {
    let caps = captures(CREATE_INDEX, sql, "CREATE INDEX")?;
    Ok(Statement::CreateIndex {
        unique: caps.get(1).is_some(),
        if_not_exists: caps.get(2).is_some(),
        index: ident(group(&caps, 3)),
        table: ident(group(&caps, 4)),
        columns: ident_list(group(&caps, 5))?,
    })
}

fn insert(sql: &str) -> DbResult<Statement> {
    let caps = captures(INSERT, sql, "INSERT")?;
    let mut placeholders = Placeholders::default();
    let values = parse_values(group(&caps, 3))?
        .into_iter()
        .map(|v| placeholders.operand(v))
        .collect();
    Ok(Statement::Insert {
        table: ident(group(&caps, 1)),
        columns: ident_list(group(&caps, 2))?,
        values,
    })
}

/// Splits the text after the table name into its leading part and the
/// trailing `WHERE`/`GROUP BY`/`ORDER BY`/`LIMIT`/`OFFSET` clauses.
/// Keywords inside quotes or parentheses are not boundaries.
fn split_clauses(tail: &str) -> DbResult<(&str, Vec<(String, &str)>)> {
    let keyword = cached_regex(CLAUSE_KEYWORD)?;
    let mut marks: Vec<(usize, usize, String)> = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0i32;
    let mut prev: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in tail.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            prev = Some(ch);
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth -= 1,
            _ if depth == 0 && !prev.is_some_and(|p| p.is_alphanumeric() || p == '_') => {
                if let Some(m) = keyword.find(&tail[i..]) {
                    let name = m
                        .as_str()
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                        .to_ascii_lowercase();
                    marks.push((i, i + m.end(), name));
                }
            }
            _ => {}
        }
        prev = Some(ch);
    }

    let head_end = marks.first().map_or(tail.len(), |(start, _, _)| *start);
    let mut clauses = Vec::with_capacity(marks.len());
    for (n, (_, body_start, name)) in marks.iter().enumerate() {
        let body_end = marks.get(n + 1).map_or(tail.len(), |(start, _, _)| *start);
        clauses.push((name.clone(), tail[*body_start..body_end].trim()));
    }
    Ok((tail[..head_end].trim(), clauses))
}

fn parse_count(text: &str, statement: &'static str, sql: &str) -> DbResult<u64> {
    text.trim()
        .parse()
        .map_err(|_| invalid_statement(statement, sql))
}

fn select(sql: &str) -> DbResult<Statement> {
    const KEYWORD: &str = "SELECT";
    let caps = captures(SELECT, sql, KEYWORD)?;
    let mut select = Select::new(ident(group(&caps, 2)));

    let fields = group(&caps, 1).trim();
    if fields != "*" {
        select.fields = ident_list(fields)?;
    }

    let (head, clauses) = split_clauses(group(&caps, 3))?;
    if !head.is_empty() {
        return Err(invalid_statement(KEYWORD, sql));
    }
    let mut placeholders = Placeholders::default();
    for (clause, body) in clauses {
        match clause.as_str() {
            "where" => select.filter = Some(where_clause::parse(body, &mut placeholders)?),
            "group by" => select.group_by = ident_list(body)?,
            "order by" => {
                for term in split_top_level(body, ',')? {
                    let caps = captures(ORDER_TERM, &term, KEYWORD)?;
                    let field = ident(group(&caps, 1));
                    let direction = if group(&caps, 2).eq_ignore_ascii_case("desc") {
                        SortDirection::Desc
                    } else {
                        SortDirection::Asc
                    };
                    select.order_by.push(Ordering { field, direction });
                }
            }
            "limit" => select.limit = Some(parse_count(body, KEYWORD, sql)?),
            "offset" => select.offset = Some(parse_count(body, KEYWORD, sql)?),
            _ => return Err(invalid_statement(KEYWORD, sql)),
        }
    }
    Ok(Statement::Select(select))
}

/// Parses an optional lone `WHERE` clause following a statement head.
fn filter_only(
    tail: &str,
    statement: &'static str,
    sql: &str,
    placeholders: &mut Placeholders,
) -> DbResult<(String, Option<Predicate>)> {
    let (head, clauses) = split_clauses(tail)?;
    let mut filter = None;
    for (clause, body) in clauses {
        if clause != "where" || filter.is_some() {
            return Err(invalid_statement(statement, sql));
        }
        filter = Some(where_clause::parse(body, placeholders)?);
    }
    Ok((head.to_string(), filter))
}

fn update(sql: &str) -> DbResult<Statement> {
    const KEYWORD: &str = "UPDATE";
    let caps = captures(UPDATE, sql, KEYWORD)?;
    let table = ident(group(&caps, 1));

    // SET placeholders are numbered before WHERE placeholders, so the
    // assignments are parsed first even though the tail is split once.
    let (head, clauses) = split_clauses(group(&caps, 2))?;
    let mut placeholders = Placeholders::default();
    let mut assignments = Vec::new();
    for piece in split_top_level(head, ',')? {
        let assignment = captures(ASSIGNMENT, &piece, KEYWORD)?;
        let value = parse_value(group(&assignment, 2));
        assignments.push((ident(group(&assignment, 1)), placeholders.operand(value)));
    }
    if assignments.is_empty() {
        return Err(invalid_statement(KEYWORD, sql));
    }

    let mut filter = None;
    for (clause, body) in clauses {
        if clause != "where" || filter.is_some() {
            return Err(invalid_statement(KEYWORD, sql));
        }
        filter = Some(where_clause::parse(body, &mut placeholders)?);
    }
    Ok(Statement::Update {
        table,
        assignments,
        filter,
    })
}

fn delete(sql: &str) -> DbResult<Statement> {
    const KEYWORD: &str = "DELETE";
    let caps = captures(DELETE, sql, KEYWORD)?;
    let mut placeholders = Placeholders::default();
    let (head, filter) = filter_only(group(&caps, 2), KEYWORD, sql, &mut placeholders)?;
    if !head.is_empty() {
        return Err(invalid_statement(KEYWORD, sql));
    }
    Ok(Statement::Delete {
        table: ident(group(&caps, 1)),
        filter,
    })
}

fn alter_table(sql: &str) -> DbResult<Statement> {
    const KEYWORD: &str = "ALTER TABLE";
    let caps = captures(ALTER_TABLE, sql, KEYWORD)?;
    let mut alterations = Vec::new();
    for action in split_top_level(group(&caps, 2), ',')? {
        let alteration = if let Some(add) = cached_regex(ADD_COLUMN)?.captures(&action) {
            let def = column_def(group(&add, 1), KEYWORD)?;
            Alteration::Add {
                name: def.name,
                column: def.column,
            }
        } else if let Some(drop) = cached_regex(DROP_COLUMN)?.captures(&action) {
            Alteration::Drop {
                name: ident(group(&drop, 1)),
            }
        } else if let Some(modify) = cached_regex(MODIFY_COLUMN)?.captures(&action) {
            Alteration::Modify {
                name: ident(group(&modify, 1)),
                column: column_spec(group(&modify, 2), KEYWORD)?,
            }
        } else {
            return Err(invalid_statement(KEYWORD, sql));
        };
        alterations.push(alteration);
    }
    if alterations.is_empty() {
        return Err(invalid_statement(KEYWORD, sql));
    }
    Ok(Statement::AlterTable {
        table: ident(group(&caps, 1)),
        alterations,
    })
}

fn drop_table(sql: &str) -> DbResult<Statement> {
    let caps = captures(DROP_TABLE, sql, "DROP TABLE")?;
    Ok(Statement::DropTable {
        if_exists: caps.get(1).is_some(),
        table: ident(group(&caps, 2)),
    })
}

fn drop_index(sql: &str) -> DbResult<Statement> {
    let caps = captures(DROP_INDEX, sql, "DROP INDEX")?;
    Ok(Statement::DropIndex {
        if_exists: caps.get(1).is_some(),
        index: ident(group(&caps, 2)),
        table: ident(group(&caps, 3)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::AnsiFormatter;
    use crate::statement::CompareOp;

    #[test]
    fn test_create_table_with_modifiers() {
        let stmt = parse(
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" INTEGER PRIMARY KEY AUTO_INCREMENT, \
             \"email\" VARCHAR(120) UNIQUE NOT NULL, \"role\" TEXT DEFAULT 'not null', \
             \"score\" DOUBLE PRECISION);",
        )
        .unwrap();
        let Statement::CreateTable {
            table,
            columns,
            if_not_exists,
        } = stmt
        else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(table, "users");
        assert!(if_not_exists);
        assert_eq!(columns[0].column, Column::integer().primary().auto_increment());
        assert_eq!(columns[1].column, Column::text().length(120).unique().not_null());
        assert_eq!(columns[2].column, Column::text().default_value("not null"));
        assert_eq!(columns[3].column, Column::float());
    }

    #[test]
    fn test_table_level_constraints() {
        let stmt = parse("create table t (a int, b text, PRIMARY KEY (a), UNIQUE (b))").unwrap();
        let Statement::CreateTable { columns, .. } = stmt else {
            panic!("expected CREATE TABLE");
        };
        assert!(columns[0].column.primary && !columns[0].column.nullable);
        assert!(columns[1].column.unique);
        assert!(parse("create table t (a int, PRIMARY KEY (zz))").is_err());
    }

    #[test]
    fn test_insert_numbers_placeholders() {
        let stmt = parse("INSERT INTO [t] (`a`, b, c) VALUES (?, 'x', ?)").unwrap();
        assert_eq!(
            stmt,
            Statement::Insert {
                table: "t".into(),
                columns: vec!["a".into(), "b".into(), "c".into()],
                values: vec![
                    Operand::Param(0),
                    Operand::Literal(Value::from("x")),
                    Operand::Param(1)
                ],
            }
        );
    }

    #[test]
    fn test_select_clauses() {
        let stmt = parse(
            "SELECT \"a\", b FROM \"t\" WHERE note = 'order by x' AND a > ? \
             GROUP BY b ORDER BY a DESC, b LIMIT 5 OFFSET 10",
        )
        .unwrap();
        let Statement::Select(select) = stmt else {
            panic!("expected SELECT");
        };
        assert_eq!(select.fields, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(select.group_by, vec!["b".to_string()]);
        assert_eq!(select.order_by, vec![Ordering::desc("a"), Ordering::asc("b")]);
        assert_eq!((select.limit, select.offset), (Some(5), Some(10)));
        assert_eq!(
            select.filter,
            Some(Predicate::And(vec![
                Predicate::compare("note", CompareOp::Eq, Operand::Literal(Value::from("order by x"))),
                Predicate::compare("a", CompareOp::Gt, Operand::Param(0)),
            ]))
        );
    }

    #[test]
    fn test_update_binds_set_before_where() {
        let stmt = parse("UPDATE t SET a = ?, b = 'y' WHERE id = ?").unwrap();
        assert_eq!(
            stmt,
            Statement::Update {
                table: "t".into(),
                assignments: vec![
                    ("a".into(), Operand::Param(0)),
                    ("b".into(), Operand::Literal(Value::from("y"))),
                ],
                filter: Some(Predicate::compare("id", CompareOp::Eq, Operand::Param(1))),
            }
        );
    }

    #[test]
    fn test_delete_alter_and_drops() {
        assert_eq!(
            parse("DELETE FROM t").unwrap(),
            Statement::Delete {
                table: "t".into(),
                filter: None
            }
        );
        assert_eq!(
            parse("ALTER TABLE t ADD COLUMN x INTEGER NOT NULL DEFAULT 0, DROP y, MODIFY COLUMN z TEXT")
                .unwrap(),
            Statement::AlterTable {
                table: "t".into(),
                alterations: vec![
                    Alteration::Add {
                        name: "x".into(),
                        column: Column::integer().not_null().default_value(0),
                    },
                    Alteration::Drop { name: "y".into() },
                    Alteration::Modify {
                        name: "z".into(),
                        column: Column::text(),
                    },
                ],
            }
        );
        assert_eq!(
            parse("DROP TABLE IF EXISTS t").unwrap(),
            Statement::DropTable {
                table: "t".into(),
                if_exists: true
            }
        );
        assert_eq!(
            parse("DROP INDEX idx ON t").unwrap(),
            Statement::DropIndex {
                table: "t".into(),
                index: "idx".into(),
                if_exists: false
            }
        );
    }

    #[test]
    fn test_rendered_statements_parse_back() {
        let fmt = AnsiFormatter;
        let statements = [
            Statement::CreateIndex {
                table: "t".into(),
                index: "idx_ab".into(),
                columns: vec!["a".into(), "b".into()],
                unique: true,
                if_not_exists: true,
            },
            Statement::AlterTable {
                table: "t".into(),
                alterations: vec![Alteration::Modify {
                    name: "a".into(),
                    column: Column::integer(),
                }],
            },
            Statement::DropIndex {
                table: "t".into(),
                index: "idx_ab".into(),
                if_exists: true,
            },
        ];
        for stmt in statements {
            assert_eq!(parse(&stmt.to_sql(&fmt).unwrap()).unwrap(), stmt);
        }
    }

    #[test]
    fn test_rejects_unknown_and_malformed() {
        let err = parse("TRUNCATE t").unwrap_err();
        assert!(err.to_string().contains("Unsupported SQL"));
        assert!(parse("SELECT * FROM t garbage").is_err());
        assert!(parse("SELECT * FROM t LIMIT many").is_err());
        assert!(parse("INSERT INTO t VALUES (1)").is_err());
        assert!(parse("UPDATE t SET WHERE a = 1").is_err());
    }
}
