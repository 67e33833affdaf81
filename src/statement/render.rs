//! Rendering of statements to SQL text.
//!
//! Placeholders are numbered from the operand's parameter index, so a
//! statement renders identically no matter which dialect binds it.

use super::{CompareOp, Operand, Predicate, Select, Statement};
use crate::dialect::SqlFormatter;
use crate::error::DbResult;

impl Statement {
    /// Renders this statement with the tokens of `fmt`.
    pub fn to_sql(&self, fmt: &dyn SqlFormatter) -> DbResult<String> {
        match self {
            Self::CreateTable {
                table,
                columns,
                if_not_exists,
            } => fmt.format_create_table(table, columns, *if_not_exists),
            Self::CreateIndex {
                table,
                index,
                columns,
                unique,
                if_not_exists,
            } => Ok(fmt.format_create_index(table, index, columns, *unique, *if_not_exists)),
            Self::Insert {
                table,
                columns,
                values,
            } => {
                let cols = columns
                    .iter()
                    .map(|c| fmt.quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                let vals = values
                    .iter()
                    .map(|v| operand(fmt, v))
                    .collect::<DbResult<Vec<_>>>()?
                    .join(", ");
                Ok(format!(
                    "INSERT INTO {} ({cols}) VALUES ({vals})",
                    fmt.quote_identifier(table)
                ))
            }
            Self::Select(select) => render_select(fmt, select),
            Self::Update {
                table,
                assignments,
                filter,
            } => {
                let sets = assignments
                    .iter()
                    .map(|(column, value)| {
                        Ok(format!("{} = {}", fmt.quote_identifier(column), operand(fmt, value)?))
                    })
                    .collect::<DbResult<Vec<_>>>()?
                    .join(", ");
                let mut sql = format!("UPDATE {} SET {sets}", fmt.quote_identifier(table));
                push_where(fmt, &mut sql, filter.as_ref())?;
                Ok(sql)
            }
            Self::Delete { table, filter } => {
                let mut sql = format!("DELETE FROM {}", fmt.quote_identifier(table));
                push_where(fmt, &mut sql, filter.as_ref())?;
                Ok(sql)
            }
            Self::AlterTable { table, alterations } => fmt.format_alter_table(table, alterations),
            Self::DropTable { table, if_exists } => Ok(fmt.format_drop_table(table, *if_exists)),
            Self::DropIndex {
                table,
                index,
                if_exists,
            } => Ok(fmt.format_drop_index(table, index, *if_exists)),
        }
    }
}

impl Predicate {
    /// Renders this predicate as `WHERE` clause text (without the keyword).
    pub fn to_sql(&self, fmt: &dyn SqlFormatter) -> DbResult<String> {
        predicate(fmt, self)
    }
}

fn render_select(fmt: &dyn SqlFormatter, select: &Select) -> DbResult<String> {
    let fields = if select.fields.is_empty() {
        "*".to_string()
    } else {
        select
            .fields
            .iter()
            .map(|f| fmt.quote_identifier(f))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut sql = format!("SELECT {fields} FROM {}", fmt.quote_identifier(&select.table));
    push_where(fmt, &mut sql, select.filter.as_ref())?;

    if !select.group_by.is_empty() {
        let groups = select
            .group_by
            .iter()
            .map(|g| fmt.quote_identifier(g))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" GROUP BY ");
        sql.push_str(&groups);
    }

    if !select.order_by.is_empty() {
        let orders = select
            .order_by
            .iter()
            .map(|o| format!("{} {}", fmt.quote_identifier(&o.field), o.direction.keyword()))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" ORDER BY ");
        sql.push_str(&orders);
    }

    let paging = fmt.format_limit_offset(select.limit, select.offset);
    if !paging.is_empty() {
        sql.push(' ');
        sql.push_str(&paging);
    }
    Ok(sql)
}

fn push_where(fmt: &dyn SqlFormatter, sql: &mut String, filter: Option<&Predicate>) -> DbResult<()> {
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate(fmt, filter)?);
    }
    Ok(())
}

fn operand(fmt: &dyn SqlFormatter, value: &Operand) -> DbResult<String> {
    match value {
        Operand::Param(index) => Ok(fmt.parameter_placeholder(index + 1)),
        Operand::Literal(value) => fmt.format_literal(value),
        Operand::List(items) => {
            let parts = items
                .iter()
                .map(|item| operand(fmt, item))
                .collect::<DbResult<Vec<_>>>()?;
            Ok(format!("({})", parts.join(", ")))
        }
    }
}

fn literal(truth: bool) -> String {
    if truth { "1=1" } else { "1=0" }.to_string()
}

fn predicate(fmt: &dyn SqlFormatter, pred: &Predicate) -> DbResult<String> {
    Ok(match pred {
        Predicate::Compare { op, value, .. }
            if matches!(op, CompareOp::In | CompareOp::NotIn)
                && matches!(value, Operand::List(items) if items.is_empty()) =>
        {
            literal(*op == CompareOp::NotIn)
        }
        Predicate::Compare { column, op, value } => format!(
            "{} {} {}",
            fmt.quote_identifier(column),
            op.sql(),
            operand(fmt, value)?
        ),
        Predicate::IsNull { column, negated } => format!(
            "{} IS {}NULL",
            fmt.quote_identifier(column),
            if *negated { "NOT " } else { "" }
        ),
        Predicate::Between {
            column,
            low,
            high,
            negated,
        } => format!(
            "{} {}BETWEEN {} AND {}",
            fmt.quote_identifier(column),
            if *negated { "NOT " } else { "" },
            operand(fmt, low)?,
            operand(fmt, high)?
        ),
        Predicate::And(parts) => join(fmt, parts, " AND ", true)?,
        Predicate::Or(parts) => join(fmt, parts, " OR ", false)?,
        Predicate::Not(inner) => format!("NOT ({})", predicate(fmt, inner)?),
        Predicate::Literal(truth) => literal(*truth),
    })
}

fn join(fmt: &dyn SqlFormatter, parts: &[Predicate], sep: &str, empty: bool) -> DbResult<String> {
    if parts.is_empty() {
        return Ok(literal(empty));
    }
    Ok(parts
        .iter()
        .map(|p| predicate(fmt, p).map(|s| format!("({s})")))
        .collect::<DbResult<Vec<_>>>()?
        .join(sep))
}
