//! Relational compiler: `QueryParams` to [`Statement`].

use crate::condition::{Clause, Condition, FieldCondition, Operator};
use crate::dialect::{Dialect, SqlFormatter};
use crate::error::{invalid_statement, DbResult, ExecutionError};
use crate::query::{BuildQueryResult, QueryParams, SelectParams};
use crate::statement::{CompareOp, Operand, Predicate, Select, Statement};
use crate::value::Value;

use super::{Database, Paradigm, ParadigmKind};

/// Table-oriented paradigm. Queries compile to [`Statement`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Relational;

impl Paradigm for Relational {
    type Query = Statement;

    const KIND: ParadigmKind = ParadigmKind::Relational;
    const EAGER_PROVISIONING: bool = true;

    fn build_query(params: &QueryParams) -> DbResult<BuildQueryResult<Statement>> {
        let mut binder = Binder::default();
        let statement = binder.statement(params)?;
        Ok(BuildQueryResult::new(statement, binder.params))
    }
}

impl<D> Database<D>
where
    D: Dialect<Paradigm = Relational> + SqlFormatter,
{
    /// Compiles `params` and renders the statement as SQL text in this
    /// dialect's tokens.
    pub fn build_sql(&self, params: &QueryParams) -> DbResult<BuildQueryResult<String>> {
        let built = self.build_query(params)?;
        let sql = built.query.to_sql(self.dialect())?;
        Ok(BuildQueryResult::new(sql, built.params))
    }
}

/// Compiles a condition into a predicate plus the values it binds, in
/// placeholder order. An empty condition compiles to `None`.
pub fn compile_condition(condition: &Condition) -> DbResult<(Option<Predicate>, Vec<Value>)> {
    let mut binder = Binder::default();
    let predicate = binder.condition(condition)?;
    Ok((predicate, binder.params))
}

/// Allocates positional parameters while compiling.
#[derive(Default)]
struct Binder {
    params: Vec<Value>,
}

impl Binder {
    fn bind(&mut self, value: Value) -> Operand {
        self.params.push(value);
        Operand::Param(self.params.len() - 1)
    }

    fn statement(&mut self, params: &QueryParams) -> DbResult<Statement> {
        Ok(match params {
            QueryParams::Create { table_name, schema } => Statement::CreateTable {
                table: table_name.clone(),
                columns: schema.columns().to_vec(),
                if_not_exists: true,
            },
            QueryParams::Select(select) => Statement::Select(self.select(select)?),
            QueryParams::Insert { table_name, data } => {
                let columns = data.keys().cloned().collect();
                let values = data.values().map(|v| self.bind(v.clone())).collect();
                Statement::Insert {
                    table: table_name.clone(),
                    columns,
                    values,
                }
            }
            QueryParams::Update {
                table_name,
                update,
                conditions,
            } => {
                if update.is_empty() {
                    return Err(invalid_statement("UPDATE", &format!("no columns to set on {table_name}")));
                }
                // SET placeholders precede WHERE placeholders.
                let assignments = update
                    .iter()
                    .map(|(column, value)| (column.clone(), self.bind(value.clone())))
                    .collect();
                Statement::Update {
                    table: table_name.clone(),
                    assignments,
                    filter: self.optional(conditions.as_ref())?,
                }
            }
            QueryParams::Delete {
                table_name,
                conditions,
            } => Statement::Delete {
                table: table_name.clone(),
                filter: self.optional(conditions.as_ref())?,
            },
            QueryParams::Alter {
                table_name,
                alterations,
            } => {
                if alterations.is_empty() {
                    return Err(invalid_statement(
                        "ALTER TABLE",
                        &format!("no alterations for {table_name}"),
                    ));
                }
                Statement::AlterTable {
                    table: table_name.clone(),
                    alterations: alterations.clone(),
                }
            }
            QueryParams::DropTable { table_name } => Statement::DropTable {
                table: table_name.clone(),
                if_exists: true,
            },
            QueryParams::DropIndex {
                table_name,
                index_name,
            } => Statement::DropIndex {
                table: table_name.clone(),
                index: index_name.clone(),
                if_exists: true,
            },
            QueryParams::CreateIndex {
                table_name,
                index_name,
                columns,
                unique,
            } => Statement::CreateIndex {
                table: table_name.clone(),
                index: index_name.clone(),
                columns: columns.clone(),
                unique: *unique,
                if_not_exists: true,
            },
        })
    }

    fn select(&mut self, select: &SelectParams) -> DbResult<Select> {
        Ok(Select {
            table: select.table_name.clone(),
            fields: select.fields.clone().unwrap_or_default(),
            filter: self.optional(select.conditions.as_ref())?,
            group_by: select.groupings.clone(),
            order_by: select.orderings.clone(),
            limit: select.limit_count,
            offset: select.offset_count,
        })
    }

    fn optional(&mut self, condition: Option<&Condition>) -> DbResult<Option<Predicate>> {
        match condition {
            Some(condition) => self.condition(condition),
            None => Ok(None),
        }
    }

    fn condition(&mut self, condition: &Condition) -> DbResult<Option<Predicate>> {
        let mut preds = Vec::with_capacity(condition.clauses().len());
        for clause in condition.clauses() {
            self.clause(clause, &mut preds)?;
        }
        Ok((!preds.is_empty()).then(|| Predicate::all(preds)))
    }

    /// A nested condition; empty means "always true".
    fn nested(&mut self, condition: &Condition) -> DbResult<Predicate> {
        Ok(self.condition(condition)?.unwrap_or(Predicate::Literal(true)))
    }

    fn clause(&mut self, clause: &Clause, out: &mut Vec<Predicate>) -> DbResult<()> {
        match clause {
            Clause::Field {
                field,
                condition: FieldCondition::Value(value),
            } => out.push(self.operator(field, Operator::Eq, value)?),
            Clause::Field {
                field,
                condition: FieldCondition::Operators(ops),
            } => {
                for (op, value) in ops {
                    out.push(self.operator(field, *op, value)?);
                }
            }
            Clause::And(subs) => {
                let parts = subs.iter().map(|c| self.nested(c)).collect::<DbResult<_>>()?;
                out.push(Predicate::And(parts));
            }
            Clause::Or(subs) => {
                let parts = subs.iter().map(|c| self.nested(c)).collect::<DbResult<_>>()?;
                out.push(Predicate::Or(parts));
            }
            Clause::Not(sub) => out.push(Predicate::Not(Box::new(self.nested(sub)?))),
        }
        Ok(())
    }

    fn operator(&mut self, field: &str, op: Operator, value: &Value) -> DbResult<Predicate> {
        let compare = match op {
            Operator::Eq | Operator::Ne if value.is_null() => {
                return Ok(Predicate::IsNull {
                    column: field.to_string(),
                    negated: op == Operator::Ne,
                });
            }
            Operator::In | Operator::Nin => {
                let items = value.as_list().ok_or_else(|| ExecutionError::NotAnArray {
                    context: format!("{field} {}", op.key()),
                })?;
                if items.is_empty() {
                    return Ok(Predicate::Literal(op == Operator::Nin));
                }
                let list = items.iter().map(|v| self.bind(v.clone())).collect();
                let cmp = if op == Operator::In { CompareOp::In } else { CompareOp::NotIn };
                return Ok(Predicate::compare(field, cmp, Operand::List(list)));
            }
            Operator::Eq => CompareOp::Eq,
            Operator::Ne => CompareOp::NotEq,
            Operator::Gt => CompareOp::Gt,
            Operator::Gte => CompareOp::Gte,
            Operator::Lt => CompareOp::Lt,
            Operator::Lte => CompareOp::Lte,
            Operator::Like => CompareOp::Like,
            Operator::Nlike => CompareOp::NotLike,
        };
        let operand = self.bind(value.clone());
        Ok(Predicate::compare(field, compare, operand))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{Column, TableSchema};
    use crate::dialect::AnsiFormatter;
    use crate::query::Ordering;
    use crate::row;

    fn sql(params: &QueryParams) -> (String, Vec<Value>) {
        let built = Relational::build_query(params).unwrap();
        (built.query.to_sql(&AnsiFormatter).unwrap(), built.params)
    }

    #[test]
    fn test_select_with_operators() {
        let (text, params) = sql(
            &SelectParams::new("users")
                .conditions(Condition::new().gte("age", 18).lt("age", 65))
                .order_by(Ordering::asc("name"))
                .limit(3)
                .into(),
        );
        assert_eq!(
            text,
            "SELECT * FROM \"users\" WHERE (\"age\" >= ?) AND (\"age\" < ?) ORDER BY \"name\" ASC LIMIT 3"
        );
        assert_eq!(params, vec![Value::Int(18), Value::Int(65)]);
    }

    #[test]
    fn test_bare_value_is_equality() {
        let (text, params) = sql(&SelectParams::new("t").conditions(Condition::new().eq("id", 7)).into());
        assert_eq!(text, "SELECT * FROM \"t\" WHERE \"id\" = ?");
        assert_eq!(params, vec![Value::Int(7)]);
    }

    #[test]
    fn test_empty_in_compiles_to_false() {
        let (text, params) = sql(
            &SelectParams::new("t")
                .conditions(Condition::new().is_in("id", Vec::<i64>::new()))
                .into(),
        );
        assert_eq!(text, "SELECT * FROM \"t\" WHERE 1=0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_in_binds_one_param_per_element() {
        let (text, params) = sql(
            &SelectParams::new("t")
                .conditions(Condition::new().is_in("id", vec![1, 2, 3]))
                .into(),
        );
        assert_eq!(text, "SELECT * FROM \"t\" WHERE \"id\" IN (?, ?, ?)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_in_requires_array() {
        let cond = Condition::new().op("id", Operator::In, 5);
        let err = Relational::build_query(&SelectParams::new("t").conditions(cond).into()).unwrap_err();
        assert!(err.to_string().contains("not an array"));
    }

    #[test]
    fn test_logical_composition() {
        let cond = Condition::new()
            .or(vec![Condition::new().eq("a", 1), Condition::new().eq("a", 2)])
            .eq("b", "x");
        let (pred, params) = compile_condition(&cond).unwrap();
        assert_eq!(
            pred.unwrap().to_sql(&AnsiFormatter).unwrap(),
            "((\"a\" = ?) OR (\"a\" = ?)) AND (\"b\" = ?)"
        );
        assert_eq!(params, vec![Value::Int(1), Value::Int(2), Value::from("x")]);
    }

    #[test]
    fn test_not_and_null() {
        let cond = Condition::new()
            .not(Condition::new().eq("status", "banned"))
            .eq("deleted_at", Value::Null);
        let (pred, params) = compile_condition(&cond).unwrap();
        assert_eq!(
            pred.unwrap().to_sql(&AnsiFormatter).unwrap(),
            "(NOT (\"status\" = ?)) AND (\"deleted_at\" IS NULL)"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_empty_condition_has_no_where() {
        assert_eq!(compile_condition(&Condition::new()).unwrap(), (None, vec![]));
    }

    #[test]
    fn test_update_binds_set_first() {
        let (text, params) = sql(&QueryParams::Update {
            table_name: "t".into(),
            update: row! { "v" => "new" },
            conditions: Some(Condition::new().eq("id", 2)),
        });
        assert_eq!(text, "UPDATE \"t\" SET \"v\" = ? WHERE \"id\" = ?");
        assert_eq!(params, vec![Value::from("new"), Value::Int(2)]);
    }

    #[test]
    fn test_insert_columns_and_params() {
        let (text, params) = sql(&QueryParams::Insert {
            table_name: "t".into(),
            data: row! { "b" => 2, "a" => 1 },
        });
        assert_eq!(text, "INSERT INTO \"t\" (\"a\", \"b\") VALUES (?, ?)");
        assert_eq!(params, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_create_and_drop() {
        let (text, _) = sql(&QueryParams::Create {
            table_name: "t".into(),
            schema: TableSchema::new().column("id", Column::integer().primary().auto_increment()),
        });
        assert_eq!(
            text,
            "CREATE TABLE IF NOT EXISTS \"t\" (\"id\" INTEGER PRIMARY KEY AUTO_INCREMENT)"
        );

        let (text, _) = sql(&QueryParams::DropTable {
            table_name: "t".into(),
        });
        assert_eq!(text, "DROP TABLE IF EXISTS \"t\"");
    }

    #[test]
    fn test_rejects_empty_update_and_alter() {
        assert!(Relational::build_query(&QueryParams::Update {
            table_name: "t".into(),
            update: row! {},
            conditions: None,
        })
        .is_err());
        assert!(Relational::build_query(&QueryParams::Alter {
            table_name: "t".into(),
            alterations: vec![],
        })
        .unwrap_err()
        .is_syntax());
    }
}
