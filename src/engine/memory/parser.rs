//! Lowering of `sqlparser` statements into the commands understood by
//! [`super::MemoryEngine`].

use crate::engine::NativeError;
use crate::types::Value;
use sqlparser::ast::{
    AssignmentTarget, BinaryOperator, ColumnOption, FromTable, FunctionArg, FunctionArgExpr,
    FunctionArguments, Ident, ObjectName, ObjectNamePart, ObjectType, SelectItem, SetExpr,
    Statement, TableConstraint, TableFactor, TableObject, TableWithJoins, UnaryOperator,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Error code for malformed SQL.
pub const SYNTAX_ERROR: i32 = 42000;

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    CreateTable {
        name: String,
        if_not_exists: bool,
        columns: Vec<ColumnDef>,
    },
    DropTable {
        name: String,
        if_exists: bool,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Expr>>,
    },
    Select {
        table: String,
        projection: Projection,
        filter: Option<Filter>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        filter: Option<Filter>,
    },
    Delete {
        table: String,
        filter: Option<Filter>,
    },
}

/// Column definition from CREATE TABLE.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnDef {
    pub name: String,
    pub type_name: String,
    pub precision: i32,
    pub scale: i32,
    pub not_null: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    All,
    Columns(Vec<String>),
    CountAll,
}

/// Scalar expression: a literal or a parameter placeholder.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Param(Option<usize>),
}

/// `WHERE column = expr`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Filter {
    pub column: String,
    pub value: Expr,
}

fn syntax(message: impl Into<String>) -> NativeError {
    NativeError::with_code(SYNTAX_ERROR, message)
}

/// Parse a single SQL statement. A trailing `;` is tolerated.
pub(crate) fn parse(sql: &str) -> Result<Command, NativeError> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| syntax(e.to_string()))?;

    let mut statements = Parser::new(&dialect)
        .with_tokens(strip_table_options(tokens))
        .parse_statements()
        .map_err(|e| syntax(e.to_string()))?;

    if statements.len() != 1 {
        return Err(syntax(format!(
            "Expected exactly one statement but found {}",
            statements.len()
        )));
    }

    lower(statements.remove(0))
}

/// Drop the engine specific `WITH "..."` clause trailing a CREATE TABLE.
fn strip_table_options(tokens: Vec<Token>) -> Vec<Token> {
    let is_create = tokens
        .iter()
        .find(|t| !matches!(t, Token::Whitespace(_)))
        .is_some_and(|t| matches!(t, Token::Word(w) if w.keyword == Keyword::CREATE));
    if !is_create {
        return tokens;
    }

    let mut kept = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if matches!(&token, Token::Word(w) if w.keyword == Keyword::WITH && w.quote_style.is_none())
        {
            let mut lookahead = iter.clone();
            while matches!(lookahead.peek(), Some(Token::Whitespace(_))) {
                lookahead.next();
            }
            if matches!(lookahead.peek(), Some(Token::Word(w)) if w.quote_style == Some('"')) {
                lookahead.next();
                iter = lookahead;
                continue;
            }
        }
        kept.push(token);
    }
    kept
}

fn lower(statement: Statement) -> Result<Command, NativeError> {
    match statement {
        Statement::CreateTable(create) => {
            let mut columns = create
                .columns
                .iter()
                .map(column_def)
                .collect::<Result<Vec<_>, _>>()?;

            for constraint in &create.constraints {
                match constraint {
                    TableConstraint::PrimaryKey { columns: key, .. } => {
                        if key.len() != 1 {
                            return Err(syntax("Composite primary keys are not supported"));
                        }
                        let key = match &key[0].column.expr {
                            sqlparser::ast::Expr::Identifier(ident) => identifier(ident),
                            other => {
                                return Err(syntax(format!("Unsupported primary key {}", other)))
                            }
                        };
                        let column = columns
                            .iter_mut()
                            .find(|c| c.name == key)
                            .ok_or_else(|| {
                                syntax(format!("Primary key column {} is not defined", key))
                            })?;
                        column.primary_key = true;
                        column.not_null = true;
                    }
                    other => return Err(syntax(format!("Unsupported constraint {}", other))),
                }
            }

            if columns.iter().filter(|c| c.primary_key).count() > 1 {
                return Err(syntax("Only one primary key column is supported"));
            }

            Ok(Command::CreateTable {
                name: object_name(&create.name)?,
                if_not_exists: create.if_not_exists,
                columns,
            })
        }
        Statement::Drop {
            object_type: ObjectType::Table,
            if_exists,
            names,
            ..
        } => match names.as_slice() {
            [name] => Ok(Command::DropTable {
                name: object_name(name)?,
                if_exists,
            }),
            _ => Err(syntax("DROP TABLE takes exactly one table")),
        },
        Statement::Insert(insert) => {
            let table = match &insert.table {
                TableObject::TableName(name) => object_name(name)?,
                _ => return Err(syntax("Unsupported insert target")),
            };
            let columns = if insert.columns.is_empty() {
                None
            } else {
                Some(insert.columns.iter().map(identifier).collect())
            };
            let source = insert
                .source
                .ok_or_else(|| syntax("INSERT requires a VALUES clause"))?;
            let rows = match *source.body {
                SetExpr::Values(values) => values
                    .rows
                    .iter()
                    .map(|row| row.iter().map(expr).collect::<Result<Vec<_>, _>>())
                    .collect::<Result<Vec<_>, _>>()?,
                _ => return Err(syntax("INSERT supports only a VALUES clause")),
            };
            Ok(Command::Insert {
                table,
                columns,
                rows,
            })
        }
        Statement::Query(query) => {
            let select = match *query.body {
                SetExpr::Select(select) => select,
                other => return Err(syntax(format!("Unsupported query {}", other))),
            };
            let table = match select.from.as_slice() {
                [from] => table_name(from)?,
                _ => return Err(syntax("SELECT requires exactly one table")),
            };
            Ok(Command::Select {
                table,
                projection: projection(&select.projection)?,
                filter: select.selection.as_ref().map(filter).transpose()?,
            })
        }
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let assignments = assignments
                .iter()
                .map(|assignment| match &assignment.target {
                    AssignmentTarget::ColumnName(name) => {
                        Ok((object_name(name)?, expr(&assignment.value)?))
                    }
                    _ => Err(syntax("Tuple assignments are not supported")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Command::Update {
                table: table_name(&table)?,
                assignments,
                filter: selection.as_ref().map(filter).transpose()?,
            })
        }
        Statement::Delete(delete) => {
            let tables = match &delete.from {
                FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
            };
            let table = match tables.as_slice() {
                [from] => table_name(from)?,
                _ => return Err(syntax("DELETE requires exactly one table")),
            };
            Ok(Command::Delete {
                table,
                filter: delete.selection.as_ref().map(filter).transpose()?,
            })
        }
        other => Err(syntax(format!("Unsupported statement {}", other))),
    }
}

/// Unquoted identifiers fold to upper case.
fn identifier(ident: &Ident) -> String {
    match ident.quote_style {
        Some(_) => ident.value.clone(),
        None => ident.value.to_ascii_uppercase(),
    }
}

/// Possibly schema-qualified name; the schema part is dropped.
fn object_name(name: &ObjectName) -> Result<String, NativeError> {
    match name.0.last() {
        Some(ObjectNamePart::Identifier(ident)) => Ok(identifier(ident)),
        _ => Err(syntax(format!("Unsupported object name {}", name))),
    }
}

fn table_name(from: &TableWithJoins) -> Result<String, NativeError> {
    if !from.joins.is_empty() {
        return Err(syntax("Joins are not supported"));
    }
    match &from.relation {
        TableFactor::Table { name, .. } => object_name(name),
        other => Err(syntax(format!("Unsupported table reference {}", other))),
    }
}

fn column_def(column: &sqlparser::ast::ColumnDef) -> Result<ColumnDef, NativeError> {
    // Display renders e.g. VARCHAR(20), DECIMAL(10,2) or DOUBLE PRECISION.
    let rendered = column.data_type.to_string().to_ascii_uppercase();
    let (type_name, args) = match rendered.split_once('(') {
        Some((base, rest)) => (base.trim().to_string(), rest.trim_end_matches(')')),
        None => (rendered.clone(), ""),
    };

    let mut sizes = args
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>()
                .map_err(|e| syntax(format!("Invalid size '{}' in {}: {}", s, rendered, e)))
        });
    let precision = sizes.next().transpose()?.unwrap_or(0);
    let scale = sizes.next().transpose()?.unwrap_or(0);

    let mut def = ColumnDef {
        name: identifier(&column.name),
        type_name,
        precision,
        scale,
        not_null: false,
        primary_key: false,
    };

    for option in &column.options {
        match &option.option {
            ColumnOption::Unique {
                is_primary: true, ..
            } => {
                def.primary_key = true;
                def.not_null = true;
            }
            ColumnOption::NotNull => def.not_null = true,
            ColumnOption::Null => def.not_null = false,
            other => return Err(syntax(format!("Unsupported column option {}", other))),
        }
    }

    Ok(def)
}

fn projection(items: &[SelectItem]) -> Result<Projection, NativeError> {
    match items {
        [SelectItem::Wildcard(_)] => Ok(Projection::All),
        [SelectItem::UnnamedExpr(sqlparser::ast::Expr::Function(function))]
            if function.name.to_string().eq_ignore_ascii_case("COUNT") =>
        {
            match &function.args {
                FunctionArguments::List(list)
                    if matches!(
                        list.args.as_slice(),
                        [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)]
                    ) =>
                {
                    Ok(Projection::CountAll)
                }
                _ => Err(syntax("Only COUNT(*) is supported")),
            }
        }
        _ => items
            .iter()
            .map(|item| match item {
                SelectItem::UnnamedExpr(sqlparser::ast::Expr::Identifier(ident)) => {
                    Ok(identifier(ident))
                }
                other => Err(syntax(format!("Unsupported select item {}", other))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Projection::Columns),
    }
}

fn filter(selection: &sqlparser::ast::Expr) -> Result<Filter, NativeError> {
    match selection {
        sqlparser::ast::Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => match left.as_ref() {
            sqlparser::ast::Expr::Identifier(ident) => Ok(Filter {
                column: identifier(ident),
                value: expr(right)?,
            }),
            other => Err(syntax(format!("Unsupported filter column {}", other))),
        },
        other => Err(syntax(format!(
            "Only 'column = value' filters are supported, found {}",
            other
        ))),
    }
}

fn expr(node: &sqlparser::ast::Expr) -> Result<Expr, NativeError> {
    match node {
        sqlparser::ast::Expr::Value(value) => match &value.value {
            sqlparser::ast::Value::Placeholder(text) => placeholder(text).map(Expr::Param),
            other => literal(other).map(Expr::Literal),
        },
        sqlparser::ast::Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => match expr(inner)? {
            Expr::Literal(Value::Integer(i)) => Ok(Expr::Literal(Value::Integer(-i))),
            Expr::Literal(Value::Float(f)) => Ok(Expr::Literal(Value::Float(-f))),
            _ => Err(syntax("'-' must be followed by a number")),
        },
        other => Err(syntax(format!("Unsupported expression {}", other))),
    }
}

fn literal(value: &sqlparser::ast::Value) -> Result<Value, NativeError> {
    use sqlparser::ast::Value as Sql;

    match value {
        Sql::Number(n, _) => n
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| n.parse::<f64>().map(Value::Float))
            .map_err(|e| syntax(format!("Invalid number '{}': {}", n, e))),
        Sql::SingleQuotedString(s) => Ok(Value::String(s.clone())),
        Sql::Boolean(b) => Ok(Value::Boolean(*b)),
        Sql::Null => Ok(Value::Null),
        other => Err(syntax(format!("Unsupported literal {}", other))),
    }
}

/// `?` binds positionally; `?N` and `$N` name a 1-based ordinal.
fn placeholder(text: &str) -> Result<Option<usize>, NativeError> {
    let digits = match text.strip_prefix('?') {
        Some("") => return Ok(None),
        Some(digits) => digits,
        None => text
            .strip_prefix('$')
            .ok_or_else(|| syntax(format!("Unsupported placeholder '{}'", text)))?,
    };

    match digits.parse::<usize>() {
        Ok(0) => Err(syntax("Parameter ordinals start at 1")),
        Ok(ordinal) => Ok(Some(ordinal)),
        Err(e) => Err(syntax(format!("Invalid parameter ordinal '{}': {}", text, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_with_options() {
        let command = parse(
            "CREATE TABLE City (id int primary key, name varchar(20), region varchar) WITH \"ATOMICITY=TRANSACTIONAL_SNAPSHOT\"",
        )
        .unwrap();

        match command {
            Command::CreateTable { name, columns, .. } => {
                assert_eq!(name, "CITY");
                assert_eq!(columns.len(), 3);
                assert!(columns[0].primary_key);
                assert!(columns[0].not_null);
                assert_eq!(columns[1].name, "NAME");
                assert_eq!(columns[1].type_name, "VARCHAR");
                assert_eq!(columns[1].precision, 20);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_table_level_primary_key() {
        let command = parse("CREATE TABLE t (a INT, b VARCHAR, PRIMARY KEY (b))").unwrap();
        match command {
            Command::CreateTable { columns, .. } => {
                assert!(!columns[0].primary_key);
                assert!(columns[1].primary_key);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_column_sizes() {
        let command =
            parse("CREATE TABLE IF NOT EXISTS t (price DECIMAL(10, 2), ratio DOUBLE PRECISION)")
                .unwrap();
        match command {
            Command::CreateTable {
                if_not_exists,
                columns,
                ..
            } => {
                assert!(if_not_exists);
                assert_eq!(columns[0].type_name, "DECIMAL");
                assert_eq!((columns[0].precision, columns[0].scale), (10, 2));
                assert_eq!(columns[1].type_name, "DOUBLE PRECISION");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_insert_with_placeholders() {
        let command = parse("INSERT INTO T(id, name) VALUES(?1, $2), (?, 'it''s')").unwrap();
        assert_eq!(
            command,
            Command::Insert {
                table: "T".to_string(),
                columns: Some(vec!["ID".to_string(), "NAME".to_string()]),
                rows: vec![
                    vec![Expr::Param(Some(1)), Expr::Param(Some(2))],
                    vec![
                        Expr::Param(None),
                        Expr::Literal(Value::String("it's".to_string()))
                    ],
                ],
            }
        );
    }

    #[test]
    fn test_select_variants() {
        assert_eq!(
            parse("select * from t;").unwrap(),
            Command::Select {
                table: "T".to_string(),
                projection: Projection::All,
                filter: None,
            }
        );
        assert_eq!(
            parse("SELECT COUNT(*) FROM PUBLIC.T WHERE id = -3").unwrap(),
            Command::Select {
                table: "T".to_string(),
                projection: Projection::CountAll,
                filter: Some(Filter {
                    column: "ID".to_string(),
                    value: Expr::Literal(Value::Integer(-3)),
                }),
            }
        );
        assert_eq!(
            parse("SELECT \"name\", id FROM t").unwrap(),
            Command::Select {
                table: "T".to_string(),
                projection: Projection::Columns(vec!["name".to_string(), "ID".to_string()]),
                filter: None,
            }
        );
    }

    #[test]
    fn test_update_and_delete() {
        assert_eq!(
            parse("UPDATE t SET name = NULL, flag = TRUE WHERE id = 1.5").unwrap(),
            Command::Update {
                table: "T".to_string(),
                assignments: vec![
                    ("NAME".to_string(), Expr::Literal(Value::Null)),
                    ("FLAG".to_string(), Expr::Literal(Value::Boolean(true))),
                ],
                filter: Some(Filter {
                    column: "ID".to_string(),
                    value: Expr::Literal(Value::Float(1.5)),
                }),
            }
        );
        assert_eq!(
            parse("DELETE FROM t -- everything\n").unwrap(),
            Command::Delete {
                table: "T".to_string(),
                filter: None,
            }
        );
        assert_eq!(
            parse("DROP TABLE IF EXISTS s.t").unwrap(),
            Command::DropTable {
                name: "T".to_string(),
                if_exists: true,
            }
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("MERGE INTO t").is_err());
        assert!(parse("SELECT * FROM t WHERE").is_err());
        assert!(parse("SELECT 'open FROM t").is_err());
        assert!(parse("INSERT INTO t VALUES ($x)").is_err());
        assert!(parse("INSERT INTO t VALUES (?0)").is_err());
        assert!(parse("SELECT * FROM t WHERE id = 1 extra").is_err());
        assert!(parse("SELECT * FROM t WHERE id > 1").is_err());
        assert!(parse("SELECT 1; SELECT 2").is_err());

        let err = parse("SELEC * FROM t").unwrap_err();
        assert_eq!(err.code, Some(SYNTAX_ERROR));
    }
}
