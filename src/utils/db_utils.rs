use actix_web::error::ErrorBadRequest;
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::MySqlPool;

/// Value bound into a dynamically built statement.
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    F64(f64),
    Date(NaiveDate),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Builds `UPDATE <table> SET .. WHERE <id_column> = ?` from a JSON object.
///
/// Only keys listed in `allowed` may be written; any other key rejects the
/// whole payload. Keys are emitted in `allowed` order so the statement text
/// is stable.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ErrorBadRequest(format!("Field '{}' cannot be updated", unknown)));
    }

    let mut columns = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for column in allowed {
        let Some(value) = obj.get(*column) else {
            continue;
        };
        columns.push(format!("{} = ?", column));
        values.push(to_sql_value(value)?);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        columns.join(", "),
        id_column
    );

    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

fn to_sql_value(value: &Value) -> Result<SqlValue, actix_web::Error> {
    Ok(match value {
        Value::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => SqlValue::Date(d),
            Err(_) => SqlValue::String(s.trim().to_string()),
        },
        Value::Number(n) => match n.as_u64() {
            Some(i) => SqlValue::U64(i),
            None => SqlValue::F64(
                n.as_f64()
                    .ok_or_else(|| ErrorBadRequest("Unsupported number"))?,
            ),
        },
        Value::Null => SqlValue::Null,
        _ => return Err(ErrorBadRequest("Unsupported JSON value type")),
    })
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: &[&str] = &["name", "phone", "designation"];

    #[test]
    fn builds_statement_in_whitelist_order() {
        let payload = json!({ "designation": "Tester", "name": " Asha " });
        let update = build_update_sql("employees", &payload, COLUMNS, "id", 7).unwrap();
        assert_eq!(
            update.sql,
            "UPDATE employees SET name = ?, designation = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Asha".into()),
                SqlValue::String("Tester".into()),
                SqlValue::U64(7),
            ]
        );
    }

    #[test]
    fn null_clears_a_column() {
        let update =
            build_update_sql("employees", &json!({ "phone": null }), COLUMNS, "id", 1).unwrap();
        assert_eq!(update.values[0], SqlValue::Null);
    }

    #[test]
    fn rejects_unknown_or_empty_payloads() {
        assert!(build_update_sql("employees", &json!({}), COLUMNS, "id", 1).is_err());
        assert!(build_update_sql("employees", &json!([1]), COLUMNS, "id", 1).is_err());
        assert!(
            build_update_sql("employees", &json!({ "status": "Verified" }), COLUMNS, "id", 1)
                .is_err()
        );
        assert!(
            build_update_sql("employees", &json!({ "name": ["x"] }), COLUMNS, "id", 1).is_err()
        );
    }
}
