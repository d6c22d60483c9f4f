use std::fmt;

/// One literal position in a bulk insert. Expr carries a sub-select that must
/// land in the statement unquoted.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Num(f64),
    Text(String),
    Expr(String),
}

impl SqlValue {
    /// Empty strings collapse to NULL, matching the ingestion contract.
    pub fn text(s: &str) -> Self {
        if s.is_empty() {
            SqlValue::Null
        } else {
            SqlValue::Text(s.to_string())
        }
    }

    pub fn opt_text(s: Option<&str>) -> Self {
        s.map(Self::text).unwrap_or(SqlValue::Null)
    }

    pub fn opt_int(v: Option<i64>) -> Self {
        v.map(SqlValue::Int).unwrap_or(SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Num(v) => write!(f, "{}", v),
            SqlValue::Text(s) => write!(f, "'{}'", escape(s)),
            SqlValue::Expr(e) => f.write_str(e),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Deferred product lookup by natural key, resolved at insert time.
pub fn product_lookup(sku: &str) -> String {
    format!("(SELECT id FROM product WHERE sku = '{}')", escape(sku))
}

/// Deferred offer-period lookup, transitively through the product's SKU.
pub fn offer_period_lookup(sku: &str) -> String {
    format!(
        "(SELECT id FROM offer_period WHERE product_id = (SELECT id FROM product WHERE sku = '{}'))",
        escape(sku)
    )
}

/// One idempotent bulk insert. Re-running the same statement must not error
/// or duplicate rows, hence INSERT OR IGNORE. Empty input renders nothing.
pub fn insert_or_ignore(table: &str, columns: &[&str], rows: &[Vec<SqlValue>]) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let values = rows
        .iter()
        .map(|row| {
            let rendered: Vec<String> = row.iter().map(ToString::to_string).collect();
            format!("({})", rendered.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT OR IGNORE INTO {} ({}) VALUES {};",
        table,
        columns.join(", "),
        values
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_values_double_single_quotes() {
        assert_eq!(SqlValue::text("Ben's Bread").to_string(), "'Ben''s Bread'");
    }

    #[test]
    fn empty_and_missing_text_render_null() {
        assert_eq!(SqlValue::text("").to_string(), "NULL");
        assert_eq!(SqlValue::opt_text(None).to_string(), "NULL");
    }

    #[test]
    fn expressions_render_unquoted() {
        let expr = SqlValue::Expr(product_lookup("1111161"));
        assert_eq!(
            expr.to_string(),
            "(SELECT id FROM product WHERE sku = '1111161')"
        );
    }

    #[test]
    fn bulk_insert_shape() {
        let rows = vec![
            vec![SqlValue::text("123"), SqlValue::Num(4.99)],
            vec![SqlValue::text("456"), SqlValue::Null],
        ];
        assert_eq!(
            insert_or_ignore("product", &["sku", "discount"], &rows),
            "INSERT OR IGNORE INTO product (sku, discount) VALUES ('123', 4.99), ('456', NULL);"
        );
    }

    #[test]
    fn empty_row_set_renders_nothing() {
        assert_eq!(insert_or_ignore("product", &["sku"], &[]), "");
    }
}
