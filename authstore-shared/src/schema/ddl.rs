/// DDL rendering for the collection and index catalog
///
/// Collections become tables with a store-generated `id UUID` primary key,
/// typed columns, `NOT NULL` for required fields and one named `CHECK`
/// constraint per field rule. Indexes become named single-column B-tree
/// indexes. Every statement uses `IF NOT EXISTS`, so replaying it is a no-op.
///
/// Collection, field and index names are validated lowercase identifiers
/// (see [`CollectionSpec::validate`]) and are emitted unquoted. Role and
/// database names come from configuration and go through [`quote_ident`].

use super::{CollectionSpec, FieldRule, FieldSpec, IndexSpec, SortOrder};

/// Prefix of the comment stored on expiring indexes
const EXPIRE_COMMENT_PREFIX: &str = "authstore:expire_after_seconds=";

/// Quotes an SQL identifier (role, database, schema)
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes an SQL string literal
///
/// Assumes `standard_conforming_strings = on` (the server default), so
/// backslashes are taken literally.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Name of the `CHECK` constraint backing a field rule
pub fn check_constraint_name(collection: &str, field: &str) -> String {
    format!("{}_{}_check", collection, field)
}

impl FieldSpec {
    /// Boolean SQL expression enforcing the rule, if any
    pub fn check_expression(&self) -> Option<String> {
        let rule = self.rule.as_ref()?;

        Some(match rule {
            FieldRule::Pattern(pattern) => format!("{} ~ {}", self.name, quote_literal(pattern)),
            FieldRule::OneOf(values) => {
                let values: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
                format!("{} IN ({})", self.name, values.join(", "))
            }
            FieldRule::MinLength(length) => format!("char_length({}) >= {}", self.name, length),
        })
    }

    fn column_sql(&self, collection: &str) -> String {
        let mut column = format!("{} {}", self.name, self.ty.sql_type());

        if self.required {
            column.push_str(" NOT NULL");
        }

        if let Some(check) = self.check_expression() {
            column.push_str(&format!(
                " CONSTRAINT {} CHECK ({})",
                check_constraint_name(collection, self.name),
                check
            ));
        }

        column
    }
}

impl CollectionSpec {
    /// `CREATE TABLE IF NOT EXISTS` statement carrying the validator
    pub fn create_table_sql(&self) -> String {
        let mut columns = vec!["id UUID PRIMARY KEY DEFAULT gen_random_uuid()".to_string()];
        columns.extend(self.fields.iter().map(|f| f.column_sql(self.name)));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name,
            columns.join(",\n    ")
        )
    }

    /// Privileges granted to the application role on this collection
    pub fn privileges(&self) -> &'static str {
        if self.append_only {
            "SELECT, INSERT"
        } else {
            "SELECT, INSERT, UPDATE, DELETE"
        }
    }

    /// `GRANT` statement giving `role` read/write access to this collection
    pub fn grant_sql(&self, role: &str) -> String {
        format!(
            "GRANT {} ON TABLE {} TO {}",
            self.privileges(),
            self.name,
            quote_ident(role)
        )
    }

    /// `REVOKE` statement removing the privileges an append-only collection must not grant
    pub fn revoke_sql(&self, role: &str) -> Option<String> {
        self.append_only.then(|| {
            format!(
                "REVOKE UPDATE, DELETE, TRUNCATE ON TABLE {} FROM {}",
                self.name,
                quote_ident(role)
            )
        })
    }
}

impl IndexSpec {
    /// Key expression as PostgreSQL reports it in `pg_indexes.indexdef`
    pub fn key_expression(&self) -> String {
        match self.order {
            SortOrder::Ascending => self.field.to_string(),
            SortOrder::Descending => format!("{} DESC", self.field),
        }
    }

    /// `CREATE INDEX IF NOT EXISTS` statement
    pub fn create_index_sql(&self) -> String {
        let order = match self.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };

        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({} {})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            self.collection,
            self.field,
            order
        )
    }

    /// Comment recording the expiry option on the index itself
    pub fn expiry_comment(&self) -> Option<String> {
        self.expire_after
            .map(|grace| format!("{}{}", EXPIRE_COMMENT_PREFIX, grace.as_secs()))
    }

    /// `COMMENT ON INDEX` statement for expiring indexes
    pub fn comment_sql(&self) -> Option<String> {
        self.expiry_comment()
            .map(|comment| format!("COMMENT ON INDEX {} IS {}", self.name, quote_literal(&comment)))
    }

    /// Compares an existing index against this definition
    ///
    /// `indexdef` is the definition reported by `pg_indexes` and `comment`
    /// the index comment. Uniqueness, key expression and expiry must match.
    pub fn matches_existing(&self, indexdef: &str, comment: Option<&str>) -> bool {
        self.matches_key(indexdef) && self.matches_expiry(comment)
    }

    /// Compares uniqueness and key expression of an existing index
    pub fn matches_key(&self, indexdef: &str) -> bool {
        let unique = indexdef.starts_with("CREATE UNIQUE INDEX");

        let key = indexdef
            .find(" USING ")
            .and_then(|using| {
                let rest = &indexdef[using..];
                let open = rest.find('(')?;
                let close = rest.rfind(')')?;
                (open < close).then(|| rest[open + 1..close].trim())
            })
            .unwrap_or_default();

        unique == self.unique && key == self.key_expression()
    }

    /// Compares the expiry recorded in an index comment
    pub fn matches_expiry(&self, comment: Option<&str>) -> bool {
        recorded_expiry(comment) == self.expiry_comment().as_deref()
    }
}

/// The expiry part of an index comment, ignoring unrelated comments
pub fn recorded_expiry(comment: Option<&str>) -> Option<&str> {
    comment.filter(|c| c.starts_with(EXPIRE_COMMENT_PREFIX))
}
