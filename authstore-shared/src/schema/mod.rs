/// Collection and index catalog
///
/// This module declares the storage contract of the authentication service:
/// three validated collections (`users`, `tokens`, `access_logs`) and the six
/// indexes that back them. The declarations are plain data; [`ddl`] renders
/// them into PostgreSQL statements and the provisioner applies them.
///
/// # Validators
///
/// Each collection is bound to a structural validator made of:
/// - the required-field set (`NOT NULL`)
/// - a type per field (column type)
/// - for string fields, an optional pattern, enum or minimum length rule
///   (named `CHECK` constraint `<collection>_<field>_check`)
///
/// # Example
///
/// ```
/// use authstore_shared::schema::{collections, indexes};
///
/// let users = collections().into_iter().find(|c| c.name == "users").unwrap();
/// assert!(users.validate().is_ok());
/// assert_eq!(indexes().len(), 6);
/// ```

pub mod ddl;

use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

/// Email shape accepted by the `users` validator
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Minimum length of a stored password hash (fits bcrypt and Argon2id PHC strings)
pub const PASSWORD_HASH_MIN_LENGTH: usize = 60;

/// PostgreSQL truncates identifiers longer than this
const MAX_IDENTIFIER_LENGTH: usize = 63;

pub const USERS: &str = "users";
pub const TOKENS: &str = "tokens";
pub const ACCESS_LOGS: &str = "access_logs";

/// Malformed collection or index definitions
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Collection {0} declares no fields")]
    NoFields(String),

    #[error("Collection {collection} declares field {field} twice")]
    DuplicateField { collection: String, field: String },

    #[error("Field {collection}.{field} has a string rule but is not a string")]
    RuleOnNonString { collection: String, field: String },

    #[error("Field {collection}.{field} has an empty enum")]
    EmptyEnum { collection: String, field: String },

    #[error("Field {collection}.{field} has a zero minimum length")]
    ZeroMinLength { collection: String, field: String },

    #[error("Field {collection}.{field} has an invalid pattern: {source}")]
    InvalidPattern {
        collection: String,
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Index {index} targets unknown collection {collection}")]
    UnknownCollection { index: String, collection: String },

    #[error("Index {index} targets unknown field {collection}.{field}")]
    UnknownField {
        index: String,
        collection: String,
        field: String,
    },

    #[error("Index {index} expires rows on {field}, which is not a timestamp")]
    ExpiryOnNonTimestamp { index: String, field: String },
}

/// Column type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Uuid,
    Timestamp,
    Bool,
}

impl FieldType {
    /// PostgreSQL column type
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::String => "TEXT",
            FieldType::Uuid => "UUID",
            FieldType::Timestamp => "TIMESTAMPTZ",
            FieldType::Bool => "BOOLEAN",
        }
    }
}

/// Value constraint on a string field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRule {
    /// Value must match the regular expression
    Pattern(&'static str),

    /// Value must be one of the listed literals
    OneOf(Vec<&'static str>),

    /// Value must have at least this many characters
    MinLength(usize),
}

/// A single field of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub rule: Option<FieldRule>,
}

impl FieldSpec {
    fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            rule: None,
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn uuid(name: &'static str) -> Self {
        Self::new(name, FieldType::Uuid)
    }

    pub fn timestamp(name: &'static str) -> Self {
        Self::new(name, FieldType::Timestamp)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn pattern(mut self, pattern: &'static str) -> Self {
        self.rule = Some(FieldRule::Pattern(pattern));
        self
    }

    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        self.rule = Some(FieldRule::OneOf(values.to_vec()));
        self
    }

    pub fn min_length(mut self, length: usize) -> Self {
        self.rule = Some(FieldRule::MinLength(length));
        self
    }
}

/// A collection (table) bound to a structural validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,

    /// Rows are never updated or deleted by the application role
    pub append_only: bool,
}

impl CollectionSpec {
    /// Looks up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the required fields, in declaration order
    pub fn required_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect()
    }

    /// Checks that the definition can be turned into a validator
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] for invalid identifiers, duplicate fields,
    /// rules on non-string fields, empty enums, zero minimum lengths and
    /// patterns that do not compile.
    pub fn validate(&self) -> Result<(), SchemaError> {
        check_identifier(self.name)?;

        if self.fields.is_empty() {
            return Err(SchemaError::NoFields(self.name.to_string()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            check_identifier(field.name)?;

            // `id` is the store-generated primary key
            if field.name == "id" || !seen.insert(field.name) {
                return Err(SchemaError::DuplicateField {
                    collection: self.name.to_string(),
                    field: field.name.to_string(),
                });
            }

            let Some(rule) = &field.rule else {
                continue;
            };

            let at = || (self.name.to_string(), field.name.to_string());

            if field.ty != FieldType::String {
                let (collection, field) = at();
                return Err(SchemaError::RuleOnNonString { collection, field });
            }

            match rule {
                FieldRule::Pattern(pattern) => {
                    if let Err(source) = regex::Regex::new(pattern) {
                        let (collection, field) = at();
                        return Err(SchemaError::InvalidPattern {
                            collection,
                            field,
                            source,
                        });
                    }
                }
                FieldRule::OneOf(values) if values.is_empty() => {
                    let (collection, field) = at();
                    return Err(SchemaError::EmptyEnum { collection, field });
                }
                FieldRule::MinLength(0) => {
                    let (collection, field) = at();
                    return Err(SchemaError::ZeroMinLength { collection, field });
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Sort direction of an index key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A single-field index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub collection: &'static str,
    pub field: &'static str,
    pub order: SortOrder,
    pub unique: bool,

    /// Rows are deleted once `field + expire_after` is in the past
    pub expire_after: Option<Duration>,
}

impl IndexSpec {
    fn new(name: &'static str, collection: &'static str, field: &'static str) -> Self {
        Self {
            name,
            collection,
            field,
            order: SortOrder::Ascending,
            unique: false,
            expire_after: None,
        }
    }

    fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    fn expire_after(mut self, grace: Duration) -> Self {
        self.expire_after = Some(grace);
        self
    }

    /// Checks that the index targets a declared timestamp/field
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the collection or field is unknown, or if
    /// an expiring index is placed on a non-timestamp field.
    pub fn validate_against(&self, collections: &[CollectionSpec]) -> Result<(), SchemaError> {
        check_identifier(self.name)?;

        let collection = collections
            .iter()
            .find(|c| c.name == self.collection)
            .ok_or_else(|| SchemaError::UnknownCollection {
                index: self.name.to_string(),
                collection: self.collection.to_string(),
            })?;

        let field = collection
            .field(self.field)
            .ok_or_else(|| SchemaError::UnknownField {
                index: self.name.to_string(),
                collection: self.collection.to_string(),
                field: self.field.to_string(),
            })?;

        if self.expire_after.is_some() && field.ty != FieldType::Timestamp {
            return Err(SchemaError::ExpiryOnNonTimestamp {
                index: self.name.to_string(),
                field: self.field.to_string(),
            });
        }

        Ok(())
    }
}

/// The three collections of the authentication store
pub fn collections() -> Vec<CollectionSpec> {
    vec![
        CollectionSpec {
            name: USERS,
            fields: vec![
                FieldSpec::string("email").required().pattern(EMAIL_PATTERN),
                FieldSpec::string("password_hash")
                    .required()
                    .min_length(PASSWORD_HASH_MIN_LENGTH),
                FieldSpec::string("user_type")
                    .required()
                    .one_of(&["EMPLOYEE", "ADMIN"]),
                FieldSpec::string("status")
                    .required()
                    .one_of(&["ACTIVE", "INACTIVE", "BLOCKED"]),
                FieldSpec::timestamp("created_at"),
                FieldSpec::timestamp("updated_at"),
            ],
            append_only: false,
        },
        CollectionSpec {
            name: TOKENS,
            fields: vec![
                FieldSpec::uuid("user_id").required(),
                FieldSpec::string("refresh_token").required(),
                FieldSpec::timestamp("expires_at").required(),
                FieldSpec::timestamp("created_at"),
            ],
            append_only: false,
        },
        CollectionSpec {
            name: ACCESS_LOGS,
            fields: vec![
                FieldSpec::timestamp("date_time").required(),
                FieldSpec::string("ip").required(),
                FieldSpec::uuid("user_id"),
                FieldSpec::string("user_agent"),
                FieldSpec::boolean("success"),
                FieldSpec::string("reason"),
            ],
            append_only: true,
        },
    ]
}

/// The six indexes of the authentication store
pub fn indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new("users_email_key", USERS, "email").unique(),
        IndexSpec::new("users_status_idx", USERS, "status"),
        IndexSpec::new("tokens_user_id_idx", TOKENS, "user_id"),
        IndexSpec::new("tokens_expires_at_ttl_idx", TOKENS, "expires_at")
            .expire_after(Duration::ZERO),
        IndexSpec::new("access_logs_user_id_idx", ACCESS_LOGS, "user_id"),
        IndexSpec::new("access_logs_date_time_idx", ACCESS_LOGS, "date_time").descending(),
    ]
}

/// Lowercase SQL identifier that never needs quoting
fn check_identifier(name: &str) -> Result<(), SchemaError> {
    let mut chars = name.chars();
    let valid = name.len() <= MAX_IDENTIFIER_LENGTH
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> CollectionSpec {
        collections()
            .into_iter()
            .find(|c| c.name == USERS)
            .unwrap()
    }

    #[test]
    fn test_catalog_is_valid() {
        let collections = collections();
        assert_eq!(collections.len(), 3);

        for collection in &collections {
            collection.validate().unwrap();
        }
        for index in indexes() {
            index.validate_against(&collections).unwrap();
        }
    }

    #[test]
    fn test_required_fields() {
        let collections = collections();
        let required: Vec<_> = collections.iter().map(|c| c.required_fields()).collect();

        assert_eq!(
            required,
            vec![
                vec!["email", "password_hash", "user_type", "status"],
                vec!["user_id", "refresh_token", "expires_at"],
                vec!["date_time", "ip"],
            ]
        );
    }

    #[test]
    fn test_only_access_logs_are_append_only() {
        let append_only: Vec<_> = collections()
            .into_iter()
            .filter(|c| c.append_only)
            .map(|c| c.name)
            .collect();
        assert_eq!(append_only, vec![ACCESS_LOGS]);
    }

    #[test]
    fn test_index_options() {
        let indexes = indexes();

        let unique: Vec<_> = indexes.iter().filter(|i| i.unique).map(|i| i.name).collect();
        assert_eq!(unique, vec!["users_email_key"]);

        let expiring: Vec<_> = indexes
            .iter()
            .filter_map(|i| i.expire_after.map(|grace| (i.name, grace)))
            .collect();
        assert_eq!(expiring, vec![("tokens_expires_at_ttl_idx", Duration::ZERO)]);

        let descending: Vec<_> = indexes
            .iter()
            .filter(|i| i.order == SortOrder::Descending)
            .map(|i| i.name)
            .collect();
        assert_eq!(descending, vec!["access_logs_date_time_idx"]);
    }

    #[test]
    fn test_email_pattern() {
        let re = regex::Regex::new(EMAIL_PATTERN).unwrap();
        assert!(re.is_match("admin@example.com"));
        assert!(re.is_match("first.last+tag@mail.example.co"));
        assert!(!re.is_match("admin.example.com"));
        assert!(!re.is_match("admin@localhost"));
        assert!(!re.is_match("admin@example.c"));
    }

    #[test]
    fn test_rejects_rule_on_non_string_field() {
        let mut spec = users();
        spec.fields.push(FieldSpec::timestamp("deleted_at").min_length(3));

        assert!(matches!(
            spec.validate(),
            Err(SchemaError::RuleOnNonString { field, .. }) if field == "deleted_at"
        ));
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let mut spec = users();
        spec.fields[0] = FieldSpec::string("email").required().pattern("([a-z");

        assert!(matches!(spec.validate(), Err(SchemaError::InvalidPattern { .. })));
    }

    #[test]
    fn test_rejects_empty_enum_and_zero_length() {
        let mut spec = users();
        spec.fields[2] = FieldSpec::string("user_type").required().one_of(&[]);
        assert!(matches!(spec.validate(), Err(SchemaError::EmptyEnum { .. })));

        let mut spec = users();
        spec.fields[1] = FieldSpec::string("password_hash").required().min_length(0);
        assert!(matches!(spec.validate(), Err(SchemaError::ZeroMinLength { .. })));
    }

    #[test]
    fn test_rejects_duplicate_and_reserved_fields() {
        let mut spec = users();
        spec.fields.push(FieldSpec::string("email"));
        assert!(matches!(spec.validate(), Err(SchemaError::DuplicateField { .. })));

        let mut spec = users();
        spec.fields.push(FieldSpec::uuid("id"));
        assert!(matches!(spec.validate(), Err(SchemaError::DuplicateField { .. })));
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        let mut spec = users();
        spec.fields.push(FieldSpec::string("Robert'); DROP TABLE users;--"));
        assert!(matches!(spec.validate(), Err(SchemaError::InvalidIdentifier(_))));

        let spec = CollectionSpec {
            name: "Users",
            fields: vec![FieldSpec::string("email")],
            append_only: false,
        };
        assert!(matches!(spec.validate(), Err(SchemaError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_rejects_misplaced_indexes() {
        let collections = collections();

        let index = IndexSpec::new("sessions_user_id_idx", "sessions", "user_id");
        assert!(matches!(
            index.validate_against(&collections),
            Err(SchemaError::UnknownCollection { .. })
        ));

        let index = IndexSpec::new("users_name_idx", USERS, "name");
        assert!(matches!(
            index.validate_against(&collections),
            Err(SchemaError::UnknownField { .. })
        ));

        let index = IndexSpec::new("tokens_refresh_ttl_idx", TOKENS, "refresh_token")
            .expire_after(Duration::ZERO);
        assert!(matches!(
            index.validate_against(&collections),
            Err(SchemaError::ExpiryOnNonTimestamp { .. })
        ));
    }
}
