/// Seed administrator
///
/// The seed record is the only data row the provisioner writes. Its secret is
/// supplied by configuration (see [`SeedSecret`]); when nothing is supplied a
/// random password is generated so that no well-known credential ever ships
/// with a deployment.
///
/// Before any write the resolved record is checked with the same rules the
/// `users` validator enforces, so a bad configuration fails with a readable
/// message instead of a constraint violation.

use crate::auth::password::{generate_password, hash_password};
use crate::config::{SeedConfig, SeedSecret};
use crate::schema::EMAIL_PATTERN;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use validator::{Validate, ValidationError};

use super::ProvisionError;

/// Resolved seed administrator, ready to insert
#[derive(Clone, Validate)]
pub struct SeedAdmin {
    #[validate(custom(function = "validate_email_shape"))]
    pub email: String,

    #[validate(length(min = 60, message = "Password hash must be at least 60 characters"))]
    pub password_hash: String,

    /// Plaintext of a password generated during resolution
    pub generated_password: Option<String>,
}

impl fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("generated_password", &self.generated_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SeedAdmin {
    /// Resolves the configured secret into a password hash and validates the result
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Password`] if hashing fails and
    /// [`ProvisionError::InvalidSeed`] if the email or hash would be rejected
    /// by the `users` validator.
    pub fn resolve(config: &SeedConfig) -> Result<Self, ProvisionError> {
        let (password_hash, generated_password) = match &config.secret {
            SeedSecret::Hash(hash) => (hash.clone(), None),
            SeedSecret::Password(password) => (hash_password(password)?, None),
            SeedSecret::Generate => {
                let password = generate_password();
                (hash_password(&password)?, Some(password))
            }
        };

        let seed = Self {
            email: config.email.clone(),
            password_hash,
            generated_password,
        };

        seed.validate().map_err(ProvisionError::InvalidSeed)?;

        Ok(seed)
    }
}

fn validate_email_shape(email: &str) -> Result<(), ValidationError> {
    let pattern = Regex::new(EMAIL_PATTERN).map_err(|_| ValidationError::new("invalid_pattern"))?;

    if !pattern.is_match(email) {
        let mut error = ValidationError::new("invalid_email");
        error.message = Some(Cow::from("Email does not match the users validator pattern"));
        return Err(error);
    }

    Ok(())
}
