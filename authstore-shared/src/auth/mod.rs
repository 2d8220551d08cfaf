/// Authentication utilities
///
/// - [`password`]: Argon2id hashing and random generation for the seed credential

pub mod password;
