//! # Quill (server-rendered blog)
//!
//! `quill` serves a small blog: visitors sign up, log in and manage articles
//! through HTML forms. The interesting part is the request path in front of the
//! handlers.
//!
//! ## Validation
//!
//! Every form is described by an ordered list of rule descriptors
//! ([`validation::FieldRules`]). The validator is a pure async function over
//! `(rules, input)` that either accepts the submission with sanitized values or
//! rejects it with field errors in declaration order.
//!
//! ## Credentials and sessions
//!
//! - **Digests:** passwords are stored as self-describing Argon2id PHC strings
//!   with a fresh salt per call. Cost parameters can change without invalidating
//!   stored digests.
//! - **Tokens:** a session is an HMAC-SHA256 signed, time-bound token carried in
//!   the `quill_session` cookie. The server keeps no session table.
//! - **Identity:** a middleware resolves the cookie once per request. Any failure
//!   degrades to an anonymous visitor and never surfaces as an error.
//!
//! Login failures use a single generic message so that the response does not
//! reveal whether an account exists.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;
pub mod validation;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
