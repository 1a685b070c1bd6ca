//! User accounts for the front end.
//!
//! Passwords are stored as `$pbkdf2-sha256$<rounds>$<salt>$<hash>` with
//! unpadded base64 salt and hash.

use crate::error::AuthError;
use crate::models::Credentials;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use sha2::Sha256;
use std::path::Path;
use tracing::info;

pub const DEFAULT_PBKDF2_ROUNDS: u32 = 29_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const SCHEME: &str = "pbkdf2-sha256";

pub trait CredentialStore {
    fn verify_credentials(&self, username: &str, password: &str) -> Result<Credentials, AuthError>;

    /// Returns `false` when the username is already taken.
    fn register_user(&self, username: &str, password: &str) -> Result<bool, AuthError>;
}

pub struct SqliteUserStore {
    conn: Connection,
    rounds: u32,
}

impl SqliteUserStore {
    pub fn open(path: &Path) -> Result<Self, AuthError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AuthError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AuthError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                is_premium INTEGER NOT NULL DEFAULT 0
            );",
        )?;

        Ok(Self {
            conn,
            rounds: DEFAULT_PBKDF2_ROUNDS,
        })
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds.max(1);
        self
    }

    pub fn add_user(&self, username: &str, password: &str, is_premium: bool) -> Result<bool, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidArgument(
                "username and password are required".to_string(),
            ));
        }

        let password_hash = hash_password(password, self.rounds);
        let inserted = self.conn.execute(
            "INSERT INTO users (username, password_hash, is_premium) VALUES (?1, ?2, ?3)",
            params![username, password_hash, is_premium],
        );

        match inserted {
            Ok(_) => {
                info!(username, is_premium, "registered user");
                Ok(true)
            }
            Err(rusqlite::Error::SqliteFailure(error, _))
                if error.code == ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }
}

impl CredentialStore for SqliteUserStore {
    fn verify_credentials(&self, username: &str, password: &str) -> Result<Credentials, AuthError> {
        let row = self
            .conn
            .query_row(
                "SELECT password_hash, is_premium FROM users WHERE username = ?1",
                params![username.trim()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;

        match row {
            Some((stored, is_premium)) if verify_password(password, &stored)? => Ok(Credentials {
                authenticated: true,
                is_premium,
            }),
            _ => Ok(Credentials::default()),
        }
    }

    fn register_user(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        self.add_user(username, password, false)
    }
}

pub fn hash_password(password: &str, rounds: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut key);

    format!(
        "${SCHEME}${rounds}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(key)
    )
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let parts: Vec<&str> = stored.split('$').collect();
    let [_, scheme, rounds, salt, expected] = parts.as_slice() else {
        return Err(AuthError::CorruptHash("expected five '$' separated fields".to_string()));
    };
    if *scheme != SCHEME {
        return Err(AuthError::CorruptHash(format!("unknown scheme {scheme}")));
    }

    let rounds: u32 = rounds
        .parse()
        .map_err(|_| AuthError::CorruptHash(format!("bad round count {rounds}")))?;
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|error| AuthError::CorruptHash(error.to_string()))?;
    let expected = STANDARD_NO_PAD
        .decode(expected)
        .map_err(|error| AuthError::CorruptHash(error.to_string()))?;

    let mut actual = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut actual);

    // constant time
    let difference = actual
        .iter()
        .zip(&expected)
        .fold(0u8, |acc, (left, right)| acc | (left ^ right));
    Ok(difference == 0 && !expected.is_empty())
}
