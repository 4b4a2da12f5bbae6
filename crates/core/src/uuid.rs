//! Session identifiers and sharded record paths.
//!
//! Saved diagnosis records are keyed by a *canonical* session id: **32 lowercase hexadecimal
//! characters** (no hyphens), the same value `Uuid::new_v4().simple().to_string()` yields.
//! Externally supplied ids must already be canonical; uppercase or hyphenated input is rejected.
//!
//! For a canonical id `u`, a record lives at `parent_dir/<u[0..2]>/<u[2..4]>/<u>.json`, which
//! keeps any one directory small.

use crate::error::{CdssError, CdssResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

pub use ::uuid::Uuid;

/// Canonical identifier of one diagnosis session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Parse an externally supplied id, requiring canonical form.
    pub fn parse(input: &str) -> CdssResult<Self> {
        if !Self::is_canonical(input) {
            return Err(CdssError::InvalidInput(format!(
                "session id must be 32 lowercase hex characters, got {input:?}"
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| CdssError::InvalidInput(format!("invalid session id: {e}")))
    }

    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// `parent_dir/<s1>/<s2>/<id>.<extension>`.
    pub fn sharded_path(&self, parent_dir: &Path, extension: &str) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir
            .join(s1)
            .join(s2)
            .join(format!("{canonical}.{extension}"))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for SessionId {
    type Err = CdssError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = CdssError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}
