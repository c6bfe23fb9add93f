//! Identity: password digests, session tokens and roles.

pub mod password;
mod session;

pub use password::{hash_password, hash_token, random_token, verify_password};
pub use session::{Session, SessionStore};

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "guide" => Ok(Role::Guide),
            "lead-guide" => Ok(Role::LeadGuide),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
