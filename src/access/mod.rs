//! Role access table.
//!
//! Maps a raw role string from the backend onto a closed set of roles and
//! answers "may this role see this path" for in-app rendering. Navigation
//! blocking is the gate's job, not this table's.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    Reception,
    Staff,
    Unknown,
}

/// Module identifiers driving menu visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Reception,
    Doctor,
    Nurse,
    Staff,
    Admin,
}

/// Allow-list and landing page for one role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRule {
    /// `None` grants every path
    pub allowed_prefixes: Option<&'static [&'static str]>,
    pub default_path: &'static str,
}

pub const ALL_MODULES: &[Module] = &[
    Module::Reception,
    Module::Doctor,
    Module::Nurse,
    Module::Staff,
    Module::Admin,
];

// Keyword rules are evaluated in order; the first hit wins.
const ROLE_KEYWORDS: &[(&[&str], Role)] = &[
    (&["admin", "관리자"], Role::Admin),
    (&["doctor", "의사"], Role::Doctor),
    (&["nurse", "간호"], Role::Nurse),
    (&["reception", "원무"], Role::Reception),
    (&["staff", "직원"], Role::Staff),
];

const DOCTOR_RULE: AccessRule = AccessRule {
    allowed_prefixes: Some(&["/doctor", "/patients", "/prescriptions", "/board", "/my_account"]),
    default_path: "/doctor",
};

const NURSE_RULE: AccessRule = AccessRule {
    allowed_prefixes: Some(&["/nurse", "/patients", "/board", "/my_account"]),
    default_path: "/nurse",
};

const RECEPTION_RULE: AccessRule = AccessRule {
    allowed_prefixes: Some(&["/reception", "/patients", "/billing", "/board", "/my_account"]),
    default_path: "/reception",
};

const STAFF_RULE: AccessRule = AccessRule {
    allowed_prefixes: Some(&["/staff", "/board", "/my_account"]),
    default_path: "/staff",
};

const UNKNOWN_RULE: AccessRule = AccessRule {
    allowed_prefixes: Some(&["/reception", "/my_account"]),
    default_path: "/reception",
};

const ADMIN_RULE: AccessRule = AccessRule {
    allowed_prefixes: None,
    default_path: "/admin",
};

impl Role {
    /// Case-insensitive substring classification of a raw role string
    pub fn normalize(raw: &str) -> Role {
        let lowered = raw.trim().to_lowercase();
        if lowered.is_empty() {
            return Role::Unknown;
        }
        ROLE_KEYWORDS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(_, role)| *role)
            .unwrap_or(Role::Unknown)
    }

    pub fn rule(self) -> &'static AccessRule {
        match self {
            Role::Admin => &ADMIN_RULE,
            Role::Doctor => &DOCTOR_RULE,
            Role::Nurse => &NURSE_RULE,
            Role::Reception => &RECEPTION_RULE,
            Role::Staff => &STAFF_RULE,
            Role::Unknown => &UNKNOWN_RULE,
        }
    }

    pub fn default_path(self) -> &'static str {
        self.rule().default_path
    }

    pub fn can_access(self, path: &str) -> bool {
        match self.rule().allowed_prefixes {
            None => true,
            Some(prefixes) => prefixes.iter().any(|prefix| path_within(path, prefix)),
        }
    }

    pub fn visible_modules(self) -> Vec<Module> {
        match self {
            Role::Admin => ALL_MODULES.to_vec(),
            Role::Doctor => vec![Module::Doctor],
            Role::Nurse => vec![Module::Nurse],
            Role::Reception | Role::Unknown => vec![Module::Reception],
            Role::Staff => vec![Module::Staff],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Doctor => "DOCTOR",
            Role::Nurse => "NURSE",
            Role::Reception => "RECEPTION",
            Role::Staff => "STAFF",
            Role::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Never fails: unrecognized input becomes `Role::Unknown`
impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::normalize(s))
    }
}

impl Module {
    pub fn as_str(self) -> &'static str {
        match self {
            Module::Reception => "reception",
            Module::Doctor => "doctor",
            Module::Nurse => "nurse",
            Module::Staff => "staff",
            Module::Admin => "admin",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `path` equals `prefix` or sits below it as a full segment
fn path_within(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn normalize_role(raw: &str) -> Role {
    Role::normalize(raw)
}

pub fn default_path_for_role(raw: &str) -> &'static str {
    Role::normalize(raw).default_path()
}

pub fn can_access_path(raw: &str, path: &str) -> bool {
    Role::normalize(raw).can_access(path)
}

pub fn visible_modules(raw: &str) -> Vec<Module> {
    Role::normalize(raw).visible_modules()
}
