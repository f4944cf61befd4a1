use serde::{Deserialize, Serialize};

/// Closed privilege set. `Anonymous` means no resolved identity; every
/// authenticated account maps to exactly one of the other three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Owner,
    User,
    #[default]
    Anonymous,
}

impl Role {
    /// Coerce a raw role attribute from the profile store into the closed set.
    /// The attribute is duck-typed on the backend side; an unrecognized value
    /// must degrade to `User`, never pass through or elevate.
    pub fn from_attr(raw: &str) -> Role {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "owner" => Role::Owner,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Owner => "owner",
            Role::User => "user",
            Role::Anonymous => "anonymous",
        }
    }

    /// Landing page after a successful login. `Anonymous` has none.
    pub fn dashboard_path(&self) -> Option<&'static str> {
        match self {
            Role::Admin => Some("/admin/dashboard"),
            Role::Owner => Some("/owner/dashboard"),
            Role::User => Some("/user/dashboard"),
            Role::Anonymous => None,
        }
    }
}
