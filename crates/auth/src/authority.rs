use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Prefix carried by every role-derived authority.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Granted authority (e.g. `"ROLE_ADMIN"`).
///
/// Authorities are what route rules test against; they are derived from role
/// records and never stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authority(Cow<'static, str>);

pub const ROLE_ADMIN: Authority = Authority(Cow::Borrowed("ROLE_ADMIN"));
pub const ROLE_USER: Authority = Authority(Cow::Borrowed("ROLE_USER"));

impl Authority {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Authority for a role name, adding the prefix unless it is already there.
    pub fn for_role_name(name: &str) -> Self {
        if name.starts_with(ROLE_PREFIX) {
            Self(Cow::Owned(name.to_string()))
        } else {
            Self(Cow::Owned(format!("{ROLE_PREFIX}{name}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Role name without the `ROLE_` prefix.
    pub fn role_name(&self) -> &str {
        self.as_str().strip_prefix(ROLE_PREFIX).unwrap_or(self.as_str())
    }
}

impl core::fmt::Display for Authority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
