//! Remote theme descriptor

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::newtypes::ThemeId;

/// Publication role of a remote theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeRole {
    Live,
    Unpublished,
    Development,
}

impl Display for ThemeRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Unpublished => write!(f, "unpublished"),
            Self::Development => write!(f, "development"),
        }
    }
}

/// The remote theme a sync run targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub id: ThemeId,
    pub name: String,
    pub role: ThemeRole,
}

impl Theme {
    pub fn new(id: ThemeId, name: impl Into<String>, role: ThemeRole) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }
}

impl Display for Theme {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{}, {})", self.name, self.id, self.role)
    }
}
