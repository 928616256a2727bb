use serde::{Deserialize, Serialize};

use super::{UserId, UserRecord};

/// A signed-in principal: the credential and the user it belongs to.
///
/// Both halves live in one value, so there is no way to hold a token
/// without a user or the other way around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub credential: String,
    pub user: UserRecord,
}

/// Who is logged in, if anyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    LoggedOut,
    LoggedIn(Identity),
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::LoggedIn(identity) => Some(identity),
            Self::LoggedOut => None,
        }
    }

    pub fn credential(&self) -> Option<&str> {
        self.identity().map(|i| i.credential.as_str())
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.identity().map(|i| &i.user)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user().map(|u| u.user_id)
    }
}
