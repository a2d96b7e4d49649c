use uuid::Uuid;

use crate::models::user::UserProfile;
use crate::session::SessionUser;

/// Principal represents the authenticated caller as resolved by the login gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub trust_level: i64,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            username: String::new(),
            trust_level: 0,
        }
    }

    pub fn with_trust_level(mut self, trust_level: i64) -> Self {
        self.trust_level = trust_level;
        self
    }

    pub fn is(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

impl From<&UserProfile> for Principal {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.id,
            username: profile.username.clone(),
            trust_level: profile.trust_level,
        }
    }
}

impl From<&SessionUser> for Principal {
    fn from(user: &SessionUser) -> Self {
        Self {
            user_id: user.id,
            ..Principal::from(&user.profile)
        }
    }
}
