use serde::{Deserialize, Serialize};

use crate::model::ids::UserId;

/// An authenticated caller, as established by the account backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: Some(email.into()),
        }
    }

    /// Identity known only by its user id, e.g. when the provider omits the e-mail.
    #[must_use]
    pub fn anonymous(user_id: UserId) -> Self {
        Self {
            user_id,
            email: None,
        }
    }

    /// Label shown in the UI: the e-mail if known, otherwise the user id.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.email
            .clone()
            .unwrap_or_else(|| self.user_id.to_string())
    }
}
