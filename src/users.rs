//! The user directory: profiles and the role lookup.
//!
//! Identity is resolved externally (organizational sign-in); this module only
//! answers "what role does this email have" and keeps profile data current.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::LazyLock;

use crate::activity::{record_best_effort, ActivityLog, LogAction};
use crate::error::{DomainError, DomainResult};
use crate::lifecycle::policy::{authorize, PolicyAction, Relation};
use crate::lifecycle::{Actor, Role};
use crate::store::UserStore;

static EMAIL_SHAPE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Light shape check; real address validation belongs to the identity layer.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub phone: String,
    /// Class or department.
    #[serde(default)]
    pub unit: String,
}

pub struct UserDirectory {
    store: Arc<dyn UserStore>,
    log: Arc<dyn ActivityLog>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>, log: Arc<dyn ActivityLog>) -> Self {
        Self { store, log }
    }

    /// Role for an email, defaulting to EMPLOYEE for any identity not yet in
    /// the directory.
    pub async fn resolve_role(&self, email: &str) -> DomainResult<Role> {
        let user = self.store.get_user(email).await?;
        Ok(user.map(|u| u.role).unwrap_or(Role::Employee))
    }

    pub async fn get(&self, email: &str) -> DomainResult<Option<User>> {
        Ok(self.store.get_user(email).await?)
    }

    /// First profile completion creates the user; later calls update it.
    /// The role is preserved across profile updates.
    pub async fn complete_profile(
        &self,
        email: &str,
        name: &str,
        phone: &str,
        unit: &str,
    ) -> DomainResult<User> {
        if !is_valid_email(email) {
            return Err(DomainError::validation(format!("invalid email: {email}")));
        }
        if name.trim().is_empty() || phone.trim().is_empty() || unit.trim().is_empty() {
            return Err(DomainError::validation(
                "name, phone and unit are all required to complete a profile",
            ));
        }

        let role = self.resolve_role(email).await?;
        let user = User {
            email: email.to_string(),
            name: name.trim().to_string(),
            role,
            phone: phone.trim().to_string(),
            unit: unit.trim().to_string(),
        };
        self.store.upsert_user(user.clone()).await?;
        record_best_effort(
            self.log.as_ref(),
            email,
            LogAction::UpdateProfile,
            &format!("profile updated for {email}"),
        )
        .await;
        Ok(user)
    }

    /// Explicit admin add, role included.
    pub async fn add_user(&self, actor: &Actor, user: User) -> DomainResult<()> {
        authorize(PolicyAction::ManageUsers, actor, Relation::Other)?;
        if !is_valid_email(&user.email) {
            return Err(DomainError::validation(format!(
                "invalid email: {}",
                user.email
            )));
        }
        let email = user.email.clone();
        let role = user.role;
        self.store.upsert_user(user).await?;
        record_best_effort(
            self.log.as_ref(),
            &actor.email,
            LogAction::SetRole,
            &format!("user {email} added with role {role}"),
        )
        .await;
        Ok(())
    }

    pub async fn set_role(&self, actor: &Actor, email: &str, role: Role) -> DomainResult<()> {
        authorize(PolicyAction::ManageUsers, actor, Relation::Other)?;
        let mut user = self
            .store
            .get_user(email)
            .await?
            .ok_or_else(|| DomainError::not_found("user", email))?;
        user.role = role;
        self.store.upsert_user(user).await?;
        record_best_effort(
            self.log.as_ref(),
            &actor.email,
            LogAction::SetRole,
            &format!("role of {email} set to {role}"),
        )
        .await;
        Ok(())
    }

    pub async fn list(&self, actor: &Actor) -> DomainResult<Vec<User>> {
        authorize(PolicyAction::ManageUsers, actor, Relation::Other)?;
        Ok(self.store.list_users().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(is_valid_email("alice@pnt.edu.vn"));
        assert!(is_valid_email("bob.tran@example.com"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@at@signs.vn"));
        assert!(!is_valid_email("spaces in@mail.vn"));
        assert!(!is_valid_email("nodot@host"));
    }
}
