//! Role checks and the single authorization gate used by the dispatcher.

use crate::bot::user::{Role, UserRecord};
use crate::config::Config;

/// What a command requires of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Permission {
    Everyone,
    Moderator,
    Admin,
    /// On the static admin allow-list; stored roles do not count.
    Owner,
}

/// True if the stored role is admin or the ID is allow-listed as admin.
///
/// The allow-list always wins, so demoting an allow-listed admin changes the
/// stored role but not this answer.
pub fn is_admin(user_id: i64, record: &UserRecord, config: &Config) -> bool {
    record.role == Role::Admin || config.is_owner(user_id)
}

/// True for stored moderators and admins, and for either allow-list.
pub fn is_moderator(user_id: i64, record: &UserRecord, config: &Config) -> bool {
    record.role >= Role::Moderator || config.is_listed_moderator(user_id) || config.is_owner(user_id)
}

/// Role a brand new record starts with.
pub fn initial_role(user_id: i64, config: &Config) -> Role {
    if config.is_owner(user_id) {
        Role::Admin
    } else if config.is_listed_moderator(user_id) {
        Role::Moderator
    } else {
        Role::User
    }
}

/// Capabilities of one caller, resolved once per update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub moderator: bool,
    pub admin: bool,
    pub owner: bool,
}

impl Access {
    pub fn resolve(user_id: i64, record: &UserRecord, config: &Config) -> Self {
        Self {
            moderator: is_moderator(user_id, record, config),
            admin: is_admin(user_id, record, config),
            owner: config.is_owner(user_id),
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::Everyone => true,
            Permission::Moderator => self.moderator,
            Permission::Admin => self.admin,
            Permission::Owner => self.owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config() -> Config {
        Config {
            admin_ids: [1].into_iter().collect(),
            moderator_ids: [2].into_iter().collect(),
            ..Config::default()
        }
    }

    fn record(role: Role) -> UserRecord {
        UserRecord::new(role, "en", Utc::now())
    }

    #[test]
    fn test_initial_role_from_allow_lists() {
        let config = config();
        assert_eq!(initial_role(1, &config), Role::Admin);
        assert_eq!(initial_role(2, &config), Role::Moderator);
        assert_eq!(initial_role(3, &config), Role::User);
    }

    #[test]
    fn test_allow_listed_admin_survives_demotion() {
        let config = config();
        let demoted = record(Role::User);
        assert!(is_admin(1, &demoted, &config));
        assert!(is_moderator(1, &demoted, &config));
    }

    #[test]
    fn test_stored_roles() {
        let config = config();
        assert!(is_admin(50, &record(Role::Admin), &config));
        assert!(is_moderator(50, &record(Role::Admin), &config));
        assert!(!is_admin(50, &record(Role::Moderator), &config));
        assert!(is_moderator(50, &record(Role::Moderator), &config));
        assert!(!is_moderator(50, &record(Role::User), &config));
        // Listed moderator with a demoted stored role.
        assert!(is_moderator(2, &record(Role::User), &config));
        assert!(!is_admin(2, &record(Role::User), &config));
    }

    #[test]
    fn test_gate() {
        let config = config();
        let promoted_admin = Access::resolve(50, &record(Role::Admin), &config);
        assert!(promoted_admin.allows(Permission::Admin));
        assert!(!promoted_admin.allows(Permission::Owner));

        let owner = Access::resolve(1, &record(Role::User), &config);
        assert!(owner.allows(Permission::Owner));

        let user = Access::resolve(60, &record(Role::User), &config);
        assert!(user.allows(Permission::Everyone));
        assert!(!user.allows(Permission::Moderator));
    }
}
