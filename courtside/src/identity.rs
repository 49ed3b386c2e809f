//! Identity collaborator: who holds admin capability.

use crate::types::UserId;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

/// Authorization predicate separating admins from ordinary users
pub trait CapabilityCheck: Send + Sync {
    /// Whether `user` may create events and moderate rosters
    fn is_admin(&self, user: UserId) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Fixed set of admins, for tests and single-club deployments
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    admins: HashSet<UserId>,
}

impl StaticDirectory {
    /// Directory with the given admins
    #[must_use]
    pub fn new(admins: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    /// Grants admin capability to `user`
    pub fn grant(&mut self, user: UserId) {
        self.admins.insert(user);
    }
}

impl CapabilityCheck for StaticDirectory {
    fn is_admin(&self, user: UserId) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let admin = self.admins.contains(&user);
        Box::pin(async move { admin })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn only_listed_users_are_admins() {
        let admin = UserId::new();
        let mut directory = StaticDirectory::new([admin]);
        assert!(directory.is_admin(admin).await);

        let player = UserId::new();
        assert!(!directory.is_admin(player).await);
        directory.grant(player);
        assert!(directory.is_admin(player).await);
    }
}
