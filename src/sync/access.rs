use std::collections::{HashMap, HashSet};

use anyhow::Result;
use sqlx::SqlitePool;

use crate::store::access::{self, Role};
use crate::store::entries::{self, DailyEntry};

/// Snapshot of the folder access rules, used to filter a day's entries for
/// one caller. Built once per query rather than per entry.
#[derive(Debug)]
pub struct AccessControlIndex {
    rules: HashMap<i64, HashSet<Role>>,
    public_tag: String,
}

impl AccessControlIndex {
    pub async fn load(pool: &SqlitePool, public_tag: &str) -> Result<Self> {
        let mut rules: HashMap<i64, HashSet<Role>> = HashMap::new();
        for (folder_id, role) in access::all_rules(pool).await? {
            rules.entry(folder_id).or_default().insert(role);
        }
        Ok(Self::from_rules(rules, public_tag))
    }

    pub fn from_rules(rules: HashMap<i64, HashSet<Role>>, public_tag: &str) -> Self {
        Self {
            rules,
            public_tag: public_tag.to_string(),
        }
    }

    /// Whether `role` may see an entry with the given tag and source folder.
    ///
    /// Superadmins see everything, and the public tag is visible to all.
    /// Entries from a folder with no rules, or with no folder at all, fall
    /// back to the elevated roles.
    pub fn allows(&self, role: Role, tag: &str, folder_id: Option<i64>) -> bool {
        if role == Role::Superadmin {
            return true;
        }
        if tag == self.public_tag {
            return true;
        }
        match folder_id.and_then(|id| self.rules.get(&id)) {
            Some(granted) => granted.contains(&role),
            None => role.is_elevated(),
        }
    }
}

/// A day's entries, reduced to what `role` is allowed to see.
pub async fn visible_entries(
    pool: &SqlitePool,
    role: Role,
    day: &str,
    public_tag: &str,
) -> Result<Vec<DailyEntry>> {
    let index = AccessControlIndex::load(pool, public_tag).await?;
    let all = entries::entries_for_day(pool, day).await?;
    Ok(all
        .into_iter()
        .filter(|e| index.allows(role, &e.tag, e.folder_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;
    use crate::store::access::set_folder_roles;
    use crate::store::entries::upsert_file_entry;
    use crate::store::folders::upsert_folder;

    const PUBLIC_TAG: &str = "EVENT";

    fn index_with(folder_id: i64, roles: &[Role]) -> AccessControlIndex {
        let mut rules = HashMap::new();
        rules.insert(folder_id, roles.iter().copied().collect());
        AccessControlIndex::from_rules(rules, PUBLIC_TAG)
    }

    #[test]
    fn superadmin_sees_everything() {
        let idx = index_with(1, &[Role::Viewer]);
        assert!(idx.allows(Role::Superadmin, "RELIEF", Some(2)));
        assert!(idx.allows(Role::Superadmin, "DUTY_ROSTER", None));
    }

    #[test]
    fn public_tag_is_visible_to_all_roles() {
        let idx = index_with(1, &[Role::Admin]);
        for role in Role::ALL {
            assert!(idx.allows(role, PUBLIC_TAG, Some(1)));
            assert!(idx.allows(role, PUBLIC_TAG, None));
        }
    }

    #[test]
    fn explicit_rules_gate_non_public_tags() {
        let idx = index_with(1, &[Role::ReliefMember]);
        assert!(idx.allows(Role::ReliefMember, "RELIEF", Some(1)));
        assert!(!idx.allows(Role::Admin, "RELIEF", Some(1)));
        assert!(!idx.allows(Role::Viewer, "RELIEF", Some(1)));
    }

    #[tokio::test]
    async fn visible_entries_filters_a_days_rows_per_role() {
        let pool = init_test_db().await;
        let relief = upsert_folder(&pool, "drv-1", "Relief", None).await.unwrap();
        let events = upsert_folder(&pool, "drv-2", "Events", None).await.unwrap();
        set_folder_roles(&pool, relief, &[Role::ReliefMember]).await.unwrap();

        upsert_file_entry(
            &pool, "2025-03-05", "RELIEF", "f-1", "cover.pdf", "who covers", "sync",
            Some(relief),
        )
        .await
        .unwrap();
        upsert_file_entry(
            &pool, "2025-03-05", "EVENT", "f-2", "flyer.pdf", "sports day", "sync",
            Some(events),
        )
        .await
        .unwrap();

        let viewer = visible_entries(&pool, Role::Viewer, "2025-03-05", PUBLIC_TAG)
            .await
            .unwrap();
        assert_eq!(viewer.len(), 1);
        assert_eq!(viewer[0].tag, "EVENT");

        let member = visible_entries(&pool, Role::ReliefMember, "2025-03-05", PUBLIC_TAG)
            .await
            .unwrap();
        assert_eq!(member.len(), 2);

        let admin = visible_entries(&pool, Role::Admin, "2025-03-05", PUBLIC_TAG)
            .await
            .unwrap();
        assert_eq!(admin.len(), 1, "admin lacks the relief grant");

        let root = visible_entries(&pool, Role::Superadmin, "2025-03-05", PUBLIC_TAG)
            .await
            .unwrap();
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn unruled_folders_default_to_elevated_roles() {
        let idx = index_with(1, &[Role::Viewer]);
        // Folder 2 has no rules; folderless entries behave the same.
        for folder in [Some(2), None] {
            assert!(idx.allows(Role::Admin, "GENERAL", folder));
            assert!(idx.allows(Role::ReliefMember, "GENERAL", folder));
            assert!(!idx.allows(Role::Viewer, "GENERAL", folder));
        }
    }
}
