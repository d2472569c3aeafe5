use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

/// Caller roles, ordered from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Superadmin,
    Admin,
    ReliefMember,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Superadmin,
        Role::Admin,
        Role::ReliefMember,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::ReliefMember => "relief_member",
            Role::Viewer => "viewer",
        }
    }

    /// Default-allow set for folders that carry no explicit access rules.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Superadmin | Role::Admin | Role::ReliefMember)
    }

    /// Roles trusted to trigger an on-demand sync.
    pub fn can_trigger_sync(&self) -> bool {
        matches!(self, Role::Superadmin | Role::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "superadmin" => Ok(Role::Superadmin),
            "admin" => Ok(Role::Admin),
            "relief_member" => Ok(Role::ReliefMember),
            "viewer" => Ok(Role::Viewer),
            other => anyhow::bail!("unknown role: {other}"),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replace the access rules for a folder with the given role set.
pub async fn set_folder_roles(pool: &SqlitePool, folder_id: i64, roles: &[Role]) -> Result<()> {
    let mut tx = pool.begin().await.context("begin access update")?;

    sqlx::query("DELETE FROM folder_role_access WHERE folder_id = ?")
        .bind(folder_id)
        .execute(&mut *tx)
        .await
        .context("clear folder roles")?;

    for role in roles {
        sqlx::query("INSERT INTO folder_role_access (folder_id, role) VALUES (?, ?)")
            .bind(folder_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await
            .context("insert folder role")?;
    }

    tx.commit().await.context("commit access update")
}

/// Roles explicitly granted access to a folder. Empty when no rules exist.
pub async fn roles_for_folder(pool: &SqlitePool, folder_id: i64) -> Result<Vec<Role>> {
    let rows = sqlx::query("SELECT role FROM folder_role_access WHERE folder_id = ?")
        .bind(folder_id)
        .fetch_all(pool)
        .await
        .context("list folder roles")?;

    rows.iter()
        .map(|r| r.get::<String, _>("role").parse())
        .collect()
}

/// Every (folder_id, role) grant in the store.
pub async fn all_rules(pool: &SqlitePool) -> Result<Vec<(i64, Role)>> {
    let rows = sqlx::query("SELECT folder_id, role FROM folder_role_access")
        .fetch_all(pool)
        .await
        .context("list access rules")?;

    rows.iter()
        .map(|r| {
            let role: Role = r.get::<String, _>("role").parse()?;
            Ok((r.get("folder_id"), role))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;
    use crate::store::folders::upsert_folder;

    #[test]
    fn role_strings_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("teacher".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn set_replaces_previous_grants() {
        let pool = init_test_db().await;
        let fid = upsert_folder(&pool, "drv-1", "Relief", None).await.unwrap();

        set_folder_roles(&pool, fid, &[Role::Admin, Role::ReliefMember])
            .await
            .unwrap();
        set_folder_roles(&pool, fid, &[Role::Viewer]).await.unwrap();

        let roles = roles_for_folder(&pool, fid).await.unwrap();
        assert_eq!(roles, vec![Role::Viewer]);
    }
}
