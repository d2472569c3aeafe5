use std::collections::HashSet;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::warn;

use crate::drive_api::{DriveApi, DriveFile};
use crate::error::DriveError;
use crate::store::shortcuts;

/// How many parent levels to climb before giving up on attribution.
/// Keeps the walk finite even if the store hands back a parent cycle.
pub const MAX_PARENT_DEPTH: usize = 10;

/// How many shortcut-to-shortcut hops to follow.
pub const MAX_SHORTCUT_HOPS: usize = 5;

/// Whether `file` lives somewhere under the folder `root_id`.
///
/// Climbs the parent chain breadth-first, at most [`MAX_PARENT_DEPTH`]
/// levels, deduplicating visited ids. Files whose ancestry cannot be
/// established within the bound are treated as outside the subtree.
pub async fn file_in_subtree(
    api: &dyn DriveApi,
    file: &DriveFile,
    root_id: &str,
) -> Result<bool, DriveError> {
    let mut frontier: Vec<String> = file.parents.clone();
    let mut visited: HashSet<String> = HashSet::new();

    for _ in 0..MAX_PARENT_DEPTH {
        if frontier.is_empty() {
            return Ok(false);
        }
        if frontier.iter().any(|p| p == root_id) {
            return Ok(true);
        }

        let mut next = Vec::new();
        for parent_id in frontier {
            if !visited.insert(parent_id.clone()) {
                continue;
            }
            match api.file_metadata(&parent_id).await {
                Ok(meta) => next.extend(meta.parents),
                // A parent we cannot read cannot lead to the root.
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        frontier = next;
    }

    warn!(file_id = %file.id, root = %root_id, "parent chain exceeded depth bound");
    Ok(false)
}

/// Follow a shortcut to its final (non-shortcut) target and remember the
/// binding so later change events on the target can be attributed to the
/// watched folder holding the shortcut.
///
/// Returns `None` for broken shortcuts and chains longer than
/// [`MAX_SHORTCUT_HOPS`].
pub async fn resolve_shortcut(
    api: &dyn DriveApi,
    pool: &SqlitePool,
    shortcut: &DriveFile,
    watched_folder_id: i64,
) -> Result<Option<DriveFile>> {
    let Some(details) = &shortcut.shortcut_details else {
        return Ok(None);
    };

    let mut target_id = details.target_id.clone();
    for _ in 0..MAX_SHORTCUT_HOPS {
        let target = match api.file_metadata(&target_id).await {
            Ok(meta) => meta,
            Err(e) if e.is_not_found() => {
                warn!(shortcut_id = %shortcut.id, target = %target_id, "broken shortcut");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(next) = &target.shortcut_details {
            target_id = next.target_id.clone();
            continue;
        }

        shortcuts::upsert_binding(
            pool,
            &shortcut.id,
            &shortcut.name,
            &target.id,
            Some(&target.name),
            watched_folder_id,
        )
        .await?;
        return Ok(Some(target));
    }

    warn!(shortcut_id = %shortcut.id, "shortcut chain exceeded hop bound");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;
    use crate::store::folders::upsert_folder;
    use crate::testutil::{file, folder, shortcut, FakeDrive};

    #[tokio::test]
    async fn direct_and_nested_children_are_in_the_subtree() {
        let drive = FakeDrive::new();
        drive.put_folder(folder("a", "A", "root"));
        drive.put_folder(folder("b", "B", "a"));
        drive.put_folder(folder("c", "C", "b"));
        let deep = file("f", "deep.pdf", "application/pdf", "c");

        assert!(file_in_subtree(&drive, &deep, "a").await.unwrap());
        assert!(file_in_subtree(&drive, &deep, "c").await.unwrap());
        assert!(!file_in_subtree(&drive, &deep, "elsewhere").await.unwrap());
    }

    #[tokio::test]
    async fn parent_cycles_terminate_as_outside() {
        let drive = FakeDrive::new();
        drive.put_folder(folder("x", "X", "y"));
        drive.put_folder(folder("y", "Y", "x"));
        let trapped = file("f", "spin.pdf", "application/pdf", "x");

        assert!(!file_in_subtree(&drive, &trapped, "root").await.unwrap());
    }

    #[tokio::test]
    async fn shortcut_chains_resolve_to_the_final_target() {
        let pool = init_test_db().await;
        let drive = FakeDrive::new();
        let fid = upsert_folder(&pool, "f-relief", "Relief", None).await.unwrap();

        drive.put_file(
            file("tgt", "final.pdf", "application/pdf", "f-shared"),
            b"content",
        );
        drive.put_folder(shortcut("sc-mid", "hop", "f-x", "tgt"));
        let first = shortcut("sc-1", "This week", "f-relief", "sc-mid");
        drive.put_folder(first.clone());

        let resolved = resolve_shortcut(&drive, &pool, &first, fid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, "tgt");

        let bindings = shortcuts::bindings_for_target(&pool, "tgt").await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].shortcut_id, "sc-1");
        assert_eq!(bindings[0].watched_folder_id, fid);
    }

    #[tokio::test]
    async fn broken_shortcuts_resolve_to_none() {
        let pool = init_test_db().await;
        let drive = FakeDrive::new();
        let fid = upsert_folder(&pool, "f-relief", "Relief", None).await.unwrap();
        let dangling = shortcut("sc-1", "gone", "f-relief", "missing-target");

        let resolved = resolve_shortcut(&drive, &pool, &dangling, fid).await.unwrap();
        assert!(resolved.is_none());
        assert!(shortcuts::bindings_for_target(&pool, "missing-target")
            .await
            .unwrap()
            .is_empty());
    }
}
