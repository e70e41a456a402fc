//! Recipe database schema history.
//!
//! Each step is an embedded SQL file; `PRAGMA user_version` records the last
//! step applied. Pending steps run in one transaction.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// `(version, sql)` pairs in strictly increasing version order.
const STEPS: &[(u32, &str)] = &[(1, include_str!("0001_init.sql"))];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |(version, _)| *version)
}

/// Brings `conn` up to [`latest_version`] and returns that version.
///
/// Fails with [`DbError::UnsupportedSchemaVersion`] for files written by a
/// newer build, leaving them untouched.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<u32> {
    let latest = latest_version();
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let pending: Vec<_> = STEPS
        .iter()
        .filter(|(version, _)| *version > found)
        .collect();
    if pending.is_empty() {
        return Ok(found);
    }

    let tx = conn.transaction()?;
    for (version, sql) in &pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        info!("event=db_migrate module=db status=step version={version}");
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        found,
        latest,
        pending.len()
    );
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::STEPS;

    #[test]
    fn steps_are_strictly_increasing_from_one() {
        let versions: Vec<u32> = STEPS.iter().map(|(version, _)| *version).collect();
        let expected: Vec<u32> = (1..=versions.len() as u32).collect();
        assert_eq!(versions, expected);
    }
}
