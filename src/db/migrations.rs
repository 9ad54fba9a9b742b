use anyhow::{ensure, Context, Result};
use log::info;
use rusqlite::Connection;

/// Schema scripts in order. Script `n` moves `user_version` from `n` to `n + 1`.
const MIGRATIONS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

fn target_version() -> i32 {
    MIGRATIONS.len() as i32
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read the schema version")?;
    let target = target_version();

    ensure!(current >= 0, "invalid schema version {current}");
    ensure!(
        current <= target,
        "database schema version {current} is newer than this build supports ({target})"
    );
    if current == target {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to start the schema migration")?;
    for (index, script) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        tx.execute_batch(script)
            .with_context(|| format!("failed to migrate schema to version {}", index + 1))?;
    }
    tx.pragma_update(None, "user_version", target)
        .context("failed to record the schema version")?;
    tx.commit().context("failed to commit the schema migration")?;

    info!("Database schema migrated from version {current} to {target}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_version(conn: &Connection) -> i32 {
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn fresh_database_reaches_latest_schema_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        run_migrations(&mut conn).unwrap();

        assert_eq!(schema_version(&conn), target_version());

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv_store'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn refuses_schema_from_a_newer_build() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", target_version() + 1)
            .unwrap();

        assert!(run_migrations(&mut conn).is_err());
        assert_eq!(schema_version(&conn), target_version() + 1);
    }
}
