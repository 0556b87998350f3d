use rusqlite::Connection;

use crate::error::Result;

/// Initialise the schema in `conn`. Safe to call on every startup.
///
/// Foreign keys are enabled on the connection so deleting an agent cascades
/// to its schedule and posts.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    create_agents_table(conn)?;
    create_schedules_table(conn)?;
    create_posts_table(conn)?;
    Ok(())
}

fn create_agents_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS agents (
            id              TEXT    NOT NULL PRIMARY KEY,
            name            TEXT    NOT NULL,
            expertise       TEXT    NOT NULL,
            persona         TEXT,
            tone            TEXT    NOT NULL DEFAULT 'professional',
            content_length  TEXT    NOT NULL DEFAULT 'medium',
            schedule_cron   TEXT,               -- derived from the schedule, NULL = unscheduled
            is_active       INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        -- Sweep query: active agents with a cron expression
        CREATE INDEX IF NOT EXISTS idx_agents_schedulable
            ON agents (is_active, schedule_cron);
        ",
    )?;
    Ok(())
}

fn create_schedules_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schedules (
            id                  TEXT    NOT NULL PRIMARY KEY,
            agent_id            TEXT    NOT NULL UNIQUE
                                REFERENCES agents (id) ON DELETE CASCADE,
            run_interval        TEXT    NOT NULL,
            publish_hour        INTEGER NOT NULL CHECK (publish_hour BETWEEN 0 AND 23),
            timezone            TEXT    NOT NULL DEFAULT 'UTC',
            is_active           INTEGER NOT NULL DEFAULT 1,
            auto_publish        INTEGER NOT NULL DEFAULT 1,
            target_keywords     TEXT    NOT NULL DEFAULT '[]',  -- JSON array
            exclude_keywords    TEXT    NOT NULL DEFAULT '[]',  -- JSON array
            content_length      TEXT    NOT NULL DEFAULT 'long',
            total_runs          INTEGER NOT NULL DEFAULT 0,
            successful_runs     INTEGER NOT NULL DEFAULT 0,
            failed_runs         INTEGER NOT NULL DEFAULT 0,
            permanent_failures  INTEGER NOT NULL DEFAULT 0,
            last_run            TEXT,
            next_run            TEXT,
            created_at          TEXT    NOT NULL,
            updated_at          TEXT    NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}

fn create_posts_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS posts (
            id                  TEXT    NOT NULL PRIMARY KEY,
            agent_id            TEXT    NOT NULL
                                REFERENCES agents (id) ON DELETE CASCADE,
            title               TEXT    NOT NULL,
            slug                TEXT    NOT NULL,
            content             TEXT    NOT NULL,
            meta_title          TEXT    NOT NULL,
            meta_description    TEXT    NOT NULL,
            keywords            TEXT    NOT NULL DEFAULT '[]',  -- JSON array
            readability_score   REAL    NOT NULL DEFAULT 0,
            keyword_density     TEXT    NOT NULL DEFAULT '{}',  -- JSON object
            tokens_used         INTEGER NOT NULL DEFAULT 0,
            word_count          INTEGER NOT NULL DEFAULT 0,
            status              TEXT    NOT NULL DEFAULT 'draft',
            generation_prompt   TEXT,
            scheduled_at        TEXT,
            published_at        TEXT,
            created_at          TEXT    NOT NULL,
            updated_at          TEXT    NOT NULL
        ) STRICT;

        -- Publish timer: WHERE status = 'scheduled' AND scheduled_at <= ?
        CREATE INDEX IF NOT EXISTS idx_posts_due ON posts (status, scheduled_at);
        CREATE INDEX IF NOT EXISTS idx_posts_agent ON posts (agent_id, created_at DESC);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('agents', 'schedules', 'posts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }
}
