use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use quill_core::{
    Agent, NewPost, Post, PostStatus, RunOutcome, RunStats, Schedule, SeoMetadata,
};
use rusqlite::{types::Type, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};

const AGENT_COLUMNS: &str = "id, name, expertise, persona, tone, content_length,
     schedule_cron, is_active, created_at, updated_at";

const SCHEDULE_COLUMNS: &str = "id, agent_id, run_interval, publish_hour, timezone,
     is_active, auto_publish, target_keywords, exclude_keywords, content_length,
     total_runs, successful_runs, failed_runs, permanent_failures, last_run, next_run,
     created_at, updated_at";

const POST_COLUMNS: &str = "id, agent_id, title, slug, content, meta_title,
     meta_description, keywords, readability_score, keyword_density, tokens_used,
     word_count, status, generation_prompt, scheduled_at, published_at,
     created_at, updated_at";

/// Thread-safe repository for agents, schedules and posts.
///
/// Wraps a single SQLite connection in a `Mutex`; every public method holds
/// the lock for its whole transaction.
pub struct ContentStore {
    db: Mutex<Connection>,
}

impl ContentStore {
    /// Wrap an open connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) a database file, creating parent directories.
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(quill_core::QuillError::from)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::new(conn)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    // --- agents ------------------------------------------------------------

    #[instrument(skip(self, agent), fields(agent_id = %agent.id))]
    pub fn insert_agent(&self, agent: &Agent) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO agents
             (id, name, expertise, persona, tone, content_length, schedule_cron,
              is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                agent.id,
                agent.name,
                agent.expertise,
                agent.persona,
                agent.tone,
                agent.content_length.to_string(),
                agent.schedule_cron,
                agent.is_active,
                ts(agent.created_at),
                ts(agent.updated_at),
            ],
        )?;
        info!(name = %agent.name, "agent stored");
        Ok(())
    }

    pub fn get_agent(&self, id: &str) -> Result<Option<Agent>> {
        let db = self.db.lock().unwrap();
        let agent = db
            .query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1"),
                [id],
                row_to_agent,
            )
            .optional()?;
        Ok(agent)
    }

    /// Active agents with a non-null cron expression, oldest first.
    pub fn list_schedulable_agents(&self) -> Result<Vec<Agent>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare_cached(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents
             WHERE is_active = 1 AND schedule_cron IS NOT NULL
             ORDER BY created_at"
        ))?;
        let agents = stmt
            .query_map([], row_to_agent)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(agents)
    }

    pub fn set_agent_active(&self, id: &str, active: bool) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE agents SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![active, ts(Utc::now()), id],
        )?;
        if n == 0 {
            return Err(StoreError::AgentNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Delete an agent; its schedule and posts go with it.
    #[instrument(skip(self))]
    pub fn delete_agent(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM agents WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::AgentNotFound { id: id.to_string() });
        }
        info!("agent deleted");
        Ok(())
    }

    // --- schedules ---------------------------------------------------------

    /// Create the agent's schedule and cache its cron expression on the agent.
    #[instrument(skip(self, schedule), fields(agent_id = %schedule.agent_id))]
    pub fn create_schedule(&self, schedule: &Schedule) -> Result<()> {
        schedule.validate()?;
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        let agent_exists: bool = tx
            .query_row(
                "SELECT 1 FROM agents WHERE id = ?1",
                [&schedule.agent_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !agent_exists {
            return Err(StoreError::AgentNotFound {
                id: schedule.agent_id.clone(),
            });
        }
        if query_schedule(&tx, &schedule.agent_id, false)?.is_some() {
            return Err(StoreError::ScheduleExists {
                agent_id: schedule.agent_id.clone(),
            });
        }

        tx.execute(
            "INSERT INTO schedules
             (id, agent_id, run_interval, publish_hour, timezone, is_active,
              auto_publish, target_keywords, exclude_keywords, content_length,
              total_runs, successful_runs, failed_runs, permanent_failures,
              last_run, next_run, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, 0, 0, 0, NULL, NULL, ?11, ?11)",
            rusqlite::params![
                schedule.id,
                schedule.agent_id,
                schedule.interval.to_string(),
                schedule.publish_hour,
                schedule.timezone,
                schedule.is_active,
                schedule.auto_publish,
                serde_json::to_string(&schedule.target_keywords)?,
                serde_json::to_string(&schedule.exclude_keywords)?,
                schedule.content_length.to_string(),
                ts(schedule.created_at),
            ],
        )?;
        sync_agent_cron(&tx, schedule)?;
        tx.commit()?;

        info!(cron = %schedule.cron_expression(), "schedule created");
        Ok(())
    }

    pub fn get_schedule_for_agent(&self, agent_id: &str) -> Result<Option<Schedule>> {
        let db = self.db.lock().unwrap();
        Ok(query_schedule(&db, agent_id, false)?)
    }

    /// Persist edited settings (interval, hour, flags, keyword lists). Run
    /// statistics are owned by the stats tracker and are not touched here.
    #[instrument(skip(self, schedule), fields(agent_id = %schedule.agent_id))]
    pub fn update_schedule(&self, schedule: &Schedule) -> Result<()> {
        schedule.validate()?;
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let n = tx.execute(
            "UPDATE schedules
             SET run_interval = ?1, publish_hour = ?2, timezone = ?3, is_active = ?4,
                 auto_publish = ?5, target_keywords = ?6, exclude_keywords = ?7,
                 content_length = ?8, updated_at = ?9
             WHERE agent_id = ?10",
            rusqlite::params![
                schedule.interval.to_string(),
                schedule.publish_hour,
                schedule.timezone,
                schedule.is_active,
                schedule.auto_publish,
                serde_json::to_string(&schedule.target_keywords)?,
                serde_json::to_string(&schedule.exclude_keywords)?,
                schedule.content_length.to_string(),
                ts(Utc::now()),
                schedule.agent_id,
            ],
        )?;
        if n == 0 {
            return Err(StoreError::ScheduleNotFound {
                agent_id: schedule.agent_id.clone(),
            });
        }
        sync_agent_cron(&tx, schedule)?;
        tx.commit()?;
        Ok(())
    }

    /// Pause or resume automation. Pausing clears the agent's cron so the
    /// sweep stops selecting it.
    #[instrument(skip(self))]
    pub fn set_schedule_active(&self, agent_id: &str, active: bool) -> Result<Schedule> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let n = tx.execute(
            "UPDATE schedules SET is_active = ?1, updated_at = ?2 WHERE agent_id = ?3",
            rusqlite::params![active, ts(Utc::now()), agent_id],
        )?;
        if n == 0 {
            return Err(StoreError::ScheduleNotFound {
                agent_id: agent_id.to_string(),
            });
        }
        let schedule = query_schedule(&tx, agent_id, false)?.ok_or_else(|| {
            StoreError::ScheduleNotFound {
                agent_id: agent_id.to_string(),
            }
        })?;
        sync_agent_cron(&tx, &schedule)?;
        tx.commit()?;
        info!(active, "schedule toggled");
        Ok(schedule)
    }

    #[instrument(skip(self))]
    pub fn delete_schedule(&self, agent_id: &str) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let n = tx.execute("DELETE FROM schedules WHERE agent_id = ?1", [agent_id])?;
        if n == 0 {
            return Err(StoreError::ScheduleNotFound {
                agent_id: agent_id.to_string(),
            });
        }
        tx.execute(
            "UPDATE agents SET schedule_cron = NULL, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![ts(Utc::now()), agent_id],
        )?;
        tx.commit()?;
        info!("schedule deleted");
        Ok(())
    }

    /// Record the next computed fire time on the agent's schedule, if any.
    pub fn set_next_run(&self, agent_id: &str, next: Option<DateTime<Utc>>) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE schedules SET next_run = ?1 WHERE agent_id = ?2",
            rusqlite::params![next.map(ts), agent_id],
        )?;
        Ok(())
    }

    // --- generation outcomes -----------------------------------------------

    /// Persist a generated post and count the success on the agent's active
    /// schedule in one transaction. With `auto_publish` the post is queued
    /// for the publish timer at `now`.
    #[instrument(skip(self, new), fields(agent_id = %new.agent_id))]
    pub fn commit_generation(&self, new: &NewPost, now: DateTime<Utc>) -> Result<Post> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let id = Uuid::now_v7().to_string();
        let now_str = ts(now);

        tx.execute(
            "INSERT INTO posts
             (id, agent_id, title, slug, content, meta_title, meta_description,
              keywords, readability_score, keyword_density, tokens_used, word_count,
              status, generation_prompt, scheduled_at, published_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                     'draft', ?13, NULL, NULL, ?14, ?14)",
            rusqlite::params![
                id,
                new.agent_id,
                new.title,
                new.seo.slug,
                new.content,
                new.seo.meta_title,
                new.seo.meta_description,
                serde_json::to_string(&new.seo.keywords)?,
                new.seo.readability_score,
                serde_json::to_string(&new.seo.keyword_density)?,
                new.tokens_used,
                new.word_count,
                new.generation_prompt,
                now_str,
            ],
        )?;

        if let Some(mut schedule) = query_schedule(&tx, &new.agent_id, true)? {
            schedule.stats.record(RunOutcome::Succeeded, now);
            write_stats(&tx, &schedule.id, &schedule.stats, &now_str)?;
            if schedule.auto_publish {
                tx.execute(
                    "UPDATE posts SET status = 'scheduled', scheduled_at = ?1, updated_at = ?1
                     WHERE id = ?2 AND status = 'draft'",
                    rusqlite::params![now_str, id],
                )?;
                debug!(post_id = %id, "auto-publish: post queued");
            }
        }

        let post = query_post(&tx, &id)?.ok_or_else(|| StoreError::PostNotFound { id: id.clone() })?;
        tx.commit()?;
        info!(post_id = %post.id, status = %post.status, "generation committed");
        Ok(post)
    }

    /// Count a final failure on the agent's active schedule. Returns the
    /// updated counters, or `None` when the agent has no active schedule.
    #[instrument(skip(self))]
    pub fn record_failure(
        &self,
        agent_id: &str,
        permanent: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<RunStats>> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let Some(mut schedule) = query_schedule(&tx, agent_id, true)? else {
            return Ok(None);
        };
        schedule.stats.record(RunOutcome::Failed { permanent }, now);
        write_stats(&tx, &schedule.id, &schedule.stats, &ts(now))?;
        tx.commit()?;
        Ok(Some(schedule.stats))
    }

    // --- posts -------------------------------------------------------------

    pub fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let db = self.db.lock().unwrap();
        Ok(query_post(&db, id)?)
    }

    /// Posts for one agent, newest first.
    pub fn list_posts_for_agent(&self, agent_id: &str) -> Result<Vec<Post>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE agent_id = ?1 ORDER BY created_at DESC, id DESC"
        ))?;
        let posts = stmt
            .query_map([agent_id], row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    /// Queue a post for publication at `at`.
    pub fn schedule_post(&self, id: &str, at: DateTime<Utc>, now: DateTime<Utc>) -> Result<Post> {
        self.transition(id, PostStatus::Scheduled, Some(at), now)
    }

    /// Publish a post immediately.
    pub fn publish_now(&self, id: &str, now: DateTime<Utc>) -> Result<Post> {
        self.transition(id, PostStatus::Published, None, now)
    }

    /// Mark a draft as failed. Terminal.
    pub fn mark_failed(&self, id: &str, now: DateTime<Utc>) -> Result<Post> {
        self.transition(id, PostStatus::Failed, None, now)
    }

    /// Promote every scheduled post whose time has come.
    ///
    /// Each update is guarded by `status = 'scheduled'`, so a post is
    /// published exactly once even when two timers race on separate
    /// connections. Returns the posts this call promoted.
    #[instrument(skip(self))]
    pub fn publish_due(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        let mut db = self.db.lock().unwrap();
        // take the write lock up front so a second connection waits instead
        // of failing the SHARED -> RESERVED upgrade
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now_str = ts(now);

        let due: Vec<String> = {
            let mut stmt = tx.prepare_cached(
                "SELECT id FROM posts
                 WHERE status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at <= ?1
                 ORDER BY scheduled_at",
            )?;
            let ids = stmt
                .query_map([&now_str], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };

        let mut published = Vec::with_capacity(due.len());
        for id in due {
            let n = tx.execute(
                "UPDATE posts SET status = 'published', published_at = ?1, updated_at = ?1
                 WHERE id = ?2 AND status = 'scheduled'",
                rusqlite::params![now_str, id],
            )?;
            if n == 1 {
                if let Some(post) = query_post(&tx, &id)? {
                    published.push(post);
                }
            }
        }
        tx.commit()?;
        Ok(published)
    }

    fn transition(
        &self,
        id: &str,
        to: PostStatus,
        scheduled_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Post> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let current = query_post(&tx, id)?.ok_or_else(|| StoreError::PostNotFound {
            id: id.to_string(),
        })?;
        if !current.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                to,
            });
        }

        let now_str = ts(now);
        let published_at = (to == PostStatus::Published).then(|| now_str.clone());
        let n = tx.execute(
            "UPDATE posts
             SET status = ?1,
                 scheduled_at = COALESCE(?2, scheduled_at),
                 published_at = COALESCE(?3, published_at),
                 updated_at = ?4
             WHERE id = ?5 AND status = ?6",
            rusqlite::params![
                to.to_string(),
                scheduled_at.map(ts),
                published_at,
                now_str,
                id,
                current.status.to_string(),
            ],
        )?;
        if n == 0 {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                to,
            });
        }
        let post = query_post(&tx, id)?.ok_or_else(|| StoreError::PostNotFound {
            id: id.to_string(),
        })?;
        tx.commit()?;
        debug!(post_id = %id, from = %current.status, %to, "post transitioned");
        Ok(post)
    }
}

// --- row helpers -------------------------------------------------------------

/// Fixed-width UTC timestamps so string comparison in SQL orders correctly.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn get_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn get_opt_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e.to_string()))
    })
    .transpose()
}

fn get_parsed<T: FromStr<Err = String>>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn get_json<T: DeserializeOwned>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn row_to_agent(row: &rusqlite::Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        expertise: row.get(2)?,
        persona: row.get(3)?,
        tone: row.get(4)?,
        content_length: get_parsed(row, 5)?,
        schedule_cron: row.get(6)?,
        is_active: row.get(7)?,
        created_at: get_ts(row, 8)?,
        updated_at: get_ts(row, 9)?,
    })
}

fn row_to_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        interval: get_parsed(row, 2)?,
        publish_hour: row.get(3)?,
        timezone: row.get(4)?,
        is_active: row.get(5)?,
        auto_publish: row.get(6)?,
        target_keywords: get_json(row, 7)?,
        exclude_keywords: get_json(row, 8)?,
        content_length: get_parsed(row, 9)?,
        stats: RunStats {
            total_runs: row.get(10)?,
            successful_runs: row.get(11)?,
            failed_runs: row.get(12)?,
            permanent_failures: row.get(13)?,
            last_run: get_opt_ts(row, 14)?,
            next_run: get_opt_ts(row, 15)?,
        },
        created_at: get_ts(row, 16)?,
        updated_at: get_ts(row, 17)?,
    })
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        title: row.get(2)?,
        seo: SeoMetadata {
            slug: row.get(3)?,
            meta_title: row.get(5)?,
            meta_description: row.get(6)?,
            keywords: get_json(row, 7)?,
            readability_score: row.get(8)?,
            keyword_density: get_json(row, 9)?,
        },
        content: row.get(4)?,
        tokens_used: row.get(10)?,
        word_count: row.get(11)?,
        status: get_parsed(row, 12)?,
        generation_prompt: row.get(13)?,
        scheduled_at: get_opt_ts(row, 14)?,
        published_at: get_opt_ts(row, 15)?,
        created_at: get_ts(row, 16)?,
        updated_at: get_ts(row, 17)?,
    })
}

fn query_schedule(
    conn: &Connection,
    agent_id: &str,
    active_only: bool,
) -> rusqlite::Result<Option<Schedule>> {
    let sql = if active_only {
        format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE agent_id = ?1 AND is_active = 1")
    } else {
        format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE agent_id = ?1")
    };
    conn.query_row(&sql, [agent_id], row_to_schedule).optional()
}

fn query_post(conn: &Connection, id: &str) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
        [id],
        row_to_post,
    )
    .optional()
}

fn write_stats(
    conn: &Connection,
    schedule_id: &str,
    stats: &RunStats,
    now: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schedules
         SET total_runs = ?1, successful_runs = ?2, failed_runs = ?3,
             permanent_failures = ?4, last_run = ?5, updated_at = ?6
         WHERE id = ?7",
        rusqlite::params![
            stats.total_runs,
            stats.successful_runs,
            stats.failed_runs,
            stats.permanent_failures,
            stats.last_run.map(ts),
            now,
            schedule_id,
        ],
    )?;
    Ok(())
}

/// Write the schedule's cron expression onto its agent, or clear it when
/// the schedule is paused.
fn sync_agent_cron(conn: &Connection, schedule: &Schedule) -> rusqlite::Result<()> {
    let cron = schedule.is_active.then(|| schedule.cron_expression());
    conn.execute(
        "UPDATE agents SET schedule_cron = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![cron, ts(Utc::now()), schedule.agent_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use quill_core::ScheduleInterval;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 6, h, m, 0).unwrap()
    }

    fn seeded() -> (ContentStore, Agent) {
        let store = ContentStore::open_in_memory().unwrap();
        let agent = Agent::new("Ada", "distributed systems");
        store.insert_agent(&agent).unwrap();
        (store, agent)
    }

    fn new_post(agent_id: &str) -> NewPost {
        NewPost {
            agent_id: agent_id.to_string(),
            title: "Consensus in practice".into(),
            content: "<h1>Consensus in practice</h1><p>Raft and friends.</p>".into(),
            seo: SeoMetadata {
                meta_title: "Consensus".into(),
                meta_description: "A tour of consensus".into(),
                keywords: vec!["raft".into()],
                readability_score: 55.0,
                keyword_density: [("raft".to_string(), 1.5)].into_iter().collect(),
                slug: "consensus-in-practice".into(),
            },
            tokens_used: 1234,
            word_count: 5,
            generation_prompt: Some("Write about consensus".into()),
        }
    }

    #[test]
    fn schedule_creation_writes_cron_onto_agent() {
        let (store, agent) = seeded();
        assert!(store.list_schedulable_agents().unwrap().is_empty());

        let schedule = Schedule::new(&agent.id, ScheduleInterval::Daily, 10);
        store.create_schedule(&schedule).unwrap();

        let agents = store.list_schedulable_agents().unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].schedule_cron.as_deref(), Some("0 10 * * *"));
    }

    #[test]
    fn second_schedule_for_same_agent_is_rejected() {
        let (store, agent) = seeded();
        store
            .create_schedule(&Schedule::new(&agent.id, ScheduleInterval::Daily, 10))
            .unwrap();
        let err = store
            .create_schedule(&Schedule::new(&agent.id, ScheduleInterval::Weekly, 8))
            .unwrap_err();
        assert!(matches!(err, StoreError::ScheduleExists { .. }));
    }

    #[test]
    fn schedule_for_unknown_agent_is_rejected() {
        let store = ContentStore::open_in_memory().unwrap();
        let err = store
            .create_schedule(&Schedule::new("ghost", ScheduleInterval::Daily, 10))
            .unwrap_err();
        assert!(matches!(err, StoreError::AgentNotFound { .. }));
    }

    #[test]
    fn deactivate_clears_cron_and_activate_restores_it() {
        let (store, agent) = seeded();
        store
            .create_schedule(&Schedule::new(&agent.id, ScheduleInterval::Biweekly, 7))
            .unwrap();

        store.set_schedule_active(&agent.id, false).unwrap();
        assert!(store.list_schedulable_agents().unwrap().is_empty());

        store.set_schedule_active(&agent.id, true).unwrap();
        let agent = store.get_agent(&agent.id).unwrap().unwrap();
        assert_eq!(agent.schedule_cron.as_deref(), Some("0 7 1,15 * *"));
    }

    #[test]
    fn update_schedule_recomputes_cron() {
        let (store, agent) = seeded();
        let mut schedule = Schedule::new(&agent.id, ScheduleInterval::Daily, 10);
        store.create_schedule(&schedule).unwrap();

        schedule.interval = ScheduleInterval::Weekly;
        schedule.publish_hour = 6;
        schedule.target_keywords = vec!["rust".into()];
        store.update_schedule(&schedule).unwrap();

        let agent = store.get_agent(&agent.id).unwrap().unwrap();
        assert_eq!(agent.schedule_cron.as_deref(), Some("0 6 * * 1"));
        let stored = store.get_schedule_for_agent(&agent.id).unwrap().unwrap();
        assert_eq!(stored.target_keywords, vec!["rust".to_string()]);
    }

    #[test]
    fn deleting_agent_cascades() {
        let (store, agent) = seeded();
        store
            .create_schedule(&Schedule::new(&agent.id, ScheduleInterval::Daily, 10))
            .unwrap();
        store.commit_generation(&new_post(&agent.id), at(10, 5)).unwrap();

        store.delete_agent(&agent.id).unwrap();
        assert!(store.get_schedule_for_agent(&agent.id).unwrap().is_none());
        assert!(store.list_posts_for_agent(&agent.id).unwrap().is_empty());
    }

    #[test]
    fn commit_generation_counts_success_and_auto_publishes() {
        let (store, agent) = seeded();
        store
            .create_schedule(&Schedule::new(&agent.id, ScheduleInterval::Daily, 10))
            .unwrap();

        let post = store.commit_generation(&new_post(&agent.id), at(10, 5)).unwrap();
        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.scheduled_at, Some(at(10, 5)));
        assert_eq!(post.seo.keyword_density.get("raft"), Some(&1.5));

        let stats = store.get_schedule_for_agent(&agent.id).unwrap().unwrap().stats;
        assert_eq!(stats.total_runs, 1);
        assert_eq!(stats.successful_runs, 1);
        assert_eq!(stats.last_run, Some(at(10, 5)));
    }

    #[test]
    fn commit_without_auto_publish_stays_draft() {
        let (store, agent) = seeded();
        let mut schedule = Schedule::new(&agent.id, ScheduleInterval::Daily, 10);
        schedule.auto_publish = false;
        store.create_schedule(&schedule).unwrap();

        let post = store.commit_generation(&new_post(&agent.id), at(10, 5)).unwrap();
        assert_eq!(post.status, PostStatus::Draft);
        assert!(post.scheduled_at.is_none());
    }

    #[test]
    fn manual_generation_without_schedule_is_draft_and_uncounted() {
        let (store, agent) = seeded();
        let post = store.commit_generation(&new_post(&agent.id), at(9, 0)).unwrap();
        assert_eq!(post.status, PostStatus::Draft);
        assert!(store.record_failure(&agent.id, false, at(9, 0)).unwrap().is_none());
    }

    #[test]
    fn failures_increment_failed_and_total() {
        let (store, agent) = seeded();
        store
            .create_schedule(&Schedule::new(&agent.id, ScheduleInterval::Daily, 10))
            .unwrap();
        store.record_failure(&agent.id, false, at(10, 5)).unwrap();
        let stats = store.record_failure(&agent.id, true, at(10, 10)).unwrap().unwrap();

        assert_eq!(stats.failed_runs, 2);
        assert_eq!(stats.permanent_failures, 1);
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.successful_runs, 0);
        assert!(stats.last_run.is_none());
    }

    #[test]
    fn publish_due_promotes_exactly_once() {
        let (store, agent) = seeded();
        let post = store.commit_generation(&new_post(&agent.id), at(9, 0)).unwrap();
        store.schedule_post(&post.id, at(9, 30), at(9, 0)).unwrap();

        assert!(store.publish_due(at(9, 29)).unwrap().is_empty());

        let first = store.publish_due(at(9, 31)).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status, PostStatus::Published);
        assert_eq!(first[0].published_at, Some(at(9, 31)));

        assert!(store.publish_due(at(9, 32)).unwrap().is_empty());
        let stored = store.get_post(&post.id).unwrap().unwrap();
        assert_eq!(stored.published_at, Some(at(9, 31)));
    }

    #[test]
    fn racing_timers_on_separate_connections_publish_once() {
        let path = std::env::temp_dir().join(format!("quill-publish-{}.db", Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();
        let first = ContentStore::open(&path).unwrap();
        let second = ContentStore::open(&path).unwrap();

        let agent = Agent::new("Ada", "distributed systems");
        first.insert_agent(&agent).unwrap();
        let post = first.commit_generation(&new_post(&agent.id), at(9, 0)).unwrap();
        first.schedule_post(&post.id, at(9, 0), at(9, 0)).unwrap();

        let (a, b) = std::thread::scope(|s| {
            let a = s.spawn(|| first.publish_due(at(9, 1)).unwrap().len());
            let b = s.spawn(|| second.publish_due(at(9, 1)).unwrap().len());
            (a.join().unwrap(), b.join().unwrap())
        });
        assert_eq!(a + b, 1);
        assert_eq!(
            second.get_post(&post.id).unwrap().unwrap().status,
            PostStatus::Published
        );

        drop(first);
        drop(second);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{path}{suffix}"));
        }
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let (store, agent) = seeded();
        let post = store.commit_generation(&new_post(&agent.id), at(9, 0)).unwrap();
        store.mark_failed(&post.id, at(9, 1)).unwrap();

        let err = store
            .schedule_post(&post.id, at(12, 0), at(9, 2))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: PostStatus::Failed,
                to: PostStatus::Scheduled,
                ..
            }
        ));

        let other = store.commit_generation(&new_post(&agent.id), at(9, 0)).unwrap();
        store.publish_now(&other.id, at(9, 5)).unwrap();
        assert!(store.publish_now(&other.id, at(9, 6)).is_err());
        assert!(store.mark_failed(&other.id, at(9, 6)).is_err());
    }

    #[test]
    fn next_run_is_persisted() {
        let (store, agent) = seeded();
        store
            .create_schedule(&Schedule::new(&agent.id, ScheduleInterval::Daily, 10))
            .unwrap();
        let next = at(10, 0) + Duration::days(1);
        store.set_next_run(&agent.id, Some(next)).unwrap();
        let schedule = store.get_schedule_for_agent(&agent.id).unwrap().unwrap();
        assert_eq!(schedule.stats.next_run, Some(next));
    }
}
