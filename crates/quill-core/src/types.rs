use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QuillError, Result};
use crate::stats::RunStats;

/// Automation cadence for a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleInterval {
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "every_3_days")]
    EveryThreeDays,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "biweekly")]
    Biweekly,
}

impl ScheduleInterval {
    /// Standard 5-field cron expression firing at minute 0 of `hour` (UTC).
    pub fn cron_expression(self, hour: u8) -> String {
        match self {
            ScheduleInterval::Daily => format!("0 {hour} * * *"),
            ScheduleInterval::EveryThreeDays => format!("0 {hour} */3 * *"),
            ScheduleInterval::Weekly => format!("0 {hour} * * 1"),
            ScheduleInterval::Biweekly => format!("0 {hour} 1,15 * *"),
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            ScheduleInterval::Daily => "Daily",
            ScheduleInterval::EveryThreeDays => "Every 3 days",
            ScheduleInterval::Weekly => "Weekly",
            ScheduleInterval::Biweekly => "Biweekly",
        }
    }
}

impl std::fmt::Display for ScheduleInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScheduleInterval::Daily => "daily",
            ScheduleInterval::EveryThreeDays => "every_3_days",
            ScheduleInterval::Weekly => "weekly",
            ScheduleInterval::Biweekly => "biweekly",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ScheduleInterval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ScheduleInterval::Daily),
            "every_3_days" => Ok(ScheduleInterval::EveryThreeDays),
            "weekly" => Ok(ScheduleInterval::Weekly),
            "biweekly" => Ok(ScheduleInterval::Biweekly),
            other => Err(format!("unknown schedule interval: {other}")),
        }
    }
}

/// Preferred article length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentLength {
    Short,
    #[default]
    Medium,
    Long,
    VeryLong,
}

impl ContentLength {
    /// Target word range handed to the content prompt.
    pub fn word_range(self) -> &'static str {
        match self {
            ContentLength::Short => "500-700",
            ContentLength::Medium => "1000-1500",
            ContentLength::Long => "2000-3000",
            ContentLength::VeryLong => "3000-5000",
        }
    }
}

impl std::fmt::Display for ContentLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContentLength::Short => "short",
            ContentLength::Medium => "medium",
            ContentLength::Long => "long",
            ContentLength::VeryLong => "very_long",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ContentLength {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "short" => Ok(ContentLength::Short),
            "medium" => Ok(ContentLength::Medium),
            "long" => Ok(ContentLength::Long),
            "very_long" => Ok(ContentLength::VeryLong),
            other => Err(format!("unknown content length: {other}")),
        }
    }
}

/// A content-generation persona.
///
/// Agents are created and edited outside the core; the only field the core
/// writes is `schedule_cron`, derived from the agent's schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub expertise: String,
    pub persona: Option<String>,
    pub tone: String,
    pub content_length: ContentLength,
    /// Cached 5-field cron expression; `None` means not scheduled.
    pub schedule_cron: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: &str, expertise: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            expertise: expertise.to_string(),
            persona: None,
            tone: "professional".to_string(),
            content_length: ContentLength::default(),
            schedule_cron: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Automation settings and run statistics for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub agent_id: String,
    pub interval: ScheduleInterval,
    /// Hour of publication, 0–23 UTC.
    pub publish_hour: u8,
    /// Display only; cron evaluation is always UTC.
    pub timezone: String,
    pub is_active: bool,
    pub auto_publish: bool,
    pub target_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub content_length: ContentLength,
    pub stats: RunStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(agent_id: &str, interval: ScheduleInterval, publish_hour: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            interval,
            publish_hour,
            timezone: "UTC".to_string(),
            is_active: true,
            auto_publish: true,
            target_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            content_length: ContentLength::Long,
            stats: RunStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn cron_expression(&self) -> String {
        self.interval.cron_expression(self.publish_hour)
    }

    pub fn validate(&self) -> Result<()> {
        if self.publish_hour > 23 {
            return Err(QuillError::InvalidValue {
                field: "publish_hour",
                value: self.publish_hour.to_string(),
            });
        }
        Ok(())
    }

    /// Round-robin over the target keywords, skipping excluded ones.
    ///
    /// The rotation position is `total_runs`, so consecutive runs walk the
    /// list in order.
    pub fn next_keyword(&self) -> Option<String> {
        let candidates: Vec<&String> = self
            .target_keywords
            .iter()
            .filter(|k| {
                !self
                    .exclude_keywords
                    .iter()
                    .any(|x| x.eq_ignore_ascii_case(k))
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let idx = self.stats.total_runs as usize % candidates.len();
        Some(candidates[idx].clone())
    }
}

/// Publication state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    /// Terminal; only reachable from `Draft`.
    Failed,
}

impl PostStatus {
    /// Allowed transitions: draft → scheduled → published, draft → published,
    /// draft → failed. A scheduled post may be rescheduled.
    pub fn can_transition_to(self, next: PostStatus) -> bool {
        use PostStatus::*;
        matches!(
            (self, next),
            (Draft, Scheduled)
                | (Draft, Published)
                | (Draft, Failed)
                | (Scheduled, Scheduled)
                | (Scheduled, Published)
        )
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(format!("unknown post status: {other}")),
        }
    }
}

/// Search-engine metadata attached to a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoMetadata {
    /// At most 70 characters.
    pub meta_title: String,
    /// At most 160 characters.
    pub meta_description: String,
    pub keywords: Vec<String>,
    pub readability_score: f64,
    /// keyword → percentage of total words.
    pub keyword_density: BTreeMap<String, f64>,
    pub slug: String,
}

/// A generated content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub agent_id: String,
    pub title: String,
    pub content: String,
    pub seo: SeoMetadata,
    pub tokens_used: u32,
    pub word_count: u32,
    pub status: PostStatus,
    /// First 1000 characters of the prompt that produced the content.
    pub generation_prompt: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pipeline output ready to be persisted as a draft post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub agent_id: String,
    pub title: String,
    pub content: String,
    pub seo: SeoMetadata,
    pub tokens_used: u32,
    pub word_count: u32,
    pub generation_prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_template_substitutes_hour_exactly() {
        for hour in 0..24u8 {
            assert_eq!(
                ScheduleInterval::Daily.cron_expression(hour),
                format!("0 {hour} * * *")
            );
            assert_eq!(
                ScheduleInterval::EveryThreeDays.cron_expression(hour),
                format!("0 {hour} */3 * *")
            );
            assert_eq!(
                ScheduleInterval::Weekly.cron_expression(hour),
                format!("0 {hour} * * 1")
            );
            assert_eq!(
                ScheduleInterval::Biweekly.cron_expression(hour),
                format!("0 {hour} 1,15 * *")
            );
        }
    }

    #[test]
    fn interval_serde_names_match_storage_names() {
        let json = serde_json::to_string(&ScheduleInterval::EveryThreeDays).unwrap();
        assert_eq!(json, "\"every_3_days\"");
        for interval in [
            ScheduleInterval::Daily,
            ScheduleInterval::EveryThreeDays,
            ScheduleInterval::Weekly,
            ScheduleInterval::Biweekly,
        ] {
            let parsed: ScheduleInterval = interval.to_string().parse().unwrap();
            assert_eq!(parsed, interval);
        }
    }

    #[test]
    fn publish_hour_out_of_range_is_rejected() {
        let mut schedule = Schedule::new("a1", ScheduleInterval::Daily, 10);
        assert!(schedule.validate().is_ok());
        schedule.publish_hour = 24;
        assert!(matches!(
            schedule.validate(),
            Err(QuillError::InvalidValue { field: "publish_hour", .. })
        ));
    }

    #[test]
    fn keyword_rotation_skips_excluded() {
        let mut schedule = Schedule::new("a1", ScheduleInterval::Daily, 10);
        schedule.target_keywords = vec!["rust".into(), "tokio".into(), "serde".into()];
        schedule.exclude_keywords = vec!["Tokio".into()];

        assert_eq!(schedule.next_keyword().as_deref(), Some("rust"));
        schedule.stats.total_runs = 1;
        assert_eq!(schedule.next_keyword().as_deref(), Some("serde"));
        schedule.stats.total_runs = 2;
        assert_eq!(schedule.next_keyword().as_deref(), Some("rust"));

        schedule.target_keywords.clear();
        assert!(schedule.next_keyword().is_none());
    }

    #[test]
    fn post_status_transitions_are_monotonic() {
        use PostStatus::*;
        assert!(Draft.can_transition_to(Scheduled));
        assert!(Scheduled.can_transition_to(Published));
        assert!(Draft.can_transition_to(Failed));
        assert!(!Published.can_transition_to(Scheduled));
        assert!(!Published.can_transition_to(Published));
        assert!(!Failed.can_transition_to(Draft));
        assert!(!Scheduled.can_transition_to(Failed));
    }
}
