mod app;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use quill_core::{Agent, ContentLength, QuillConfig, Schedule, ScheduleInterval};
use quill_scheduler::JobOutcome;
use quill_seo::{article_schema, ArticleSchemaInput};
use tracing::{info, warn};

use crate::app::App;

#[derive(Parser)]
#[command(name = "quill", about = "Scheduled blog content generation")]
struct Cli {
    /// Config file (defaults to $QUILL_CONFIG, then ~/.quill/quill.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the schedule sweep and publish timer until Ctrl-C
    Run,
    /// Run a single schedule sweep and wait for the jobs it dispatched
    Sweep,
    /// Publish every scheduled post that is due
    Publish,
    /// Generate one article for an agent now
    Generate {
        #[arg(short, long)]
        agent: String,
        #[arg(short, long)]
        topic: Option<String>,
        #[arg(short, long)]
        keyword: Option<String>,
    },
    /// Manage agents
    #[command(subcommand)]
    Agent(AgentCommand),
    /// Manage an agent's schedule
    #[command(subcommand)]
    Schedule(ScheduleCommand),
    /// Inspect and publish posts
    #[command(subcommand)]
    Post(PostCommand),
}

#[derive(Subcommand)]
enum AgentCommand {
    /// Create an agent and print its id
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        expertise: String,
        #[arg(long)]
        persona: Option<String>,
        #[arg(long, default_value = "professional")]
        tone: String,
        /// short, medium, long or very_long
        #[arg(long, default_value = "medium")]
        length: ContentLength,
    },
    Pause { id: String },
    Resume { id: String },
    /// Delete an agent with its schedule and posts
    Remove { id: String },
}

#[derive(Subcommand)]
enum ScheduleCommand {
    /// Create or update the schedule of an agent
    Set {
        #[arg(short, long)]
        agent: String,
        /// daily, every_3_days, weekly or biweekly
        #[arg(short, long)]
        interval: ScheduleInterval,
        /// Publication hour, 0-23 UTC
        #[arg(long)]
        hour: u8,
        /// Comma-separated keywords rotated across runs
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
        #[arg(long, default_value = "long")]
        length: ContentLength,
        /// Keep generated posts as drafts
        #[arg(long)]
        no_auto_publish: bool,
    },
    Show { agent: String },
    Pause { agent: String },
    Resume { agent: String },
    Remove { agent: String },
}

#[derive(Subcommand)]
enum PostCommand {
    List { agent: String },
    /// Print a post as JSON
    Show {
        id: String,
        /// Print schema.org Article markup instead
        #[arg(long)]
        schema: bool,
    },
    /// Schedule a draft for publication at an RFC 3339 time
    Schedule { id: String, at: DateTime<Utc> },
    /// Publish a post immediately
    Publish { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    // explicit path > QUILL_CONFIG env > ~/.quill/quill.toml
    let config_path = cli.config.or_else(|| std::env::var("QUILL_CONFIG").ok());
    let config = QuillConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        QuillConfig::default()
    });
    let app = App::open(config)?;

    match cli.command {
        Commands::Run => app.run().await?,
        Commands::Sweep => {
            let report = app.sweep(app.dispatcher()?).sweep_once()?;
            info!(
                checked = report.checked,
                due = report.due,
                leased = report.leased,
                errors = report.errors,
                "sweep finished, waiting for jobs"
            );
            for job in report.jobs {
                let agent_id = job.agent_id.clone();
                let outcome = job.wait().await?;
                print_outcome(&agent_id, &outcome);
            }
        }
        Commands::Publish => {
            for post in app.publisher().tick_once()? {
                println!("{}\t{}", post.id, post.title);
            }
        }
        Commands::Generate {
            agent,
            topic,
            keyword,
        } => {
            let outcome = app.dispatcher()?.submit(&agent, topic, keyword).wait().await?;
            print_outcome(&agent, &outcome);
            if !outcome.is_success() {
                bail!("generation for agent {agent} did not succeed");
            }
        }
        Commands::Agent(cmd) => agent_command(&app, cmd)?,
        Commands::Schedule(cmd) => schedule_command(&app, cmd)?,
        Commands::Post(cmd) => post_command(&app, cmd)?,
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quill_daemon=info,quill_scheduler=info,quill_pipeline=info".into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn print_outcome(agent_id: &str, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Succeeded {
            post_id, attempts, ..
        } => println!("{agent_id}\tok\t{post_id}\tattempts={attempts}"),
        JobOutcome::Failed {
            kind,
            attempts,
            error,
            ..
        } => println!("{agent_id}\tfailed ({kind})\tattempts={attempts}\t{error}"),
        JobOutcome::Skipped { reason } => println!("{agent_id}\tskipped\t{reason}"),
    }
}

fn agent_command(app: &App, cmd: AgentCommand) -> anyhow::Result<()> {
    match cmd {
        AgentCommand::Add {
            name,
            expertise,
            persona,
            tone,
            length,
        } => {
            let mut agent = Agent::new(&name, &expertise);
            agent.persona = persona;
            agent.tone = tone;
            agent.content_length = length;
            app.store.insert_agent(&agent)?;
            println!("{}", agent.id);
        }
        AgentCommand::Pause { id } => app.store.set_agent_active(&id, false)?,
        AgentCommand::Resume { id } => app.store.set_agent_active(&id, true)?,
        AgentCommand::Remove { id } => app.store.delete_agent(&id)?,
    }
    Ok(())
}

fn schedule_command(app: &App, cmd: ScheduleCommand) -> anyhow::Result<()> {
    let schedule = match cmd {
        ScheduleCommand::Set {
            agent,
            interval,
            hour,
            keywords,
            exclude,
            length,
            no_auto_publish,
        } => {
            let existing = app.store.get_schedule_for_agent(&agent)?;
            let mut schedule = existing
                .clone()
                .unwrap_or_else(|| Schedule::new(&agent, interval, hour));
            schedule.interval = interval;
            schedule.publish_hour = hour;
            schedule.target_keywords = keywords;
            schedule.exclude_keywords = exclude;
            schedule.content_length = length;
            schedule.auto_publish = !no_auto_publish;
            if existing.is_some() {
                app.store.update_schedule(&schedule)?;
            } else {
                app.store.create_schedule(&schedule)?;
            }
            schedule
        }
        ScheduleCommand::Show { agent } => app
            .store
            .get_schedule_for_agent(&agent)?
            .with_context(|| format!("agent {agent} has no schedule"))?,
        ScheduleCommand::Pause { agent } => app.store.set_schedule_active(&agent, false)?,
        ScheduleCommand::Resume { agent } => app.store.set_schedule_active(&agent, true)?,
        ScheduleCommand::Remove { agent } => {
            app.store.delete_schedule(&agent)?;
            return Ok(());
        }
    };
    println!(
        "{} at {:02}:00 UTC ({})",
        schedule.interval.label(),
        schedule.publish_hour,
        schedule.cron_expression()
    );
    println!("{}", serde_json::to_string_pretty(&schedule)?);
    Ok(())
}

fn post_command(app: &App, cmd: PostCommand) -> anyhow::Result<()> {
    let now = Utc::now();
    let post = match cmd {
        PostCommand::List { agent } => {
            for post in app.store.list_posts_for_agent(&agent)? {
                println!("{}\t{}\t{}", post.id, post.status, post.title);
            }
            return Ok(());
        }
        PostCommand::Show { id, schema } => {
            let post = app
                .store
                .get_post(&id)?
                .with_context(|| format!("post {id} not found"))?;
            if schema {
                let author = app
                    .store
                    .get_agent(&post.agent_id)?
                    .map(|a| a.name)
                    .unwrap_or_default();
                let published_at = post.published_at.map(|t| t.to_rfc3339());
                let markup = article_schema(&ArticleSchemaInput {
                    title: &post.title,
                    content: &post.content,
                    author: &author,
                    published_at: published_at.as_deref(),
                    site_name: &app.config.site.name,
                    site_url: &app.config.site.url,
                });
                println!("{}", serde_json::to_string_pretty(&markup)?);
                return Ok(());
            }
            post
        }
        PostCommand::Schedule { id, at } => app.store.schedule_post(&id, at, now)?,
        PostCommand::Publish { id } => app.store.publish_now(&id, now)?,
    };
    println!("{}", serde_json::to_string_pretty(&post)?);
    Ok(())
}
