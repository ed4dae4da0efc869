//! Judgeflow - idea/judge assignment and evaluation CLI
//!
//! The `judgeflow` command drives the review workflow against the
//! configured database. The session token selects the caller role.
//!
//! ## Commands
//!
//! - `import`: Load ideas and judges from a catalog file
//! - `assignments`: List, create, delete and lock assignments (admin)
//! - `desk`: Show the calling judge's assigned ideas
//! - `evaluate`: Open or submit an evaluation (judge)
//! - `judges` / `scoreboard`: Admin reports
//! - `file`: Resolve a submission document

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{info, Level};

use judgeflow_core::{
    gateway_from_config, AccessGuard, AssignmentApi, Caller, DeskApi, DocumentLinker, FileApi,
    FileResolution, JudgeflowConfig, ReportApi, ReviewError, EvaluationEngine, METRICS,
};
use judgeflow_state::{
    AssignmentId, Idea, IdeaId, Judge, JudgeId, ReviewStore, SurrealHandle, SurrealReviewStore,
};

#[derive(Parser)]
#[command(name = "judgeflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Idea/judge assignment and evaluation workflow", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Session token identifying the caller
    #[arg(long, global = true, env = "JUDGEFLOW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Result format on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Load ideas and judges from a catalog JSON file
    Import {
        /// File with `{"ideas": [...], "judges": [...]}`
        catalog: PathBuf,
    },

    /// List every idea
    Ideas,

    /// Judge roster with open assignment counts
    Judges,

    /// Manage assignments
    Assignments {
        #[command(subcommand)]
        action: AssignmentAction,
    },

    /// Show the calling judge's assigned ideas
    Desk,

    /// Open or submit an evaluation
    Evaluate {
        #[command(subcommand)]
        action: EvaluateAction,
    },

    /// Scores and decisions for one idea
    Scoreboard {
        idea: String,
    },

    /// Resolve a submission document
    File {
        /// Owner identifier (may be percent-encoded)
        owner: String,

        /// Filename (may be percent-encoded)
        name: String,

        /// Write the document here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AssignmentAction {
    /// List assignments for an idea
    List { idea: String },

    /// Assign judges to an idea (all or none)
    Create {
        idea: String,

        #[arg(required = true)]
        judges: Vec<String>,
    },

    /// Delete an unlocked assignment
    Delete { assignment: String },

    /// Lock an assignment
    Lock { assignment: String },
}

#[derive(Subcommand)]
enum EvaluateAction {
    /// Start working on an assignment
    Open { assignment: String },

    /// Submit ratings and a decision
    Submit {
        assignment: String,

        /// Ten comma-separated ratings in 1..=10
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        ratings: Vec<i64>,

        /// APPROVED or REJECTED
        #[arg(long)]
        decision: String,
    },
}

/// Catalog import file.
#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    ideas: Vec<Idea>,
    #[serde(default)]
    judges: Vec<Judge>,
}

/// Everything a command needs: the store, the APIs and the caller.
struct App {
    store: Arc<dyn ReviewStore>,
    caller: Caller,
    output: OutputFormat,
    assignments: AssignmentApi<dyn ReviewStore>,
    evaluations: EvaluationEngine<dyn ReviewStore>,
    desk: DeskApi<dyn ReviewStore>,
    reports: ReportApi<dyn ReviewStore>,
    files: FileApi,
}

impl App {
    fn new(
        store: Arc<dyn ReviewStore>,
        config: &JudgeflowConfig,
        caller: Caller,
        output: OutputFormat,
    ) -> Self {
        Self {
            assignments: AssignmentApi::new(store.clone(), config.retry),
            evaluations: EvaluationEngine::new(store.clone()),
            desk: DeskApi::new(
                store.clone(),
                config.retry,
                DocumentLinker::from_config(&config.files),
            ),
            reports: ReportApi::new(store.clone(), config.retry),
            files: FileApi::new(gateway_from_config(&config.files)),
            store,
            caller,
            output,
        }
    }

    /// Print `value` as JSON, or hand it to `text` for the human format.
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> Result<()> {
        match self.output {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(value).context("serialize output")?
                );
            }
            OutputFormat::Text => text(value),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    judgeflow_core::init_tracing(cli.json, level);

    let outcome = run(cli).await;
    METRICS.flush();

    if let Err(err) = outcome {
        match err.downcast_ref::<ReviewError>() {
            Some(review) => eprintln!("error: {}", review.report()),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = JudgeflowConfig::load(cli.config.as_deref())?;
    let guard = judgeflow_core::TokenAccessGuard::from_config(&config.access)?;
    let caller = guard.resolve(cli.token.as_deref()).await;

    let handle = SurrealHandle::setup_from_env(&config.database)
        .await
        .context("Failed to connect to Judgeflow database")?;
    let store: Arc<dyn ReviewStore> =
        Arc::new(SurrealReviewStore::new(&handle, config.capacity_policy()));

    let app = App::new(store, &config, caller, cli.output);
    dispatch(&app, cli.command).await
}

async fn dispatch(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Import { catalog } => cmd_import(app, &catalog).await,
        Commands::Ideas => cmd_ideas(app).await,
        Commands::Judges => cmd_judges(app).await,
        Commands::Assignments { action } => match action {
            AssignmentAction::List { idea } => cmd_assignments_list(app, &idea).await,
            AssignmentAction::Create { idea, judges } => {
                cmd_assignments_create(app, &idea, &judges).await
            }
            AssignmentAction::Delete { assignment } => {
                cmd_assignments_delete(app, &assignment).await
            }
            AssignmentAction::Lock { assignment } => cmd_assignments_lock(app, &assignment).await,
        },
        Commands::Desk => cmd_desk(app).await,
        Commands::Evaluate { action } => match action {
            EvaluateAction::Open { assignment } => cmd_evaluate_open(app, &assignment).await,
            EvaluateAction::Submit {
                assignment,
                ratings,
                decision,
            } => cmd_evaluate_submit(app, &assignment, &ratings, &decision).await,
        },
        Commands::Scoreboard { idea } => cmd_scoreboard(app, &idea).await,
        Commands::File { owner, name, out } => cmd_file(app, &owner, &name, out.as_deref()).await,
    }
}

/// Provision ideas and judges (stands in for the submission and
/// onboarding flows).
async fn cmd_import(app: &App, path: &Path) -> Result<()> {
    app.caller.require_admin()?;
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read catalog {:?}", path))?;
    let catalog: CatalogFile =
        serde_json::from_str(&content).with_context(|| format!("parse catalog {:?}", path))?;

    let (ideas, judges) = (catalog.ideas.len(), catalog.judges.len());
    for idea in catalog.ideas {
        app.store
            .put_idea(idea)
            .await
            .map_err(ReviewError::from)?;
    }
    for judge in catalog.judges {
        app.store
            .put_judge(judge)
            .await
            .map_err(ReviewError::from)?;
    }
    info!(ideas, judges, "catalog imported");
    println!("Imported {} ideas and {} judges", ideas, judges);
    Ok(())
}

async fn cmd_ideas(app: &App) -> Result<()> {
    let ideas = app.assignments.ideas(&app.caller).await?;
    app.emit(&ideas, |ideas| {
        if ideas.is_empty() {
            println!("No ideas found");
        }
        for idea in ideas {
            let cap = idea
                .max_judges
                .map(|m| m.to_string())
                .unwrap_or_else(|| "default".to_string());
            println!(
                "{}  [{}]  {}  (max judges: {}, files: {})",
                idea.id,
                idea.track,
                idea.title,
                cap,
                idea.files.len()
            );
        }
    })
}

async fn cmd_judges(app: &App) -> Result<()> {
    let roster = app.reports.roster(&app.caller).await?;
    app.emit(&roster, |roster| {
        if roster.is_empty() {
            println!("No judges found");
        }
        for entry in roster {
            let capacity = entry
                .judge
                .capacity
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{}  {}  open {}/{}  total {}{}",
                entry.judge.id,
                entry.judge.display_name,
                entry.open_assignments,
                capacity,
                entry.total_assignments,
                if entry.has_headroom() { "" } else { "  (full)" }
            );
        }
    })
}

async fn cmd_assignments_list(app: &App, idea: &str) -> Result<()> {
    let listed = app
        .assignments
        .list(&app.caller, &IdeaId::from(idea))
        .await?;
    app.emit(&listed, |listed| {
        println!(
            "Idea {}: {}/{} judges assigned",
            listed.idea_id,
            listed.assignments.len(),
            listed.max_judges
        );
        for a in &listed.assignments {
            let score = a
                .evaluation
                .as_ref()
                .map(|e| format!("  score {} {}", e.final_score, e.decision))
                .unwrap_or_default();
            println!("  {}  {}  {}{}", a.id, a.judge_id, a.label(), score);
        }
    })
}

async fn cmd_assignments_create(app: &App, idea: &str, judges: &[String]) -> Result<()> {
    let judge_ids: Vec<JudgeId> = judges.iter().map(|j| JudgeId::new(j.as_str())).collect();
    let created = app
        .assignments
        .create(&app.caller, &IdeaId::from(idea), &judge_ids)
        .await?;
    app.emit(&created, |created| {
        for a in created {
            println!("Assigned {} to {} ({})", a.judge_id, a.idea_id, a.id);
        }
    })
}

async fn cmd_assignments_delete(app: &App, assignment: &str) -> Result<()> {
    let id = AssignmentId::from(assignment);
    app.assignments.delete(&app.caller, &id).await?;
    app.emit(&serde_json::json!({ "deleted": id }), |_| {
        println!("Deleted assignment {}", id)
    })
}

async fn cmd_assignments_lock(app: &App, assignment: &str) -> Result<()> {
    let locked = app
        .assignments
        .lock(&app.caller, &AssignmentId::from(assignment))
        .await?;
    app.emit(&locked, |a| {
        let at = a
            .locked_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_default();
        println!("Locked assignment {} at {}", a.id, at);
    })
}

async fn cmd_desk(app: &App) -> Result<()> {
    let desk = app.desk.desk(&app.caller).await?;
    app.emit(&desk, |desk| {
        let s = desk.stats;
        println!(
            "Judge {}: {} total, {} pending, {} approved, {} rejected, {} locked",
            desk.judge_id, s.total, s.pending, s.approved, s.rejected, s.locked
        );
        for entry in &desk.entries {
            println!();
            println!("{}  {}", entry.assignment_id, entry.status);
            println!("    {} [{}]", entry.idea.title, entry.idea.track);
            if let Some(url) = &entry.idea.document_url {
                println!("    document: {}", url);
            }
            if let Some(e) = &entry.evaluation {
                println!(
                    "    {} score {} (average {:.1})",
                    e.decision,
                    e.final_score,
                    e.ratings.average()
                );
            }
        }
    })
}

async fn cmd_evaluate_open(app: &App, assignment: &str) -> Result<()> {
    let opened = app
        .evaluations
        .open(&app.caller, &AssignmentId::from(assignment))
        .await?;
    app.emit(&opened, |a| println!("Assignment {} is {}", a.id, a.label()))
}

async fn cmd_evaluate_submit(
    app: &App,
    assignment: &str,
    ratings: &[i64],
    decision: &str,
) -> Result<()> {
    let updated = app
        .evaluations
        .submit_decision(&app.caller, &AssignmentId::from(assignment), ratings, decision)
        .await?;
    app.emit(&updated, |a| {
        if let Some(e) = &a.evaluation {
            println!(
                "Assignment {} {}: {} with score {}",
                a.id,
                a.label(),
                e.decision,
                e.final_score
            );
        }
    })
}

async fn cmd_scoreboard(app: &App, idea: &str) -> Result<()> {
    let board = app
        .reports
        .scoreboard(&app.caller, &IdeaId::from(idea))
        .await?;
    app.emit(&board, |b| {
        println!(
            "Idea {}: {} of {} assigned reviewed (max {})",
            b.idea_id, b.reviewed, b.assigned, b.max_judges
        );
        println!("  approvals {}  rejections {}", b.approvals, b.rejections);
        match b.mean {
            Some(mean) => println!("  scores {:?}  mean {:.1}", b.scores, mean),
            None => println!("  no reviewed evaluations"),
        }
    })
}

async fn cmd_file(app: &App, owner: &str, name: &str, out: Option<&Path>) -> Result<()> {
    match app.files.view(&app.caller, owner, name).await? {
        FileResolution::Content {
            content_type,
            bytes,
        } => {
            info!(content_type, size = bytes.len(), "document resolved");
            match out {
                Some(path) => {
                    std::fs::write(path, &bytes).with_context(|| format!("write {:?}", path))?;
                    println!("Wrote {} bytes ({}) to {:?}", bytes.len(), content_type, path);
                }
                None => std::io::stdout()
                    .write_all(&bytes)
                    .context("write document to stdout")?,
            }
        }
        FileResolution::Redirect { location } => println!("{}", location),
    }
    Ok(())
}
