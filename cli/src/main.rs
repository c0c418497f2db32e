use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use blockwise_client::ApiClient;
use blockwise_core::{
    chapter_assignment, parse_config_value, render_lesson_text, resolve_shared_paths, AppConfig,
    ChapterDraft, CompileController, CompileOutcome, ConfigStore, Notification, NotificationKind,
    Notifier, SessionContext, SessionStore, SharedPaths, TabModel, TaskDraft,
};
use blockwise_observability::{emit_event, init_process_logging, ObservabilityEvent, ProcessKind};
use blockwise_types::{AssignmentAction, CodeSection, Credentials, Language, Task};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "blockwise")]
#[command(about = "BlockWise lessons, code runs and authoring from the terminal")]
struct Cli {
    /// Backend base URL for this invocation.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Compile service base URL when it is not served by the backend host.
    #[arg(long, global = true)]
    compile_url: Option<String>,
    /// Data directory holding config, session and logs.
    #[arg(long, global = true)]
    home: Option<PathBuf>,
    /// Print JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange credentials for a session token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BLOCKWISE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Logout,
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BLOCKWISE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Whoami,
    Chapters,
    /// List the tasks assigned to a chapter.
    Chapter { id: i64 },
    Tasks,
    /// Show a task's lesson and code tabs.
    Task {
        id: i64,
        /// Print the lesson markdown unrendered.
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// Submit a task's editable tab to the compile service.
    Run {
        task_id: i64,
        #[arg(long, short)]
        language: Language,
        /// Replace the editable tab's content with this file before running.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show {
        /// Print every layer separately.
        #[arg(long, default_value_t = false)]
        layers: bool,
    },
    /// Persist a value to the project config file.
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Create a task from a JSON draft file (`-` reads stdin).
    CreateTask {
        #[arg(long)]
        from: String,
    },
    CreateChapter {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        id: Option<i64>,
    },
    Assign {
        #[arg(long)]
        chapter: i64,
        #[arg(long)]
        task: i64,
    },
    Unassign {
        #[arg(long)]
        chapter: i64,
        #[arg(long)]
        task: i64,
    },
}

struct CliContext {
    client: ApiClient,
    session_store: SessionStore,
    config_store: ConfigStore,
    json: bool,
}

/// Prints run notifications as they arrive.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) -> anyhow::Result<()> {
        let mark = match notification.kind {
            NotificationKind::Success => "✓",
            NotificationKind::Failure => "✗",
        };
        let mut out = io::stdout().lock();
        writeln!(out, "{mark} {notification}")?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match &cli.home {
        Some(root) => SharedPaths::from_root(root),
        None => resolve_shared_paths()?,
    };
    let overrides = build_cli_overrides(cli.api_url.clone(), cli.compile_url.clone());
    let config_store = ConfigStore::new(&paths.project_config_path, overrides).await?;
    let config = config_store.get().await;

    let (_log_guard, log_info) =
        init_process_logging(ProcessKind::Cli, &paths.logs_dir, config.log_retention_days)?;
    tracing::debug!("cli logging initialized: {:?}", log_info);

    let session = SessionContext::new();
    let session_store = SessionStore::new(&paths.session_path);
    if let Some(stored) = session_store.load().await? {
        session.sign_in(stored);
    }

    let ctx = CliContext {
        client: ApiClient::new(&config, session)?,
        session_store,
        config_store,
        json: cli.json,
    };

    match cli.command {
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt("Password: ")?,
            };
            let session = ctx.client.sign_in(&Credentials { email, password }).await?;
            ctx.session_store.save(&session).await?;
            println!(
                "Signed in as {} ({:?}), session valid until {}",
                session.email,
                session.role,
                session.expires_at.format("%Y-%m-%d %H:%M UTC")
            );
        }
        Command::Logout => {
            ctx.client.sign_out();
            ctx.session_store.clear().await?;
            println!("Signed out.");
        }
        Command::Register { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt("Choose a password: ")?,
            };
            ctx.client
                .sign_up(&Credentials {
                    email: email.clone(),
                    password,
                })
                .await?;
            println!("Account created for {email}. Sign in with `blockwise login --email {email}`.");
        }
        Command::Whoami => match ctx.client.session().current() {
            Some(session) if ctx.json => print_json(&serde_json::json!({
                "user_id": session.user_id,
                "email": session.email,
                "role": session.role,
                "expires_at": session.expires_at,
            }))?,
            Some(session) => println!(
                "{} (user {}, role {:?}, expires {})",
                session.email,
                session.user_id,
                session.role,
                session.expires_at.format("%Y-%m-%d %H:%M UTC")
            ),
            None => println!("Not signed in."),
        },
        Command::Chapters => {
            let chapters = ctx.client.list_chapters().await?;
            if ctx.json {
                print_json(&chapters)?;
            } else {
                for chapter in &chapters {
                    print_row(chapter.id, &chapter.title, &chapter.description);
                }
            }
        }
        Command::Chapter { id } => {
            let tasks = ctx.client.chapter_tasks(id).await?;
            if ctx.json {
                print_json(&tasks)?;
            } else if tasks.is_empty() {
                println!("Chapter {id} has no tasks.");
            } else {
                for task in &tasks {
                    print_row(task.id, &task.title, &task.description);
                }
            }
        }
        Command::Tasks => {
            let tasks = ctx.client.list_tasks().await?;
            if ctx.json {
                print_json(&tasks)?;
            } else {
                for task in &tasks {
                    print_row(task.id, &task.title, &task.description);
                }
            }
        }
        Command::Task { id, raw } => {
            let task = ctx.client.get_task(id).await?;
            if ctx.json {
                print_json(&task)?;
            } else {
                print!("{}", format_task(&task, raw));
            }
        }
        Command::Run {
            task_id,
            language,
            file,
        } => run_task(&ctx, task_id, language, file.as_deref()).await?,
        Command::Config { command } => match command {
            ConfigCommand::Show { layers } => {
                if layers {
                    print_json(&ctx.config_store.get_layers_value().await)?;
                } else {
                    print_json(&ctx.config_store.get().await)?;
                }
            }
            ConfigCommand::Set { key, value } => {
                let value = parse_config_value(&value);
                let effective = ctx.config_store.get_effective_value().await;
                let patch = validate_config_patch(&effective, &key, value)?;
                ctx.config_store.patch_project(patch).await?;
                println!(
                    "Saved `{key}` to {}",
                    ctx.config_store.project_path().display()
                );
            }
        },
        Command::Admin { command } => run_admin(&ctx, command).await?,
    }

    Ok(())
}

async fn run_task(
    ctx: &CliContext,
    task_id: i64,
    language: Language,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let task = ctx.client.get_task(task_id).await?;
    if task.is_text_only() {
        anyhow::bail!("task {task_id} is a text-only lesson; there is no code to run");
    }

    let mut tabs = TabModel::from_section(task.section(language));
    if tabs.current_tab().name.is_empty() {
        anyhow::bail!(
            "task {task_id} has no {} editor tab",
            language.display_name()
        );
    }
    if let Some(path) = file {
        let code = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        tabs.edit_content(code);
    }

    let submission = tabs.submission();
    info!(
        task_id,
        language = language.as_str(),
        tab = submission.tab_name.as_str(),
        "submitting"
    );
    let controller =
        CompileController::new(Arc::new(ctx.client.clone()), Arc::new(ConsoleNotifier));
    let outcome = controller
        .run(submission, language, task_id.to_string())
        .await;

    match outcome {
        CompileOutcome::Succeeded => Ok(()),
        CompileOutcome::Rejected { body } => {
            if !body.trim().is_empty() {
                eprintln!("{}", body.trim_end());
            }
            anyhow::bail!("compilation failed")
        }
        CompileOutcome::TransportFailed { error } => {
            anyhow::bail!("compile request failed: {error}")
        }
    }
}

async fn run_admin(ctx: &CliContext, command: AdminCommand) -> anyhow::Result<()> {
    match command {
        AdminCommand::CreateTask { from } => {
            let draft = read_task_draft(&from)?;
            let request = draft.build()?;
            ctx.client.create_task(&request).await?;
            emit_event(
                tracing::Level::INFO,
                ProcessKind::Cli,
                ObservabilityEvent {
                    event: "admin.task.created",
                    component: "cli.admin",
                    status: Some("ok"),
                    detail: Some(request.title.as_str()),
                    ..Default::default()
                },
            );
            println!("Created task \"{}\".", request.title);
        }
        AdminCommand::CreateChapter {
            title,
            description,
            id,
        } => {
            let request = ChapterDraft {
                id,
                title,
                description,
            }
            .build()?;
            ctx.client.create_chapter(&request).await?;
            println!("Created chapter \"{}\".", request.title);
        }
        AdminCommand::Assign { chapter, task } => {
            let request = chapter_assignment(chapter, task, AssignmentAction::Add);
            ctx.client.change_chapter_assignment(&request).await?;
            println!("Added task {task} to chapter {chapter}.");
        }
        AdminCommand::Unassign { chapter, task } => {
            let request = chapter_assignment(chapter, task, AssignmentAction::Remove);
            ctx.client.change_chapter_assignment(&request).await?;
            println!("Removed task {task} from chapter {chapter}.");
        }
    }
    Ok(())
}

fn build_cli_overrides(api_url: Option<String>, compile_url: Option<String>) -> Option<Value> {
    if api_url.is_none() && compile_url.is_none() {
        return None;
    }
    let mut root = serde_json::Map::new();
    if let Some(url) = api_url {
        root.insert("api_url".to_string(), Value::String(url));
    }
    if let Some(url) = compile_url {
        root.insert("compile_url".to_string(), Value::String(url));
    }
    Some(Value::Object(root))
}

/// Checks that `key` names a config field and that the merged result still
/// parses, then returns the patch to persist.
fn validate_config_patch(effective: &Value, key: &str, value: Value) -> anyhow::Result<Value> {
    let known = serde_json::to_value(AppConfig::default())?;
    let Some(fields) = known.as_object() else {
        anyhow::bail!("config defaults are not an object");
    };
    if !fields.contains_key(key) {
        let mut names = fields.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        anyhow::bail!("unknown config key `{key}`. known keys: {}", names.join(", "));
    }

    let mut candidate = effective.clone();
    if let Some(map) = candidate.as_object_mut() {
        map.insert(key.to_string(), value.clone());
    }
    serde_json::from_value::<AppConfig>(candidate)
        .with_context(|| format!("invalid value for `{key}`"))?;

    let mut patch = serde_json::Map::new();
    patch.insert(key.to_string(), value);
    Ok(Value::Object(patch))
}

fn read_task_draft(input: &str) -> anyhow::Result<TaskDraft> {
    let raw = if input.trim() == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        let path = input.strip_prefix('@').unwrap_or(input);
        std::fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?
    };
    serde_json::from_str(&raw).context("task draft is not valid JSON")
}

fn prompt(label: &str) -> anyhow::Result<String> {
    let mut err = io::stderr().lock();
    write!(err, "{label}")?;
    err.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_row(id: i64, title: &str, description: &str) {
    if description.is_empty() {
        println!("{id:>5}  {title}");
    } else {
        println!("{id:>5}  {title} - {description}");
    }
}

fn format_task(task: &Task, raw: bool) -> String {
    let mut out = format!("{}\n", task.title);
    if !task.description.is_empty() {
        out.push_str(&format!("{}\n", task.description));
    }
    out.push('\n');
    if raw {
        out.push_str(task.text.trim_end());
    } else {
        out.push_str(&render_lesson_text(&task.text));
    }
    out.push_str("\n\n");

    if task.is_text_only() {
        out.push_str("Text-only lesson.\n");
        return out;
    }
    out.push_str("Code:\n");
    for language in Language::ALL {
        if let Some(line) = describe_section(task.section(language)) {
            out.push_str(&format!("  {:<9} {line}\n", language.display_name()));
        }
    }
    out
}

fn describe_section(section: &CodeSection) -> Option<String> {
    if section.current_tab.name.is_empty() {
        return None;
    }
    let mut line = format!("{} (editable)", section.current_tab.name);
    if !section.tabs.is_empty() {
        let refs = section
            .tabs
            .iter()
            .map(|tab| tab.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!(", read-only: {refs}"));
    }
    Some(line)
}
