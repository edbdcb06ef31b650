use checklist_core::auth::{CredentialGate, Identity, LocalIdentityProvider};
use checklist_core::error::AppError;
use checklist_core::model::{ResetTime, Task, TaskKind};
use checklist_core::notify::{Notifier, notifier_from_env};
use checklist_core::prefs::{JsonKeyValue, Palette, Preferences, palette_for};
use checklist_core::session::Session;
use checklist_core::store::{JsonStore, TaskStore};
use clap::{CommandFactory, Parser};
use log::warn;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;
use tabled::{Table, Tabled};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

mod cli;
mod session_file;

use cli::{Cli, Command, ListCommand, PrefsCommand, parse_on_off};

fn task_store() -> Result<TaskStore, AppError> {
    let path = JsonStore::default_path()?;
    Ok(TaskStore::new(Arc::new(JsonStore::open(&path)?)))
}

fn credential_gate() -> Result<CredentialGate, AppError> {
    let accounts = LocalIdentityProvider::default_path()?;
    Ok(CredentialGate::new(Box::new(LocalIdentityProvider::new(
        &accounts,
    ))))
}

fn preferences_store() -> Result<JsonKeyValue, AppError> {
    Ok(JsonKeyValue::new(&JsonKeyValue::default_path()?))
}

fn active_identity() -> Result<Identity, AppError> {
    session_file::load(&session_file::session_path()?)?
        .ok_or_else(|| AppError::authentication("not signed in"))
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "task")]
    text: String,
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "done")]
    done: &'static str,
    #[tabled(rename = "created")]
    created: String,
    #[tabled(rename = "reset")]
    reset: String,
}

fn task_rows(tasks: &[Task]) -> Vec<TaskRow> {
    tasks
        .iter()
        .map(|task| TaskRow {
            id: task.id.clone(),
            text: task.text.clone(),
            kind: task.kind.as_str(),
            done: if task.completed { "x" } else { "" },
            created: created_date(&task.created_at),
            reset: task.reset_time.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect()
}

fn created_date(created_at: &str) -> String {
    OffsetDateTime::parse(created_at, &Rfc3339)
        .map(|stamp| stamp.date().to_string())
        .unwrap_or_else(|_| created_at.to_string())
}

fn print_tasks_table(title: &str, tasks: &[Task], palette: &Palette) {
    println!("{}", palette.accentize(title));
    if tasks.is_empty() {
        println!("{}", palette.mutedize("(no tasks)"));
        return;
    }
    println!("{}", Table::new(task_rows(tasks)));
}

fn task_json(task: &Task) -> serde_json::Value {
    serde_json::json!({
        "id": task.id,
        "text": task.text,
        "kind": task.kind.as_str(),
        "completed": task.completed,
        "created_at": task.created_at,
        "reset_time": task.reset_time,
    })
}

fn print_task_json(task: &Task) {
    println!("{}", task_json(task));
}

fn print_tasks_json(tasks: &[Task]) {
    let payload: Vec<serde_json::Value> = tasks.iter().map(task_json).collect();
    println!("{}", serde_json::Value::Array(payload));
}

fn render_tasks(title: &str, tasks: &[Task], kv: &JsonKeyValue, json: bool) {
    if json {
        print_tasks_json(tasks);
    } else {
        let palette = palette_for(Preferences::load(kv).dark_mode);
        print_tasks_table(title, tasks, &palette);
    }
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                args.push(current.clone());
                current.clear();
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn run_prefs(command: PrefsCommand, session: Option<&Session>, json: bool) -> Result<(), AppError> {
    let kv = preferences_store()?;

    match command {
        PrefsCommand::Show => {
            let current = Preferences::load(&kv);
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "dark_mode": current.dark_mode,
                        "reset_time": current.reset_time.to_string(),
                    })
                );
            } else {
                println!("dark mode: {}", if current.dark_mode { "on" } else { "off" });
                println!("reset time: {}", current.reset_time);
            }
        }
        PrefsCommand::ResetTime { time } => {
            let parsed: ResetTime = time.parse()?;
            let mut current = Preferences::load(&kv);
            current.reset_time = parsed;
            current.save(&kv)?;
            if let Some(open) = session {
                open.set_reset_time(parsed)?;
            }
            println!("Reset time set to {parsed}");
        }
        PrefsCommand::DarkMode { state } => {
            let on = parse_on_off(&state).map_err(AppError::invalid_input)?;
            let mut current = Preferences::load(&kv);
            current.dark_mode = on;
            current.save(&kv)?;
            println!("Dark mode {}", if on { "on" } else { "off" });
        }
    }

    Ok(())
}

fn run_command(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::Register { email, password } => {
            let provider = LocalIdentityProvider::new(&LocalIdentityProvider::default_path()?);
            let identity = provider.register(&email, &password)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "user_id": identity.user_id,
                        "email": identity.email,
                    })
                );
            } else {
                println!("Registered account: {}", identity.email);
            }
        }
        Command::Login { email, password } => {
            let gate = credential_gate()?;
            let identity = gate.login(&email, &password)?;
            session_file::save(&session_file::session_path()?, &identity)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "user_id": identity.user_id,
                        "email": identity.email,
                    })
                );
            } else {
                println!("Signed in as {}", identity.email);
            }
        }
        Command::Logout => {
            let gate = credential_gate()?;
            gate.logout()?;
            session_file::clear(&session_file::session_path()?)?;
            println!("Signed out");
        }
        Command::Add { text, monthly } => {
            let identity = active_identity()?;
            let text = match text {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("task text is required")),
            };
            let kind = if monthly {
                TaskKind::Monthly
            } else {
                TaskKind::Daily
            };

            let prefs = Preferences::load(&preferences_store()?);
            let task = task_store()?.create(&text, kind, &identity.user_id, prefs.reset_time)?;
            if cli.json {
                print_task_json(&task);
            } else {
                println!("Added task: {} ({})", task.text, task.id);
            }
        }
        Command::Toggle { id } => {
            let identity = active_identity()?;
            let tasks = task_store()?;
            let task = tasks.get(&identity.user_id, &id)?;
            let completed = !task.completed;
            tasks.set_completed(&task.id, completed)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "id": task.id, "completed": completed })
                );
            } else if completed {
                println!("Completed task: {} ({})", task.text, task.id);
            } else {
                println!("Reopened task: {} ({})", task.text, task.id);
            }
        }
        Command::Delete { id } => {
            let identity = active_identity()?;
            let tasks = task_store()?;
            let task = tasks.get(&identity.user_id, &id)?;
            tasks.delete(&task.id)?;
            if cli.json {
                println!("{}", serde_json::json!({ "id": task.id, "deleted": true }));
            } else {
                println!("Deleted task: {} ({})", task.text, task.id);
            }
        }
        Command::List { list } => {
            let identity = active_identity()?;
            let tasks = task_store()?;
            let kv = preferences_store()?;

            match list.unwrap_or(ListCommand::All) {
                ListCommand::Daily => {
                    let fetched = tasks.fetch(&identity.user_id, Some(TaskKind::Daily))?;
                    render_tasks("Daily tasks", &fetched, &kv, cli.json);
                }
                ListCommand::Monthly => {
                    let fetched = tasks.fetch(&identity.user_id, Some(TaskKind::Monthly))?;
                    render_tasks("Monthly tasks", &fetched, &kv, cli.json);
                }
                ListCommand::All => {
                    let fetched = tasks.fetch(&identity.user_id, None)?;
                    if cli.json {
                        print_tasks_json(&fetched);
                    } else {
                        let (daily, monthly): (Vec<Task>, Vec<Task>) = fetched
                            .into_iter()
                            .partition(|task| task.kind == TaskKind::Daily);
                        render_tasks("Daily tasks", &daily, &kv, false);
                        render_tasks("Monthly tasks", &monthly, &kv, false);
                    }
                }
            }
        }
        Command::Prefs { prefs } => {
            run_prefs(prefs.unwrap_or(PrefsCommand::Show), None, cli.json)?;
        }
        Command::Watch => run_interactive(cli.json)?,
    }

    Ok(())
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        let mut lock = stdin.lock();
        let mut input = String::new();

        loop {
            input.clear();
            match lock.read_line(&mut input) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if sender.send(input.clone()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    receiver
}

fn drain_session(
    session: &Session,
    notifier: &dyn Notifier,
    kv: &JsonKeyValue,
    json: bool,
) -> Result<(), AppError> {
    while let Some(snapshot) = session.daily.try_next()? {
        render_tasks("Daily tasks", &snapshot, kv, json);
    }
    while let Some(snapshot) = session.monthly.try_next()? {
        render_tasks("Monthly tasks", &snapshot, kv, json);
    }
    while let Ok(outcome) = session.reset_outcomes.try_recv() {
        if let Err(err) = notifier.notify_reset(&outcome) {
            warn!("reset notification failed: {err}");
        }
    }

    Ok(())
}

fn handle_interactive_line(
    line: &str,
    gate: &CredentialGate,
    tasks: &TaskStore,
    kv: &JsonKeyValue,
    session: Option<&Session>,
    json: bool,
) -> Result<(), AppError> {
    let args = split_command_line(line)?;
    if args.is_empty() {
        return Ok(());
    }

    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push("checklist".to_string());
    argv.extend(args);
    let cli = Cli::try_parse_from(argv).map_err(normalize_parse_error)?;
    let json = json || cli.json;

    match cli.command {
        Command::Login { email, password } => {
            let identity = gate.login(&email, &password)?;
            session_file::save(&session_file::session_path()?, &identity)?;
            println!("Signed in as {}", identity.email);
        }
        Command::Logout => {
            gate.logout()?;
            session_file::clear(&session_file::session_path()?)?;
        }
        Command::Add { text, monthly } => {
            let open = session.ok_or_else(|| AppError::authentication("not signed in"))?;
            let text = match text {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("task text is required")),
            };
            let kind = if monthly {
                TaskKind::Monthly
            } else {
                TaskKind::Daily
            };

            let prefs = Preferences::load(kv);
            let task = tasks.create(&text, kind, &open.identity().user_id, prefs.reset_time)?;
            println!("Added task: {} ({})", task.text, task.id);
        }
        Command::Toggle { id } => {
            let open = session.ok_or_else(|| AppError::authentication("not signed in"))?;
            let task = tasks.get(&open.identity().user_id, &id)?;
            tasks.set_completed(&task.id, !task.completed)?;
        }
        Command::Delete { id } => {
            let open = session.ok_or_else(|| AppError::authentication("not signed in"))?;
            let task = tasks.get(&open.identity().user_id, &id)?;
            tasks.delete(&task.id)?;
        }
        Command::List { list } => {
            let open = session.ok_or_else(|| AppError::authentication("not signed in"))?;
            let kind = match list.unwrap_or(ListCommand::All) {
                ListCommand::Daily => Some(TaskKind::Daily),
                ListCommand::Monthly => Some(TaskKind::Monthly),
                ListCommand::All => None,
            };
            let fetched = tasks.fetch(&open.identity().user_id, kind)?;
            render_tasks("Tasks", &fetched, kv, json);
        }
        Command::Prefs { prefs } => {
            run_prefs(prefs.unwrap_or(PrefsCommand::Show), session, json)?;
        }
        Command::Register { .. } => {
            return Err(AppError::invalid_input(
                "register is not available inside watch",
            ));
        }
        Command::Watch => {
            return Err(AppError::invalid_input("already watching"));
        }
    }

    Ok(())
}

fn run_interactive(json: bool) -> Result<(), AppError> {
    let tasks = task_store()?;
    let gate = credential_gate()?;
    let identity_events = gate.watch_identity()?;
    let kv = preferences_store()?;
    let notifier = notifier_from_env()?;

    // Resume the persisted session, the way a provider replays its auth
    // state on startup.
    let session_path = session_file::session_path()?;
    if let Some(identity) = session_file::load(&session_path)? {
        gate.restore(identity)?;
    }

    let stdin_lines = spawn_stdin_reader();
    let mut session: Option<Session> = None;

    println!("checklist watch - type 'help' for commands, 'quit' to exit");

    loop {
        // Identity transitions are the sole trigger for opening and closing
        // the live session.
        while let Ok(event) = identity_events.try_recv() {
            match event {
                Some(identity) => {
                    let needs_open = match session.as_ref() {
                        Some(open) => open.identity().user_id != identity.user_id,
                        None => true,
                    };
                    if needs_open {
                        if let Some(open) = session.take() {
                            open.close();
                        }
                        let prefs = Preferences::load(&kv);
                        session = Some(Session::open(identity, tasks.clone(), prefs.reset_time)?);
                    }
                }
                None => {
                    if let Some(open) = session.take() {
                        open.close();
                        println!("Signed out");
                    }
                }
            }
        }

        if let Some(open) = session.as_ref()
            && let Err(err) = drain_session(open, notifier.as_ref(), &kv, json)
        {
            eprintln!("ERROR: {err}");
        }

        match stdin_lines.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
                    break;
                }
                if line == "help" || line == "?" {
                    print_help();
                    continue;
                }

                if let Err(err) =
                    handle_interactive_line(&line, &gate, &tasks, &kv, session.as_ref(), json)
                {
                    eprintln!("ERROR: {err}");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(open) = session.take() {
        open.close();
    }

    Ok(())
}

fn main() {
    let _logger = flexi_logger::Logger::try_with_env_or_str("warn")
        .and_then(|logger| logger.start())
        .ok();

    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        if let Err(err) = run_interactive(false) {
            eprintln!("ERROR: {err}");
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) {
                print!("{err}");
                return;
            }
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli) {
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}
