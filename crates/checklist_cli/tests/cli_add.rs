use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

struct TestEnv {
    base: PathBuf,
    store: PathBuf,
    accounts: PathBuf,
    session: PathBuf,
    prefs: PathBuf,
}

fn test_env(name: &str) -> TestEnv {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let base = std::env::temp_dir().join(format!("checklist-{nanos}-{name}"));
    TestEnv {
        store: base.join("documents.json"),
        accounts: base.join("accounts.json"),
        session: base.join("session.json"),
        prefs: base.join("prefs.json"),
        base,
    }
}

fn checklist(env: &TestEnv, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_checklist"))
        .args(args)
        .env("CHECKLIST_STORE_PATH", &env.store)
        .env("CHECKLIST_ACCOUNTS_PATH", &env.accounts)
        .env("CHECKLIST_SESSION_PATH", &env.session)
        .env("CHECKLIST_PREFS_PATH", &env.prefs)
        .env("CHECKLIST_DISABLE_NOTIFICATIONS", "1")
        .output()
        .expect("failed to run checklist")
}

fn sign_in(env: &TestEnv) {
    assert!(
        checklist(env, &["register", "ana@example.com", "secret"])
            .status
            .success()
    );
    assert!(
        checklist(env, &["login", "ana@example.com", "secret"])
            .status
            .success()
    );
}

fn stored_tasks(env: &TestEnv) -> Vec<serde_json::Value> {
    let content = std::fs::read_to_string(&env.store).expect("store file");
    let stored: serde_json::Value = serde_json::from_str(&content).expect("store json");
    stored["collections"]["tasks"]
        .as_array()
        .cloned()
        .unwrap_or_default()
}

#[test]
fn add_requires_a_session() {
    let env = test_env("add-no-session");

    let output = checklist(&env, &["add", "Water plants"]);
    std::fs::remove_dir_all(&env.base).ok();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: authentication"));
}

#[test]
fn add_creates_daily_task_with_current_reset_time() {
    let env = test_env("add-daily");
    sign_in(&env);
    assert!(
        checklist(&env, &["prefs", "reset-time", "12:00"])
            .status
            .success()
    );

    let output = checklist(&env, &["add", "Water plants"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Added task: Water plants"));

    let tasks = stored_tasks(&env);
    std::fs::remove_dir_all(&env.base).ok();

    assert_eq!(tasks.len(), 1);
    let fields = &tasks[0]["fields"];
    assert_eq!(fields["text"], "Water plants");
    assert_eq!(fields["kind"], "daily");
    assert_eq!(fields["completed"], false);
    assert_eq!(fields["reset_time"], "12:00");
    assert!(fields["user_id"].is_string());
    assert!(fields["created_at"].is_string());
}

#[test]
fn add_monthly_task_has_no_reset_time() {
    let env = test_env("add-monthly");
    sign_in(&env);

    let output = checklist(&env, &["add", "Pay rent", "--monthly"]);
    assert!(output.status.success());

    let tasks = stored_tasks(&env);
    std::fs::remove_dir_all(&env.base).ok();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["fields"]["kind"], "monthly");
    assert_eq!(tasks[0]["fields"]["reset_time"], serde_json::Value::Null);
}

#[test]
fn add_rejects_blank_text() {
    let env = test_env("add-blank");
    sign_in(&env);

    let output = checklist(&env, &["add", "   "]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
    assert!(!env.store.exists());
    std::fs::remove_dir_all(&env.base).ok();
}

#[test]
fn add_trims_task_text() {
    let env = test_env("add-trim");
    sign_in(&env);

    let output = checklist(&env, &["add", "  Water plants  "]);
    assert!(output.status.success());

    let tasks = stored_tasks(&env);
    std::fs::remove_dir_all(&env.base).ok();

    assert_eq!(tasks[0]["fields"]["text"], "Water plants");
}

#[test]
fn add_json_outputs_the_created_task() {
    let env = test_env("add-json");
    sign_in(&env);

    let output = checklist(&env, &["--json", "add", "Water plants"]);
    std::fs::remove_dir_all(&env.base).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("json output");

    assert!(parsed["id"].is_string());
    assert_eq!(parsed["text"], "Water plants");
    assert_eq!(parsed["kind"], "daily");
    assert_eq!(parsed["completed"], false);
    OffsetDateTime::parse(
        parsed["created_at"].as_str().expect("created_at string"),
        &Rfc3339,
    )
    .expect("created_at rfc3339");
}
