use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

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

// Task state must survive the session boundary through the store, not
// client memory: login, add, toggle, logout, login, list.
#[test]
fn completed_task_survives_logout_and_login() {
    let env = test_env("roundtrip");

    assert!(
        checklist(&env, &["register", "ana@example.com", "secret"])
            .status
            .success()
    );
    assert!(
        checklist(&env, &["login", "ana@example.com", "secret"])
            .status
            .success()
    );

    let output = checklist(&env, &["--json", "add", "Water plants"]);
    assert!(output.status.success());
    let added: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("json output");
    let id = added["id"].as_str().expect("task id").to_string();

    assert!(checklist(&env, &["toggle", &id]).status.success());
    assert!(checklist(&env, &["logout"]).status.success());
    assert!(
        checklist(&env, &["login", "ana@example.com", "secret"])
            .status
            .success()
    );

    let output = checklist(&env, &["--json", "list", "daily"]);
    std::fs::remove_dir_all(&env.base).ok();

    assert!(output.status.success());
    let tasks: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("json output");
    let tasks = tasks.as_array().expect("task array");

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], id.as_str());
    assert_eq!(tasks[0]["text"], "Water plants");
    assert_eq!(tasks[0]["completed"], true);
}
