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

#[test]
fn register_then_login_establishes_session() {
    let env = test_env("auth-login");

    let output = checklist(&env, &["register", "ana@example.com", "secret"]);
    assert!(output.status.success());

    let output = checklist(&env, &["login", "ana@example.com", "secret"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Signed in as ana@example.com"));

    let session = std::fs::read_to_string(&env.session).expect("session file");
    std::fs::remove_dir_all(&env.base).ok();
    assert!(session.contains("ana@example.com"));
}

#[test]
fn login_with_wrong_password_fails() {
    let env = test_env("auth-wrong");
    checklist(&env, &["register", "ana@example.com", "secret"]);

    let output = checklist(&env, &["login", "ana@example.com", "nope"]);
    std::fs::remove_dir_all(&env.base).ok();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: authentication"));
}

#[test]
fn login_with_unknown_account_fails() {
    let env = test_env("auth-unknown");

    let output = checklist(&env, &["login", "nobody@example.com", "secret"]);
    std::fs::remove_dir_all(&env.base).ok();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: authentication"));
}

#[test]
fn logout_clears_the_session() {
    let env = test_env("auth-logout");
    checklist(&env, &["register", "ana@example.com", "secret"]);
    checklist(&env, &["login", "ana@example.com", "secret"]);

    let output = checklist(&env, &["logout"]);
    assert!(output.status.success());
    assert!(!env.session.exists());

    let output = checklist(&env, &["add", "Water plants"]);
    std::fs::remove_dir_all(&env.base).ok();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: authentication"));
}

#[test]
fn register_rejects_duplicate_email() {
    let env = test_env("auth-duplicate");
    checklist(&env, &["register", "ana@example.com", "secret"]);

    let output = checklist(&env, &["register", "ana@example.com", "other"]);
    std::fs::remove_dir_all(&env.base).ok();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}
