use super::*;

use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::default();
    assert_eq!(settings.server_url, "http://127.0.0.1:8080");
    assert_eq!(settings.thread, "all");
    let sync = settings.sync_settings();
    assert_eq!(sync.poll_interval, Duration::from_millis(1000));
    assert_eq!(sync.retry.max_attempts, 1);
}

#[test]
fn file_values_accept_strings_and_integers() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
server_url = "https://planner.example"
thread = "design"
poll_interval_ms = 250
retry_attempts = "3"
"#,
    )
    .expect("apply file");

    assert_eq!(settings.server_url, "https://planner.example");
    assert_eq!(settings.thread, "design");
    assert_eq!(settings.poll_interval_ms, 250);
    assert_eq!(settings.retry_attempts, 3);
}

#[test]
fn invalid_numbers_are_reported() {
    let mut settings = Settings::default();
    let err = apply_file(&mut settings, "retry_attempts = \"many\"").expect_err("invalid");
    assert!(err.to_string().contains("retry_attempts"), "{err}");
}

#[test]
fn app_env_overrides_legacy_env_and_file() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "server_url = \"http://file\"").expect("apply file");
    apply_env(
        &mut settings,
        env_from(&[
            ("PLANNER_SERVER_URL", "http://legacy"),
            ("APP__SERVER_URL", "http://app"),
            ("APP__RETRY_DELAY_MS", "5"),
        ]),
    )
    .expect("apply env");

    assert_eq!(settings.server_url, "http://app");
    assert_eq!(settings.retry_delay_ms, 5);
}

#[test]
fn zero_attempts_still_tries_once() {
    let settings = Settings {
        retry_attempts: 0,
        poll_interval_ms: 0,
        ..Settings::default()
    };
    let sync = settings.sync_settings();
    assert_eq!(sync.retry.max_attempts, 1);
    assert_eq!(sync.poll_interval, Duration::from_millis(1));
}

#[test]
fn loads_settings_from_file_on_disk() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("planner_config_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("planner.toml");
    fs::write(&path, "thread = \"ops\"\n").expect("write config");

    let settings = load_settings(&path).expect("load");
    assert_eq!(settings.thread, "ops");

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let settings = load_settings(Path::new("/nonexistent/planner.toml")).expect("load");
    assert_eq!(settings.poll_interval_ms, 1000);
}
