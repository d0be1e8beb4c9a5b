//! SMTP password loading from keychain with env-var fallback.
//!
//! These tests mutate process-global env vars and run serially.

use helpdesk_workflow::config::GlobalConfig;
use helpdesk_workflow::AppError;

const PASSWORD_ENV: &str = "HELPDESK_SMTP_PASSWORD";

fn config_with_username(username: Option<&str>) -> GlobalConfig {
    let user_line = username.map_or_else(String::new, |u| format!("username = \"{u}\"\n"));
    let toml = format!(
        "database_path = \"helpdesk.db\"\n\n[smtp]\nhost = \"localhost\"\n\
         from_address = \"helpdesk@example.com\"\n{user_line}"
    );
    GlobalConfig::from_toml_str(&toml).expect("config parses")
}

#[tokio::test]
#[serial_test::serial]
async fn env_var_supplies_password() {
    let mut config = config_with_username(Some("mailer"));
    std::env::set_var(PASSWORD_ENV, "s3cret");

    config.load_credentials().await.expect("credentials load");
    assert_eq!(config.smtp.password.as_deref(), Some("s3cret"));

    std::env::remove_var(PASSWORD_ENV);
}

#[tokio::test]
#[serial_test::serial]
async fn missing_password_is_config_error() {
    let mut config = config_with_username(Some("mailer"));
    std::env::remove_var(PASSWORD_ENV);

    let err = config.load_credentials().await.expect_err("no password");
    match err {
        AppError::Config(msg) => {
            assert!(msg.contains(PASSWORD_ENV), "message names the env var: {msg}");
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[tokio::test]
#[serial_test::serial]
async fn empty_env_var_counts_as_missing() {
    let mut config = config_with_username(Some("mailer"));
    std::env::set_var(PASSWORD_ENV, "");

    let result = config.load_credentials().await;
    assert!(matches!(result, Err(AppError::Config(_))));

    std::env::remove_var(PASSWORD_ENV);
}

#[tokio::test]
#[serial_test::serial]
async fn unauthenticated_relay_skips_lookup() {
    let mut config = config_with_username(None);
    std::env::remove_var(PASSWORD_ENV);

    config.load_credentials().await.expect("no credentials needed");
    assert!(config.smtp.password.is_none());
}
