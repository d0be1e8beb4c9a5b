use axum::http::StatusCode;
use axum::response::IntoResponse;

use helpdesk_workflow::AppError;

#[test]
fn display_uses_kind_prefix() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Db("locked".into()), "db: locked"),
        (AppError::NotFound("ticket t1".into()), "not found: ticket t1"),
        (AppError::NotAuthorized("client".into()), "not authorized: client"),
        (AppError::TicketFinalized("closed".into()), "ticket finalized: closed"),
        (AppError::AwaitingApproval("t1".into()), "awaiting approval: t1"),
        (AppError::InvalidTransition("x".into()), "invalid transition: x"),
        (AppError::InvalidState("y".into()), "invalid state: y"),
        (AppError::StateNotFound("z".into()), "state not found: z"),
        (AppError::Delivery("queue full".into()), "delivery: queue full"),
        (AppError::Io("bind".into()), "io: bind"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn messages_have_no_trailing_period() {
    let err = AppError::InvalidTransition("trial cannot move to closed".into());
    assert!(!err.to_string().ends_with('.'));
}

#[test]
fn kind_is_snake_case() {
    assert_eq!(AppError::TicketFinalized(String::new()).kind(), "ticket_finalized");
    assert_eq!(AppError::AwaitingApproval(String::new()).kind(), "awaiting_approval");
    assert_eq!(AppError::NotAuthorized(String::new()).kind(), "not_authorized");
}

#[test]
fn sqlx_errors_map_to_db() {
    let err: AppError = sqlx::Error::RowNotFound.into();
    assert!(matches!(err, AppError::Db(_)));
}

#[test]
fn toml_errors_map_to_config() {
    let parse_err = toml::from_str::<toml::Value>("a = [").expect_err("invalid toml");
    let err: AppError = parse_err.into();
    assert!(matches!(err, AppError::Config(msg) if msg.starts_with("invalid config")));
}

#[test]
fn http_status_mapping() {
    let cases = [
        (AppError::NotFound(String::new()), StatusCode::NOT_FOUND),
        (AppError::NotAuthorized(String::new()), StatusCode::FORBIDDEN),
        (AppError::TicketFinalized(String::new()), StatusCode::CONFLICT),
        (AppError::AwaitingApproval(String::new()), StatusCode::CONFLICT),
        (AppError::InvalidTransition(String::new()), StatusCode::CONFLICT),
        (AppError::InvalidState(String::new()), StatusCode::CONFLICT),
        (AppError::Db(String::new()), StatusCode::INTERNAL_SERVER_ERROR),
        (AppError::StateNotFound(String::new()), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
        assert_eq!(err.into_response().status(), status);
    }
}
