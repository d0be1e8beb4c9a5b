use std::time::Duration;

use helpdesk_workflow::config::DeliveryConfig;
use helpdesk_workflow::notify::delivery::RetryPolicy;
use helpdesk_workflow::notify::OutgoingEmail;

#[test]
fn default_backoff_doubles_from_two_seconds() {
    let policy = RetryPolicy::from_config(&DeliveryConfig::default());
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.backoff(1), Duration::from_secs(2));
    assert_eq!(policy.backoff(2), Duration::from_secs(4));
    assert_eq!(policy.backoff(3), Duration::from_secs(8));
    assert_eq!(policy.attempt_timeout, Duration::from_secs(30));
}

#[test]
fn backoff_saturates_instead_of_overflowing() {
    let policy = RetryPolicy::from_config(&DeliveryConfig::default());
    assert!(policy.backoff(200) >= policy.backoff(3));
}

#[test]
fn plain_only_drops_html() {
    let email = OutgoingEmail {
        to: "a@example.com".into(),
        subject: "s".into(),
        html_body: Some("<p>hi</p>".into()),
        text_body: "hi".into(),
    };
    let plain = email.plain_only();
    assert!(plain.html_body.is_none());
    assert_eq!(plain.text_body, "hi");
    assert_eq!(plain.to, email.to);
}
