//! 重试选项与错误分类测试

use flare_grpc_retry::{
    CallOption, ContextError, DEFAULT_RETRIABLE_CODES, Linear, RetryCallOption, RetryError,
    RetryOption, is_context_error, is_retriable, split_call_options,
};
use std::time::Duration;
use tonic::{Code, Status};

#[test]
fn default_option_disables_retry() {
    let option = RetryOption::default();
    assert_eq!(option.max_attempts(), 0);
    assert!(option.is_disabled());
    assert_eq!(option.per_attempt_timeout(), Duration::ZERO);
    assert_eq!(option.codes(), &DEFAULT_RETRIABLE_CODES);

    // 默认退避为 50ms ± 10%
    for attempt in 1..50 {
        let d = option.backoff_duration(attempt);
        assert!(d >= Duration::from_millis(45) && d <= Duration::from_millis(55));
    }
}

#[test]
fn merge_applies_overrides_in_order_without_touching_base() {
    let base = RetryOption::default();
    let merged = base.merge(&[
        RetryCallOption::with_max(5),
        RetryCallOption::with_codes([Code::Aborted]),
        RetryCallOption::with_per_retry_timeout(Duration::from_millis(300)),
        RetryCallOption::with_backoff(Linear::new(Duration::from_secs(2))),
        RetryCallOption::with_max(3),
    ]);

    assert_eq!(merged.max_attempts(), 3);
    assert_eq!(merged.codes(), &[Code::Aborted]);
    assert_eq!(merged.per_attempt_timeout(), Duration::from_millis(300));
    assert_eq!(merged.backoff_duration(7), Duration::from_secs(2));

    assert_eq!(base.max_attempts(), 0);
    assert_eq!(base.codes(), &DEFAULT_RETRIABLE_CODES);
    assert_eq!(base.per_attempt_timeout(), Duration::ZERO);
}

#[test]
fn disable_is_max_zero() {
    let base = RetryOption::default().merge(&[RetryCallOption::with_max(4)]);
    let disabled = base.merge(&[RetryCallOption::with_disable()]);
    assert!(disabled.is_disabled());
    assert_eq!(base.max_attempts(), 4);
}

#[test]
fn custom_override_runs_against_copy() {
    let base = RetryOption::default();
    let merged = base.merge(&[RetryCallOption::custom(|opt| {
        let mut codes = opt.codes().to_vec();
        codes.push(Code::Internal);
        opt.set_codes(codes);
    })]);
    assert!(merged.codes().contains(&Code::Internal));
    assert!(!base.codes().contains(&Code::Internal));
}

#[test]
fn split_strips_retry_options() {
    let (transport, retry) = split_call_options(vec![
        CallOption::Timeout(Duration::from_secs(1)),
        RetryCallOption::with_max(2).into(),
        CallOption::MaxResponseSize(1024),
        CallOption::Retry(RetryCallOption::with_disable()),
    ]);

    assert_eq!(transport.len(), 2);
    assert!(matches!(transport[0], CallOption::Timeout(_)));
    assert!(matches!(transport[1], CallOption::MaxResponseSize(1024)));
    assert_eq!(retry.len(), 2);
    assert!(RetryOption::default().merge(&retry).is_disabled());
}

#[test]
fn context_errors_are_never_retriable() {
    let option = RetryOption::default().merge(&[RetryCallOption::with_codes([
        Code::DeadlineExceeded,
        Code::Cancelled,
        Code::Unavailable,
    ])]);

    assert!(is_context_error(&Status::deadline_exceeded("slow")));
    assert!(is_context_error(&Status::cancelled("gone")));
    assert!(is_context_error(&ContextError::Canceled));
    assert!(!is_retriable(&Status::deadline_exceeded("slow"), &option));
    assert!(!is_retriable(&ContextError::DeadlineExceeded, &option));
    assert!(is_retriable(&Status::unavailable("down"), &option));
}

#[test]
fn retriable_follows_code_set() {
    let option = RetryOption::default();
    assert!(is_retriable(&Status::unavailable("down"), &option));
    assert!(is_retriable(&Code::ResourceExhausted, &option));
    assert!(!is_retriable(&Status::invalid_argument("bad"), &option));
    assert!(!is_retriable(&RetryError::invalid_config("bad"), &option));
}

#[test]
fn context_error_maps_to_status() {
    let status: Status = ContextError::DeadlineExceeded.into();
    assert_eq!(status.code(), Code::DeadlineExceeded);
    let status: Status = ContextError::Canceled.into();
    assert_eq!(status.code(), Code::Cancelled);
}
