//! Per-IP token-bucket behavior (spec §4.5, "Rate limiting"; §8 scenario 6),
//! exercised directly against `leaky_bucket` the way `AppState` configures
//! it, without needing a running HTTP server.

use std::time::Duration;

#[tokio::test]
async fn exceeding_points_within_duration_is_rejected() {
    let limiter = leaky_bucket::RateLimiter::builder()
        .initial(3)
        .max(3)
        .refill(3)
        .interval(Duration::from_secs(60))
        .fair(false)
        .build();

    assert!(limiter.try_acquire(1));
    assert!(limiter.try_acquire(1));
    assert!(limiter.try_acquire(1));
    assert!(!limiter.try_acquire(1), "4th request within the window should be rejected");
}
