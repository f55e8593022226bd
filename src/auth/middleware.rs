use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{extract_bearer_token, AuthError, AuthService};

/// JWT authentication middleware
pub async fn jwt_auth_middleware(
    State(auth_service): State<AuthService>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;

    let session = auth_service.validate_session(token).await?;

    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// CORS configuration for the browser front end
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Security headers middleware
pub fn security_headers_layer() -> tower_http::set_header::SetResponseHeaderLayer<axum::http::HeaderValue> {
    tower_http::set_header::SetResponseHeaderLayer::overriding(
        axum::http::header::X_CONTENT_TYPE_OPTIONS,
        axum::http::HeaderValue::from_static("nosniff"),
    )
}

/// Sliding-window limiter keyed by an arbitrary string (client IP, email, phone).
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<LimiterState>>,
    max_requests: usize,
    window: Duration,
}

#[derive(Debug)]
struct LimiterState {
    requests: HashMap<String, Vec<Instant>>,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(LimiterState {
                requests: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            max_requests,
            window,
        }
    }

    pub fn check_rate_limit(&self, key: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        let window = self.window;

        // Keys that went quiet for a whole window are dropped, at most once per window.
        if now.duration_since(state.last_sweep) >= window {
            state.requests.retain(|_, hits| {
                hits.retain(|&time| now.duration_since(time) < window);
                !hits.is_empty()
            });
            state.last_sweep = now;
        }

        let entry = state.requests.entry(key.to_string()).or_default();
        entry.retain(|&time| now.duration_since(time) < window);

        if entry.len() >= self.max_requests {
            return false;
        }

        entry.push(now);
        true
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .requests
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserRole;

    #[test]
    fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        assert!(limiter.check_rate_limit("client1"));
        assert!(limiter.check_rate_limit("client1"));
        assert!(limiter.check_rate_limit("client1"));

        assert!(!limiter.check_rate_limit("client1"));

        assert!(limiter.check_rate_limit("client2"));
    }

    #[test]
    fn test_rate_limiter_window_expires() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));

        assert!(limiter.check_rate_limit("+15550001111"));
        assert!(!limiter.check_rate_limit("+15550001111"));

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check_rate_limit("+15550001111"));
    }

    #[test]
    fn test_rate_limiter_forgets_idle_keys() {
        let limiter = RateLimiter::new(2, Duration::from_millis(20));

        for i in 0..500 {
            assert!(limiter.check_rate_limit(&format!("10.0.{}.{}", i / 256, i % 256)));
        }
        assert_eq!(limiter.tracked_keys(), 500);

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check_rate_limit("10.9.9.9"));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn test_user_role_permissions() {
        let admin = UserRole::Admin;
        let trainer = UserRole::Trainer;
        let client = UserRole::Client;

        assert!(admin.can_access(&trainer));
        assert!(admin.can_access(&client));

        assert!(trainer.can_access(&trainer));
        assert!(!trainer.can_access(&client));
        assert!(!trainer.can_access(&admin));

        assert!(client.can_access(&client));
        assert!(!client.can_access(&trainer));
    }
}
