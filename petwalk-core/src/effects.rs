use std::fmt::Display;
use std::future::Future;
use uuid::Uuid;

/// Runs a side effect whose failure must not undo the caller's state change.
/// Errors are logged and dropped.
pub async fn best_effort<F, T, E>(label: &str, booking_id: Uuid, effect: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match effect.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(%booking_id, error = %e, "{} failed, continuing", label);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_best_effort_swallows_errors() {
        let id = Uuid::new_v4();
        let ok = best_effort("ok", id, async { Ok::<_, String>(7) }).await;
        assert_eq!(ok, Some(7));
        let failed = best_effort("chat", id, async { Err::<i32, _>("down".to_string()) }).await;
        assert_eq!(failed, None);
    }
}
