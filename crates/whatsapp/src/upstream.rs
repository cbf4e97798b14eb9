use std::{future::Future, time::Duration};

use venom_channels::ClientError;

/// Bound an upstream call made on behalf of a request.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stalled_call_times_out() {
        let result: Result<(), _> =
            bounded(Duration::from_secs(15), std::future::pending()).await;
        assert!(matches!(result, Err(ClientError::Timeout(d)) if d == Duration::from_secs(15)));
    }

    #[tokio::test]
    async fn passes_result_through() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, ClientError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
