use std::time::Duration;

use tokio::time::sleep;

/// Cooperative throttle between outbound requests. A zero delay returns immediately.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn waits_at_least_the_delay() {
        let delay = Duration::from_millis(20);
        let start = Instant::now();
        pause(delay).await;
        assert!(start.elapsed() >= delay);
    }

    #[tokio::test]
    async fn zero_delay_is_immediate() {
        let start = Instant::now();
        pause(Duration::ZERO).await;
        assert!(start.elapsed() < Duration::from_millis(20));
    }
}
