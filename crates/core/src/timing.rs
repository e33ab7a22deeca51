use std::future::Future;
use std::time::{Duration, Instant};

use tracing::debug;

/// 执行异步操作并返回其结果与耗时
pub async fn timed<F>(operation_name: &str, future: F) -> (F::Output, Duration)
where
    F: Future,
{
    let started = Instant::now();
    let output = future.await;
    let elapsed = started.elapsed();
    debug!(
        event = "operation_timed",
        operation = operation_name,
        duration_ms = elapsed.as_millis() as u64,
        "{} 耗时 {:?}",
        operation_name,
        elapsed
    );
    (output, elapsed)
}
