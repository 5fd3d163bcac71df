//! Interval cycling request loop.
//!
//! The driver visits the intervals of its schedule in order, one window at a time.
//! Within a window it sends one GET request to the target, sleeps for the
//! window's interval and repeats, until the window duration has elapsed.
//! Requests are strictly sequential and a failed attempt never stops the loop.

use std::{pin::pin, time::Duration};

use rama::{
    Service,
    error::OpaqueError,
    http::{Body, HeaderValue, Request, Response, Uri, header::USER_AGENT},
    telemetry::tracing,
};
use tokio::time::{Instant, sleep, timeout};

use crate::{config::DriverConfig, utils};

mod cursor;
mod outcome;

pub use self::{
    cursor::ScheduleCursor,
    outcome::{AttemptOutcome, DriverReport},
};

#[derive(Debug)]
pub struct LoadDriver<S> {
    client: S,
    target: Uri,
    cursor: ScheduleCursor,
    window: Duration,
    request_timeout: Option<Duration>,
    max_windows: Option<u64>,
    report: DriverReport,
}

impl<S> LoadDriver<S>
where
    S: Service<Request, Output = Response, Error = OpaqueError>,
{
    pub fn new(cfg: DriverConfig, client: S) -> Self {
        let max_windows = cfg
            .cycles
            .map(|cycles| cycles.get().saturating_mul(cfg.schedule.len() as u64));

        Self {
            client,
            target: cfg.target,
            cursor: ScheduleCursor::new(cfg.schedule),
            window: cfg.window,
            request_timeout: cfg.request_timeout,
            max_windows,
            report: DriverReport::default(),
        }
    }

    /// Drive load until `cancelled` resolves,
    /// or until all configured cycles are completed.
    ///
    /// Cancellation is observed while a request is in flight
    /// as well as while sleeping between requests.
    pub async fn run<F>(mut self, cancelled: F) -> DriverReport
    where
        F: Future,
    {
        tracing::info!(
            url = %self.target,
            schedule.len = self.cursor.schedule().len(),
            window = %humantime::format_duration(self.window),
            request_timeout = ?self.request_timeout,
            max_windows = ?self.max_windows,
            "load driver started",
        );

        let mut cancelled = pin!(cancelled);

        loop {
            if self
                .max_windows
                .is_some_and(|max| self.report.windows >= max)
            {
                tracing::info!("all cycles completed");
                break;
            }

            let interrupted = tokio::select! {
                biased;

                _ = cancelled.as_mut() => true,
                _ = self.run_window() => false,
            };

            if interrupted {
                tracing::info!(
                    cursor = self.cursor.position(),
                    "load driver cancelled"
                );
                break;
            }
        }

        let DriverReport {
            windows,
            attempts,
            ok,
            http_fail,
            other_fail,
        } = self.report;
        tracing::info!(
            windows,
            attempts,
            ok,
            http_fail,
            other_fail,
            "load driver stopped"
        );

        self.report
    }

    async fn run_window(&mut self) {
        let index = self.cursor.position();
        let interval = self.cursor.advance();

        tracing::info!(
            schedule.index = index,
            "using interval {} for the next {}",
            humantime::format_duration(interval),
            humantime::format_duration(self.window),
        );

        let window_end = window_deadline(Instant::now(), self.window);
        while Instant::now() < window_end {
            let attempt_start = Instant::now();
            let outcome = self.attempt().await;
            outcome.log(self.report.attempts, attempt_start.elapsed());
            self.report.record(&outcome);

            sleep(interval).await;
        }

        self.report.windows += 1;
    }

    async fn attempt(&self) -> AttemptOutcome {
        let req = self.new_request();

        let result = match self.request_timeout {
            Some(limit) => match timeout(limit, self.client.serve(req)).await {
                Ok(result) => result,
                Err(_) => return AttemptOutcome::TimedOut(limit),
            },
            None => self.client.serve(req).await,
        };

        match result {
            Ok(resp) => AttemptOutcome::from_status(resp.status()),
            Err(err) => AttemptOutcome::Failed(err),
        }
    }

    fn new_request(&self) -> Request {
        let mut req = Request::new(Body::empty());
        *req.uri_mut() = self.target.clone();
        req.headers_mut().insert(
            USER_AGENT,
            HeaderValue::from_static(utils::env::user_agent()),
        );
        req
    }
}

/// End of a window starting at `start`,
/// capped to a far-future instant when the window is too large to represent.
fn window_deadline(start: Instant, window: Duration) -> Instant {
    start
        .checked_add(window)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

// roughly 30 years
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[cfg(test)]
mod tests {
    use std::{
        num::NonZeroU64,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use parking_lot::Mutex;
    use rama::{
        http::{StatusCode, service::web::response::IntoResponse},
        service::service_fn,
        telemetry::tracing,
    };
    use tracing_test::traced_test;

    use super::*;
    use crate::config::IntervalSchedule;

    fn config(intervals: &[f64], window_secs: u64, cycles: Option<u64>) -> DriverConfig {
        DriverConfig {
            target: Uri::from_static("http://127.0.0.1:8080/load"),
            schedule: IntervalSchedule::try_from_secs(intervals).unwrap(),
            window: Duration::from_secs(window_secs),
            request_timeout: Some(Duration::from_secs(2)),
            cycles: cycles.and_then(NonZeroU64::new),
        }
    }

    /// Client answering 200 OK instantly, recording when each request was received.
    fn recording_client(
        hits: Arc<Mutex<Vec<Instant>>>,
    ) -> impl Service<Request, Output = Response, Error = OpaqueError> {
        service_fn(move |req: Request| {
            let hits = hits.clone();
            async move {
                assert_eq!(req.uri(), "http://127.0.0.1:8080/load");
                hits.lock().push(Instant::now());
                Ok::<_, OpaqueError>(StatusCode::OK.into_response())
            }
        })
    }

    fn offsets_in_secs(start: Instant, hits: &[Instant]) -> Vec<f64> {
        hits.iter()
            .map(|hit| hit.duration_since(start).as_secs_f64())
            .collect()
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn one_second_interval_sends_five_requests_per_five_second_window() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let driver = LoadDriver::new(config(&[1.], 5, Some(1)), recording_client(hits.clone()));

        let start = Instant::now();
        let report = driver.run(std::future::pending::<()>()).await;

        assert_eq!(report.windows, 1);
        assert_eq!(report.attempts, 5);
        assert_eq!(report.ok, 5);

        let offsets = offsets_in_secs(start, &hits.lock());
        assert_eq!(offsets.len(), 5);
        for (expected, offset) in offsets.iter().enumerate() {
            assert_eq!(offset.trunc() as usize, expected, "offsets: {offsets:?}");
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn full_cycle_request_count_follows_schedule() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let driver = LoadDriver::new(
            config(&[0.01, 0.1, 0.5, 1.0], 5, Some(1)),
            recording_client(hits.clone()),
        );

        let start = Instant::now();
        let report = driver.run(std::future::pending::<()>()).await;
        assert_eq!(report.windows, 4);

        let offsets = offsets_in_secs(start, &hits.lock());
        let mut per_window = [0u64; 4];
        for offset in &offsets {
            let window = (*offset / 5.).floor() as usize;
            assert!(window < 4, "request outside of cycle at {offset}s");
            per_window[window] += 1;
        }

        for (count, expected) in per_window.iter().zip([500u64, 50, 10, 5]) {
            assert!(
                count.abs_diff(expected) <= 1,
                "per window: {per_window:?}, expected ~{expected}",
            );
        }
        assert_eq!(report.attempts, per_window.iter().sum::<u64>());
        assert!((561..=565).contains(&report.attempts), "{report:?}");
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn cycles_repeat_schedule_in_order() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let driver = LoadDriver::new(config(&[1., 2.5], 5, Some(2)), recording_client(hits.clone()));

        let start = Instant::now();
        let report = driver.run(std::future::pending::<()>()).await;
        assert_eq!(report.windows, 4);

        // 1s: 0..5, 2.5s: 5, 7.5, 1s: 10..15, 2.5s: 15, 17.5
        let offsets = offsets_in_secs(start, &hits.lock());
        assert_eq!(
            offsets,
            vec![0., 1., 2., 3., 4., 5., 7.5, 10., 11., 12., 13., 14., 15., 17.5]
        );
    }

    #[traced_test]
    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn failed_attempt_does_not_stop_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = service_fn({
            let calls = calls.clone();
            move |_req: Request| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n == 3 {
                        Err(OpaqueError::from_display("connection refused"))
                    } else {
                        Ok(StatusCode::OK.into_response())
                    }
                }
            }
        });

        let report = LoadDriver::new(config(&[1., 0.5], 5, Some(1)), client)
            .run(std::future::pending::<()>())
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 15);
        assert_eq!(
            report,
            DriverReport {
                windows: 2,
                attempts: 15,
                ok: 14,
                http_fail: 0,
                other_fail: 1,
            }
        );

        assert!(logs_contain("sent request. response: 200 OK"));
        assert!(logs_contain("failed to send request: connection refused"));
        assert!(logs_contain("using interval 500ms for the next 5s"));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn huge_window_runs_until_cancelled() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let mut cfg = config(&[1.], 5, None);
        cfg.window = Duration::from_secs_f64(1e19);

        let report = LoadDriver::new(cfg, recording_client(hits.clone()))
            .run(sleep(Duration::from_millis(3500)))
            .await;

        assert_eq!(report.windows, 0);
        assert_eq!(report.attempts, 4);
        assert_eq!(hits.lock().len(), 4);
    }

    #[test]
    fn window_deadline_saturates() {
        let start = Instant::now();
        assert_eq!(
            window_deadline(start, Duration::from_secs(5)),
            start + Duration::from_secs(5)
        );
        assert!(window_deadline(start, Duration::MAX) > start + Duration::from_secs(86400 * 365));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn error_status_is_reported_but_not_fatal() {
        let client = service_fn(async |_req: Request| {
            Ok::<_, OpaqueError>(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        });

        let report = LoadDriver::new(config(&[1.], 5, Some(1)), client)
            .run(std::future::pending::<()>())
            .await;

        assert_eq!(report.attempts, 5);
        assert_eq!(report.http_fail, 5);
        assert_eq!(report.windows, 1);
    }

    #[traced_test]
    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn hanging_request_is_bounded_by_timeout() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let client = service_fn({
            let hits = hits.clone();
            move |_req: Request| {
                let hits = hits.clone();
                async move {
                    let n = {
                        let mut hits = hits.lock();
                        hits.push(Instant::now());
                        hits.len()
                    };
                    if n == 2 {
                        std::future::pending::<()>().await;
                    }
                    Ok::<_, OpaqueError>(StatusCode::OK.into_response())
                }
            }
        });

        let start = Instant::now();
        let report = LoadDriver::new(config(&[1.], 5, Some(1)), client)
            .run(std::future::pending::<()>())
            .await;

        // t=0 ok, t=1 hangs until the 2s timeout, t=4 ok, window ends at t=5
        assert_eq!(offsets_in_secs(start, &hits.lock()), vec![0., 1., 4.]);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.other_fail, 1);
        assert_eq!(report.windows, 1);

        tracing::info!("hanging request test finished");
        assert!(logs_contain("timed out after 2s"));
        assert!(logs_contain("using interval 1s for the next 5s"));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn cancellation_stops_an_endless_run() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let driver = LoadDriver::new(config(&[1.], 5, None), recording_client(hits.clone()));

        let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            sleep(Duration::from_millis(6500)).await;
            let _ = cancel_tx.send(());
        });

        let report = driver
            .run(async move {
                let _ = cancel_rx.await;
            })
            .await;

        // second window got interrupted while sleeping after its second request
        assert_eq!(report.windows, 1);
        assert_eq!(report.attempts, 7);
        assert_eq!(hits.lock().len(), 7);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn cancellation_interrupts_in_flight_request() {
        let client = service_fn(async |_req: Request| {
            std::future::pending::<()>().await;
            Ok::<_, OpaqueError>(StatusCode::OK.into_response())
        });

        let mut cfg = config(&[1.], 5, None);
        cfg.request_timeout = None;

        let report = LoadDriver::new(cfg, client)
            .run(sleep(Duration::from_secs(30)))
            .await;

        assert_eq!(report, DriverReport::default());
    }
}
