use std::{cell::Cell, rc::Rc, time::Duration};

use assert_call::{call, CallRecorder};
use tokio::{task::LocalSet, time::sleep};

use super::*;
use crate::AsyncValue;

fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

fn fmt(value: &AsyncValue<usize>) -> String {
    match value {
        AsyncValue::Pending => "pending".into(),
        AsyncValue::Complete(x) => format!("{x}"),
        AsyncValue::Error(e) => format!("error: {e}"),
    }
}

/// Returns the number of calls so far.
fn counting(
    count: &Rc<Cell<usize>>,
) -> impl Fn() -> futures::future::Ready<Result<usize, SyncError>> {
    let count = count.clone();
    move || {
        count.set(count.get() + 1);
        futures::future::ready(Ok(count.get()))
    }
}

#[tokio::test(start_paused = true)]
async fn subscribers_share_one_loop() {
    LocalSet::new()
        .run_until(async {
            let mut cr = CallRecorder::new();
            let count = Rc::new(Cell::new(0));
            let r = poll_readable("counter", ms(100), counting(&count));
            let _s0 = r.subscribe(|v| call!("a {}", fmt(v)));
            let _s1 = r.subscribe(|v| call!("b {}", fmt(v)));
            cr.verify(["a pending", "b pending"]);

            sleep(ms(250)).await;
            assert_eq!(count.get(), 3);
            cr.verify(["a 1", "b 1", "a 2", "b 2", "a 3", "b 3"]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn last_unsubscribe_stops_and_next_subscribe_restarts() {
    LocalSet::new()
        .run_until(async {
            let count = Rc::new(Cell::new(0));
            let r = poll_readable("counter", ms(100), counting(&count));
            let s = r.subscribe(|_| {});
            sleep(ms(150)).await;
            assert_eq!(count.get(), 2);
            assert_eq!(r.get(), AsyncValue::Complete(2));

            drop(s);
            assert!(!r.is_running());
            assert_eq!(r.get(), AsyncValue::Pending);
            sleep(ms(500)).await;
            assert_eq!(count.get(), 2);

            let _s = r.subscribe(|_| {});
            assert_eq!(r.get(), AsyncValue::Pending);
            sleep(ms(1)).await;
            assert_eq!(count.get(), 3);
            assert_eq!(r.get(), AsyncValue::Complete(3));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn equal_results_are_not_emitted() {
    LocalSet::new()
        .run_until(async {
            let mut cr = CallRecorder::new();
            let count = Rc::new(Cell::new(0));
            let r = poll_readable("constant", ms(100), {
                let count = count.clone();
                move || {
                    count.set(count.get() + 1);
                    futures::future::ready(Ok(7))
                }
            });
            let _s = r.subscribe(|v| call!("{}", fmt(v)));
            sleep(ms(450)).await;
            assert_eq!(count.get(), 5);
            cr.verify(["pending", "7"]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_is_retried_on_next_tick() {
    LocalSet::new()
        .run_until(async {
            let mut cr = CallRecorder::new();
            let count = Rc::new(Cell::new(0));
            let r = poll_readable("flaky", ms(100), {
                let count = count.clone();
                move || {
                    count.set(count.get() + 1);
                    futures::future::ready(if count.get() == 1 {
                        Err(SyncError::remote("get", "offline"))
                    } else {
                        Ok(count.get())
                    })
                }
            });
            let _s = r.subscribe(|v| call!("{}", fmt(v)));
            sleep(ms(150)).await;
            cr.verify([
                "pending",
                "error: remote call `get` failed: offline",
                "2",
            ]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn slow_fetches_do_not_overlap() {
    LocalSet::new()
        .run_until(async {
            let running = Rc::new(Cell::new(0));
            let max_running = Rc::new(Cell::new(0));
            let count = Rc::new(Cell::new(0));
            let r = poll_readable("slow", ms(100), {
                let running = running.clone();
                let max_running = max_running.clone();
                let count = count.clone();
                move || {
                    let running = running.clone();
                    let max_running = max_running.clone();
                    let count = count.clone();
                    async move {
                        running.set(running.get() + 1);
                        max_running.set(max_running.get().max(running.get()));
                        sleep(ms(250)).await;
                        running.set(running.get() - 1);
                        count.set(count.get() + 1);
                        Ok(count.get())
                    }
                }
            });
            let _s = r.subscribe(|_| {});
            sleep(ms(1000)).await;
            assert_eq!(max_running.get(), 1);
            assert!(count.get() < 5);
        })
        .await;
}
