use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use tokio::time::{sleep, timeout};

use crate::error::{BoxError, QueueError};
use crate::events::{Event, EventKind};
use crate::logger::Logger;
use crate::subscribers::{LogWriter, Subscribe};
use crate::tasks::{OperationFn, OperationRef};

use super::{Queue, QueueConfig, Termination};

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

async fn wait_terminated<T, R>(queue: &Queue<T, R>)
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    timeout(Duration::from_secs(5), queue.terminated())
        .await
        .expect("queue did not terminate");
}

/// Doubles the task; records the order in which operations actually ran.
fn doubling(ran: Arc<Mutex<Vec<u32>>>, concurrency: usize) -> Queue<u32, u32> {
    Queue::new(
        move |n: u32| {
            let ran = Arc::clone(&ran);
            async move {
                ran.lock().unwrap().push(n);
                sleep(Duration::from_millis(5)).await;
                Ok::<_, BoxError>(n * 2)
            }
        },
        concurrency,
    )
}

#[tokio::test]
async fn test_fill_before_start_reports_all_tasks_and_completes_once() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 2);
    let seen_filled = Arc::new(Mutex::new(Vec::new()));
    let results = Arc::new(Mutex::new(Vec::new()));
    let completed = counter();

    {
        let seen_filled = Arc::clone(&seen_filled);
        let results = Arc::clone(&results);
        let completed = Arc::clone(&completed);
        queue
            .on_filled(move |tasks, _report| seen_filled.lock().unwrap().push(tasks.to_vec()))
            .for_each(move |task, doubled, done| {
                results.lock().unwrap().push((task, doubled));
                done.ok();
            })
            .completed(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            });
    }

    queue.push(1).unwrap().push(2).unwrap().push(3).unwrap();
    queue.filled();
    assert!(seen_filled.lock().unwrap().is_empty(), "deferred until start");

    queue.start().unwrap();
    wait_terminated(&queue).await;

    assert_eq!(*seen_filled.lock().unwrap(), vec![vec![1, 2, 3]]);
    let mut results = results.lock().unwrap().clone();
    results.sort();
    assert_eq!(results, vec![(1, 2), (2, 4), (3, 6)]);
    assert_eq!(completed.load(Ordering::SeqCst), 1);

    let status = queue.snapshot();
    assert_eq!(status.terminal, Some(Termination::Completed));
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.accepted, 3);
}

#[tokio::test]
async fn test_first_failure_kills_queue_and_skips_rest() {
    let processed = counter();
    let queue: Queue<&'static str, ()> = {
        let processed = Arc::clone(&processed);
        Queue::new(
            move |name: &'static str| {
                let processed = Arc::clone(&processed);
                async move {
                    processed.fetch_add(1, Ordering::SeqCst);
                    if name == "a" {
                        Err(BoxError::from("a failed"))
                    } else {
                        Ok(())
                    }
                }
            },
            1,
        )
    };
    let errors = Arc::new(Mutex::new(Vec::new()));
    let completed = counter();
    {
        let errors = Arc::clone(&errors);
        let completed = Arc::clone(&completed);
        queue
            .catch(move |err| errors.lock().unwrap().push(err.to_string()))
            .completed(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            });
    }

    queue.push("a").unwrap().push("b").unwrap();
    queue.start().unwrap();
    queue.filled();
    wait_terminated(&queue).await;
    sleep(Duration::from_millis(20)).await;

    assert_eq!(*errors.lock().unwrap(), vec!["operation failed: a failed".to_string()]);
    assert_eq!(processed.load(Ordering::SeqCst), 1, "b must never run");
    assert_eq!(completed.load(Ordering::SeqCst), 0);
    assert_eq!(queue.snapshot().terminal, Some(Termination::Failed));
}

#[tokio::test]
async fn test_empty_queue_completes_on_start() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    let completed = counter();
    {
        let completed = Arc::clone(&completed);
        queue.completed(move || {
            completed.fetch_add(1, Ordering::SeqCst);
        });
    }

    queue.filled().start().unwrap();

    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert!(queue.is_killed());
}

#[tokio::test]
async fn test_buffered_tasks_run_in_push_order() {
    let ran = Arc::new(Mutex::new(Vec::new()));
    let queue = doubling(Arc::clone(&ran), 1);
    for n in 0..8 {
        queue.push(n).unwrap();
    }
    queue.filled().start().unwrap();
    queue.start().unwrap();
    wait_terminated(&queue).await;

    assert_eq!(*ran.lock().unwrap(), (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_filter_rejects_without_counting() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 2);
    let filled_with = Arc::new(Mutex::new(Vec::new()));
    let each = Arc::new(Mutex::new(Vec::new()));
    {
        let filled_with = Arc::clone(&filled_with);
        let each = Arc::clone(&each);
        queue
            .push_if(|n| n % 2 == 0)
            .on_filled(move |tasks, _| filled_with.lock().unwrap().extend_from_slice(tasks))
            .for_each(move |task, _, done| {
                each.lock().unwrap().push(task);
                done.ok();
            });
    }

    for n in 0..6 {
        queue.push(n).unwrap();
    }
    queue.start().unwrap().filled();
    wait_terminated(&queue).await;

    assert_eq!(*filled_with.lock().unwrap(), vec![0, 2, 4]);
    let mut each = each.lock().unwrap().clone();
    each.sort();
    assert_eq!(each, vec![0, 2, 4]);
    assert_eq!(queue.snapshot().terminal, Some(Termination::Completed));
}

#[tokio::test]
async fn test_push_misuse_errors() {
    let filled = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    filled.filled();
    assert!(matches!(filled.push(1), Err(QueueError::Filled)));

    let failing: Queue<u32, u32> =
        Queue::new(|_n: u32| async move { Err::<u32, _>("nope") }, 1);
    failing.push(1).unwrap();
    failing.start().unwrap();
    wait_terminated(&failing).await;
    assert!(matches!(failing.push(2), Err(QueueError::Killed)));
}

#[tokio::test]
async fn test_first_fires_once_under_concurrency() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 4);
    let firsts = Arc::new(Mutex::new(Vec::new()));
    {
        let firsts = Arc::clone(&firsts);
        queue.first(move |result, _| firsts.lock().unwrap().push(*result));
    }
    for n in 1..=10 {
        queue.push(n).unwrap();
    }
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;

    let firsts = firsts.lock().unwrap();
    assert_eq!(firsts.len(), 1);
    assert_eq!(firsts[0] % 2, 0);
}

#[tokio::test]
async fn test_processing_error_stops_further_results() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    let each = counter();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let completed = counter();
    {
        let each = Arc::clone(&each);
        let errors = Arc::clone(&errors);
        let completed = Arc::clone(&completed);
        queue
            .for_each(move |task, _, done| {
                each.fetch_add(1, Ordering::SeqCst);
                if task == 1 {
                    done.fail("cannot store 1");
                } else {
                    done.ok();
                }
            })
            .catch(move |err| errors.lock().unwrap().push(err.as_label()))
            .completed(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            });
    }

    queue.push(1).unwrap().push(2).unwrap().push(3).unwrap();
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;
    sleep(Duration::from_millis(30)).await;

    assert_eq!(each.load(Ordering::SeqCst), 1);
    assert_eq!(*errors.lock().unwrap(), vec!["processing_failed"]);
    assert_eq!(completed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fill_after_drain_completes_immediately() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 2);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let completed = counter();
    {
        let completed = Arc::clone(&completed);
        queue
            .for_each(move |task, _, done| {
                done.ok();
                let _ = tx.send(task);
            })
            .completed(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            });
    }

    queue.start().unwrap();
    queue.push(1).unwrap().push(2).unwrap();
    for _ in 0..2 {
        timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
    }
    assert_eq!(queue.snapshot().in_flight, 0);
    assert_eq!(completed.load(Ordering::SeqCst), 0, "not filled yet");

    queue.filled();
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_first_hook_can_fail_the_queue() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    let each = counter();
    let errors = Arc::new(Mutex::new(Vec::new()));
    {
        let each = Arc::clone(&each);
        let errors = Arc::clone(&errors);
        queue
            .first(|_, report| report.report("first result rejected"))
            .for_each(move |_, _, done| {
                each.fetch_add(1, Ordering::SeqCst);
                done.ok();
            })
            .catch(move |err| errors.lock().unwrap().push(err.to_string()));
    }

    queue.push(1).unwrap().push(2).unwrap();
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;

    assert_eq!(each.load(Ordering::SeqCst), 0);
    assert_eq!(
        *errors.lock().unwrap(),
        vec!["hook reported failure: first result rejected".to_string()]
    );
}

#[tokio::test]
async fn test_on_filled_report_before_start_kills_queue() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    let caught = counter();
    {
        let caught = Arc::clone(&caught);
        queue
            .on_filled(|tasks, report| {
                if tasks.is_empty() {
                    report.report("nothing to do");
                }
            })
            .catch(move |_| {
                caught.fetch_add(1, Ordering::SeqCst);
            });
    }

    queue.filled().start().unwrap();
    assert_eq!(caught.load(Ordering::SeqCst), 1);
    assert_eq!(queue.snapshot().terminal, Some(Termination::Failed));
    assert!(matches!(queue.start(), Err(QueueError::Killed)));
}

#[tokio::test]
async fn test_reentrant_push_from_for_each() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 2);
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let handle = queue.clone();
        let seen = Arc::clone(&seen);
        queue.for_each(move |task, _, done| {
            seen.lock().unwrap().push(task);
            if task < 3 {
                handle.push(task + 1).unwrap();
            } else {
                handle.filled();
            }
            done.ok();
        });
    }

    queue.push(0).unwrap();
    queue.start().unwrap();
    wait_terminated(&queue).await;

    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    assert_eq!(queue.snapshot().terminal, Some(Termination::Completed));
}

fn caught_errors<T, R>(queue: &Queue<T, R>) -> Arc<Mutex<Vec<String>>>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
{
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    queue.catch(move |err| sink.lock().unwrap().push(format!("{}: {err}", err.as_label())));
    errors
}

#[tokio::test]
async fn test_panicking_first_hook_kills_queue() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    let errors = caught_errors(&queue);
    queue.first(|_, _| panic!("first exploded"));

    queue.push(1).unwrap();
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("hook_failed"), "got {}", errors[0]);
    assert!(errors[0].contains("first exploded"), "got {}", errors[0]);
    assert_eq!(queue.snapshot().terminal, Some(Termination::Failed));
}

#[tokio::test]
async fn test_panicking_for_each_is_not_a_success() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    let errors = caught_errors(&queue);
    let completed = counter();
    {
        let completed = Arc::clone(&completed);
        queue
            .for_each(|_, _, _done| panic!("for_each exploded"))
            .completed(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            });
    }

    queue.push(1).unwrap();
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;

    assert_eq!(completed.load(Ordering::SeqCst), 0);
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("for_each exploded"), "got {}", errors[0]);
    assert_eq!(queue.snapshot().terminal, Some(Termination::Failed));
}

#[tokio::test]
async fn test_done_dropped_by_a_panicking_task_kills_queue() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    let errors = caught_errors(&queue);
    queue.for_each(|_, _, done| {
        tokio::spawn(async move {
            let _held = done;
            panic!("worker exploded");
        });
    });

    queue.push(1).unwrap();
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("dropped during a panic"), "got {}", errors[0]);
}

#[tokio::test]
async fn test_panicking_filter_rejects_push() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    let errors = caught_errors(&queue);
    queue.push_if(|_| panic!("filter exploded"));
    queue.start().unwrap();

    assert!(matches!(queue.push(1), Err(QueueError::Killed)));
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert!(queue.is_killed());
}

#[tokio::test]
async fn test_panicking_on_filled_kills_queue() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    let errors = caught_errors(&queue);
    queue.on_filled(|_, _| panic!("on_filled exploded"));

    queue.push(1).unwrap();
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;

    assert!(errors.lock().unwrap()[0].contains("on_filled exploded"));
}

#[tokio::test]
async fn test_panicking_completed_hook_still_terminates() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    queue.completed(|| panic!("completed exploded"));

    queue.push(1).unwrap();
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;

    assert_eq!(queue.snapshot().terminal, Some(Termination::Completed));
}

#[tokio::test]
async fn test_dropped_done_counts_as_success() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 1);
    let parked = Arc::new(Mutex::new(Vec::new()));
    {
        let parked = Arc::clone(&parked);
        queue.for_each(move |_, _, done| parked.lock().unwrap().push(done));
    }
    queue.push(1).unwrap();
    queue.filled().start().unwrap();

    sleep(Duration::from_millis(30)).await;
    assert!(!queue.is_killed(), "continuation still parked");
    parked.lock().unwrap().clear();

    wait_terminated(&queue).await;
    assert_eq!(queue.snapshot().terminal, Some(Termination::Completed));
}

#[tokio::test]
async fn test_operation_panic_is_reported() {
    let queue: Queue<u32, u32> = Queue::new(
        |n: u32| async move {
            if n == 0 {
                panic!("division by zero");
            }
            Ok::<_, BoxError>(10 / n)
        },
        1,
    );
    let errors = Arc::new(Mutex::new(Vec::new()));
    {
        let errors = Arc::clone(&errors);
        queue.catch(move |err| errors.lock().unwrap().push(err.to_string()));
    }
    queue.push(0).unwrap();
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("division by zero"), "got {}", errors[0]);
}

struct CountingLogger(AtomicUsize);

impl Logger for CountingLogger {
    fn error(&self, _err: &QueueError) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_only_first_error_is_logged_and_caught() {
    let logger = Arc::new(CountingLogger(AtomicUsize::new(0)));
    let op: OperationRef<u32, ()> =
        OperationFn::arc(|n: u32| async move { Err::<(), _>(format!("task {n} failed")) });
    let queue = Queue::builder(op)
        .with_concurrency(4)
        .with_logger(logger.clone())
        .build();
    let caught = counter();
    {
        let caught = Arc::clone(&caught);
        queue.catch(move |_| {
            caught.fetch_add(1, Ordering::SeqCst);
        });
    }
    let mut events = queue.events();

    for n in 0..4 {
        queue.push(n).unwrap();
    }
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;
    sleep(Duration::from_millis(20)).await;

    assert_eq!(logger.0.load(Ordering::SeqCst), 1);
    assert_eq!(caught.load(Ordering::SeqCst), 1);

    let mut failed = 0;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::QueueFailed {
            failed += 1;
        }
    }
    assert_eq!(failed, 1);
}

#[tokio::test]
async fn test_late_results_after_kill_are_ignored() {
    let queue: Queue<u32, u32> = Queue::new(
        |n: u32| async move {
            if n == 0 {
                return Err::<u32, BoxError>("fast failure".into());
            }
            sleep(Duration::from_millis(30)).await;
            Ok(n)
        },
        2,
    );
    let each = counter();
    let firsts = counter();
    {
        let each = Arc::clone(&each);
        let firsts = Arc::clone(&firsts);
        queue
            .for_each(move |_, _, done| {
                each.fetch_add(1, Ordering::SeqCst);
                done.ok();
            })
            .first(move |_, _| {
                firsts.fetch_add(1, Ordering::SeqCst);
            });
    }
    queue.push(1).unwrap().push(0).unwrap();
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;
    sleep(Duration::from_millis(60)).await;

    assert_eq!(each.load(Ordering::SeqCst), 0);
    assert_eq!(firsts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_events_trace_the_lifecycle() {
    let queue = doubling(Arc::new(Mutex::new(Vec::new())), 2);
    let mut rx = queue.events();
    queue.push_if(|n| *n != 2);
    queue.push(1).unwrap().push(2).unwrap().push(3).unwrap();
    queue.filled().start().unwrap();
    wait_terminated(&queue).await;

    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(ev.kind);
    }
    let count = |k: EventKind| kinds.iter().filter(|x| **x == k).count();
    assert_eq!(count(EventKind::TaskBuffered), 3);
    assert_eq!(count(EventKind::TaskRejected), 1);
    assert_eq!(count(EventKind::TaskAdmitted), 2);
    assert_eq!(count(EventKind::TaskFinished), 2);
    assert_eq!(count(EventKind::QueueStarted), 1);
    assert_eq!(kinds.last(), Some(&EventKind::QueueCompleted));
}

struct TerminalWatcher {
    kinds: Mutex<Vec<EventKind>>,
    notify: Arc<Notify>,
}

#[async_trait]
impl Subscribe for TerminalWatcher {
    async fn on_event(&self, ev: &Event) {
        self.kinds.lock().unwrap().push(ev.kind);
        if ev.is_terminal() {
            self.notify.notify_one();
        }
    }
    fn name(&self) -> &'static str {
        "terminal-watcher"
    }
}

#[tokio::test]
async fn test_subscribers_receive_events() {
    let notify = Arc::new(Notify::new());
    let watcher = Arc::new(TerminalWatcher {
        kinds: Mutex::new(Vec::new()),
        notify: Arc::clone(&notify),
    });
    let op: OperationRef<u32, u32> =
        OperationFn::arc(|n: u32| async move { Ok::<_, BoxError>(n) });
    let queue = Queue::builder(op)
        .with_config(QueueConfig {
            concurrency: 0,
            bus_capacity: 16,
        })
        .with_subscribers(vec![
            watcher.clone() as Arc<dyn Subscribe>,
            Arc::new(LogWriter::new()),
        ])
        .build();

    queue.push(5).unwrap();
    queue.filled().start().unwrap();
    timeout(Duration::from_secs(5), notify.notified())
        .await
        .expect("subscriber never saw the terminal event");

    let kinds = watcher.kinds.lock().unwrap();
    assert!(kinds.contains(&EventKind::TaskAdmitted));
    assert_eq!(kinds.last(), Some(&EventKind::QueueCompleted));
}
