//! A simple async executor that drives one future on the current thread,
//! parking the thread while the future is pending.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

pub struct Executor;

impl Executor {
    /// Runs `task` to completion on the calling thread.
    ///
    /// The future is dropped before this returns, including on unwind.
    pub fn run(task: impl Future<Output = ()>) {
        let mut task = pin!(task);
        let wakeup = Arc::new(WakerImpl {
            thread: thread::current(),
            // Poll once before waiting for anything.
            woken: AtomicBool::new(true),
        });
        let waker = Waker::from(wakeup.clone());
        let mut context = Context::from_waker(&waker);

        loop {
            if !wakeup.woken.swap(false, Ordering::Acquire) {
                // Spurious unparks are fine; we re-check the flag.
                thread::park();
                continue;
            }
            if task.as_mut().poll(&mut context) == Poll::Ready(()) {
                return;
            }
        }
    }
}

struct WakerImpl {
    thread: Thread,
    woken: AtomicBool,
}

impl Wake for WakerImpl {
    fn wake(self: Arc<Self>) { self.wake_by_ref(); }

    fn wake_by_ref(self: &Arc<Self>) {
        self.woken.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::pin::Pin;
    use std::rc::Rc;
    use std::time::Duration;
    use std::{future, thread};

    use super::*;

    #[derive(Default)]
    struct PendingThenReady(bool);

    impl Future for PendingThenReady {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            if self.0 {
                return Poll::Ready(());
            }
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }

    #[test]
    fn executor_runs() {
        Executor::run(future::ready(()));
        Executor::run(PendingThenReady::default());

        let mut x = 0;
        Executor::run(async {
            x += 1;
            PendingThenReady::default().await;
            x += 1;
        });
        assert_eq!(2, x);
    }

    #[test]
    fn executor_drops_main_task_on_unwind() {
        struct SignallingDrop(AssertUnwindSafe<Rc<Cell<bool>>>);
        impl Drop for SignallingDrop {
            fn drop(&mut self) { self.0.replace(true); }
        }

        let dropped = Rc::new(Cell::new(false));

        let dropper = SignallingDrop(AssertUnwindSafe(dropped.clone()));
        let result = catch_unwind(AssertUnwindSafe(|| {
            Executor::run(async move {
                let _dropper = dropper;
                PendingThenReady::default().await;
                panic!("oh no");
            });
        }));

        assert!(result.is_err());
        assert_eq!(true, dropped.take());
    }

    #[test]
    fn channel_works() {
        use tokio::sync::mpsc;

        let (tx, mut rx) = mpsc::unbounded_channel();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(25));
            _ = tx.send(());
            _ = tx.send(());
            drop(tx);
        });

        let mut msgs = 0;
        Executor::run(async {
            while let Some(_msg) = rx.recv().await {
                msgs += 1;
                PendingThenReady::default().await;
            }
        });

        assert_eq!(2, msgs);
    }
}
