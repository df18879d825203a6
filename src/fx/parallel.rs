//! # Fan-out / fan-in.
//!
//! [`parallel`] starts every op at once and reports each outcome twice:
//!
//! ```text
//!            ┌─► op[0] ──┐
//! parallel ──┼─► op[1] ──┼──► immediate  (completion order)
//!            └─► op[2] ──┘──► sequence   (input order)
//!                        └──► join()     (Vec, input order)
//! ```
//!
//! Each op runs under [`safe`](super::safe), so a failing op never
//! disturbs its siblings. Both channels close once every op has finished.

use std::future::IntoFuture;

use tokio::sync::mpsc;

use crate::core::{Op, Scope, Task};
use crate::fx::safe::{Outcome, safe};

/// Running fan-out started by [`parallel`].
#[derive(Debug)]
pub struct Parallel<T> {
    sequence: mpsc::UnboundedReceiver<Outcome<T>>,
    immediate: mpsc::UnboundedReceiver<Outcome<T>>,
    done: Task<Vec<Outcome<T>>>,
}

impl<T> Parallel<T> {
    /// Outcomes in input order.
    pub fn sequence(&mut self) -> &mut mpsc::UnboundedReceiver<Outcome<T>> {
        &mut self.sequence
    }

    /// Outcomes in completion order.
    pub fn immediate(&mut self) -> &mut mpsc::UnboundedReceiver<Outcome<T>> {
        &mut self.immediate
    }

    /// Splits into `(sequence, immediate, aggregate)`.
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedReceiver<Outcome<T>>,
        mpsc::UnboundedReceiver<Outcome<T>>,
        Task<Vec<Outcome<T>>>,
    ) {
        (self.sequence, self.immediate, self.done)
    }

    /// Waits for every op; outcomes are in input order.
    pub async fn join(self) -> Outcome<Vec<Outcome<T>>> {
        self.done.await
    }

    /// Halts every op still running.
    pub async fn halt(self) {
        let _ = self.done.halt().await;
    }
}

impl<T: Send + 'static> IntoFuture for Parallel<T> {
    type Output = Outcome<Vec<Outcome<T>>>;
    type IntoFuture = Task<Vec<Outcome<T>>>;

    fn into_future(self) -> Self::IntoFuture {
        self.done
    }
}

/// Starts every op in `scope` and returns the fan-in handle.
///
/// An empty list resolves immediately to an empty `Vec`.
pub fn parallel<T>(scope: &Scope, ops: Vec<Op<T>>) -> Parallel<T>
where
    T: Clone + Send + 'static,
{
    let (seq_tx, sequence) = mpsc::unbounded_channel();
    let (imm_tx, immediate) = mpsc::unbounded_channel();

    let done = scope.spawn(move |s| async move {
        let tasks: Vec<Task<Outcome<T>>> = ops
            .into_iter()
            .map(|work| {
                let imm = imm_tx.clone();
                s.spawn(move |child| async move {
                    let res = safe(work(child)).await;
                    let _ = imm.send(res.clone());
                    Ok(res)
                })
            })
            .collect();
        drop(imm_tx);

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            let res = task.await.unwrap_or_else(Err);
            let _ = seq_tx.send(res.clone());
            results.push(res);
        }
        Ok(results)
    });

    Parallel {
        sequence,
        immediate,
        done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, op};
    use crate::error::TaskError;
    use std::time::Duration;

    fn delayed(name: &'static str, ms: u64) -> Op<&'static str> {
        op(move |_| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(name)
        })
    }

    async fn drain<T>(rx: &mut mpsc::UnboundedReceiver<Outcome<T>>) -> Vec<Outcome<T>> {
        let mut out = Vec::new();
        while let Some(v) = rx.recv().await {
            out.push(v);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_vs_immediate_order() {
        let scope = Scope::new(Config::default());
        let (mut seq, mut imm, done) =
            parallel(&scope, vec![delayed("a", 20), delayed("b", 10)]).into_parts();

        assert_eq!(done.await, Ok(vec![Ok("a"), Ok("b")]));
        assert_eq!(drain(&mut seq).await, vec![Ok("a"), Ok("b")]);
        assert_eq!(drain(&mut imm).await, vec![Ok("b"), Ok("a")]);
    }

    #[tokio::test]
    async fn empty_resolves_immediately() {
        let scope = Scope::new(Config::default());
        let res = parallel::<u8>(&scope, Vec::new()).await;
        assert_eq!(res, Ok(vec![]));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_disturb_siblings() {
        let scope = Scope::new(Config::default());
        let failing: Op<&'static str> = op(|_| async { Err(TaskError::fail("nope")) });
        let res = parallel(&scope, vec![failing, delayed("ok", 5)]).join().await;
        assert_eq!(res, Ok(vec![Err(TaskError::fail("nope")), Ok("ok")]));
    }

    #[tokio::test(start_paused = true)]
    async fn halt_stops_running_ops() {
        let scope = Scope::new(Config::default());
        let mut p = parallel(&scope, vec![delayed("slow", 60_000)]);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(p.immediate().try_recv().is_err());
        p.halt().await;
        assert_eq!(scope.tasks(), 0);
    }
}
