//! # Keyed race.
//!
//! [`race`] starts every op, resolves as soon as one finishes and halts the
//! rest. The result map always holds the winner's key; a loser only appears
//! when it had already finished by the time the winner was observed.

use std::collections::HashMap;
use std::hash::Hash;

use futures::future::{join_all, select_all};

use crate::core::{Op, Scope, Task};
use crate::fx::safe::{Outcome, safe};

/// Runs `ops` concurrently and keeps the first to finish.
///
/// Losers are halted (their cleanup has run) before this returns. An empty
/// input returns an empty map.
pub async fn race<K, T>(scope: &Scope, ops: Vec<(K, Op<T>)>) -> HashMap<K, Outcome<T>>
where
    K: Eq + Hash + Send + 'static,
    T: Send + 'static,
{
    if ops.is_empty() {
        return HashMap::new();
    }

    let res = scope
        .call(move |s| async move {
            let mut tasks: Vec<(K, Task<Outcome<T>>)> = ops
                .into_iter()
                .map(|(key, work)| {
                    let task = s.spawn(move |child| async move { Ok(safe(work(child)).await) });
                    (key, task)
                })
                .collect();

            let (first, idx, _) = select_all(tasks.iter_mut().map(|(_, t)| t)).await;
            let (winner, _) = tasks.swap_remove(idx);

            let mut out = HashMap::with_capacity(1);
            out.insert(winner, first.unwrap_or_else(Err));

            let losers = join_all(tasks.into_iter().map(|(key, task)| async move {
                let finished = task.is_finished();
                (key, finished, task.halt().await)
            }))
            .await;
            for (key, finished, res) in losers {
                if finished {
                    out.insert(key, res.unwrap_or_else(Err));
                }
            }
            Ok(out)
        })
        .await;

    res.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, op};
    use crate::error::TaskError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn after(ms: u64, v: u32) -> Op<u32> {
        op(move |_| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(v)
        })
    }

    #[tokio::test(start_paused = true)]
    async fn first_wins_and_losers_are_halted() {
        let scope = Scope::new(Config::default());
        let loser_finished = Arc::new(AtomicBool::new(false));
        let flag = loser_finished.clone();
        let slow: Op<u32> = op(move |_| {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(2)
            }
        });

        let out = race(&scope, vec![("fast", after(5, 1)), ("slow", slow)]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out.get("fast"), Some(&Ok(1)));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!loser_finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_can_win() {
        let scope = Scope::new(Config::default());
        let boom: Op<u32> = op(|_| async { Err(TaskError::fail("boom")) });
        let out = race(&scope, vec![(0, boom), (1, after(50, 1))]).await;
        assert_eq!(out.get(&0), Some(&Err(TaskError::fail("boom"))));
        assert!(!out.contains_key(&1));
    }

    #[tokio::test]
    async fn empty_is_empty() {
        let scope = Scope::new(Config::default());
        let out = race::<&str, ()>(&scope, Vec::new()).await;
        assert!(out.is_empty());
    }
}
