use core::{future::Future, num::NonZero};

use tokio::task::{JoinError, JoinHandle};

/// A fixed-size set of tasks spawned on the current runtime.
#[derive(Debug)]
pub struct TaskPool<F> {
    num_tasks: NonZero<usize>,
    factory: F,
}

impl<F> TaskPool<F> {
    pub fn new(num_tasks: NonZero<usize>, factory: F) -> Self {
        Self { num_tasks, factory }
    }
}

impl<F, T> TaskPool<F>
where
    F: FnMut(usize) -> T,
    T: Future + Send + 'static,
    T::Output: Send + 'static,
{
    /// Spawns every task, each produced by the factory from its index.
    pub fn spawn(mut self) -> TaskSet<T::Output> {
        let num_tasks = self.num_tasks.get();
        let mut jobs = Vec::with_capacity(num_tasks);

        for idx in 0..num_tasks {
            let job = tokio::spawn((self.factory)(idx));

            jobs.push(job);
        }

        TaskSet { jobs }
    }
}

/// Handles of tasks spawned by a [`TaskPool`].
#[derive(Debug)]
pub struct TaskSet<T> {
    jobs: Vec<JoinHandle<T>>,
}

impl<T> TaskSet<T> {
    /// Waits for every task to complete, returning their outputs in spawn
    /// order.
    pub async fn join(self) -> Result<Vec<T>, JoinError> {
        let mut out = Vec::with_capacity(self.jobs.len());
        for job in self.jobs {
            out.push(job.await?);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_spawns_exact_number_of_tasks() {
        let pool = TaskPool::new(NonZero::new(5).unwrap(), |idx: usize| async move { idx * 2 });

        assert_eq!(vec![0, 2, 4, 6, 8], pool.spawn().join().await.unwrap());
    }
}
