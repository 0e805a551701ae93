use futures::lock::Mutex;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, Instrument};

/// Collection of background tasks that live as long as the module running them
#[derive(Default)]
pub struct JobSet {
    handles: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl JobSet {
    /// Spawns a named task on the runtime
    pub async fn spawn<F>(&self, name: &str, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(job = name, "Spawning job");

        let handle = tokio::spawn(job.instrument(info_span!("job", job = name)));
        self.handles.lock().await.push((name.to_owned(), handle));
    }

    /// Number of jobs which have not yet finished
    pub async fn running(&self) -> usize {
        self.handles
            .lock()
            .await
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Aborts all jobs and waits for them to wind down
    pub async fn terminate(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().await);

        for (name, handle) in handles {
            handle.abort();

            if let Err(error) = handle.await {
                if !error.is_cancelled() {
                    debug!(job = %name, ?error, "Job terminated abnormally");
                }
            }
        }
    }
}
