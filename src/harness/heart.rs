//! Structures to keep the process alive until some event occurs

use futures::{
    channel::mpsc::{channel, Receiver, Sender},
    pin_mut,
    prelude::*,
    select,
};
use std::fmt::{self, Formatter};
use tokio::signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tracing::{debug, error, warn};

/// Reason why the heart stopped beating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeathReason {
    /// Internal kill signal has been sent
    Killed(String),
    /// SIGTERM, SIGINT or another process-external cause
    Terminated,
}

impl fmt::Display for DeathReason {
    fn fmt(&self, w: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeathReason::Killed(reason) => write!(w, "Killed ({})", reason),
            DeathReason::Terminated => write!(w, "Terminated due to external signal"),
        }
    }
}

/// Lifecycle management struct that can be used to keep the application alive
pub struct Heart {
    /// Receiver for kill requests sent by heart stones
    rx: Receiver<String>,
}

impl Heart {
    /// Creates a new heart and linked stone
    pub fn new() -> (Self, HeartStone) {
        let (tx, rx) = channel(2);
        (Self { rx }, HeartStone { remote: tx })
    }

    /// Future that waits until the heart dies for the returned reason
    ///
    /// The heart also dies once every linked stone has been dropped, as nobody
    /// would be left to kill it when the work keeping it alive is gone.
    pub async fn death(&mut self) -> DeathReason {
        debug!("Heart starts beating");

        let termination = Heart::termination_signal().fuse();
        pin_mut!(termination);

        select! {
            reason = self.rx.next() => match reason {
                Some(reason) => DeathReason::Killed(reason),
                None => DeathReason::Killed("all heart stones dropped".to_owned()),
            },
            () = termination => DeathReason::Terminated,
        }
    }

    async fn termination_signal() {
        let ctrl_c = ctrl_c().fuse();
        pin_mut!(ctrl_c);

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm_stream) => {
                let sigterm = sigterm_stream.recv().fuse();
                pin_mut!(sigterm);

                select! {
                    _ = sigterm => {},
                    _ = ctrl_c => {},
                };
            }
            Err(error) => {
                warn!(?error, "Unable to listen for SIGTERM, only reacting to Ctrl-C");
                ctrl_c.await.ok();
            }
        }
    }
}

/// Remote controller for the heart
#[derive(Clone)]
pub struct HeartStone {
    remote: Sender<String>,
}

impl HeartStone {
    /// Kill the associated heart
    pub async fn kill(&mut self, reason: impl Into<String>) {
        if let Err(e) = self.remote.send(reason.into()).await {
            error!("Failed to interact with Heart: {}", e);
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use futures::poll;
    use std::time::Duration;
    use tokio::task::{spawn, yield_now};
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn live_until_killed() {
        let (mut heart, _stone) = Heart::new();

        let handle = spawn(async move { heart.death().await });
        sleep(Duration::from_millis(100)).await;
        yield_now().await;

        assert!(!poll!(handle).is_ready());
    }

    #[tokio::test]
    async fn die_when_killed() {
        let (mut heart, mut stone) = Heart::new();

        let handle = spawn(async move { heart.death().await });
        stone.kill("Testing").await;

        assert_eq!(
            handle.await.unwrap(),
            DeathReason::Killed("Testing".to_owned())
        );
    }

    #[tokio::test]
    async fn die_when_stones_are_lost() {
        let (mut heart, stone) = Heart::new();

        let handle = spawn(async move { heart.death().await });
        let job = spawn(async move {
            let _stone = stone;
            panic!("job crashed");
        });

        assert!(job.await.is_err());
        assert_eq!(
            timeout(Duration::from_millis(500), handle).await.unwrap().unwrap(),
            DeathReason::Killed("all heart stones dropped".to_owned())
        );
    }
}
