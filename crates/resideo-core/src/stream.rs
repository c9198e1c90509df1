// ── Snapshot subscriptions ──
//
// What a consumer holds to follow one device: the latest snapshot on
// demand, or a `Stream` of snapshots as the cache publishes them.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::cache::Snapshot;
use crate::model::{Characteristic, CharacteristicValue};

pub struct SnapshotStream {
    current: Arc<Snapshot>,
    receiver: watch::Receiver<Arc<Snapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(mut receiver: watch::Receiver<Arc<Snapshot>>) -> Self {
        let current = Arc::clone(&receiver.borrow_and_update());
        Self { current, receiver }
    }

    /// The snapshot seen by the last `changed()` (or at subscription).
    pub fn current(&self) -> &Arc<Snapshot> {
        &self.current
    }

    /// Wait for the cache to publish again. `None` once the device is gone.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        self.receiver.changed().await.ok()?;
        self.current = Arc::clone(&self.receiver.borrow_and_update());
        Some(Arc::clone(&self.current))
    }

    /// Wait until `characteristic` differs from its value in `current()`.
    pub async fn next_value(&mut self, characteristic: Characteristic) -> Option<CharacteristicValue> {
        let before = self.current.get(characteristic);
        loop {
            let snap = self.changed().await?;
            let now = snap.get(characteristic);
            if now != before {
                return now;
            }
        }
    }

    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` of snapshots, starting with the latest one.
pub struct SnapshotWatchStream {
    inner: WatchStream<Arc<Snapshot>>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
