use std::{
    future::Future,
    io,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use bytes::Bytes;
use futures::{stream, Stream, StreamExt, TryStreamExt};

use crate::model::object::ByteStream;

pub async fn read_to_end<S>(stream: S) -> io::Result<Vec<u8>>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    stream
        .try_fold(Vec::new(), |mut buf, chunk| async move {
            buf.extend_from_slice(&chunk);
            Ok(buf)
        })
        .await
}

/// Fails the stream with `TimedOut` once no chunk arrives for `idle`. A slow
/// but steady transfer is never cut off.
pub fn idle_timeout<S>(inner: S, idle: Duration) -> ByteStream
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    stream::unfold(Some(Box::pin(inner)), move |state| async move {
        let mut inner = state?;

        match tokio::time::timeout(idle, inner.next()).await {
            Ok(Some(item)) => Some((item, Some(inner))),
            Ok(None) => None,
            Err(_) => {
                let err = io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no data received for {:?}", idle),
                );
                Some((Err(err), None))
            }
        }
    })
    .boxed()
}

/// Drives `fut` to completion unless `progress` stays unchanged for a whole
/// `idle` period, in which case `fut` is dropped and `None` is returned.
pub async fn until_stalled<F>(fut: F, progress: &AtomicU64, idle: Duration) -> Option<F::Output>
where
    F: Future,
{
    tokio::pin!(fut);
    let mut last = progress.load(Ordering::Relaxed);

    loop {
        tokio::select! {
            output = &mut fut => return Some(output),
            _ = tokio::time::sleep(idle) => {
                let now = progress.load(Ordering::Relaxed);
                if now == last {
                    return None;
                }
                last = now;
            }
        }
    }
}
