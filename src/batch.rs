use futures_util::future::join_all;
use std::future::Future;

/// The settled outcome of one task in a batch, tagged with the key it was
/// submitted under.
#[derive(Debug)]
pub struct Settled<K, T, E> {
    pub key: K,
    pub outcome: Result<T, E>,
}

/// Runs every task of the batch to completion and returns one settlement per
/// task, in submission order. A failing task never cancels its siblings.
pub async fn settle_all<K, T, E, F, I>(tasks: I) -> Vec<Settled<K, T, E>>
where
    I: IntoIterator<Item = (K, F)>,
    F: Future<Output = Result<T, E>>,
{
    let (keys, futures): (Vec<K>, Vec<F>) = tasks.into_iter().unzip();
    let outcomes = join_all(futures).await;

    keys.into_iter()
        .zip(outcomes)
        .map(|(key, outcome)| Settled { key, outcome })
        .collect()
}
