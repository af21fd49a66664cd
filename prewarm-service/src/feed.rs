//! Turns request templates into the input stream of a warmup dispatch.

use std::time::Duration;

use futures_util::Stream;
use prewarm_types::{Interpolator, Render};
use tokio::time::Instant;

/// Cycles through a list of templates and renders a fresh request from each.
///
/// The feed stops after [`max_requests`](Self::max_requests) requests, or once
/// [`max_duration`](Self::max_duration) has elapsed since the stream was first polled, whichever
/// comes first. Without any limit, the feed is infinite.
#[derive(Debug)]
pub struct RequestFeed<T> {
    templates: Vec<T>,
    interpolator: Interpolator,
    max_requests: Option<usize>,
    max_duration: Option<Duration>,
}

impl<T> RequestFeed<T>
where
    T: Render + Send + 'static,
    T::Output: Send + 'static,
{
    /// Creates an unbounded feed over the given templates.
    pub fn new(templates: Vec<T>) -> Self {
        Self {
            templates,
            interpolator: Interpolator::new(),
            max_requests: None,
            max_duration: None,
        }
    }

    /// Uses the given interpolator to render templates.
    pub fn interpolator(mut self, interpolator: Interpolator) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// Stops the feed after `max_requests` requests.
    pub fn max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = Some(max_requests);
        self
    }

    /// Stops the feed once `max_duration` has elapsed.
    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    /// Returns the stream of rendered requests.
    pub fn into_stream(self) -> impl Stream<Item = T::Output> + Send + 'static {
        let Self {
            templates,
            mut interpolator,
            max_requests,
            max_duration,
        } = self;

        async_stream::stream! {
            if templates.is_empty() {
                return;
            }
            let deadline = max_duration.map(|duration| Instant::now() + duration);

            for index in 0.. {
                if max_requests.is_some_and(|max| index >= max) {
                    break;
                }
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    tracing::debug!(requests = index, "warmup duration elapsed");
                    break;
                }

                let request = templates[index % templates.len()].render(&mut interpolator);
                yield request;
            }
        }
    }
}
