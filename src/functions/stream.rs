use std::collections::VecDeque;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{select, Either, Shared};
use futures::stream::{self, Stream, StreamExt};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::functions::error::{
    deadline_exceeded, deleted_error, error_for_response, internal_error, FunctionsError,
    FunctionsResult,
};
use crate::functions::serializer::decode;
use crate::functions::transport::ChunkStream;
use crate::platform::runtime::sleep;

const DATA_PREFIX: &str = "data: ";

/// One item produced by [`CallableFunction::stream`](super::CallableFunction::stream).
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent<Chunk, Response> {
    /// A `message` sent by the function while it runs.
    Chunk(Chunk),
    /// The value the function returned. Always the last event.
    Result(Response),
}

#[derive(Debug)]
enum RawEvent {
    Chunk(JsonValue),
    Result(JsonValue),
}

#[cfg(not(target_arch = "wasm32"))]
type RawEventStream = Pin<Box<dyn Stream<Item = FunctionsResult<RawEvent>> + Send>>;
#[cfg(target_arch = "wasm32")]
type RawEventStream = Pin<Box<dyn Stream<Item = FunctionsResult<RawEvent>>>>;

/// Server-sent events of a streaming call.
///
/// Ends after the [`StreamEvent::Result`] or after the first error, whichever
/// comes first.
pub struct CallableStream<Chunk, Response> {
    events: RawEventStream,
    done: bool,
    _marker: PhantomData<fn() -> (Chunk, Response)>,
}

impl<Chunk, Response> CallableStream<Chunk, Response> {
    pub(crate) fn new(
        body: ChunkStream,
        idle_timeout: Duration,
        cancelled: Shared<oneshot::Receiver<()>>,
        url: String,
    ) -> Self {
        let reader = EventReader {
            body,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
            idle_timeout,
            cancelled,
            url,
        };
        Self {
            events: Box::pin(stream::unfold(reader, EventReader::next_event)),
            done: false,
            _marker: PhantomData,
        }
    }
}

impl<Chunk, Response> std::fmt::Debug for CallableStream<Chunk, Response> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableStream")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<Chunk, Response> Stream for CallableStream<Chunk, Response>
where
    Chunk: DeserializeOwned,
    Response: DeserializeOwned,
{
    type Item = FunctionsResult<StreamEvent<Chunk, Response>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        let event = match self.events.as_mut().poll_next(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(None) => {
                self.done = true;
                return Poll::Ready(None);
            }
            Poll::Ready(Some(event)) => event,
        };
        let typed = event.and_then(|event| match event {
            RawEvent::Chunk(value) => deserialize(value, "chunk").map(StreamEvent::Chunk),
            RawEvent::Result(value) => deserialize(value, "result").map(StreamEvent::Result),
        });
        if !matches!(typed, Ok(StreamEvent::Chunk(_))) {
            self.done = true;
        }
        Poll::Ready(Some(typed))
    }
}

fn deserialize<T: DeserializeOwned>(value: JsonValue, what: &str) -> FunctionsResult<T> {
    serde_json::from_value(value).map_err(|err| {
        internal_error(format!(
            "Failed to deserialize callable stream {what}: {err}"
        ))
    })
}

/// Splits the response body into `data:` lines and turns them into events.
struct EventReader {
    body: ChunkStream,
    buffer: Vec<u8>,
    pending: VecDeque<FunctionsResult<RawEvent>>,
    finished: bool,
    idle_timeout: Duration,
    cancelled: Shared<oneshot::Receiver<()>>,
    url: String,
}

enum Read {
    Chunk(Option<FunctionsResult<Vec<u8>>>),
    Cancelled,
    TimedOut,
}

impl EventReader {
    async fn next_event(mut self) -> Option<(FunctionsResult<RawEvent>, Self)> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some((event, self));
            }
            if self.finished {
                return None;
            }
            match self.read().await {
                Read::Chunk(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                    self.drain_complete_lines();
                }
                Read::Chunk(Some(Err(err))) => self.fail(err),
                Read::Chunk(None) => {
                    let rest = std::mem::take(&mut self.buffer);
                    self.process_line(&rest);
                    if !self.finished {
                        self.fail(internal_error("Stream ended without a result."));
                    }
                }
                Read::Cancelled => {
                    debug!("Streaming call to {} cancelled because the client was deleted", self.url);
                    self.fail(deleted_error());
                }
                Read::TimedOut => {
                    debug!("Streaming call to {} went quiet for {:?}", self.url, self.idle_timeout);
                    self.fail(deadline_exceeded());
                }
            }
        }
    }

    /// Waits for the next body chunk, the idle timeout or deletion of the client.
    async fn read(&mut self) -> Read {
        let cancelled = self.cancelled.clone();
        let timer = Box::pin(sleep(self.idle_timeout));
        match select(cancelled, select(self.body.next(), timer)).await {
            Either::Left(_) => Read::Cancelled,
            Either::Right((Either::Left((chunk, _)), _)) => Read::Chunk(chunk),
            Either::Right((Either::Right(_), _)) => Read::TimedOut,
        }
    }

    fn fail(&mut self, error: FunctionsError) {
        self.pending.push_back(Err(error));
        self.finished = true;
    }

    fn drain_complete_lines(&mut self) {
        while !self.finished {
            let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            self.process_line(&line);
        }
    }

    /// Handles one `data: {...}` line. Blank lines, comments and payloads that
    /// are not JSON are skipped.
    fn process_line(&mut self, line: &[u8]) {
        if self.finished {
            return;
        }
        let text = String::from_utf8_lossy(line);
        let Some(payload) = text.trim().strip_prefix(DATA_PREFIX) else {
            return;
        };
        let Ok(json) = serde_json::from_str::<JsonValue>(payload) else {
            return;
        };

        if let Some(result) = json.get("result") {
            match decode(result) {
                Ok(value) => {
                    self.pending.push_back(Ok(RawEvent::Result(value)));
                    self.finished = true;
                }
                Err(err) => self.fail(err),
            }
        } else if let Some(message) = json.get("message") {
            match decode(message) {
                Ok(value) => self.pending.push_back(Ok(RawEvent::Chunk(value))),
                Err(err) => self.fail(err),
            }
        } else if json.get("error").is_some() {
            let error = error_for_response(0, Some(&json))
                .unwrap_or_else(|| internal_error("internal"));
            self.fail(error);
        }
    }
}
