//! Server-sent events parsing
//!
//! Only `data:` fields matter here. Events are separated by a blank line,
//! multi-line data is joined with `\n`, and `event:`, `id:`, `retry:` and
//! comment lines are dropped.

use std::collections::VecDeque;
use std::fmt::Display;

use futures_util::stream::{self, Stream, StreamExt};

use crate::error::StreamError;
use crate::transport::FragmentStream;

/// Incremental parser fed with raw body chunks
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the data payloads of every event it completes.
    ///
    /// Chunks may split lines or multi-byte characters anywhere.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = find_event_boundary(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            if let Some(data) = parse_event(&block[..pos]) {
                events.push(data);
            }
        }
        events
    }

    /// Flush a trailing event left unterminated at end of body
    pub fn finish(&mut self) -> Option<String> {
        let block = std::mem::take(&mut self.buffer);
        parse_event(&block)
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

fn parse_event(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        } else if line == "data" {
            data_lines.push("");
        }
        // `event:`, `id:`, `retry:` and `:` comments are not used
    }

    let data = data_lines.join("\n");
    if data.is_empty() {
        None
    } else {
        Some(data)
    }
}

/// Turn a raw body stream into a stream of event data payloads.
///
/// A body error is yielded once as `StreamError::Transport` and ends the
/// stream.
pub fn data_events<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = (Box::pin(body), SseParser::new(), VecDeque::<String>::new(), false);

    stream::unfold(
        state,
        |(mut body, mut parser, mut pending, mut finished)| async move {
            loop {
                if let Some(data) = pending.pop_front() {
                    return Some((Ok(data), (body, parser, pending, finished)));
                }
                if finished {
                    return None;
                }

                match body.next().await {
                    Some(Ok(chunk)) => pending.extend(parser.push(chunk.as_ref())),
                    Some(Err(e)) => {
                        let error = StreamError::Transport(e.to_string());
                        return Some((Err(error), (body, parser, pending, true)));
                    }
                    None => {
                        finished = true;
                        pending.extend(parser.finish());
                    }
                }
            }
        },
    )
    .boxed()
}
