//! Newline-delimited JSON generation streams.
//!
//! A model server answers a streaming generation request with one JSON object
//! per line. Each carries an optional `response` fragment and the last one
//! carries `done: true`. [`fragments`] turns the raw body into a lazy stream of
//! those fragments that ends at the completion marker. A unit carrying an
//! `error` field ends the stream with [`FaqError::Generation`].

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::error::{FaqError, Result};

#[derive(Debug, Default, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

struct FragmentReader {
    body: BoxStream<'static, Result<Bytes>>,
    buffer: Vec<u8>,
    body_finished: bool,
    done: bool,
}

impl FragmentReader {
    fn take_line(&mut self) -> Option<Vec<u8>> {
        if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            return Some(line);
        }
        if self.body_finished && !self.buffer.is_empty() {
            return Some(std::mem::take(&mut self.buffer));
        }
        None
    }

    async fn next_fragment(&mut self) -> Option<Result<String>> {
        loop {
            if self.done {
                return None;
            }

            if let Some(line) = self.take_line() {
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let chunk: GenerateChunk = match serde_json::from_str(line) {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        debug!(error = %err, "skipping undecodable stream line");
                        continue;
                    }
                };
                if let Some(message) = chunk.error {
                    self.done = true;
                    return Some(Err(FaqError::Generation(message)));
                }
                self.done = chunk.done;
                match chunk.response {
                    Some(text) => return Some(Ok(text)),
                    None => continue,
                }
            }

            if self.body_finished {
                return None;
            }

            match self.body.next().await {
                Some(Ok(bytes)) => self.buffer.extend_from_slice(&bytes),
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => self.body_finished = true,
            }
        }
    }
}

/// Lazily decode `response` fragments from a generation body. Finite and
/// single-consumer: it ends after the unit flagged `done`, or when the body
/// ends, and yields a transport error at most once.
pub fn fragments(body: BoxStream<'static, Result<Bytes>>) -> impl Stream<Item = Result<String>> {
    let reader = FragmentReader {
        body,
        buffer: Vec::new(),
        body_finished: false,
        done: false,
    };

    stream::unfold(reader, |mut reader| async move {
        let item = reader.next_fragment().await?;
        Some((item, reader))
    })
}

/// Concatenate every fragment in arrival order.
pub async fn accumulate<S>(fragments: S) -> Result<String>
where
    S: Stream<Item = Result<String>>,
{
    let mut fragments = std::pin::pin!(fragments);
    let mut text = String::new();
    while let Some(fragment) = fragments.next().await {
        text.push_str(&fragment?);
    }
    Ok(text)
}
