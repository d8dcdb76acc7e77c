use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use whalewatch::error::FeedError;
use whalewatch::feed::connector::{FrameSource, FrameStream};

/// What a scripted connection does after its frames run out.
#[derive(Clone, Copy)]
pub enum End {
    Close,
    Hang,
}

pub enum Session {
    Refuse(&'static str),
    Frames(Vec<Result<String, FeedError>>, End),
}

/// Per-uri queue of scripted sessions. Once a uri's queue is empty further
/// connects hang forever.
#[derive(Default)]
pub struct ScriptedSource {
    sessions: Mutex<HashMap<String, VecDeque<Session>>>,
}

impl ScriptedSource {
    pub fn script(&self, uri: &str, sessions: Vec<Session>) {
        self.sessions.lock().insert(uri.to_string(), sessions.into());
    }
}

struct ScriptedStream {
    frames: VecDeque<Result<String, FeedError>>,
    end: End,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn connect(&self, uri: &str) -> Result<Box<dyn FrameStream>, FeedError> {
        let next = self
            .sessions
            .lock()
            .get_mut(uri)
            .and_then(|q| q.pop_front());
        match next {
            Some(Session::Refuse(reason)) => Err(FeedError::Connect(reason.to_string())),
            Some(Session::Frames(frames, end)) => Ok(Box::new(ScriptedStream {
                frames: frames.into(),
                end,
            })),
            None => futures_util::future::pending().await,
        }
    }
}

#[async_trait]
impl FrameStream for ScriptedStream {
    async fn next_frame(&mut self) -> Option<Result<String, FeedError>> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(frame);
        }
        match self.end {
            End::Close => None,
            End::Hang => futures_util::future::pending().await,
        }
    }
}

pub fn trade_frame(symbol: &str, price: &str, qty: &str, t: i64, maker: bool) -> String {
    format!(r#"{{"e":"aggTrade","s":"{symbol}","p":"{price}","q":"{qty}","T":{t},"m":{maker}}}"#)
}

pub fn liq_frame(symbol: &str, side: &str, qty: &str, price: &str) -> String {
    format!(
        r#"{{"e":"forceOrder","E":1700000000001,"o":{{"s":"{symbol}","S":"{side}","o":"LIMIT","f":"IOC","q":"{qty}","p":"{price}","ap":"{price}","X":"FILLED","l":"{qty}","z":"{qty}","T":1700000000000}}}}"#
    )
}
