//! Common test utilities and helpers for the analyzer tests
//!
//! Mocks for every device boundary of the pipeline: a camera that hands out a
//! generated photo, a scripted permission probe, a scripted inference
//! transport, and a one-shot HTTP server for the real chat completions client.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use water_strip_analyzer::analysis::{AnalysisClient, InferenceRequest, InferenceTransport};
use water_strip_analyzer::capture::{
    AnalyzingFlag, CameraFacing, CaptureArtifact, CaptureDevice, PermissionProbe, PermissionState,
};
use water_strip_analyzer::presenter::StalePolicy;
use water_strip_analyzer::session::AnalysisSession;
use water_strip_analyzer::{StripError, StripResult};

/// A completion carrying a well-formed reading set.
pub const GOOD_REPLY: &str = r#"{"pH": 7.2, "ammonia": 0.25, "nitrite": 0, "nitrate": 5}"#;

/// Write a `width`x`height` gradient PNG into `dir`.
pub fn write_test_photo(dir: &Path, width: u32, height: u32) -> PathBuf {
    let photo = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let path = dir.join(format!("strip-{}x{}.png", width, height));
    photo.save(&path).expect("write test photo");
    path
}

/// Permission probe that replays a script; the last answer repeats.
pub struct ScriptedProbe {
    answers: Mutex<VecDeque<PermissionState>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new(answers: &[PermissionState]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn granted() -> Self {
        Self::new(&[PermissionState::Granted])
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl PermissionProbe for ScriptedProbe {
    async fn request_permission(&self) -> StripResult<PermissionState> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut answers = self.answers.lock().unwrap();
        let answer = if answers.len() > 1 {
            answers.pop_front()
        } else {
            answers.front().copied()
        };
        Ok(answer.unwrap_or(PermissionState::Denied))
    }
}

/// Camera that returns the same photo for every shot and records the facing used.
pub struct MockCamera {
    photo: PathBuf,
    fail: bool,
    shots: Arc<Mutex<Vec<CameraFacing>>>,
}

impl MockCamera {
    pub fn new(photo: impl Into<PathBuf>) -> Self {
        Self {
            photo: photo.into(),
            fail: false,
            shots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("unused.png")
        }
    }

    pub fn shots(&self) -> Arc<Mutex<Vec<CameraFacing>>> {
        self.shots.clone()
    }
}

#[async_trait]
impl CaptureDevice for MockCamera {
    async fn take_picture(&mut self, facing: CameraFacing) -> StripResult<CaptureArtifact> {
        self.shots.lock().unwrap().push(facing);
        if self.fail {
            return Err(StripError::capture("camera unavailable"));
        }
        Ok(CaptureArtifact::from_path(&self.photo))
    }
}

/// What the scripted transport does with each request.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Delayed(Duration, String),
    NetworkDown,
    Hang,
}

/// Observations shared between a test and its [`ScriptedTransport`].
#[derive(Debug, Clone, Default)]
pub struct TransportProbe {
    requests: Arc<Mutex<Vec<InferenceRequest>>>,
    flag: Arc<Mutex<Option<AnalyzingFlag>>>,
    flag_during_call: Arc<Mutex<Vec<bool>>>,
}

impl TransportProbe {
    /// Record the analyzing flag's value whenever a request arrives.
    pub fn watch_flag(&self, flag: AnalyzingFlag) {
        *self.flag.lock().unwrap() = Some(flag);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn flag_during_call(&self) -> Vec<bool> {
        self.flag_during_call.lock().unwrap().clone()
    }
}

/// Transport replaying a script of replies; the last one repeats.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    probe: TransportProbe,
}

impl ScriptedTransport {
    pub fn new(reply: Reply) -> (Self, TransportProbe) {
        Self::sequence(vec![reply])
    }

    pub fn sequence(replies: Vec<Reply>) -> (Self, TransportProbe) {
        let probe = TransportProbe::default();
        (
            Self {
                replies: Mutex::new(replies.into()),
                probe: probe.clone(),
            },
            probe,
        )
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap_or(Reply::NetworkDown)
        }
    }

    pub fn text(reply: &str) -> (Self, TransportProbe) {
        Self::new(Reply::Text(reply.to_string()))
    }
}

#[async_trait]
impl InferenceTransport for ScriptedTransport {
    async fn complete(&self, request: &InferenceRequest) -> StripResult<String> {
        self.probe.requests.lock().unwrap().push(request.clone());
        if let Some(flag) = self.probe.flag.lock().unwrap().as_ref() {
            self.probe.flag_during_call.lock().unwrap().push(flag.is_set());
        }
        match self.next_reply() {
            Reply::Text(text) => Ok(text),
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Reply::NetworkDown => Err(StripError::network("connection refused")),
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// A granted session over `photo` answering with `reply`.
pub fn session_with(
    photo: &Path,
    reply: Reply,
    timeout: Option<Duration>,
    policy: StalePolicy,
) -> (AnalysisSession, TransportProbe) {
    scripted_session(photo, vec![reply], timeout, policy)
}

/// A granted session over `photo` answering with `replies` in turn.
pub fn scripted_session(
    photo: &Path,
    replies: Vec<Reply>,
    timeout: Option<Duration>,
    policy: StalePolicy,
) -> (AnalysisSession, TransportProbe) {
    let (transport, probe) = ScriptedTransport::sequence(replies);
    let session = AnalysisSession::builder()
        .with_permission_probe(ScriptedProbe::granted())
        .with_capture_device(MockCamera::new(photo))
        .with_analysis_client(AnalysisClient::new(Box::new(transport)).with_timeout(timeout))
        .with_stale_policy(policy)
        .build()
        .expect("session builds");
    probe.watch_flag(session.analyzing());
    (session, probe)
}

/// Accept one HTTP request, answer it with `status` and `body`, and hand back
/// the raw request text.
pub async fn serve_once(status: u16, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0u8; 16 * 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);
            if request_complete(&raw) {
                break;
            }
        }

        let reason = if status < 400 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            reason,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&raw).into_owned()
    });

    (url, handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&raw[..end]).to_ascii_lowercase();
    let body_len = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= end + 4 + body_len
}

/// A chat completions envelope whose first choice says `content`.
pub fn completion_envelope(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
    .to_string()
}
