#![allow(dead_code)]

use async_trait::async_trait;
use rust_asset_backend::config::TransferConfig;
use rust_asset_backend::services::cdn::{AssetDeleter, DeletionStatus};
use rust_asset_backend::services::connection::{Connector, RemoteConnection};
use rust_asset_backend::services::ftp::FtpError;
use rust_asset_backend::services::replace::RecordUpdater;
use rust_asset_backend::services::verifier::ReachabilityProbe;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const PUBLIC_BASE: &str = "https://static.example.com";

pub fn test_config() -> TransferConfig {
    TransferConfig {
        host: "ftp.example.com".to_string(),
        user: "deploy".to_string(),
        password: "secret".to_string(),
        base_dir: "public_html".to_string(),
        public_base_url: PUBLIC_BASE.to_string(),
        ..TransferConfig::default()
    }
}

fn rejected(code: u16, message: &str) -> FtpError {
    FtpError::Rejected {
        code,
        message: message.to_string(),
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Failure switches for the in-memory remote host
#[derive(Debug, Default, Clone)]
pub struct Faults {
    pub refuse_connect: bool,
    /// Connections after this many succeed no more
    pub refuse_connect_after: Option<usize>,
    pub mkdir: Option<u16>,
    pub put: Option<u16>,
    pub chmod: Option<u16>,
    pub put_delay: Option<Duration>,
}

/// What the fake remote host looks like and what it has been asked to do
#[derive(Debug, Default)]
pub struct RemoteState {
    pub dirs: HashSet<String>,
    pub files: HashMap<String, Vec<u8>>,
    pub modes: HashMap<String, String>,
    pub commands: Vec<String>,
    pub connects: usize,
    pub closes: usize,
    pub active_puts: usize,
    pub max_active_puts: usize,
    pub faults: Faults,
}

impl RemoteState {
    pub fn count(&self, prefix: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

/// In-memory stand-in for the FTP host
#[derive(Clone)]
pub struct MockRemote {
    pub state: Arc<Mutex<RemoteState>>,
}

impl MockRemote {
    /// A host whose login directory already holds `public_html`
    pub fn new() -> Self {
        let mut state = RemoteState::default();
        state.dirs.insert("public_html".to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A host without the configured base directory
    pub fn bare() -> Self {
        Self {
            state: Arc::new(Mutex::new(RemoteState::default())),
        }
    }

    pub fn with_faults(self, faults: Faults) -> Self {
        self.state.lock().unwrap().faults = faults;
        self
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(MockConnector {
            state: self.state.clone(),
        })
    }

    pub fn snapshot<T>(&self, f: impl FnOnce(&RemoteState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }
}

pub struct MockConnector {
    state: Arc<Mutex<RemoteState>>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, FtpError> {
        let mut state = self.state.lock().unwrap();
        let refused = state.faults.refuse_connect
            || state
                .faults
                .refuse_connect_after
                .is_some_and(|limit| state.connects >= limit);
        if refused {
            return Err(FtpError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        state.connects += 1;
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
            cwd: String::new(),
        }))
    }
}

pub struct MockConnection {
    state: Arc<Mutex<RemoteState>>,
    cwd: String,
}

impl MockConnection {
    fn record(&self, command: String) -> std::sync::MutexGuard<'_, RemoteState> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command);
        state
    }
}

#[async_trait]
impl RemoteConnection for MockConnection {
    async fn change_dir(&mut self, path: &str) -> Result<(), FtpError> {
        let target = join(&self.cwd, path.trim_matches('/'));
        let state = self.record(format!("CWD {}", path));
        if !state.dirs.contains(&target) {
            return Err(rejected(550, "No such directory"));
        }
        drop(state);
        self.cwd = target;
        Ok(())
    }

    async fn list_names(&mut self) -> Result<Vec<String>, FtpError> {
        let state = self.record("NLST".to_string());
        let prefix = if self.cwd.is_empty() {
            String::new()
        } else {
            format!("{}/", self.cwd)
        };
        Ok(state
            .dirs
            .iter()
            .chain(state.files.keys())
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    async fn make_dir(&mut self, name: &str) -> Result<(), FtpError> {
        let mut state = self.record(format!("MKD {}", name));
        if let Some(code) = state.faults.mkdir {
            return Err(rejected(code, "Cannot create directory"));
        }
        let path = join(&self.cwd, name);
        state.dirs.insert(path);
        Ok(())
    }

    async fn put(
        &mut self,
        name: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64, FtpError> {
        let delay = {
            let mut state = self.record(format!("STOR {}", name));
            if let Some(code) = state.faults.put {
                return Err(rejected(code, "Transfer aborted"));
            }
            state.active_puts += 1;
            state.max_active_puts = state.max_active_puts.max(state.active_puts);
            state.faults.put_delay
        };

        let mut data = Vec::new();
        let read = source.read_to_end(&mut data).await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.active_puts -= 1;
        read?;
        let written = data.len() as u64;
        state.files.insert(join(&self.cwd, name), data);
        Ok(written)
    }

    async fn set_permissions(&mut self, path: &str, mode: &str) -> Result<(), FtpError> {
        let mut state = self.record(format!("SITE CHMOD {} {}", mode, path));
        if let Some(code) = state.faults.chmod {
            return Err(rejected(code, "Permission denied"));
        }
        state.modes.insert(join(&self.cwd, path), mode.to_string());
        Ok(())
    }

    async fn close(&mut self) {
        let mut state = self.record("QUIT".to_string());
        state.closes += 1;
    }
}

/// Answers HEAD requests from a script; the last entry repeats.
/// `None` stands for a network failure.
pub struct ScriptedProbe {
    script: Vec<Option<u16>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn statuses(statuses: &[u16]) -> Arc<Self> {
        Arc::new(Self {
            script: statuses.iter().copied().map(Some).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            script: vec![None],
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn head(&self, _url: &str) -> anyhow::Result<u16> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script[n.min(self.script.len() - 1)];
        step.ok_or_else(|| anyhow::anyhow!("connection reset"))
    }
}

/// Records every deletion and answers with a fixed result
pub struct RecordingDeleter {
    result: Result<DeletionStatus, String>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl RecordingDeleter {
    pub fn answering(status: DeletionStatus) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(status),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(reason.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(status: DeletionStatus, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(status),
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetDeleter for RecordingDeleter {
    async fn delete(&self, identifier: &str) -> anyhow::Result<DeletionStatus> {
        self.calls.lock().unwrap().push(identifier.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

/// Remembers persisted URLs; optionally refuses them
pub struct RecordingUpdater {
    fail: bool,
    pub persisted: Mutex<Vec<String>>,
}

impl RecordingUpdater {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            persisted: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            persisted: Mutex::new(Vec::new()),
        })
    }

    pub fn urls(&self) -> Vec<String> {
        self.persisted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordUpdater for RecordingUpdater {
    async fn persist(&self, public_url: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("database unavailable");
        }
        self.persisted.lock().unwrap().push(public_url.to_string());
        Ok(())
    }
}

/// One-shot HTTP responder on an ephemeral port. Returns the base URL and
/// the raw requests it has received.
pub async fn http_responder(status: u16, body: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let request = read_http_request(&mut stream).await.unwrap_or_default();
            seen.lock().unwrap().push(request);

            let response = format!(
                "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{}", addr), requests)
}

async fn read_http_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
