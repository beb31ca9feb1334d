use crate::config::TransferConfig;
use crate::services::connection::{Connector, RemoteConnection};
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

/// Protocol-level failure talking to the FTP server
#[derive(Error, Debug)]
pub enum FtpError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Server replied {code}: {message}")]
    Rejected { code: u16, message: String },

    #[error("Malformed reply: {0}")]
    Malformed(String),
}

/// A complete (possibly multi-line) server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    fn into_error(self) -> FtpError {
        FtpError::Rejected {
            code: self.code,
            message: self.text,
        }
    }
}

trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

type Stream = Box<dyn Transport>;

const COPY_CHUNK: usize = 64 * 1024;

/// Reads one reply. Multi-line replies (`123-...` up to `123 ...`) are joined
/// with newlines.
pub async fn read_reply<R>(reader: &mut R) -> Result<Reply, FtpError>
where
    R: AsyncBufRead + Unpin,
{
    let first = read_line(reader).await?;
    let code = parse_code(&first)?;
    let mut text = first.get(4..).unwrap_or("").to_string();

    if first.as_bytes().get(3) == Some(&b'-') {
        let terminator = format!("{} ", code);
        loop {
            let line = read_line(reader).await?;
            text.push('\n');
            if line.starts_with(&terminator) || line == code.to_string() {
                text.push_str(line.get(4..).unwrap_or(""));
                break;
            }
            text.push_str(&line);
        }
    }

    Ok(Reply { code, text })
}

async fn read_line<R>(reader: &mut R) -> Result<String, FtpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(FtpError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "control connection closed by server",
        )));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn parse_code(line: &str) -> Result<u16, FtpError> {
    line.get(..3)
        .and_then(|c| c.parse::<u16>().ok())
        .filter(|c| (100..600).contains(c))
        .ok_or_else(|| FtpError::Malformed(line.to_string()))
}

/// Extracts the data address from a 227 reply. Servers behind NAT often
/// advertise an unroutable address; the control peer is used instead.
pub fn parse_pasv(text: &str, control_peer: IpAddr) -> Result<SocketAddr, FtpError> {
    let numbers = text
        .split(|c: char| !(c.is_ascii_digit() || c == ','))
        .find(|part| part.split(',').count() == 6)
        .ok_or_else(|| FtpError::Malformed(format!("PASV reply: {}", text)))?;

    let octets = numbers
        .split(',')
        .map(|n| n.parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| FtpError::Malformed(format!("PASV reply: {}", text)))?;

    let advertised = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
    let port = (u16::from(octets[4]) << 8) | u16::from(octets[5]);

    let peer_is_private = match control_peer {
        IpAddr::V4(ip) => ip.is_private() || ip.is_loopback(),
        IpAddr::V6(_) => false,
    };
    let ip = if advertised.is_unspecified()
        || (advertised.is_private() && !peer_is_private)
        || control_peer.is_ipv6()
    {
        control_peer
    } else {
        IpAddr::V4(advertised)
    };

    Ok(SocketAddr::new(ip, port))
}

fn tls_connector() -> Result<TlsConnector, FtpError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| FtpError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// One logged-in FTP (or explicit FTPS) session
pub struct FtpConnection {
    control: BufReader<Stream>,
    tls: Option<(TlsConnector, ServerName<'static>)>,
    peer: IpAddr,
    command_timeout: Duration,
    closed: bool,
}

impl FtpConnection {
    /// Connects, optionally upgrades to TLS, logs in and switches to binary
    /// mode. The whole handshake is bounded by `connect_timeout`.
    pub async fn connect(config: &TransferConfig) -> Result<Self, FtpError> {
        timeout(config.connect_timeout, Self::handshake(config))
            .await
            .map_err(|_| FtpError::Timeout(config.connect_timeout))?
    }

    async fn handshake(config: &TransferConfig) -> Result<Self, FtpError> {
        let addr = format!("{}:{}", config.host, config.port);
        let tcp = TcpStream::connect(&addr).await?;
        let peer = tcp.peer_addr()?.ip();
        tracing::debug!("FTP control connection open to {}", addr);

        let mut plain = BufReader::new(tcp);
        let mut greeting = read_reply(&mut plain).await?;
        // 120: service ready in a moment
        if greeting.code == 120 {
            greeting = read_reply(&mut plain).await?;
        }
        if greeting.code != 220 {
            return Err(greeting.into_error());
        }

        let (control, tls) = if config.secure {
            send_line(&mut plain, "AUTH TLS").await?;
            let reply = read_reply(&mut plain).await?;
            if reply.code != 234 {
                return Err(reply.into_error());
            }

            let connector = tls_connector()?;
            let server_name = ServerName::try_from(config.host.clone())
                .map_err(|e| FtpError::Tls(e.to_string()))?;
            let stream = connector
                .connect(server_name.clone(), plain.into_inner())
                .await
                .map_err(|e| FtpError::Tls(e.to_string()))?;

            let stream: Stream = Box::new(stream);
            (BufReader::new(stream), Some((connector, server_name)))
        } else {
            let stream: Stream = Box::new(plain.into_inner());
            (BufReader::new(stream), None)
        };

        let mut conn = Self {
            control,
            tls,
            peer,
            command_timeout: config.command_timeout,
            closed: false,
        };

        conn.login(&config.user, &config.password).await?;
        if conn.tls.is_some() {
            conn.command("PBSZ 0", &[200]).await?;
            conn.command("PROT P", &[200]).await?;
        }
        conn.command("TYPE I", &[200]).await?;

        tracing::info!(
            "FTP session established with {} (secure: {})",
            addr,
            config.secure
        );
        Ok(conn)
    }

    async fn login(&mut self, user: &str, password: &str) -> Result<(), FtpError> {
        let reply = self.exchange(&format!("USER {}", user)).await?;
        match reply.code {
            230 => return Ok(()),
            331 | 332 => {}
            _ => return Err(reply.into_error()),
        }

        let reply = self.exchange(&format!("PASS {}", password)).await?;
        match reply.code {
            230 | 202 => Ok(()),
            _ => Err(reply.into_error()),
        }
    }

    async fn exchange(&mut self, line: &str) -> Result<Reply, FtpError> {
        if line.starts_with("PASS ") {
            tracing::debug!("FTP > PASS ****");
        } else {
            tracing::debug!("FTP > {}", line);
        }
        send_line(&mut self.control, line).await?;
        let reply = self.next_reply().await?;
        tracing::debug!("FTP < {} {}", reply.code, reply.text);
        Ok(reply)
    }

    async fn next_reply(&mut self) -> Result<Reply, FtpError> {
        timeout(self.command_timeout, read_reply(&mut self.control))
            .await
            .map_err(|_| FtpError::Timeout(self.command_timeout))?
    }

    async fn command(&mut self, line: &str, expected: &[u16]) -> Result<Reply, FtpError> {
        let reply = self.exchange(line).await?;
        if expected.contains(&reply.code) {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    async fn open_passive(&mut self) -> Result<TcpStream, FtpError> {
        let reply = self.command("PASV", &[227]).await?;
        let addr = parse_pasv(&reply.text, self.peer)?;
        timeout(self.command_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| FtpError::Timeout(self.command_timeout))?
            .map_err(FtpError::from)
    }

    // The TLS handshake on the data channel only completes once the server
    // has accepted the transfer command, so it runs after the 1xx reply.
    async fn secure_data(&mut self, tcp: TcpStream) -> Result<Stream, FtpError> {
        match &self.tls {
            Some((connector, name)) => {
                let stream = timeout(self.command_timeout, connector.connect(name.clone(), tcp))
                    .await
                    .map_err(|_| FtpError::Timeout(self.command_timeout))?
                    .map_err(|e| FtpError::Tls(e.to_string()))?;
                Ok(Box::new(stream))
            }
            None => Ok(Box::new(tcp)),
        }
    }

    async fn finish_transfer(&mut self) -> Result<(), FtpError> {
        let reply = self.next_reply().await?;
        tracing::debug!("FTP < {} {}", reply.code, reply.text);
        match reply.code {
            226 | 250 => Ok(()),
            _ => Err(reply.into_error()),
        }
    }
}

#[async_trait]
impl RemoteConnection for FtpConnection {
    async fn change_dir(&mut self, path: &str) -> Result<(), FtpError> {
        self.command(&format!("CWD {}", path), &[250, 200]).await?;
        Ok(())
    }

    async fn list_names(&mut self) -> Result<Vec<String>, FtpError> {
        let data = self.open_passive().await?;
        let reply = self.exchange("NLST").await?;
        match reply.code {
            125 | 150 => {}
            // Several daemons answer NLST on an empty directory this way
            450 | 550 => return Ok(Vec::new()),
            _ => return Err(reply.into_error()),
        }

        let mut data = self.secure_data(data).await?;
        let mut raw = Vec::new();
        let read = timeout(self.command_timeout, data.read_to_end(&mut raw))
            .await
            .map_err(|_| FtpError::Timeout(self.command_timeout))?;
        match read {
            Ok(_) => {}
            // TLS peers that skip close_notify
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
            Err(e) => return Err(e.into()),
        }
        drop(data);
        self.finish_transfer().await?;

        Ok(String::from_utf8_lossy(&raw)
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.rsplit('/').next().unwrap_or(line).to_string())
            .filter(|name| name != "." && name != "..")
            .collect())
    }

    async fn make_dir(&mut self, name: &str) -> Result<(), FtpError> {
        self.command(&format!("MKD {}", name), &[257, 250]).await?;
        Ok(())
    }

    async fn put(
        &mut self,
        name: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64, FtpError> {
        let data = self.open_passive().await?;
        let reply = self.exchange(&format!("STOR {}", name)).await?;
        if !matches!(reply.code, 125 | 150) {
            return Err(reply.into_error());
        }

        let mut data = self.secure_data(data).await?;
        let written = copy_with_idle_timeout(source, &mut data, self.command_timeout).await?;
        timeout(self.command_timeout, data.shutdown())
            .await
            .map_err(|_| FtpError::Timeout(self.command_timeout))??;
        drop(data);

        self.finish_transfer().await?;
        Ok(written)
    }

    async fn set_permissions(&mut self, path: &str, mode: &str) -> Result<(), FtpError> {
        self.command(&format!("SITE CHMOD {} {}", mode, path), &[200, 250])
            .await?;
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match self.exchange("QUIT").await {
            Ok(reply) if reply.code == 221 => {}
            Ok(reply) => tracing::debug!("Unexpected QUIT reply {} {}", reply.code, reply.text),
            Err(e) => tracing::debug!("QUIT failed: {}", e),
        }
        if let Err(e) = self.control.get_mut().shutdown().await {
            tracing::debug!("Control connection shutdown failed: {}", e);
        }
    }
}

/// Streams `source` into `sink`. `idle` bounds each read and write, not the
/// whole transfer, so a slow but live link never times out.
async fn copy_with_idle_timeout<W>(
    source: &mut (dyn AsyncRead + Unpin + Send),
    sink: &mut W,
    idle: Duration,
) -> Result<u64, FtpError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        let n = timeout(idle, source.read(&mut buf))
            .await
            .map_err(|_| FtpError::Timeout(idle))??;
        if n == 0 {
            return Ok(total);
        }
        timeout(idle, sink.write_all(&buf[..n]))
            .await
            .map_err(|_| FtpError::Timeout(idle))??;
        total += n as u64;
    }
}

async fn send_line<W>(writer: &mut W, line: &str) -> Result<(), FtpError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Opens real FTP sessions from the transfer configuration
pub struct FtpConnector {
    config: TransferConfig,
}

impl FtpConnector {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for FtpConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, FtpError> {
        let conn = FtpConnection::connect(&self.config).await?;
        Ok(Box::new(conn))
    }
}
