use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use ssh2::{CheckResult, ErrorCode, KnownHostFileKind, Session, Sftp};

use crate::config::{Credential, SftpConfig};
use crate::constants::REMOTE_DIR_MODE;
use crate::error::{Result, UploadError};
use crate::remote::{Connector, Presence, Removal, RemoteFileStore, SessionState};
use crate::security::scrub_path;

// SFTP status codes (draft-ietf-secsh-filexfer-02)
const LIBSSH2_FX_NO_SUCH_FILE: i32 = 2;
const LIBSSH2_FX_NO_SUCH_PATH: i32 = 10;

fn is_not_found(err: &ssh2::Error) -> bool {
    matches!(
        err.code(),
        ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_FILE) | ErrorCode::SFTP(LIBSSH2_FX_NO_SUCH_PATH)
    )
}

/// Opens a fresh SSH session and SFTP channel per call.
#[derive(Debug, Clone)]
pub struct SftpConnector {
    config: SftpConfig,
}

impl SftpConnector {
    pub fn new(config: SftpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SftpConfig {
        &self.config
    }
}

impl Connector for SftpConnector {
    fn connect(&self) -> Result<Box<dyn RemoteFileStore>> {
        Ok(Box::new(SftpStore::connect(&self.config)?))
    }
}

/// One authenticated SSH session with its SFTP sub-channel.
pub struct SftpStore {
    session: Option<Session>,
    sftp: Option<Sftp>,
    state: SessionState,
    endpoint: String,
}

impl SftpStore {
    /// Connect, authenticate and open the SFTP subsystem.
    ///
    /// Any failure leaves the store `Faulted`; whatever was opened is torn
    /// down before the connection error is returned.
    pub fn connect(config: &SftpConfig) -> Result<Self> {
        config.validate()?;

        let mut store = SftpStore {
            session: None,
            sftp: None,
            state: SessionState::Disconnected,
            endpoint: config.endpoint(),
        };

        let start = Instant::now();
        match store.establish(config) {
            Ok(()) => {
                store.state = SessionState::Connected;
                debug!("Connected to sftp://{} in {:?}", store.endpoint, start.elapsed());
                Ok(store)
            }
            Err(e) => {
                store.state = SessionState::Faulted;
                warn!("Failed to connect to sftp://{}: {}", store.endpoint, e);
                store.disconnect();
                Err(e)
            }
        }
    }

    fn establish(&mut self, config: &SftpConfig) -> Result<()> {
        let timeout = Duration::from_millis(config.session.timeout_ms);
        let tcp = connect_tcp(&config.host, config.port, timeout)?;

        tcp.set_read_timeout(Some(timeout))
            .map_err(|e| UploadError::connection("Failed to set read timeout", &e))?;
        tcp.set_write_timeout(Some(timeout))
            .map_err(|e| UploadError::connection("Failed to set write timeout", &e))?;

        let mut session = Session::new()
            .map_err(|e| UploadError::connection("Failed to create SSH session", &e))?;
        session.set_tcp_stream(tcp);
        // validate() keeps timeout_ms within u32
        session.set_timeout(config.session.timeout_ms as u32);
        session.set_compress(config.session.compression());
        for key in config.session.unrecognised_options() {
            debug!("Ignoring unsupported session option {}", key);
        }
        let session = self.session.insert(session);

        session
            .handshake()
            .map_err(|e| UploadError::connection("Failed to perform SSH handshake", &e))?;

        verify_host_key(session, config)?;
        authenticate(session, config)?;

        let sftp = session
            .sftp()
            .map_err(|e| UploadError::connection("Failed to create SFTP subsystem", &e))?;
        self.sftp = Some(sftp);
        Ok(())
    }

    fn channel(&self) -> Result<&Sftp> {
        match (&self.sftp, self.state) {
            (Some(sftp), SessionState::Connected) => Ok(sftp),
            _ => Err(UploadError::Connection(format!(
                "session to {} is {}, not connected",
                self.endpoint, self.state
            ))),
        }
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| UploadError::connection(&format!("Failed to resolve {}:{}", host, port), &e))?
        .collect();

    let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("TCP connect to {} failed: {}", addr, e);
                last_err = e;
            }
        }
    }

    Err(UploadError::connection(
        &format!("Failed to connect to {}:{}", host, port),
        &last_err,
    ))
}

fn verify_host_key(session: &Session, config: &SftpConfig) -> Result<()> {
    if !config.session.strict_host_key_checking() {
        debug!("Host key checking disabled for {}", config.host);
        return Ok(());
    }

    let known_hosts_path = config.session.known_hosts_file().ok_or_else(|| {
        UploadError::Connection("strict host key checking needs a known_hosts file".into())
    })?;

    let (key, _key_type) = session
        .host_key()
        .ok_or_else(|| UploadError::Connection("server did not present a host key".into()))?;

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| UploadError::connection("Failed to initialise known hosts", &e))?;
    known_hosts
        .read_file(&known_hosts_path, KnownHostFileKind::OpenSSH)
        .map_err(|e| {
            UploadError::connection(
                &format!("Failed to read {}", known_hosts_path.display()),
                &e,
            )
        })?;

    match known_hosts.check_port(&config.host, config.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::Mismatch => Err(UploadError::Connection(format!(
            "host key for {} does not match {}",
            config.host,
            known_hosts_path.display()
        ))),
        CheckResult::NotFound => Err(UploadError::Connection(format!(
            "host {} is not in {}",
            config.host,
            known_hosts_path.display()
        ))),
        CheckResult::Failure => Err(UploadError::Connection(format!(
            "host key check for {} failed",
            config.host
        ))),
    }
}

fn authenticate(session: &Session, config: &SftpConfig) -> Result<()> {
    match &config.credential {
        Credential::Password { password } => session
            .userauth_password(&config.username, password)
            .map_err(|e| UploadError::connection("Failed to authenticate with password", &e))?,
        Credential::PrivateKey { path, passphrase } => session
            .userauth_pubkey_file(&config.username, None, path, passphrase.as_deref())
            .map_err(|e| {
                UploadError::connection(
                    &format!(
                        "Failed to authenticate with private key {}",
                        scrub_path(&path.to_string_lossy())
                    ),
                    &e,
                )
            })?,
    }

    if !session.authenticated() {
        return Err(UploadError::Connection("Authentication failed".into()));
    }
    Ok(())
}

impl RemoteFileStore for SftpStore {
    fn state(&self) -> SessionState {
        self.state
    }

    fn stat(&mut self, path: &str) -> Result<Presence> {
        match self.channel()?.stat(Path::new(path)) {
            Ok(stat) if stat.is_dir() => Ok(Presence::Directory),
            Ok(_) => Ok(Presence::File),
            Err(e) if is_not_found(&e) => Ok(Presence::NotFound),
            Err(e) => Err(UploadError::transfer(&format!("stat {}", path), &e)),
        }
    }

    fn create_dir(&mut self, path: &str) -> Result<()> {
        self.channel()?
            .mkdir(Path::new(path), REMOTE_DIR_MODE)
            .map_err(|e| UploadError::directory(path, e.to_string()))
    }

    fn put(&mut self, content: &mut dyn Read, path: &str) -> Result<u64> {
        let start = Instant::now();
        let mut remote_file = self
            .channel()?
            .create(Path::new(path))
            .map_err(|e| UploadError::transfer(&format!("Failed to create remote file {}", path), &e))?;

        let written = io::copy(content, &mut remote_file)
            .map_err(|e| UploadError::transfer(&format!("Failed to write remote file {}", path), &e))?;

        debug!("Wrote {} bytes to {} in {:?}", written, path, start.elapsed());
        Ok(written)
    }

    fn get(&mut self, path: &str) -> Result<Option<Vec<u8>>> {
        let mut remote_file = match self.channel()?.open(Path::new(path)) {
            Ok(file) => file,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => {
                return Err(UploadError::transfer(&format!("Failed to open remote file {}", path), &e))
            }
        };

        let mut contents = Vec::new();
        remote_file
            .read_to_end(&mut contents)
            .map_err(|e| UploadError::transfer(&format!("Failed to read remote file {}", path), &e))?;
        Ok(Some(contents))
    }

    fn remove(&mut self, path: &str) -> Result<Removal> {
        match self.channel()?.unlink(Path::new(path)) {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if is_not_found(&e) => Ok(Removal::NotFound),
            Err(e) => Err(UploadError::transfer(&format!("Failed to remove {}", path), &e)),
        }
    }

    fn disconnect(&mut self) {
        // Channel first, then the session that carries it
        drop(self.sftp.take());

        if let Some(session) = self.session.take() {
            if let Err(e) = session.disconnect(None, "upload session closed", None) {
                warn!("Failed to disconnect from sftp://{}: {}", self.endpoint, e);
            }
        }

        if self.state != SessionState::Disconnected {
            info!("Disconnected from sftp://{}", self.endpoint);
        }
        self.state = SessionState::Disconnected;
    }
}
