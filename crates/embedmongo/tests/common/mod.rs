//! Test helpers for embedmongo integration tests

#![allow(dead_code)]

use embedmongo::runtime::wire;
use embedmongo::{
    ArtifactDescriptor, BitSize, Command, CpuArch, Distribution, Os, OsVersion, Platform,
    ResolveError, Resolver, SupervisorConfig, Version,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Prints a plain text startup banner, the readiness line, then idles
pub const READY_SCRIPT: &str = r#"echo "MongoDB starting : pid=$$ port=27017 dbpath=/tmp/db 64-bit host=test"
echo "[initandlisten] waiting for connections on port 27017"
exec sleep 30"#;

pub fn platform(os: Os, arch: CpuArch, bits: BitSize) -> Platform {
    Platform::new(os, arch, bits)
}

pub fn linux64(os_version: Option<OsVersion>) -> Platform {
    let platform = Platform::new(Os::Linux, CpuArch::X86, BitSize::B64);
    match os_version {
        Some(os_version) => platform.with_os_version(os_version).unwrap(),
        None => platform,
    }
}

pub fn resolve(version: &str, platform: Platform) -> Result<ArtifactDescriptor, ResolveError> {
    let distribution = Distribution::new(Version::parse(version).unwrap(), platform);
    Resolver::new().resolve(&distribution)
}

/// A `/bin/sh -c` fake server using the mongod readiness patterns
pub fn shell_server(name: &str, script: &str, address: SocketAddr) -> SupervisorConfig {
    let mut config = SupervisorConfig::new(name, "/bin/sh", address);
    config.args = vec!["-c".to_string(), script.to_string()];
    config.patterns = Command::Mongod.startup_patterns();
    config.startup_timeout = Duration::from_secs(10);
    config.shutdown_step_timeout = Duration::from_millis(300);
    config
}

/// Loopback listener recording every wire message it receives, then hanging
/// up without replying
pub struct CommandRecorder {
    pub address: SocketAddr,
    payloads: Arc<Mutex<Vec<Vec<u8>>>>,
    task: JoinHandle<()>,
}

impl CommandRecorder {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let payloads = Arc::new(Mutex::new(Vec::new()));

        let recorded = payloads.clone();
        let task = tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut message = vec![0u8; wire::HEADER_LEN];
                if socket.read_exact(&mut message).await.is_err() {
                    continue;
                }
                let Some((len, _)) = wire::header(&message) else {
                    continue;
                };
                message.resize(len as usize, 0);
                if socket
                    .read_exact(&mut message[wire::HEADER_LEN..])
                    .await
                    .is_ok()
                {
                    recorded.lock().unwrap().push(message);
                }
            }
        });

        Self {
            address,
            payloads,
            task,
        }
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().unwrap().clone()
    }
}

impl Drop for CommandRecorder {
    fn drop(&mut self) {
        self.task.abort();
    }
}
