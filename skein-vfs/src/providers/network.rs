//! Read-only network provider (`http://`, `https://`)

use crate::config;
use crate::error::{VfsError, VfsResult};
use crate::name::Name;
use crate::provider::FileProvider;
use crate::registry::Registry;
use crate::vfs::Vfs;
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_LENGTH;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

pub const SCHEMES: [&str; 2] = ["http", "https"];

/// Register one network provider per supported scheme
pub fn register(registry: &Registry) -> bool {
    let mut all = true;
    for scheme in SCHEMES {
        all &= registry.register(scheme, move |_: &Vfs| {
            Arc::new(NetworkProvider::new(scheme)) as Arc<dyn FileProvider>
        });
    }
    all
}

/// Whole-file downloads over HTTP(S).
///
/// Remote resources are treated as files that always exist; only
/// `read_file` and `file_size` actually touch the network.
#[derive(Debug)]
pub struct NetworkProvider {
    scheme: &'static str,
    client: OnceCell<Client>,
}

impl NetworkProvider {
    pub fn new(scheme: &'static str) -> Self {
        Self {
            scheme,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> VfsResult<&Client> {
        self.client.get_or_try_init(|| {
            let cfg = &config::config().network;
            Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .user_agent(cfg.user_agent.as_str())
                .build()
                .map_err(|e| VfsError::Network(e.to_string()))
        })
    }
}

impl FileProvider for NetworkProvider {
    fn scheme_name(&self) -> &str {
        self.scheme
    }

    fn exists(&self, _name: &Name) -> bool {
        true
    }

    fn is_file(&self, _name: &Name) -> bool {
        true
    }

    /// From a HEAD request; 0 when the server does not report a length.
    fn file_size(&self, name: &Name) -> u64 {
        let url = name.to_canonical_string();
        let Ok(client) = self.client() else {
            return 0;
        };
        match client.head(&url).send() {
            Ok(resp) if resp.status().is_success() => resp
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            Ok(resp) => {
                debug!(target: "skein::net", url = %url, status = %resp.status(), "HEAD failed");
                0
            }
            Err(e) => {
                debug!(target: "skein::net", url = %url, error = %e, "HEAD failed");
                0
            }
        }
    }

    fn read_file(&self, name: &Name) -> VfsResult<Vec<u8>> {
        let url = name.to_canonical_string();
        trace!(target: "skein::net", url = %url, "GET");
        let resp = self
            .client()?
            .get(&url)
            .send()
            .map_err(|e| VfsError::Network(format!("{}: {}", url, e)))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(VfsError::not_found(url));
        }
        if !status.is_success() {
            return Err(VfsError::Network(format!("{}: HTTP {}", url, status)));
        }
        let body = resp
            .bytes()
            .map_err(|e| VfsError::Network(format!("{}: {}", url, e)))?;
        debug!(target: "skein::net", url = %url, bytes = body.len(), "Downloaded");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Status;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Minimal HTTP/1.1 server answering `requests` connections.
    fn serve(requests: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming().take(requests) {
                let mut stream = stream.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let request = String::from_utf8_lossy(&request);
                let line = request.lines().next().unwrap_or_default().to_string();
                let response = if line.contains("/missing") {
                    "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                } else if line.starts_with("HEAD") {
                    "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\n".to_string()
                } else {
                    "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello".to_string()
                };
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_read_and_size_from_local_server() {
        let base = serve(3);
        let net = NetworkProvider::new("http");
        let name = Name::parse(&format!("{}/greeting.txt", base));
        assert_eq!(net.read_file(&name).unwrap(), b"hello");
        assert_eq!(net.file_size(&name), 5);

        let missing = Name::parse(&format!("{}/missing", base));
        assert!(net.read_file(&missing).unwrap_err().is_not_found());
    }

    #[test]
    fn test_connection_refused_is_a_failure() {
        let net = NetworkProvider::new("http");
        let name = Name::parse("http://127.0.0.1:1/file.txt");
        let err = net.read_file(&name).unwrap_err();
        assert_eq!(err.status(), Status::Failure);
        assert!(!err.is_fatal());
        assert_eq!(net.file_size(&name), 0);
    }

    #[test]
    fn test_queries_and_unsupported_operations() {
        let net = NetworkProvider::new("https");
        let name = Name::parse("https://example.invalid/x");
        assert!(net.exists(&name));
        assert!(net.is_file(&name));
        assert!(!net.is_dir(&name));
        assert_eq!(
            net.write_file(&name, b"x", true).unwrap_err().status(),
            Status::Unsupported
        );
        assert_eq!(net.remove(&name).unwrap_err().status(), Status::Unsupported);
        assert_eq!(net.scheme_name(), "https");
    }

    #[test]
    fn test_registers_both_schemes() {
        let registry = Registry::new();
        assert!(register(&registry));
        assert!(registry.contains("http"));
        assert!(registry.contains("https"));
        assert!(!registry.contains("ftp"));
        assert!(!register(&registry));
    }
}
