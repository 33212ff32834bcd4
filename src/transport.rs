//! HTTP carriage for pair-verify messages.
//!
//! Accessories accept pair-verify as `POST /pair-verify` with a TLV8 body on a
//! single persistent connection; both round trips must share it.

use std::time::Duration;

use async_trait::async_trait;
use hap_core::error::{Error, Result};
use hap_pairing::Transport;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

const CONTENT_TYPE: &str = "application/pairing+tlv8";

/// Largest response body accepted. Pair-verify bodies are a few hundred bytes.
const MAX_BODY_LEN: usize = 64 * 1024;

/// Persistent HTTP/1.1 connection to one accessory.
pub struct HttpTransport {
    host: String,
    stream: BufReader<TcpStream>,
    timeout: Duration,
}

impl HttpTransport {
    /// Connect to `addr` (`host:port`).
    pub async fn connect(addr: &str, io_timeout: Duration) -> Result<Self> {
        let stream = timeout(io_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Transport(format!("connect to {} timed out", addr)))??;
        stream.set_nodelay(true)?;
        debug!(%addr, "connected");

        Ok(Self {
            host: addr.to_string(),
            stream: BufReader::new(stream),
            timeout: io_timeout,
        })
    }

    async fn post(&mut self, path: &str, body: &[u8]) -> Result<Vec<u8>> {
        let head = format!(
            "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
            path,
            self.host,
            CONTENT_TYPE,
            body.len()
        );

        let stream = self.stream.get_mut();
        stream.write_all(head.as_bytes()).await?;
        stream.write_all(body).await?;
        stream.flush().await?;
        debug!(path, body_len = body.len(), "HTTP request sent");

        timeout(self.timeout, self.read_response())
            .await
            .map_err(|_| Error::Transport(format!("no response to {} in time", path)))?
    }

    async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut status_line = String::new();
        if self.stream.read_line(&mut status_line).await? == 0 {
            return Err(Error::Transport("connection closed by accessory".to_string()));
        }
        let status = parse_status(&status_line)?;

        let mut content_length = 0;
        loop {
            let mut line = String::new();
            if self.stream.read_line(&mut line).await? == 0 {
                return Err(Error::Transport("connection closed in headers".to_string()));
            }
            if line == "\r\n" || line == "\n" {
                break;
            }
            if let Some(len) = content_length_of(&line)? {
                content_length = len;
            }
        }

        if content_length > MAX_BODY_LEN {
            return Err(Error::Transport(format!(
                "response body of {} bytes exceeds {} byte limit",
                content_length, MAX_BODY_LEN
            )));
        }

        let mut body = vec![0u8; content_length];
        self.stream.read_exact(&mut body).await?;
        debug!(status, body_len = body.len(), "HTTP response received");

        if !(200..300).contains(&status) {
            return Err(Error::Transport(format!("accessory answered HTTP {}", status)));
        }
        Ok(body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn pair_verify(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.post("/pair-verify", request).await
    }
}

/// Status code from an `HTTP/1.x NNN Reason` line.
fn parse_status(line: &str) -> Result<u16> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code
            .parse()
            .map_err(|_| Error::Transport(format!("bad status code in {:?}", line.trim_end()))),
        _ => Err(Error::Transport(format!(
            "bad status line {:?}",
            line.trim_end()
        ))),
    }
}

/// `Some(len)` if `line` is a Content-Length header.
fn content_length_of(line: &str) -> Result<Option<usize>> {
    let Some((key, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if !key.trim().eq_ignore_ascii_case("Content-Length") {
        return Ok(None);
    }
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| Error::Transport(format!("bad Content-Length {:?}", value.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    mod parsing {
        use super::*;

        #[test]
        fn status_line_yields_code() {
            assert_eq!(parse_status("HTTP/1.1 200 OK\r\n").unwrap(), 200);
            assert_eq!(parse_status("HTTP/1.0 470 Connection Authorization Required\r\n").unwrap(), 470);
        }

        #[test]
        fn status_line_rejects_garbage() {
            assert!(parse_status("RTSP/1.0 200 OK\r\n").is_err());
            assert!(parse_status("HTTP/1.1 abc\r\n").is_err());
            assert!(parse_status("\r\n").is_err());
        }

        #[test]
        fn content_length_is_case_insensitive() {
            assert_eq!(content_length_of("content-length: 42\r\n").unwrap(), Some(42));
            assert_eq!(content_length_of("Content-Length:7\r\n").unwrap(), Some(7));
        }

        #[test]
        fn other_headers_are_ignored() {
            assert_eq!(content_length_of("Content-Type: application/pairing+tlv8\r\n").unwrap(), None);
            assert_eq!(content_length_of("no colon here\r\n").unwrap(), None);
        }

        #[test]
        fn bad_content_length_is_error() {
            assert!(content_length_of("Content-Length: many\r\n").is_err());
        }
    }

    mod exchange {
        use super::*;

        /// Accept one connection, answer each request with the next canned
        /// response, and return the raw requests seen.
        async fn serve(responses: Vec<Vec<u8>>) -> (String, tokio::task::JoinHandle<Vec<Vec<u8>>>) {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap().to_string();

            let handle = tokio::spawn(async move {
                let (socket, _) = listener.accept().await.unwrap();
                let mut reader = BufReader::new(socket);
                let mut seen = Vec::new();

                for response in responses {
                    let mut request = Vec::new();
                    let mut length = 0;
                    loop {
                        let mut line = String::new();
                        reader.read_line(&mut line).await.unwrap();
                        request.extend_from_slice(line.as_bytes());
                        if let Some(len) = content_length_of(&line).unwrap() {
                            length = len;
                        }
                        if line == "\r\n" {
                            break;
                        }
                    }
                    let mut body = vec![0u8; length];
                    reader.read_exact(&mut body).await.unwrap();
                    request.extend_from_slice(&body);
                    seen.push(request);

                    reader.get_mut().write_all(&response).await.unwrap();
                }
                seen
            });

            (addr, handle)
        }

        fn ok(body: &[u8]) -> Vec<u8> {
            let mut response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
                CONTENT_TYPE,
                body.len()
            )
            .into_bytes();
            response.extend_from_slice(body);
            response
        }

        #[tokio::test]
        async fn posts_tlv8_and_returns_body() {
            let (addr, server) = serve(vec![ok(&[0x06, 0x01, 0x02])]).await;
            let mut transport = HttpTransport::connect(&addr, Duration::from_secs(5)).await.unwrap();

            let body = transport.pair_verify(&[0x06, 0x01, 0x01]).await.unwrap();
            assert_eq!(body, vec![0x06, 0x01, 0x02]);

            let seen = server.await.unwrap();
            let request = String::from_utf8_lossy(&seen[0]);
            assert!(request.starts_with("POST /pair-verify HTTP/1.1\r\n"));
            assert!(request.contains("Content-Type: application/pairing+tlv8\r\n"));
            assert!(request.contains("Content-Length: 3\r\n"));
            assert!(seen[0].ends_with(&[0x06, 0x01, 0x01]));
        }

        #[tokio::test]
        async fn both_round_trips_share_one_connection() {
            let (addr, server) = serve(vec![ok(&[0x06, 0x01, 0x02]), ok(&[0x06, 0x01, 0x04])]).await;
            let mut transport = HttpTransport::connect(&addr, Duration::from_secs(5)).await.unwrap();

            transport.pair_verify(&[0x06, 0x01, 0x01]).await.unwrap();
            let second = transport.pair_verify(&[0x06, 0x01, 0x03]).await.unwrap();
            assert_eq!(second, vec![0x06, 0x01, 0x04]);

            assert_eq!(server.await.unwrap().len(), 2);
        }

        #[tokio::test]
        async fn non_success_status_is_transport_error() {
            let response = b"HTTP/1.1 470 Connection Authorization Required\r\nContent-Length: 0\r\n\r\n".to_vec();
            let (addr, _server) = serve(vec![response]).await;
            let mut transport = HttpTransport::connect(&addr, Duration::from_secs(5)).await.unwrap();

            assert!(matches!(
                transport.pair_verify(&[0x06, 0x01, 0x01]).await,
                Err(Error::Transport(_))
            ));
        }

        #[tokio::test]
        async fn oversized_content_length_is_transport_error() {
            for length in [MAX_BODY_LEN + 1, usize::MAX] {
                let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", length).into_bytes();
                let (addr, _server) = serve(vec![response]).await;
                let mut transport = HttpTransport::connect(&addr, Duration::from_secs(5)).await.unwrap();

                assert!(matches!(
                    transport.pair_verify(&[0x06, 0x01, 0x01]).await,
                    Err(Error::Transport(_))
                ));
            }
        }

        #[tokio::test]
        async fn closed_connection_is_transport_error() {
            let (addr, _server) = serve(Vec::new()).await;
            let mut transport = HttpTransport::connect(&addr, Duration::from_secs(5)).await.unwrap();

            let result = transport.pair_verify(&[0x06, 0x01, 0x01]).await;
            assert!(result.is_err());
        }
    }
}
