use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum HttpError {
    #[error("HTTP status {status}{}", render_body(.body))]
    Status {
        status: u16,
        body: String,
        attempts: usize,
    },
    #[error("transport error after {attempts} attempt(s): {message}")]
    Transport { message: String, attempts: usize },
    #[error("response decode failed: {0}")]
    Decode(String),
}

fn render_body(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(" ({body})")
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(15),
            attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

/// Query parameters whose values never appear in errors or logs.
const SECRET_PARAMS: &[&str] = &["key"];

// ureq's own Display embeds the full request URL, query string included.
fn describe_transport(err: &ureq::Transport, query: &[(&str, &str)]) -> String {
    let mut message = err.kind().to_string();
    if let Some(detail) = err.message() {
        message.push_str(": ");
        message.push_str(detail);
    }
    if let Some(source) = std::error::Error::source(err) {
        message.push_str(": ");
        message.push_str(&source.to_string());
    }
    redact_secrets(message, query)
}

fn redact_secrets(mut text: String, query: &[(&str, &str)]) -> String {
    for (name, value) in query {
        if !SECRET_PARAMS.contains(name) || value.is_empty() {
            continue;
        }
        let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
        text = text.replace(&encoded, "[redacted]").replace(value, "[redacted]");
    }
    text
}

pub(crate) fn get_text_with_retries(
    url: &str,
    query: &[(&str, &str)],
    policy: &RetryPolicy,
) -> Result<String, HttpError> {
    let attempts = policy.attempts.max(1);
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(policy.connect_timeout)
        .timeout_read(policy.read_timeout)
        .timeout_write(policy.read_timeout)
        .build();

    for attempt in 1..=attempts {
        let mut request = agent.get(url);
        for (key, value) in query {
            request = request.query(key, value);
        }

        match request.call() {
            Ok(response) => {
                return response
                    .into_string()
                    .map_err(|err| HttpError::Decode(err.to_string()));
            }
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let body = response_body.trim().chars().take(240).collect::<String>();

                if should_retry_http_status(status) && attempt < attempts {
                    warn!(url, status, attempt, "retryable HTTP status, retrying");
                    thread::sleep(policy.retry_delay);
                    continue;
                }

                return Err(HttpError::Status {
                    status,
                    body,
                    attempts: attempt,
                });
            }
            Err(ureq::Error::Transport(err)) => {
                let message = describe_transport(&err, query);
                if attempt < attempts {
                    debug!(url, attempt, error = %message, "transport error, retrying");
                    thread::sleep(policy.retry_delay);
                    continue;
                }
                return Err(HttpError::Transport { message, attempts });
            }
        }
    }

    Err(HttpError::Transport {
        message: "exhausted attempts without a concrete error".to_string(),
        attempts,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub(crate) enum Behavior {
        Respond(u16, String),
        DelayRespond(Duration, u16, String),
    }

    /// Serves queued responses in order and records each request line.
    #[derive(Debug)]
    pub(crate) struct TestServer {
        pub(crate) base_url: String,
        requests: Arc<Mutex<Vec<String>>>,
        shutdown_tx: mpsc::Sender<()>,
        join_handle: Option<std::thread::JoinHandle<()>>,
    }

    impl TestServer {
        pub(crate) fn spawn(behaviors: Vec<Behavior>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            listener.set_nonblocking(true).expect("set nonblocking");
            let addr = listener.local_addr().expect("local addr");

            let requests = Arc::new(Mutex::new(Vec::new()));
            let requests_clone = Arc::clone(&requests);
            let shared_behaviors = Arc::new(Mutex::new(VecDeque::from(behaviors)));
            let behaviors_clone = Arc::clone(&shared_behaviors);
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let join_handle = std::thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }

                    match listener.accept() {
                        Ok((mut stream, _)) => {
                            let behavior = {
                                let mut queue = behaviors_clone.lock().expect("lock behaviors");
                                queue.pop_front().unwrap_or_else(|| {
                                    Behavior::Respond(200, "default-ok".to_string())
                                })
                            };
                            let requests = Arc::clone(&requests_clone);
                            let request_line = consume_request(&mut stream).unwrap_or_default();
                            requests.lock().expect("lock requests").push(request_line);
                            std::thread::spawn(move || {
                                serve_behavior(&mut stream, behavior);
                            });
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                            std::thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            });

            Self {
                base_url: format!("http://{addr}"),
                requests,
                shutdown_tx,
                join_handle: Some(join_handle),
            }
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().expect("lock requests").len()
        }

        pub(crate) fn request_lines(&self) -> Vec<String> {
            self.requests.lock().expect("lock requests").clone()
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            let _ = self.shutdown_tx.send(());
            if let Some(handle) = self.join_handle.take() {
                let _ = handle.join();
            }
        }
    }

    /// Address of a port that was just released, so connecting to it fails.
    pub(crate) fn unreachable_url() -> String {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        format!("http://{addr}")
    }

    fn consume_request(stream: &mut TcpStream) -> std::io::Result<String> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(Duration::from_millis(200)))?;
        let mut buf = [0_u8; 1024];
        let mut data = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => {
                    data.extend_from_slice(&buf[..read]);
                    if data.windows(4).any(|window| window == b"\r\n\r\n") {
                        break;
                    }
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        let text = String::from_utf8_lossy(&data);
        Ok(text.lines().next().unwrap_or_default().to_string())
    }

    fn reason_phrase(status: u16) -> &'static str {
        match status {
            200 => "OK",
            400 => "Bad Request",
            403 => "Forbidden",
            404 => "Not Found",
            408 => "Request Timeout",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Status",
        }
    }

    fn serve_behavior(stream: &mut TcpStream, behavior: Behavior) {
        match behavior {
            Behavior::Respond(status, body) => {
                let _ = write_response(stream, status, &body);
            }
            Behavior::DelayRespond(delay, status, body) => {
                std::thread::sleep(delay);
                let _ = write_response(stream, status, &body);
            }
        }
    }

    fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
        let reason = reason_phrase(status);
        let payload = body.as_bytes();
        write!(
            stream,
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        )?;
        stream.write_all(payload)?;
        stream.flush()
    }
}
