//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed route table from a thread-per-connection accept loop.
//! Routes can be scripted to fail their first N hits (or every hit) with a
//! given status. The server tracks per-route hit counts and the high-water
//! mark of concurrently served requests, which lets tests assert retry
//! sequencing and the pool's concurrency bound.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Route {
    pub body: Vec<u8>,
    /// Respond with `fail_status` for the first `fail_first` hits.
    pub fail_first: usize,
    pub fail_status: u16,
    /// Pause before answering, so tests can observe overlap and cancel
    /// mid-flight.
    pub delay: Duration,
}

impl Route {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            fail_first: 0,
            fail_status: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn failing_first(hits: usize, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            fail_first: hits,
            fail_status: status,
            ..Self::ok(body)
        }
    }

    pub fn always_failing(status: u16) -> Self {
        Self::failing_first(usize::MAX, status, Vec::new())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Default)]
struct Counters {
    hits: Mutex<HashMap<String, usize>>,
    current: AtomicUsize,
    peak: AtomicUsize,
}

pub struct FetchServer {
    addr: SocketAddr,
    counters: Arc<Counters>,
}

impl FetchServer {
    /// Bind an ephemeral port and serve `routes` from a background thread.
    pub fn start(routes: HashMap<String, Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().unwrap();
        let counters = Arc::new(Counters::default());
        let routes = Arc::new(routes);

        let c = Arc::clone(&counters);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let routes = Arc::clone(&routes);
                let c = Arc::clone(&c);
                thread::spawn(move || handle(stream, &routes, &c));
            }
        });

        Self { addr, counters }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Number of requests seen for `path`.
    pub fn hits(&self, path: &str) -> usize {
        *self.counters.hits.lock().unwrap().get(path).unwrap_or(&0)
    }

    /// Highest number of requests served at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }
}

fn handle(mut stream: TcpStream, routes: &HashMap<String, Route>, counters: &Counters) {
    let path = match read_request_path(&mut stream) {
        Some(p) => p,
        None => return,
    };

    let hit_number = {
        let mut hits = counters.hits.lock().unwrap();
        let n = hits.entry(path.clone()).or_insert(0);
        *n += 1;
        *n
    };
    let current = counters.current.fetch_add(1, Ordering::SeqCst) + 1;
    counters.peak.fetch_max(current, Ordering::SeqCst);

    let response = match routes.get(&path) {
        None => respond(404, b"not found"),
        Some(route) => {
            if !route.delay.is_zero() {
                thread::sleep(route.delay);
            }
            if hit_number <= route.fail_first {
                respond(route.fail_status, b"scripted failure")
            } else {
                respond(200, &route.body)
            }
        }
    };
    let _ = stream.write_all(&response);
    let _ = stream.flush();

    counters.current.fetch_sub(1, Ordering::SeqCst);
}

fn read_request_path(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    // Read header bytes until the blank line; requests here have no body.
    while !buf.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte) {
            Ok(1) => buf.push(byte[0]),
            _ => return None,
        }
        if buf.len() > 16 * 1024 {
            return None;
        }
    }
    let text = String::from_utf8_lossy(&buf);
    let first_line = text.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next()?;
    if method != "GET" {
        return None;
    }
    Some(parts.next()?.to_string())
}

fn respond(status: u16, body: &[u8]) -> Vec<u8> {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Error",
    };
    let mut out = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}
