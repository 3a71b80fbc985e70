//! Minimal HTTP/1.1 chunk-session server for integration tests.
//!
//! Implements `start`, `append`, `finish`, `status`, and `cancel` under a
//! common prefix with multipart form bodies. Appends must arrive in order; a
//! resent chunk that was already stored is acknowledged without being stored
//! twice. Finished files are kept in memory for assertions.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const PREFIX: &str = "/upload/upload_chunk";

#[derive(Debug, Default)]
struct Session {
    name: String,
    total: u64,
    next_index: u64,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<String, Session>,
    finished: HashMap<String, Vec<u8>>,
    cancelled: Vec<String>,
    /// chunk index -> remaining injected failures
    append_failures: HashMap<u64, u32>,
    appends: Vec<u64>,
    started: u64,
}

#[derive(Clone)]
pub struct ChunkServer {
    pub base_url: String,
    state: Arc<Mutex<State>>,
}

impl ChunkServer {
    /// Content of a finished upload, by final file name.
    pub fn finished(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().finished.get(name).cloned()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }

    /// Chunk indices received by `append`, including rejected ones.
    pub fn appends(&self) -> Vec<u64> {
        self.state.lock().unwrap().appends.clone()
    }

    pub fn sessions_started(&self) -> u64 {
        self.state.lock().unwrap().started
    }

    /// Answer `append` of `index` with HTTP 500 `times` times.
    pub fn fail_chunk(&self, index: u64, times: u32) {
        self.state
            .lock()
            .unwrap()
            .append_failures
            .insert(index, times);
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start() -> ChunkServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(Mutex::new(State::default()));
    let shared = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &state));
        }
    });
    ChunkServer {
        base_url: format!("http://127.0.0.1:{}{}", port, PREFIX),
        state,
    }
}

struct Request {
    method: String,
    path: String,
    query: String,
    content_type: String,
    body: Vec<u8>,
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    let (status, body) = route(&req, state);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(body.as_bytes());
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 8192];
    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut tmp).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?.to_string();
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (target, String::new()),
    };

    let mut content_length = 0usize;
    let mut content_type = String::new();
    let mut expect_continue = false;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.parse().unwrap_or(0),
                "content-type" => content_type = value.to_string(),
                "expect" => expect_continue = value.eq_ignore_ascii_case("100-continue"),
                _ => {}
            }
        }
    }
    if expect_continue {
        let _ = stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n");
    }

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut tmp).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    body.truncate(content_length);
    Some(Request {
        method,
        path,
        query,
        content_type,
        body,
    })
}

fn route(req: &Request, state: &Mutex<State>) -> (&'static str, String) {
    let Some(op) = req.path.strip_prefix(PREFIX) else {
        return ("404 Not Found", r#"{"error":"no such endpoint"}"#.to_string());
    };
    let mut st = state.lock().unwrap();
    match (req.method.as_str(), op) {
        ("POST", "/start") => {
            let f = multipart_fields(req);
            let total: u64 = text(&f, "total_size").parse().unwrap_or(0);
            st.started += 1;
            let sid = format!("sess{}", st.started);
            st.sessions.insert(
                sid.clone(),
                Session {
                    name: text(&f, "name"),
                    total,
                    ..Session::default()
                },
            );
            (
                "200 OK",
                format!(
                    r#"{{"session_id":"{}","temp":"{}_x.part","recommended_chunk_size":1048576}}"#,
                    sid, sid
                ),
            )
        }
        ("POST", "/append") => {
            let f = multipart_fields(req);
            let sid = text(&f, "session_id");
            let index: u64 = text(&f, "chunk_index").parse().unwrap_or(u64::MAX);
            st.appends.push(index);
            if let Some(left) = st.append_failures.get_mut(&index) {
                if *left > 0 {
                    *left -= 1;
                    return ("500 Internal Server Error", r#"{"error":"disk full"}"#.to_string());
                }
            }
            let chunk = f.get("chunk").cloned().unwrap_or_default();
            let Some(session) = st.sessions.get_mut(&sid) else {
                return ("404 Not Found", r#"{"error":"Session not found"}"#.to_string());
            };
            if index > session.next_index {
                return ("409 Conflict", r#"{"error":"chunk index mismatch"}"#.to_string());
            }
            if index == session.next_index {
                session.data.extend_from_slice(&chunk);
                session.next_index += 1;
            }
            let pct = if session.total == 0 {
                100.0
            } else {
                session.data.len() as f64 * 100.0 / session.total as f64
            };
            ("200 OK", format!(r#"{{"progress":{:.2}}}"#, pct))
        }
        ("POST", "/finish") => {
            let f = multipart_fields(req);
            let sid = text(&f, "session_id");
            let Some(session) = st.sessions.remove(&sid) else {
                return ("404 Not Found", r#"{"error":"Session not found"}"#.to_string());
            };
            let final_name = text(&f, "final_filename");
            let name = if final_name.is_empty() {
                session.name
            } else {
                final_name
            };
            st.finished.insert(name.clone(), session.data);
            (
                "200 OK",
                format!(r#"{{"status":"finished","filename":"{}"}}"#, name),
            )
        }
        ("GET", "/status") => {
            let sid = req
                .query
                .split('&')
                .find_map(|kv| kv.strip_prefix("session_id="))
                .unwrap_or("");
            match st.sessions.get(sid) {
                Some(s) => (
                    "200 OK",
                    format!(
                        r#"{{"uploaded_size":{},"total_size":{}}}"#,
                        s.data.len(),
                        s.total
                    ),
                ),
                None => ("404 Not Found", r#"{"error":"Session not found"}"#.to_string()),
            }
        }
        ("POST", "/cancel") => {
            let f = multipart_fields(req);
            let sid = text(&f, "session_id");
            st.sessions.remove(&sid);
            st.cancelled.push(sid);
            ("200 OK", r#"{"status":"cancelled"}"#.to_string())
        }
        _ => ("405 Method Not Allowed", r#"{"error":"method not allowed"}"#.to_string()),
    }
}

fn text(fields: &HashMap<String, Vec<u8>>, name: &str) -> String {
    fields
        .get(name)
        .map(|v| String::from_utf8_lossy(v).to_string())
        .unwrap_or_default()
}

/// Split a `multipart/form-data` body into field name -> raw value.
fn multipart_fields(req: &Request) -> HashMap<String, Vec<u8>> {
    let mut out = HashMap::new();
    let Some(boundary) = req
        .content_type
        .split(';')
        .find_map(|p| p.trim().strip_prefix("boundary="))
    else {
        return out;
    };
    let delim = format!("--{}", boundary.trim_matches('"'));
    let body = &req.body;
    let mut pos = match find(body, delim.as_bytes()) {
        Some(p) => p + delim.len(),
        None => return out,
    };
    loop {
        if body[pos..].starts_with(b"--") {
            break;
        }
        let part_start = pos + 2;
        let Some(rel_end) = find(&body[part_start..], delim.as_bytes()) else {
            break;
        };
        let part = &body[part_start..part_start + rel_end];
        // Part ends with CRLF before the next delimiter.
        let part = part.strip_suffix(b"\r\n").unwrap_or(part);
        if let Some(h_end) = find(part, b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&part[..h_end]);
            if let Some(name) = headers
                .split(';')
                .find_map(|p| p.trim().strip_prefix("name="))
                .map(|n| n.split("\r\n").next().unwrap_or(n).trim_matches('"').to_string())
            {
                out.insert(name, part[h_end + 4..].to_vec());
            }
        }
        pos = part_start + rel_end + delim.len();
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
