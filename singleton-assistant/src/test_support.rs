//! In-process stand-in for an Ollama server

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub path: String,
    pub body: String,
}

pub struct FakeOllama {
    pub endpoint: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeOllama {
    pub fn requests_to(&self, path: &str) -> Vec<serde_json::Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .map(|r| serde_json::from_str(&r.body).unwrap_or(serde_json::Value::Null))
            .collect()
    }
}

/// Answer each request path with a canned status and body, in order for
/// repeated paths. The last body for a path repeats once its list runs out.
pub async fn serve(routes: Vec<(&'static str, u16, Vec<String>)>) -> FakeOllama {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::<Recorded>::new()));
    let recorded = requests.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let (path, body) = read_request(&mut socket).await;
            let seen = {
                let mut log = recorded.lock().unwrap();
                let seen = log.iter().filter(|r| r.path == path).count();
                log.push(Recorded {
                    path: path.clone(),
                    body,
                });
                seen
            };
            let (status, body) = routes
                .iter()
                .find(|(route, _, _)| *route == path)
                .map(|(_, status, bodies)| {
                    let body = bodies.get(seen).or(bodies.last()).cloned().unwrap_or_default();
                    (*status, body)
                })
                .unwrap_or((404, String::new()));
            let response = format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    FakeOllama {
        endpoint: format!("http://{addr}"),
        requests,
    }
}

async fn read_request(socket: &mut TcpStream) -> (String, String) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut split = None;
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
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
            split = Some(end);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    let text = String::from_utf8_lossy(&buf).into_owned();
    let path = text
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let body = split
        .map(|end| String::from_utf8_lossy(&buf[end + 4..]).into_owned())
        .unwrap_or_default();
    (path, body)
}

/// An endpoint nothing listens on.
pub async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
