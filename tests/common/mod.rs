#![allow(dead_code)]

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Minimal HTTP server that plays back a fixed sequence of responses, one
/// per connection. Used where a test needs different answers for
/// successive requests (e.g. 503, 503, 200), which header-matched mocks
/// cannot express.
pub async fn scripted_server(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_handle = hits.clone();

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            hits_handle.fetch_add(1, Ordering::SeqCst);
            read_request(&mut socket).await;

            let reason = match status {
                200 => "OK",
                400 => "Bad Request",
                401 => "Unauthorized",
                500 => "Internal Server Error",
                503 => "Service Unavailable",
                _ => "Unknown",
            };
            let response = format!(
                "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), hits)
}

async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut buf = vec![0u8; 65536];
    let mut total = 0;
    loop {
        let n = match socket.read(&mut buf[total..]).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        total += n;
        let text = String::from_utf8_lossy(&buf[..total]);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text
                .lines()
                .find_map(|line| {
                    line.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                })
                .unwrap_or(0);
            if total - (header_end + 4) >= content_length {
                break;
            }
        }
        if total == buf.len() {
            break;
        }
    }
}

/// RSS 2.0 document with `count` items for the given channel.
pub fn rss_feed(channel: &str, count: usize) -> String {
    let mut items = String::new();
    for i in 0..count {
        items.push_str(&format!(
            "<item>\
             <title>{channel} story {i}</title>\
             <description>Report {i} from {channel} with enough detail to summarize.</description>\
             <link>https://t.me/{channel}/{i}</link>\
             </item>"
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <rss version=\"2.0\"><channel><title>{channel}</title>{items}</channel></rss>"
    )
}

/// OpenAI-style chat completion body.
pub fn chat_body(content: &str, finish_reason: &str) -> String {
    json!({
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": finish_reason,
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200},
    })
    .to_string()
}
