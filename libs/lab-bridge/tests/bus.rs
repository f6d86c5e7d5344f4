use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use lab_bridge::{BusClient, Connector, EventPublisher, NatsConnector};

const INFO: &str = r#"INFO {"server_id":"stub","server_name":"stub","version":"2.10.0","proto":1,"max_payload":1048576,"headers":true}"#;

/// Single-connection NATS speaker: answers `PING` with `PONG` and reports
/// every line the client sends, then `EOF` once the client hangs up.
fn nats_stub() -> (SocketAddr, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut writer = stream.try_clone().unwrap();
        writer.write_all(format!("{INFO}\r\n").as_bytes()).unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim_end().to_string();
            if line == "PING" {
                let _ = writer.write_all(b"PONG\r\n");
            }
            let _ = tx.send(line);
        }
        let _ = tx.send("EOF".to_string());
    });
    (addr, rx)
}

fn lines_until_eof(rx: &mpsc::Receiver<String>) -> Vec<String> {
    let mut seen = Vec::new();
    while let Ok(line) = rx.recv_timeout(Duration::from_secs(5)) {
        let eof = line == "EOF";
        seen.push(line);
        if eof {
            break;
        }
    }
    seen
}

#[test]
fn unreachable_broker_degrades_to_noop() {
    // Nothing listens on port 1.
    let connector = NatsConnector::new("nats://127.0.0.1:1", Duration::from_secs(2));
    let mut publisher = EventPublisher::new(connector);

    let started = Instant::now();
    publisher.publish_started("batch", "/models/m.gguf", serde_json::json!({"ctx": 2048}));
    publisher.publish("llama.benchmark.cell.v1", serde_json::json!({"throughput_tps": 1.0}));
    assert!(!publisher.is_connected());
    assert!(started.elapsed() < Duration::from_secs(10));

    publisher.close();
    publisher.close();
}

#[test]
fn publish_reaches_broker_and_close_drains_connection() {
    let (addr, rx) = nats_stub();
    let connector = NatsConnector::new(&format!("nats://{addr}"), Duration::from_secs(5));
    let mut publisher = EventPublisher::new(connector);

    publisher.publish_started("batch", "/models/m.gguf", serde_json::json!({}));
    assert!(publisher.is_connected());
    publisher.close();
    assert!(!publisher.is_connected());

    let seen = lines_until_eof(&rx);
    let published = seen
        .iter()
        .position(|l| l.starts_with("PUB llama.benchmark.started.v1 "))
        .expect("PUB line");
    assert!(seen[published + 1].contains(r#""source":"llama-throughput-lab""#));
    assert_eq!(seen.last().map(String::as_str), Some("EOF"));
}

#[test]
fn nats_client_close_completes_drain() {
    let (addr, rx) = nats_stub();
    let connector = NatsConnector::new(&format!("nats://{addr}"), Duration::from_secs(5));
    let mut client = connector.connect().unwrap();

    client.publish("t", b"{}".to_vec()).unwrap();
    client.flush().unwrap();
    client.close().unwrap();

    let seen = lines_until_eof(&rx);
    assert!(seen.iter().any(|l| l == "PUB t 2"));
    assert_eq!(seen.last().map(String::as_str), Some("EOF"));
}
