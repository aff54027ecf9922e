//! Frames survive real sockets, including ones that coalesce writes.

use std::thread;

use packstream_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, HeaderWidth};
use packstream_transport::{Connection, Endpoint, Listener};

fn exchange(listener: Listener, config: FrameConfig) {
    let endpoint = listener.local_endpoint();
    let client = thread::spawn(move || {
        let conn = Connection::connect(&endpoint).unwrap();
        let mut writer = FrameWriter::with_config(conn, config);
        for size in [0usize, 1, 255, 4096, 70_000] {
            writer.send(&vec![size as u8; size]).unwrap();
        }
    });

    let conn = listener.accept().unwrap();
    let mut reader = FrameReader::with_config(conn, config);
    for size in [0usize, 1, 255, 4096, 70_000] {
        let message = reader.read_message().unwrap();
        assert_eq!(message.len(), size);
        assert!(message.iter().all(|byte| *byte == size as u8));
    }
    client.join().unwrap();
    assert!(matches!(reader.read_message(), Err(FrameError::ConnectionClosed)));
}

#[test]
fn tcp_round_trip() {
    let listener = Listener::bind(&Endpoint::tcp("127.0.0.1:0")).unwrap();
    exchange(listener, FrameConfig::new(HeaderWidth::Four));
}

#[cfg(unix)]
#[test]
fn unix_round_trip() {
    let dir = std::env::temp_dir().join(format!("packstream-rt-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let listener = Listener::bind(&Endpoint::unix(dir.join("rt.sock"))).unwrap();
    exchange(listener, FrameConfig::new(HeaderWidth::Eight));
    let _ = std::fs::remove_dir_all(&dir);
}
