//! Integration tests: full dump runs against an in-process mock
//! Pixelflut server on a real TCP socket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};

use pixeldump::{
    export, Color, Connection, ConnectionPool, Dumper, FetchConfig, Pixel, PixelflutError, Point,
};

/// Deterministic canvas content served for unwritten pixels.
fn pattern_color(x: u32, y: u32) -> Color {
    Color::new((x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8)
}

/// A mock Pixelflut server: answers SIZE and pixel reads from a pattern,
/// applies pixel writes to shared state, and counts accepted connections.
struct MockServer {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct MockCanvas {
    width: u32,
    height: u32,
    written: Arc<Mutex<HashMap<(u32, u32), Color>>>,
}

impl MockCanvas {
    fn color_at(&self, x: u32, y: u32) -> Color {
        self.written
            .lock()
            .unwrap()
            .get(&(x, y))
            .copied()
            .unwrap_or_else(|| pattern_color(x, y))
    }
}

async fn spawn_mock_server(width: u32, height: u32) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let canvas = MockCanvas {
        width,
        height,
        written: Arc::new(Mutex::new(HashMap::new())),
    };

    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(serve_client(stream, canvas.clone()));
        }
    });

    MockServer { addr, accepted }
}

async fn serve_client(stream: TcpStream, canvas: MockCanvas) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let request = line.trim_end();
        let tokens: Vec<&str> = request.split(' ').collect();

        let response = match tokens.as_slice() {
            ["SIZE"] => format!("SIZE {} {}\n", canvas.width, canvas.height),
            ["PX", x, y] => {
                let (x, y): (u32, u32) = (x.parse().unwrap(), y.parse().unwrap());
                format!("PX {x} {y} {}\n", canvas.color_at(x, y))
            }
            ["PX", x, y, hex] => {
                // Pixel write: store it, answer nothing.
                let (x, y): (u32, u32) = (x.parse().unwrap(), y.parse().unwrap());
                let color = Color::new(
                    u8::from_str_radix(&hex[0..2], 16).unwrap(),
                    u8::from_str_radix(&hex[2..4], 16).unwrap(),
                    u8::from_str_radix(&hex[4..6], 16).unwrap(),
                );
                canvas.written.lock().unwrap().insert((x, y), color);
                continue;
            }
            _ => panic!("mock server got unexpected request: {request:?}"),
        };

        if writer.write_all(response.as_bytes()).await.is_err() {
            return;
        }
        if writer.flush().await.is_err() {
            return;
        }
    }
}

#[tokio::test]
async fn test_one_shot_dump_matches_served_canvas() {
    let server = spawn_mock_server(40, 30).await;

    let pool = ConnectionPool::connect("127.0.0.1", server.addr.port(), 4)
        .await
        .unwrap();
    assert_eq!(
        server.accepted.load(Ordering::SeqCst),
        4,
        "pool must establish connections eagerly"
    );

    let dumper = Dumper::from_pool(
        pool,
        FetchConfig {
            x_split: 4,
            y_split: 3,
            batch_size: 64,
        },
    );

    let buffer = dumper.snapshot().await.unwrap();
    assert_eq!(buffer.len(), 40 * 30);
    for x in 0..40 {
        for y in 0..30 {
            assert_eq!(
                buffer.get(Point::new(x, y)),
                Some(pattern_color(x, y)),
                "pixel ({x},{y})"
            );
        }
    }
    assert_eq!(dumper.parse_failures().await, 0);

    // The stable buffer renders to a PNG matching the server content.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.png");
    export::export_png(&buffer, &path).unwrap();
    let reloaded = image_pixel(&path, 11, 7);
    let expected = pattern_color(11, 7);
    assert_eq!(reloaded, (expected.r, expected.g, expected.b));

    dumper.shutdown().await;
}

fn image_pixel(path: &std::path::Path, x: u32, y: u32) -> (u8, u8, u8) {
    let image = image::open(path).unwrap().to_rgb8();
    let pixel = image.get_pixel(x, y);
    (pixel[0], pixel[1], pixel[2])
}

#[tokio::test]
async fn test_pool_creation_fails_fast_on_dead_endpoint() {
    // Bind a port, then free it again so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = ConnectionPool::connect("127.0.0.1", port, 3).await;
    assert!(matches!(result, Err(PixelflutError::Connect { .. })));
}

#[tokio::test]
async fn test_recording_observes_live_writes() {
    let server = spawn_mock_server(12, 12).await;

    let dumper = Dumper::builder("127.0.0.1", server.addr.port())
        .pool_size(2)
        .grid(3, 3)
        .batch_size(32)
        .connect()
        .await
        .unwrap();

    let recording = dumper.start_recording().await.unwrap();
    wait_for(|| recording.buffer().len() == 144).await;

    // Paint a pixel on the server; a later loop generation must pick the
    // new color up through the same read path.
    let painted = Pixel::new(Point::new(6, 6), Color::new(1, 2, 3));
    let mut painter = Connection::connect("127.0.0.1", server.addr.port())
        .await
        .unwrap();
    painter.draw_pixel(painted).await.unwrap();

    wait_for(|| recording.buffer().get(painted.point) == Some(painted.color)).await;

    let buffer = recording.stop().await;
    assert_eq!(buffer.get(painted.point), Some(painted.color));
    assert_eq!(buffer.len(), 144);

    painter.close().await.unwrap();
    dumper.shutdown().await;
}

#[tokio::test]
async fn test_draw_then_read_back() {
    let server = spawn_mock_server(10, 10).await;
    let mut conn = Connection::connect("127.0.0.1", server.addr.port())
        .await
        .unwrap();

    let pixels = [
        Pixel::new(Point::new(0, 0), Color::new(0xAB, 0xCD, 0xEF)),
        Pixel::new(Point::new(9, 9), Color::new(0x01, 0x02, 0x03)),
    ];
    conn.draw_pixels(&pixels, 10).await.unwrap();

    // Reads are answered in FIFO order on the same connection, so they
    // observe the writes sent before them.
    let read_back = conn.query_pixel(Point::new(0, 0)).await.unwrap();
    assert_eq!(read_back.color, Color::new(0xAB, 0xCD, 0xEF));

    let untouched = conn.query_pixel(Point::new(5, 5)).await.unwrap();
    assert_eq!(untouched.color, pattern_color(5, 5));

    conn.close().await.unwrap();
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5 seconds");
}
