use picogo_link::FrameDecoder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:7070".to_string());
    let command = args.next().unwrap_or_else(|| r#"{"LED":"on"}"#.to_string());
    eprintln!("Connecting to {}", addr);
    let mut stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("Connect failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = stream.write_all(format!("{command}\n").as_bytes()).await {
        eprintln!("Send failed: {}", e);
        std::process::exit(1);
    }

    // Wait up to 5s for the first reply, print every frame in that read
    let mut decoder = FrameDecoder::new(4096);
    let mut buf = vec![0u8; 1024];
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match timeout(remaining, stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                eprintln!("Link closed by controller");
                std::process::exit(3);
            }
            Ok(Ok(n)) => {
                let frames = decoder.push(&buf[..n]);
                if frames.is_empty() {
                    continue;
                }
                for frame in frames {
                    println!("Reply: {}", String::from_utf8_lossy(&frame));
                }
                return;
            }
            Ok(Err(e)) => {
                eprintln!("Receive error: {}", e);
                std::process::exit(2);
            }
            Err(_) => {
                eprintln!("Timeout waiting for reply");
                std::process::exit(4);
            }
        }
    }
}
