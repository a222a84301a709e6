/*!
 * Echo Listener
 * Loopback TCP peer for the connect scenario
 */

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts one connection on 127.0.0.1, captures everything the peer sends
/// and echoes it back
pub struct EchoListener {
    addr: SocketAddr,
    worker: Option<JoinHandle<io::Result<Vec<u8>>>>,
}

impl EchoListener {
    /// Bind an ephemeral loopback port and start accepting
    pub fn spawn() -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
        let addr = listener.local_addr()?;

        let worker = thread::Builder::new()
            .name("echo-listener".to_string())
            .spawn(move || serve(listener))?;

        debug!(addr = %addr, "echo listener started");
        Ok(Self {
            addr,
            worker: Some(worker),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the peer to hang up and return what it sent
    pub fn finish(mut self) -> io::Result<Vec<u8>> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| io::Error::other("echo listener panicked"))?,
            None => Ok(Vec::new()),
        }
    }
}

impl Drop for EchoListener {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // Nobody connected: wake the blocked accept so the thread can exit.
        if let Ok(stream) = TcpStream::connect(self.addr) {
            drop(stream);
        }
        let _ = worker.join();
    }
}

fn serve(listener: TcpListener) -> io::Result<Vec<u8>> {
    let (mut stream, peer) = listener.accept()?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let mut captured = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            // A peer that closes with our echo still unread resets instead of
            // sending FIN; everything it sent was already captured.
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset && !captured.is_empty() => {
                debug!(peer = %peer, "peer reset after sending");
                break;
            }
            Err(e) => return Err(e),
        };
        captured.extend_from_slice(&chunk[..n]);
        // The peer may already be gone; the capture is what matters.
        if let Err(e) = stream.write_all(&chunk[..n]) {
            debug!(peer = %peer, error = %e, "echo write failed");
        }
    }

    debug!(peer = %peer, bytes = captured.len(), "echo listener done");
    Ok(captured)
}
