//! Packet source abstraction over the UDP sockets
//!
//! The decode loop never touches sockets directly; it pulls datagrams from a
//! [`PacketSource`], one non-blocking attempt per poll iteration. This keeps
//! the loop testable with scripted packet queues and decouples the core from
//! any specific transport.

use crate::error::Result;
use std::net::UdpSocket;

/// One-shot, non-blocking datagram source
pub trait PacketSource {
    /// Attempt to receive a single datagram. Returns the number of bytes
    /// written into `buf`, or `None` when nothing is pending.
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;
}

/// Non-blocking UDP socket source for one stream
pub struct UdpPacketSource {
    socket: UdpSocket,
    label: &'static str,
    port: u16,
    seen_data: bool,
}

impl UdpPacketSource {
    /// Bind a non-blocking UDP socket on all interfaces
    pub fn bind(label: &'static str, port: u16) -> Result<Self> {
        log::info!("Opening UDP socket on port {} for {}...", port, label);
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            label,
            port,
            seen_data: false,
        })
    }
}

impl PacketSource for UdpPacketSource {
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((len, addr)) => {
                if !self.seen_data {
                    self.seen_data = true;
                    log::info!(
                        "Got data on {} port ({}) from {}",
                        self.label,
                        self.port,
                        addr
                    );
                }
                Ok(Some(len))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Scripted packet source for tests: yields queued datagrams in order, then
/// reports no data.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;

    pub struct MockPacketSource {
        queue: VecDeque<Vec<u8>>,
    }

    impl MockPacketSource {
        pub fn new() -> Self {
            Self {
                queue: VecDeque::new(),
            }
        }

        pub fn push(&mut self, datagram: Vec<u8>) {
            self.queue.push_back(datagram);
        }
    }

    impl PacketSource for MockPacketSource {
        fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
            match self.queue.pop_front() {
                Some(datagram) => {
                    buf[..datagram.len()].copy_from_slice(&datagram);
                    Ok(Some(datagram.len()))
                }
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockPacketSource;
    use super::*;

    #[test]
    fn test_mock_source_yields_in_order() {
        let mut source = MockPacketSource::new();
        source.push(vec![1, 2, 3]);
        source.push(vec![4]);

        let mut buf = [0u8; 16];
        assert_eq!(source.try_recv(&mut buf).unwrap(), Some(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(source.try_recv(&mut buf).unwrap(), Some(1));
        assert_eq!(source.try_recv(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_udp_source_loopback() {
        let mut source = UdpPacketSource::bind("video", 0).unwrap();
        let port = source.socket.local_addr().unwrap().port();

        let mut buf = [0u8; 16];
        assert_eq!(source.try_recv(&mut buf).unwrap(), None);

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[9, 8, 7], ("127.0.0.1", port)).unwrap();

        // Allow the datagram to land
        let mut got = None;
        for _ in 0..100 {
            if let Some(n) = source.try_recv(&mut buf).unwrap() {
                got = Some(n);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(got, Some(3));
        assert_eq!(&buf[..3], &[9, 8, 7]);
    }
}
