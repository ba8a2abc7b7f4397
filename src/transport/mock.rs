//! Mock transport for testing

use super::PacketTransport;
use crate::error::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock transport with scripted incoming datagrams and captured sends
///
/// Clones share the same queues, so a test can keep a handle while the
/// session driver owns another.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    incoming: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                incoming: VecDeque::new(),
                sent: Vec::new(),
            })),
        }
    }

    /// Queue a datagram to be delivered by the next `recv`
    pub fn inject_datagram(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.incoming.push_back(data.to_vec());
    }

    /// All packets sent so far
    pub fn sent_packets(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent.clone()
    }

    /// Clear captured sends
    pub fn clear_sent(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.sent.clear();
    }
}

impl PacketTransport for MockTransport {
    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let mut inner = self.inner.lock().unwrap();
        match inner.incoming.pop_front() {
            Some(datagram) => {
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok(Some(n))
            }
            None => Ok(None),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.sent.push(data.to_vec());
        Ok(data.len())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
