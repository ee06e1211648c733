use crate::osc;
use rosc::OscMessage;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::trace;

/// Sends OSC datagrams to a TotalMix endpoint over UDP
pub struct OscSender {
    socket: UdpSocket,
    endpoint: SocketAddr,
}

impl OscSender {
    /// Bind an ephemeral local socket for sending to `endpoint`
    pub async fn bind(endpoint: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if endpoint.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self { socket, endpoint })
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Send a message, returning the number of bytes sent
    pub async fn send(&self, message: OscMessage) -> io::Result<usize> {
        trace!("Sending {} to {}", message.addr, self.endpoint);
        let data = osc::encode(message)?;
        self.socket.send_to(&data, self.endpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_reaches_endpoint() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = OscSender::bind(receiver.local_addr().unwrap()).await.unwrap();
        assert_eq!(sender.endpoint(), receiver.local_addr().unwrap());

        let sent = sender.send(osc::volume(0.25)).await.unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, sent);
        assert_eq!(&buf[..len], osc::encode(osc::volume(0.25)).unwrap().as_slice());
    }
}
