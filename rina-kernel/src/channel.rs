//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::error::Error;
use crate::message::{ControlMessage, ManagementSdu};

/// Abstracts the control channel used to exchange [`ControlMessage`]s with
/// the kernel module. The real kernel module lives outside this
/// repository; production code talks to it over a dedicated character
/// device, while tests and the admin-socket simulator use
/// [`MockControlChannel`].
pub trait ControlChannel: Send {
    fn send(
        &mut self,
        msg: ControlMessage,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<ControlMessage, Error>> + Send;
}

/// Abstracts one bound I/O channel (a flow) used to exchange management
/// SDUs with a neighbor.
pub trait ManagementChannel: Send {
    fn send(
        &mut self,
        sdu: ManagementSdu,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<ManagementSdu, Error>> + Send;
}

/// An in-memory control channel pair, for tests and for the admin socket's
/// self-contained simulation mode.
pub struct MockControlChannel {
    tx: mpsc::UnboundedSender<ControlMessage>,
    rx: mpsc::UnboundedReceiver<ControlMessage>,
}

impl MockControlChannel {
    pub fn pair() -> (MockControlChannel, MockControlChannel) {
        let (tx_a, rx_b) = mpsc::unbounded_channel();
        let (tx_b, rx_a) = mpsc::unbounded_channel();
        (
            MockControlChannel { tx: tx_a, rx: rx_a },
            MockControlChannel { tx: tx_b, rx: rx_b },
        )
    }
}

impl ControlChannel for MockControlChannel {
    async fn send(&mut self, msg: ControlMessage) -> Result<(), Error> {
        self.tx.send(msg).map_err(|_| Error::ChannelClosed)
    }

    async fn recv(&mut self) -> Result<ControlMessage, Error> {
        self.rx.recv().await.ok_or(Error::ChannelClosed)
    }
}

/// An in-memory management channel pair, for tests and for driving
/// neighbor/enrollment scenarios without a real flow.
pub struct MockManagementChannel {
    tx: mpsc::UnboundedSender<ManagementSdu>,
    rx: mpsc::UnboundedReceiver<ManagementSdu>,
    /// SDUs sent but not yet delivered, exposed for inspection in tests.
    pub sent: Mutex<VecDeque<ManagementSdu>>,
}

impl MockManagementChannel {
    pub fn pair() -> (MockManagementChannel, MockManagementChannel) {
        let (tx_a, rx_b) = mpsc::unbounded_channel();
        let (tx_b, rx_a) = mpsc::unbounded_channel();
        (
            MockManagementChannel {
                tx: tx_a,
                rx: rx_a,
                sent: Mutex::new(VecDeque::new()),
            },
            MockManagementChannel {
                tx: tx_b,
                rx: rx_b,
                sent: Mutex::new(VecDeque::new()),
            },
        )
    }

    /// Drains one already-queued SDU without waiting, for tests that pump
    /// traffic between two instances until both sides go quiet.
    pub fn try_recv(&mut self) -> Option<ManagementSdu> {
        self.rx.try_recv().ok()
    }
}

impl ManagementChannel for MockManagementChannel {
    async fn send(&mut self, sdu: ManagementSdu) -> Result<(), Error> {
        self.sent.lock().unwrap().push_back(sdu.clone());
        self.tx.send(sdu).map_err(|_| Error::ChannelClosed)
    }

    async fn recv(&mut self) -> Result<ManagementSdu, Error> {
        self.rx.recv().await.ok_or(Error::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use rina_utils::{Address, PortId};

    use super::*;

    #[tokio::test]
    async fn control_channel_pair_delivers_messages() {
        let (mut a, mut b) = MockControlChannel::pair();
        a.send(ControlMessage::FlowFetch).await.unwrap();
        let received = b.recv().await.unwrap();
        assert_eq!(received.kind(), "FLOW_FETCH");
    }

    #[tokio::test]
    async fn management_channel_pair_delivers_sdus() {
        let (mut a, mut b) = MockManagementChannel::pair();
        let sdu = ManagementSdu {
            src_addr: Address::new(1),
            port_id: PortId::new(7),
            payload: vec![1, 2, 3],
        };
        a.send(sdu.clone()).await.unwrap();
        let received = b.recv().await.unwrap();
        assert_eq!(received.payload, sdu.payload);
        assert_eq!(a.sent.lock().unwrap().len(), 1);
    }
}
