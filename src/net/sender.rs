//! Datagram sender with FIFO submission order

use crate::error::Result;
use crate::message::{self, Encode};
use crate::net::closeable::CurrentOperation;
use crate::net::datagram::{open_sender_socket, send_frame_to};
use crate::net::manager::{FinishedNotifier, OperationManager, PendingQueue};
use std::marker::PhantomData;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tracing::trace;

/// Sends length-framed datagrams, one at a time, in submission order.
///
/// The socket is opened lazily with the broadcast option set and an
/// ephemeral local port; `cancel` closes it, aborting the in-flight send
/// and dropping queued ones without invoking their handlers.
pub struct DatagramSender<M: Encode> {
    runtime: Handle,
    manager: Arc<OperationManager<PendingQueue>>,
    current: Arc<CurrentOperation>,
    socket: Arc<Mutex<Option<Arc<UdpSocket>>>>,
    _message: PhantomData<fn(M)>,
}

impl<M: Encode> DatagramSender<M> {
    /// Create a sender on the ambient tokio runtime.
    ///
    /// Panics outside a runtime context; use [`DatagramSender::with_handle`]
    /// there.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    pub fn with_handle(runtime: Handle) -> Self {
        let current = Arc::new(CurrentOperation::new());
        let socket = Arc::new(Mutex::new(None::<Arc<UdpSocket>>));
        let closer = current.clone();
        let slot = socket.clone();
        Self {
            runtime,
            manager: OperationManager::new(move || {
                closer.close();
                slot.lock().unwrap().take();
            }),
            current,
            socket,
            _message: PhantomData,
        }
    }

    /// Send `message` to `ip:port`.
    pub fn async_send(
        &self,
        message: &M,
        ip: IpAddr,
        port: u16,
        timeout: Duration,
        handler: impl FnOnce(Result<()>) + Send + 'static,
    ) {
        self.async_send_to(message, SocketAddr::new(ip, port), timeout, handler);
    }

    /// Send `message` to an endpoint.
    pub fn async_send_to(
        &self,
        message: &M,
        endpoint: SocketAddr,
        timeout: Duration,
        handler: impl FnOnce(Result<()>) + Send + 'static,
    ) {
        let payload = match message::encode_message(message) {
            Ok(payload) => payload,
            Err(err) => {
                self.runtime.spawn(async move { handler(Err(err)) });
                return;
            }
        };

        let runtime = self.runtime.clone();
        let manager = self.manager.clone();
        let current = self.current.clone();
        let socket = self.socket.clone();

        self.manager.start_operation(move || {
            let signal = current.arm();
            let notifier = FinishedNotifier::new(manager);

            runtime.spawn(async move {
                let result = async {
                    let socket = acquire_socket(&socket)?;
                    send_frame_to(&socket, &payload, endpoint, &signal, timeout).await
                }
                .await;

                if let Err(err) = &result {
                    trace!(%endpoint, error = %err, "datagram send failed");
                }
                notifier.notify();
                handler(result);
            });
        });
    }

    /// Abort the in-flight send and drop queued ones.
    pub fn cancel(&self) {
        self.manager.cancel_operation();
    }
}

impl<M: Encode> Default for DatagramSender<M> {
    fn default() -> Self {
        Self::new()
    }
}

fn acquire_socket(slot: &Mutex<Option<Arc<UdpSocket>>>) -> Result<Arc<UdpSocket>> {
    let mut slot = slot.lock().unwrap();
    if let Some(socket) = slot.as_ref() {
        return Ok(socket.clone());
    }
    let socket = Arc::new(open_sender_socket()?);
    *slot = Some(socket.clone());
    Ok(socket)
}
