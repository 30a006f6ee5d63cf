//! Datagram receiver with latest-wins submission

use crate::buffer::BufferPool;
use crate::error::Result;
use crate::frame::HEADER_SIZE;
use crate::message::{self, Decode};
use crate::net::closeable::CurrentOperation;
use crate::net::datagram::{open_receiver_socket, recv_frame_from};
use crate::net::manager::{FinishedNotifier, OperationManager, PendingReplacer};
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tracing::trace;

const POOLED_BUFFERS: usize = 2;

/// Receives length-framed datagrams on a fixed port.
///
/// The socket is opened lazily with `reuse_address` and `broadcast` set and
/// bound to `(v4, binding_port)`. A new `async_receive` supersedes an
/// outstanding one: the socket is closed, aborting the prior operation,
/// whose handler observes `Aborted`. After `cancel` the trailing completion
/// is observed internally but its handler is not invoked.
pub struct DatagramReceiver<M: Decode> {
    runtime: Handle,
    binding_port: u16,
    max_message_size: usize,
    buffers: Arc<BufferPool>,
    manager: Arc<OperationManager<PendingReplacer>>,
    current: Arc<CurrentOperation>,
    socket: Arc<Mutex<Option<Arc<UdpSocket>>>>,
    _message: PhantomData<fn() -> M>,
}

impl<M: Decode + Send + 'static> DatagramReceiver<M> {
    /// Create a receiver for `binding_port` on the ambient tokio runtime.
    ///
    /// Panics outside a runtime context; use
    /// [`DatagramReceiver::with_handle`] there.
    pub fn new(binding_port: u16, max_message_size: usize) -> Self {
        Self::with_handle(Handle::current(), binding_port, max_message_size)
    }

    pub fn with_handle(runtime: Handle, binding_port: u16, max_message_size: usize) -> Self {
        let current = Arc::new(CurrentOperation::new());
        let socket = Arc::new(Mutex::new(None::<Arc<UdpSocket>>));
        let closer = current.clone();
        let slot = socket.clone();
        Self {
            runtime,
            binding_port,
            max_message_size,
            buffers: Arc::new(BufferPool::new(
                POOLED_BUFFERS,
                max_message_size + HEADER_SIZE,
            )),
            manager: OperationManager::new(move || {
                closer.close();
                slot.lock().unwrap().take();
            }),
            current,
            socket,
            _message: PhantomData,
        }
    }

    /// Receive one datagram. The handler gets the decoded message and the
    /// sender's endpoint.
    pub fn async_receive(
        &self,
        timeout: Duration,
        handler: impl FnOnce(Result<(M, SocketAddr)>) + Send + 'static,
    ) {
        let runtime = self.runtime.clone();
        let manager = self.manager.clone();
        let current = self.current.clone();
        let socket = self.socket.clone();
        let buffers = self.buffers.clone();
        let binding_port = self.binding_port;
        let max_message_size = self.max_message_size;

        self.manager.start_operation(move || {
            let signal = current.arm();
            let notifier = FinishedNotifier::new(manager.clone());

            runtime.spawn(async move {
                let result = async {
                    let socket = acquire_socket(&socket, binding_port)?;
                    let mut buf = buffers.try_get();
                    let received =
                        recv_frame_from(&socket, &mut buf, max_message_size, &signal, timeout)
                            .await;
                    buffers.try_put(buf);
                    let (payload, sender) = received?;
                    let decoded = message::decode_message::<M>(&payload)?;
                    Ok((decoded, sender))
                }
                .await;

                if manager.is_canceled() {
                    // Cancelled via the manager: observe the completion but
                    // keep the user handler out of it.
                    trace!("receive completion swallowed after cancel");
                    return;
                }

                notifier.notify();
                handler(result);
            });
        });
    }

    /// Abort the outstanding receive; its handler is not invoked.
    pub fn cancel(&self) {
        self.manager.cancel_operation();
    }
}

fn acquire_socket(
    slot: &Mutex<Option<Arc<UdpSocket>>>,
    binding_port: u16,
) -> Result<Arc<UdpSocket>> {
    let mut slot = slot.lock().unwrap();
    if let Some(socket) = slot.as_ref() {
        return Ok(socket.clone());
    }
    let socket = Arc::new(open_receiver_socket(binding_port)?);
    *slot = Some(socket.clone());
    Ok(socket)
}
