use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};

/// A message interface for [services](Service).
///
/// Most commonly, this interface is an enumeration of messages, but it can also be implemented
/// on a single message. For each individual message, this type needs to implement the
/// [`FromMessage`] trait.
pub trait Interface: Send + 'static {}

/// Services without messages can use `()` as their interface.
impl Interface for () {}

/// An error when [sending](Addr::send) a message to a service fails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SendError;

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to send message to service")
    }
}

impl std::error::Error for SendError {}

/// Response behavior of an [`Interface`] message.
///
/// It defines how a service handles and responds to messages, such as through asynchronous
/// responses or fire-and-forget without responding.
pub trait MessageResponse {
    /// Sends responses from the service back to the waiting recipient.
    type Sender;

    /// The type returned from [`Addr::send`].
    type Output;

    /// Returns the response channel for an interface message.
    fn channel() -> (Self::Sender, Self::Output);
}

/// The request when sending an asynchronous message to a service.
///
/// This is returned from [`Addr::send`] when the message responds asynchronously through
/// [`AsyncResponse`]. It resolves once the service has responded, or fails with [`SendError`]
/// if the service dropped the request.
pub struct Request<T>(oneshot::Receiver<T>);

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request").finish_non_exhaustive()
    }
}

impl<T> Future for Request<T> {
    type Output = Result<T, SendError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.poll_unpin(cx).map(|result| result.map_err(|_| SendError))
    }
}

/// Sends a message response from a service back to the waiting [`Request`].
///
/// If the sender is dropped without responding, the request fails with [`SendError`].
pub struct Sender<T>(oneshot::Sender<T>);

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("open", &!self.0.is_closed())
            .finish()
    }
}

impl<T> Sender<T> {
    /// Sends the response value and closes the [`Request`].
    ///
    /// This silently drops the value if the request has been dropped.
    pub fn send(self, value: T) {
        self.0.send(value).ok();
    }
}

/// Message response resulting in an asynchronous [`Request`].
///
/// The sender must be placed on the interface in [`FromMessage::from_message`].
pub struct AsyncResponse<T>(PhantomData<T>);

impl<T> fmt::Debug for AsyncResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncResponse")
    }
}

impl<T> MessageResponse for AsyncResponse<T> {
    type Sender = Sender<T>;
    type Output = Request<T>;

    fn channel() -> (Self::Sender, Self::Output) {
        let (tx, rx) = oneshot::channel();
        (Sender(tx), Request(rx))
    }
}

/// Message response for fire-and-forget messages.
///
/// Sending a message with this response type returns immediately.
#[derive(Debug)]
pub struct NoResponse;

impl MessageResponse for NoResponse {
    type Sender = ();
    type Output = ();

    fn channel() -> (Self::Sender, Self::Output) {
        ((), ())
    }
}

/// Declares a message as part of an [`Interface`].
///
/// Messages have an associated `Response` type that determines the return value of sending the
/// message. Within an interface, the responder can vary for each message.
pub trait FromMessage<M>: Interface {
    /// The behavior declaring the return value when sending this message.
    type Response: MessageResponse;

    /// Converts the message into the service interface.
    fn from_message(message: M, sender: <Self::Response as MessageResponse>::Sender) -> Self;
}

/// The address of a [`Service`].
///
/// Addresses allow to [send](Self::send) messages to a service that implements a corresponding
/// [`FromMessage`] implementation. Addresses can be freely cloned. When the last clone of an
/// address is dropped, the receiving end returns `None` and the service winds down.
pub struct Addr<I: Interface> {
    tx: mpsc::UnboundedSender<I>,
    queue_size: Arc<AtomicU64>,
}

impl<I: Interface> fmt::Debug for Addr<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Addr")
            .field("open", &!self.tx.is_closed())
            .field("queue_size", &self.len())
            .finish()
    }
}

// Manually derive `Clone` since we do not require `I: Clone` and the Clone derive adds this
// constraint.
impl<I: Interface> Clone for Addr<I> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            queue_size: Arc::clone(&self.queue_size),
        }
    }
}

impl<I: Interface> Addr<I> {
    /// Sends a message to the service and returns the response.
    ///
    /// Depending on the message's response behavior, this either returns a future resolving to
    /// the return value, or does not return anything for fire-and-forget messages. The
    /// communication channel with the service is unbounded, so backlogs could occur when sending
    /// too many messages.
    ///
    /// Sending asynchronous messages can fail with `Err(SendError)` if the service has shut
    /// down. Fire-and-forget messages are silently dropped in that case.
    pub fn send<M>(&self, message: M) -> <I::Response as MessageResponse>::Output
    where
        I: FromMessage<M>,
    {
        let (tx, rx) = I::Response::channel();
        self.queue_size.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(I::from_message(message, tx)).is_err() {
            self.queue_size.fetch_sub(1, Ordering::SeqCst);
            rum_log::trace!("dropping message for closed service");
        }
        rx
    }

    /// Returns `true` if the service is no longer receiving messages.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns the number of messages waiting in the inbox.
    pub fn len(&self) -> u64 {
        self.queue_size.load(Ordering::SeqCst)
    }

    /// Returns `true` if the inbox is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Custom address used for testing.
    ///
    /// Returns the receiving end of the channel for inspection.
    pub fn custom() -> (Self, mpsc::UnboundedReceiver<I>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr = Addr {
            tx,
            queue_size: Default::default(),
        };
        (addr, rx)
    }
}

/// Inbound channel for messages sent through an [`Addr`].
pub struct Receiver<I: Interface> {
    rx: mpsc::UnboundedReceiver<I>,
    queue_size: Arc<AtomicU64>,
}

impl<I: Interface> Receiver<I> {
    /// Receives the next value for this receiver.
    ///
    /// This method returns `None` if the channel has been closed and there are no remaining
    /// messages in the channel's buffer, which happens when all [`Addr`]s have been dropped.
    pub async fn recv(&mut self) -> Option<I> {
        let value = self.rx.recv().await;

        if value.is_some() {
            self.queue_size.fetch_sub(1, Ordering::SeqCst);
        }

        value
    }
}

impl<I: Interface> fmt::Debug for Receiver<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("queue_size", &self.queue_size.load(Ordering::SeqCst))
            .finish()
    }
}

/// Creates an unbounded channel for communicating with a [`Service`].
///
/// The `Addr` as the sending part provides public methods to send messages of the service's
/// [`Interface`] type. The `Receiver` is passed to [`Service::spawn_handler`].
pub fn channel<I: Interface>() -> (Addr<I>, Receiver<I>) {
    let queue_size = Arc::new(AtomicU64::new(0));
    let (tx, rx) = mpsc::unbounded_channel();

    let addr = Addr {
        tx,
        queue_size: Arc::clone(&queue_size),
    };

    let rx = Receiver { rx, queue_size };

    (addr, rx)
}

/// An asynchronous unit responding to messages.
///
/// Services receive messages conforming to some [`Interface`] through an [`Addr`] and handle
/// them one by one. Internally, services are free to concurrently process these messages or
/// not, most probably should.
///
/// Individually, messages can have separate response types as specified by the
/// [`FromMessage`] implementation on the interface type.
///
/// # Implementing Services
///
/// The standard way to implement services is through the `spawn_handler` function. It receives
/// an inbound channel for all messages sent through the service's address, and spawns its main
/// loop onto the current tokio runtime.
pub trait Service: Sized {
    /// The interface of messages this service implements.
    type Interface: Interface;

    /// Spawns a task to handle service messages.
    ///
    /// Receives an inbound channel for all messages sent through the service's [`Addr`]. Note
    /// that this function is synchronous, so that the service must spawn a task internally.
    fn spawn_handler(self, rx: Receiver<Self::Interface>);

    /// Starts the service in the current runtime and returns an address for it.
    ///
    /// Must be called from within a tokio runtime context.
    fn start(self) -> Addr<Self::Interface> {
        let (addr, rx) = channel();
        self.spawn_handler(rx);
        addr
    }

    /// Returns a unique name for this service implementation.
    ///
    /// This is used for internal diagnostics and uses the fully qualified type name of the
    /// service implementor by default.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ping;

    #[derive(Debug)]
    struct Bump;

    #[derive(Debug)]
    enum Counter {
        Ping(Ping, Sender<u32>),
        Bump(Bump),
    }

    impl Interface for Counter {}

    impl FromMessage<Ping> for Counter {
        type Response = AsyncResponse<u32>;

        fn from_message(message: Ping, sender: Sender<u32>) -> Self {
            Self::Ping(message, sender)
        }
    }

    impl FromMessage<Bump> for Counter {
        type Response = NoResponse;

        fn from_message(message: Bump, _: ()) -> Self {
            Self::Bump(message)
        }
    }

    struct CounterService(u32);

    impl Service for CounterService {
        type Interface = Counter;

        fn spawn_handler(mut self, mut rx: Receiver<Self::Interface>) {
            tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    match message {
                        Counter::Ping(_, sender) => sender.send(self.0),
                        Counter::Bump(_) => self.0 += 1,
                    }
                }
            });
        }
    }

    #[tokio::test]
    async fn test_messages_are_handled_in_order() {
        let addr = CounterService(0).start();

        addr.send(Bump);
        addr.send(Bump);

        assert_eq!(addr.send(Ping).await, Ok(2));
        assert!(addr.is_empty());
    }

    #[tokio::test]
    async fn test_send_to_stopped_service() {
        let (addr, rx) = channel::<Counter>();
        drop(rx);

        assert!(addr.is_closed());
        addr.send(Bump);
        assert_eq!(addr.send(Ping).await, Err(SendError));
        assert_eq!(addr.len(), 0);
    }

    #[tokio::test]
    async fn test_custom_addr() {
        let (addr, mut rx) = Addr::<Counter>::custom();
        addr.send(Bump);
        assert!(matches!(rx.recv().await, Some(Counter::Bump(Bump))));
    }

    #[test]
    fn test_name() {
        assert!(CounterService::name().ends_with("CounterService"));
    }
}
