use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use tether_shared::constants::OPEN_KEY_SIZE;
use tether_shared::{BufferPool, ConnectionConfig, PooledBuffer};

use crate::server::NetworkConfig;
use crate::timed_bucket::TimedBucket;
use crate::transport::error::ListenError;
use crate::transport::{Transport, TransportErrorCode, TransportState};

struct TcpShared {
    pool: Arc<BufferPool>,
    receive_queue: Mutex<VecDeque<PooledBuffer>>,
    queued_bytes: AtomicUsize,
    connected: AtomicBool,
    errors: AtomicU16,
    shutdown: watch::Sender<bool>,
}

impl TcpShared {
    fn fail(&self, code: TransportErrorCode) {
        self.errors.fetch_or(code.bits(), Ordering::AcqRel);
        self.disconnect();
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            let _ = self.shutdown.send(true);
        }
    }
}

/// A framed transport over one TCP stream.
///
/// Frames are `[u32 length][payload]`, little-endian. Reading and writing run
/// as two tokio tasks; the simulation side talks to them only through locked
/// queues and atomic state, never touching the socket itself. Writes are
/// strictly sequential: one frame is in flight at a time and later `send`
/// calls queue behind it.
pub struct TcpTransport {
    shared: Arc<TcpShared>,
    sender: UnboundedSender<PooledBuffer>,
}

impl TcpTransport {
    /// Wraps a connected stream, spawning its read/write tasks. Must be
    /// called from within a tokio runtime.
    pub fn spawn(stream: TcpStream, pool: &Arc<BufferPool>, config: &ConnectionConfig) -> Self {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(TcpShared {
            pool: Arc::clone(pool),
            receive_queue: Mutex::new(VecDeque::new()),
            queued_bytes: AtomicUsize::new(0),
            connected: AtomicBool::new(true),
            errors: AtomicU16::new(0),
            shutdown: shutdown_tx,
        });

        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(read_loop(
            read_half,
            Arc::clone(&shared),
            config.receive_buffer_size,
            config.max_receive_queue_size,
            shutdown_rx.clone(),
        ));
        tokio::spawn(write_loop(
            write_half,
            Arc::clone(&shared),
            receiver,
            shutdown_rx,
        ));

        Self { shared, sender }
    }
}

impl Transport for TcpTransport {
    fn send(&self, buffer: PooledBuffer) -> bool {
        if !self.shared.connected.load(Ordering::Acquire) {
            return false;
        }
        // a send racing task teardown drops the buffer back to the pool
        self.sender.send(buffer).is_ok()
    }

    fn receive(&self, out: &mut Vec<PooledBuffer>) {
        let mut queue = self
            .shared
            .receive_queue
            .lock()
            .expect("tcp receive queue lock poisoned");
        let mut drained = 0;
        for buffer in queue.drain(..) {
            drained += buffer.len();
            out.push(buffer);
        }
        self.shared.queued_bytes.fetch_sub(drained, Ordering::AcqRel);
    }

    fn state(&self) -> TransportState {
        if self.shared.connected.load(Ordering::Acquire) {
            TransportState::Connected
        } else {
            TransportState::Disconnected
        }
    }

    fn errors(&self) -> TransportErrorCode {
        TransportErrorCode::from_bits(self.shared.errors.load(Ordering::Acquire))
    }

    fn close(&self) {
        self.shared.disconnect();
        let mut queue = self
            .shared
            .receive_queue
            .lock()
            .expect("tcp receive queue lock poisoned");
        queue.clear();
        self.shared.queued_bytes.store(0, Ordering::Release);
    }
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    shared: Arc<TcpShared>,
    max_receive_size: usize,
    max_receive_queue_size: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = read_frame(&mut read_half, &shared, max_receive_size) => match result {
                Ok(Some(payload)) => {
                    let len = payload.len();
                    {
                        let mut queue = shared
                            .receive_queue
                            .lock()
                            .expect("tcp receive queue lock poisoned");
                        queue.push_back(payload);
                    }
                    let queued = shared.queued_bytes.fetch_add(len, Ordering::AcqRel) + len;
                    if queued > max_receive_queue_size {
                        log::warn!(
                            "receive queue exceeded budget: {queued} > {max_receive_queue_size}"
                        );
                        shared.fail(TransportErrorCode::RECEIVE_QUEUE_EXCEEDED);
                        break;
                    }
                }
                // clean close by the peer
                Ok(None) => break,
                Err(code) => {
                    shared.fail(code);
                    break;
                }
            }
        }
    }
    shared.disconnect();
}

/// Reads one length-prefixed frame. `Ok(None)` is a clean end-of-stream at a
/// frame boundary.
async fn read_frame(
    read_half: &mut OwnedReadHalf,
    shared: &TcpShared,
    max_receive_size: usize,
) -> Result<Option<PooledBuffer>, TransportErrorCode> {
    let mut prefix = [0u8; 4];
    if let Err(error) = read_half.read_exact(&mut prefix).await {
        return match error.kind() {
            std::io::ErrorKind::UnexpectedEof => Ok(None),
            _ => Err(TransportErrorCode::SOCKET_RECEIVE),
        };
    }
    let length = u32::from_le_bytes(prefix) as usize;
    if length > max_receive_size {
        log::warn!("inbound frame of {length} bytes exceeds max_receive_size {max_receive_size}");
        return Err(TransportErrorCode::RECEIVE_BUFFER_EXCEEDED);
    }

    let mut payload = shared.pool.rent(length);
    if read_half.read_exact(&mut payload).await.is_err() {
        return Err(TransportErrorCode::SOCKET_RECEIVE);
    }
    Ok(Some(payload))
}

async fn write_loop(
    mut write_half: OwnedWriteHalf,
    shared: Arc<TcpShared>,
    mut queue: UnboundedReceiver<PooledBuffer>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            message = queue.recv() => match message {
                Some(buffer) => {
                    if let Err(error) = write_half.write_all(&buffer).await {
                        log::warn!("socket write failed: {error}");
                        shared.fail(TransportErrorCode::SOCKET_SEND);
                        break;
                    }
                    // buffer drops here, returning to the pool
                }
                None => break,
            }
        }
    }
    // unsent frames go back to the pool
    queue.close();
    while queue.try_recv().is_ok() {}
    let _ = write_half.shutdown().await;
    shared.disconnect();
}

/// A socket accepted by the listener that has presented its open key.
pub struct IncomingConnection {
    pub open_key: [u8; OPEN_KEY_SIZE],
    pub addr: SocketAddr,
    pub transport: TcpTransport,
}

/// Accepts TCP connections, runs the open-key handshake, and queues the
/// survivors for admission on the simulation thread.
///
/// Accepts are rate-limited per second; each accepted socket must deliver its
/// 32-byte open key within `accept_timeout` or it is dropped without ever
/// reaching the admission layer. The I/O all happens on a tokio runtime owned
/// by a dedicated thread.
pub struct FramedListener {
    created: Arc<Mutex<VecDeque<IncomingConnection>>>,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl FramedListener {
    pub fn listen(
        network: &NetworkConfig,
        connection: &ConnectionConfig,
        pool: &Arc<BufferPool>,
    ) -> Result<Self, ListenError> {
        let created = Arc::new(Mutex::new(VecDeque::new()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (bound_tx, bound_rx) = mpsc::sync_channel(1);

        let network = network.clone();
        let connection = connection.clone();
        let pool = Arc::clone(pool);
        let accept_queue = Arc::clone(&created);
        std::thread::Builder::new()
            .name("tether-listener".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(error) => {
                        let _ = bound_tx.send(Err(ListenError::Bind(error)));
                        return;
                    }
                };
                runtime.block_on(accept_loop(
                    network,
                    connection,
                    pool,
                    accept_queue,
                    bound_tx,
                    shutdown_rx,
                ));
            })
            .expect("failed to spawn listener thread");

        let local_addr = bound_rx
            .recv()
            .expect("listener thread exited before binding")?;
        log::info!("listening on {local_addr}");
        Ok(Self {
            created,
            local_addr,
            shutdown: shutdown_tx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Drains handshake survivors; called once per tick by the server.
    pub fn poll_created(&self, out: &mut Vec<IncomingConnection>) {
        let mut created = self.created.lock().expect("listener queue lock poisoned");
        out.extend(created.drain(..));
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for FramedListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn accept_loop(
    network: NetworkConfig,
    connection: ConnectionConfig,
    pool: Arc<BufferPool>,
    created: Arc<Mutex<VecDeque<IncomingConnection>>>,
    bound_tx: mpsc::SyncSender<Result<SocketAddr, ListenError>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let listener = match bind_listener(&network) {
        Ok(listener) => listener,
        Err(error) => {
            let _ = bound_tx.send(Err(error));
            return;
        }
    };
    let local_addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(error) => {
            let _ = bound_tx.send(Err(ListenError::Bind(error)));
            return;
        }
    };
    let _ = bound_tx.send(Ok(local_addr));

    let mut bucket = TimedBucket::new(network.accepts_per_second, Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    if !bucket.try_acquire() {
                        log::debug!("accept rate limit reached, dropping {addr}");
                        continue;
                    }
                    tokio::spawn(open_handshake(
                        stream,
                        addr,
                        network.accept_timeout,
                        network.max_create_queue,
                        connection.clone(),
                        Arc::clone(&pool),
                        Arc::clone(&created),
                    ));
                }
                Err(error) => {
                    log::warn!("accept failed: {error}");
                }
            }
        }
    }
    log::info!("listener on {local_addr} shut down");
}

fn bind_listener(network: &NetworkConfig) -> Result<tokio::net::TcpListener, ListenError> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::from(([0, 0, 0, 0], network.port)))?;
    Ok(socket.listen(network.listen_backlog)?)
}

async fn open_handshake(
    mut stream: TcpStream,
    addr: SocketAddr,
    accept_timeout: Duration,
    max_create_queue: usize,
    connection: ConnectionConfig,
    pool: Arc<BufferPool>,
    created: Arc<Mutex<VecDeque<IncomingConnection>>>,
) {
    let mut open_key = [0u8; OPEN_KEY_SIZE];
    match tokio::time::timeout(accept_timeout, stream.read_exact(&mut open_key)).await {
        Ok(Ok(_)) => {}
        Ok(Err(error)) => {
            log::debug!("open key read from {addr} failed: {error}");
            return;
        }
        Err(_) => {
            log::debug!("open key from {addr} timed out");
            return;
        }
    }

    let transport = TcpTransport::spawn(stream, &pool, &connection);
    let mut queue = created.lock().expect("listener queue lock poisoned");
    if queue.len() >= max_create_queue {
        log::warn!("create queue full, dropping connection from {addr}");
        drop(queue);
        transport.close();
        return;
    }
    queue.push_back(IncomingConnection {
        open_key,
        addr,
        transport,
    });
}
