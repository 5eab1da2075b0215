//! OSC送信用のUDPトランスポート
//!
//! `send` はエンコード済みデータグラムをキューに積むだけで、`send_to` は
//! 送信スレッドが行う。失敗は `SendError` としてチャネルで戻り、tickループ側で
//! `poll_failures` + `record_failure` により処理する。

use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rosc::OscMessage;

use crate::config::{OscConfig, SendFailurePolicy};
use crate::osc::encode_packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unbound,
    Bound,
    /// 終端状態。自動復帰はしない。
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => write!(f, "unbound"),
            Self::Bound => write!(f, "bound"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {local}: {source}")]
    Bind {
        local: String,
        destination: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to resolve destination {destination}: {source}")]
    Resolve {
        destination: String,
        #[source]
        source: io::Error,
    },
    #[error("transport already bound")]
    AlreadyBound,
    #[error("transport is {0}, cannot send")]
    NotBound(ConnectionState),
    #[error("transport closed")]
    Closed,
    #[error("failed to encode OSC packet: {0}")]
    Encode(#[from] rosc::OscError),
}

/// 送信失敗。どの `send` 呼び出しのものかを seq で識別する。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("send #{seq} failed ({kind:?}): {message}")]
pub struct SendError {
    pub seq: u64,
    pub kind: io::ErrorKind,
    pub message: String,
}

impl SendError {
    fn from_io(seq: u64, err: &io::Error) -> Self {
        Self {
            seq,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendTicket {
    pub seq: u64,
}

/// `record_failure` の処理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// 最初の致命的失敗。`Failed` に遷移しソケットを閉じた。
    Closed,
    /// すでに失敗済み。何もしない。
    AlreadyFailed,
    /// `LogAndContinue` でログのみ。状態は変わらない。
    Ignored,
}

struct Outgoing {
    seq: u64,
    bytes: Vec<u8>,
}

struct SendWorker {
    queue: Sender<Outgoing>,
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// 送信スレッド本体。キューが閉じるか `stop` が立つまで送り続ける。
///
/// `stop` は送信ごとに確認するので、停止後にキューへ残ったものは送らない。
fn run_sender(
    socket: &UdpSocket,
    destination: SocketAddr,
    queue: &Receiver<Outgoing>,
    failures: &Sender<SendError>,
    stop: &AtomicBool,
) {
    for out in queue.iter() {
        if stop.load(Ordering::Acquire) {
            break;
        }
        if let Err(e) = socket.send_to(&out.bytes, destination) {
            if failures.send(SendError::from_io(out.seq, &e)).is_err() {
                break;
            }
        }
    }
}

pub struct OscTransport {
    config: OscConfig,
    state: ConnectionState,
    worker: Option<SendWorker>,
    failures: Option<Receiver<SendError>>,
    local_addr: Option<SocketAddr>,
    destination: Option<SocketAddr>,
    next_seq: u64,
}

impl OscTransport {
    pub fn new(config: OscConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Unbound,
            worker: None,
            failures: None,
            local_addr: None,
            destination: None,
            next_seq: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// UDPにはハンドシェイクがないので bound == connected
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Bound
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn destination(&self) -> Option<SocketAddr> {
        self.destination
    }

    /// ローカルソケットをバインドし送信スレッドを起動する。一度だけ。
    pub fn bind(&mut self) -> Result<(), TransportError> {
        if self.state != ConnectionState::Unbound {
            return Err(TransportError::AlreadyBound);
        }

        let local = format!("{}:{}", self.config.local_host, self.config.local_port);
        let destination = resolve(&self.config.destination)?;
        let socket = UdpSocket::bind(&local).map_err(|source| TransportError::Bind {
            local: local.clone(),
            destination: self.config.destination.clone(),
            source,
        })?;
        let local_addr = socket.local_addr().map_err(|source| TransportError::Bind {
            local,
            destination: self.config.destination.clone(),
            source,
        })?;

        let (queue_tx, queue_rx) = unbounded::<Outgoing>();
        let (failure_tx, failure_rx) = unbounded::<SendError>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_ref = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("osc-sender".to_string())
            .spawn(move || run_sender(&socket, destination, &queue_rx, &failure_tx, &stop_ref))
            .map_err(|source| TransportError::Bind {
                local: local_addr.to_string(),
                destination: self.config.destination.clone(),
                source,
            })?;

        log::info!("OSC bound on {} -> {}", local_addr, destination);

        self.worker = Some(SendWorker {
            queue: queue_tx,
            stop,
            handle,
        });
        self.failures = Some(failure_rx);
        self.local_addr = Some(local_addr);
        self.destination = Some(destination);
        self.state = ConnectionState::Bound;
        Ok(())
    }

    /// メッセージをキューに積む。実際の送信は待たない。
    pub fn send(&mut self, msg: &OscMessage) -> Result<SendTicket, TransportError> {
        let worker = match (self.state, &self.worker) {
            (ConnectionState::Bound, Some(worker)) => worker,
            (ConnectionState::Bound, None) => return Err(TransportError::Closed),
            (state, _) => return Err(TransportError::NotBound(state)),
        };

        let bytes = encode_packet(msg)?;
        let seq = self.next_seq;
        self.next_seq += 1;

        worker
            .queue
            .send(Outgoing { seq, bytes })
            .map_err(|_| TransportError::Closed)?;

        Ok(SendTicket { seq })
    }

    /// 前回呼び出し以降に送信スレッドから届いた失敗を取り出す
    pub fn poll_failures(&self) -> Vec<SendError> {
        match &self.failures {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        }
    }

    /// 送信失敗の一元ハンドラ。tickループからのみ呼ぶ。
    pub fn record_failure(&mut self, err: &SendError, policy: SendFailurePolicy) -> FailureOutcome {
        if self.state == ConnectionState::Failed {
            log::debug!("ignoring {} after transport failure", err);
            return FailureOutcome::AlreadyFailed;
        }

        match policy {
            SendFailurePolicy::LogAndContinue => {
                log::warn!("{} (continuing)", err);
                FailureOutcome::Ignored
            }
            SendFailurePolicy::Shutdown => {
                log::error!("error sending to {}: {}", self.config.destination, err);
                self.state = ConnectionState::Failed;
                self.close();
                FailureOutcome::Closed
            }
        }
    }

    /// ソケットをベストエフォートで解放する。キューに残った送信は捨てる。
    pub fn close(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.stop.store(true, Ordering::Release);
        drop(worker.queue);
        if worker.handle.join().is_err() {
            log::warn!("osc sender thread panicked while closing");
        }
        self.failures = None;
        log::info!("OSC transport closed");
    }

    pub fn is_closed(&self) -> bool {
        self.worker.is_none()
    }
}

impl Drop for OscTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn resolve(destination: &str) -> Result<SocketAddr, TransportError> {
    let mut addrs = destination
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            destination: destination.to_string(),
            source,
        })?;
    addrs.next().ok_or_else(|| TransportError::Resolve {
        destination: destination.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
    })
}
