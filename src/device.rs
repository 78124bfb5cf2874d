// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Half-duplex RTU line driver.
//!
//! The device owns both halves of one serial line: a receive loop that
//! assembles and decodes frames by silence timing, and a send path that
//! waits for the line to go quiet before transmitting. Frame boundaries
//! on an RTU line are not marked in-band; a frame ends when the line has
//! been silent for 3.5 character times (T3.5), and inter-byte gaps above
//! 1.5 character times (T1.5) are illegal inside a frame.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{CodecRegistry, FrameLength};
use crate::dispatch::{EventDispatcher, MessageEvent};
use crate::error::{Error, Result};
use crate::frame::{Direction, Message, Transaction, MAX_FRAME_LEN};
use crate::tracker::TransactionTracker;
use crate::util;

pub use tokio_serial::{DataBits, Parity, SerialStream, StopBits};

/// Serial line settings of an RTU device.
#[derive(Debug, Clone)]
pub struct RtuDeviceConfig {
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    /// Defaults per the RTU transmission mode: two stop bits without
    /// parity, one otherwise.
    pub stop_bits: Option<StopBits>,
}

impl RtuDeviceConfig {
    #[must_use]
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            parity: Parity::None,
            stop_bits: None,
        }
    }

    fn effective_stop_bits(&self) -> StopBits {
        self.stop_bits.unwrap_or(match self.parity {
            Parity::None => StopBits::Two,
            Parity::Odd | Parity::Even => StopBits::One,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.port.is_empty() {
            return Err(Error::Configuration("empty port name"));
        }
        if self.baud_rate == 0 {
            return Err(Error::Configuration("baud rate must be positive"));
        }
        Ok(())
    }
}

/// The silence intervals of the RTU transmission mode.
///
/// Below 19200 baud both intervals scale with the character time (11 bits
/// per character); above, the specification fixes them at 750 µs and
/// 1750 µs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceTimers {
    t1_5: Duration,
    t3_5: Duration,
}

impl SilenceTimers {
    pub fn from_baud_rate(baud_rate: u32) -> Result<Self> {
        if baud_rate == 0 {
            return Err(Error::Configuration("baud rate must be positive"));
        }
        Ok(if baud_rate > 19_200 {
            Self {
                t1_5: Duration::from_micros(750),
                t3_5: Duration::from_micros(1_750),
            }
        } else {
            Self {
                t1_5: Duration::from_micros(u64::from(15_000_000 / baud_rate)),
                t3_5: Duration::from_micros(u64::from(35_000_000 / baud_rate)),
            }
        })
    }

    #[must_use]
    pub const fn t1_5(&self) -> Duration {
        self.t1_5
    }

    #[must_use]
    pub const fn t3_5(&self) -> Duration {
        self.t3_5
    }

    /// Timeout for a read inside a frame.
    ///
    /// Generous next to T1.5 because host-side serial drivers buffer in
    /// chunks well above single-character granularity.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        (self.t3_5 * 3).max(Duration::from_millis(10))
    }
}

/// Observable state of the shared line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LineState {
    Idle = 0,
    Sending = 1,
    Receiving = 2,
}

const IDLE: u8 = LineState::Idle as u8;
const SENDING: u8 = LineState::Sending as u8;
const RECEIVING: u8 = LineState::Receiving as u8;

struct LineShared {
    state: AtomicU8,
    /// Earliest µs-since-epoch instant at which the line counts as silent.
    idle_from_micros: AtomicU64,
    epoch: Instant,
    timers: SilenceTimers,
    disposed: AtomicBool,
}

impl LineShared {
    fn new(timers: SilenceTimers) -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            idle_from_micros: AtomicU64::new(0),
            epoch: Instant::now(),
            timers,
            disposed: AtomicBool::new(false),
        }
    }

    fn now_micros(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    /// Restart the T3.5 silence window from now.
    fn touch_idle_from(&self) {
        let idle_from = self.now_micros() + u64::try_from(self.timers.t3_5.as_micros()).unwrap_or(u64::MAX);
        self.idle_from_micros.store(idle_from, Ordering::Release);
    }
}

struct TxLane<T> {
    writer: WriteHalf<T>,
    frame: [u8; MAX_FRAME_LEN],
}

/// One station on a half-duplex RTU line.
pub struct RtuDevice<T = SerialStream> {
    shared: Arc<LineShared>,
    tracker: TransactionTracker,
    registry: CodecRegistry,
    dispatcher: EventDispatcher,
    cancel: CancellationToken,
    rx: Mutex<ReadHalf<T>>,
    tx: Mutex<TxLane<T>>,
}

impl RtuDevice<SerialStream> {
    /// Open the configured serial port.
    ///
    /// Must be called within a Tokio runtime; spawns the transaction
    /// sweeper and dispatch worker.
    pub fn open(config: &RtuDeviceConfig) -> Result<Self> {
        config.validate()?;
        let builder = tokio_serial::new(&config.port, config.baud_rate)
            .parity(config.parity)
            .stop_bits(config.effective_stop_bits())
            .data_bits(DataBits::Eight);
        let stream = SerialStream::open(&builder).map_err(std::io::Error::from)?;
        Self::attach(stream, config.baud_rate)
    }
}

impl<T> RtuDevice<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Drive an already opened transport with the default codec set.
    pub fn attach(transport: T, baud_rate: u32) -> Result<Self> {
        Self::attach_with_registry(transport, baud_rate, CodecRegistry::with_defaults())
    }

    /// Drive an already opened transport with a caller-assembled registry.
    pub fn attach_with_registry(
        transport: T,
        baud_rate: u32,
        registry: CodecRegistry,
    ) -> Result<Self> {
        let timers = SilenceTimers::from_baud_rate(baud_rate)?;
        let (read_half, write_half) = tokio::io::split(transport);
        let cancel = CancellationToken::new();
        let tracker = TransactionTracker::new();
        tracker.spawn_sweeper(cancel.child_token());
        let dispatcher = EventDispatcher::spawn(cancel.child_token());
        Ok(Self {
            shared: Arc::new(LineShared::new(timers)),
            tracker,
            registry,
            dispatcher,
            cancel,
            rx: Mutex::new(read_half),
            tx: Mutex::new(TxLane {
                writer: write_half,
                frame: [0; MAX_FRAME_LEN],
            }),
        })
    }

    /// Register a subscriber for decoded messages.
    pub fn subscribe(&self, subscriber: impl Fn(&MessageEvent) + Send + Sync + 'static) {
        self.dispatcher.subscribe(subscriber);
    }

    /// Pending-transaction bookkeeping, shared with the receive loop.
    #[must_use]
    pub fn tracker(&self) -> &TransactionTracker {
        &self.tracker
    }

    #[must_use]
    pub fn line_state(&self) -> LineState {
        match self.shared.state.load(Ordering::Acquire) {
            SENDING => LineState::Sending,
            RECEIVING => LineState::Receiving,
            _ => LineState::Idle,
        }
    }

    #[must_use]
    pub fn silence_timers(&self) -> SilenceTimers {
        self.shared.timers
    }

    /// Begin shutdown: reject new operations and cancel the running loop
    /// and background tasks.
    pub fn shutdown(&self) {
        self.shared.disposed.store(true, Ordering::Release);
        self.cancel.cancel();
        info!("device shut down");
    }

    /// Run the receive loop until shutdown or a line failure.
    ///
    /// Frame-local failures (bad CRC, unknown function, inter-byte
    /// timeout) are logged, the line is drained until silent and the loop
    /// resumes. Only transport failures terminate it with an error.
    pub async fn run(&self) -> Result<()> {
        let mut rx = self
            .rx
            .try_lock()
            .map_err(|_| Error::Configuration("receive loop is already running"))?;

        let result = self.receive_loop(&mut rx).await;
        self.shared.state.store(IDLE, Ordering::Release);
        match result {
            Err(Error::Cancelled) => Ok(()),
            other => other,
        }
    }

    async fn receive_loop(&self, rx: &mut ReadHalf<T>) -> Result<()> {
        let mut buf = [0u8; MAX_FRAME_LEN];
        loop {
            // Between frames the line may stay quiet indefinitely.
            let n = tokio::select! {
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                n = rx.read(&mut buf[..1]) => n?,
            };
            if n == 0 {
                return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            self.shared.state.store(RECEIVING, Ordering::Release);

            match self.receive_frame(rx, &mut buf).await {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "discarding frame");
                    self.drain_until_silence(rx, &mut buf).await?;
                }
                Err(err) => {
                    self.mark_idle();
                    return Err(err);
                }
            }
            self.mark_idle();
        }
    }

    /// Assemble and decode one frame; `buf[0]` already holds its first byte.
    async fn receive_frame(&self, rx: &mut ReadHalf<T>, buf: &mut [u8; MAX_FRAME_LEN]) -> Result<()> {
        let mut have = 1;
        self.fill(rx, buf, &mut have, 4).await?;

        let transaction = Transaction::from_wire(buf[0], buf[1])?;
        let direction = if self.tracker.is_request_active(&transaction) {
            Direction::Response
        } else {
            Direction::Request
        };
        let codec = self.registry.resolve(&buf[..have], direction)?;

        // An inbound length claim beyond the frame limit is line noise or a
        // broken peer, not a caller mistake: recoverable, like a bad CRC.
        const OVER_LIMIT: Error = Error::Format("claimed frame length exceeds the RTU frame limit");
        let frame_len = loop {
            match codec.frame_length(&buf[..have], direction)? {
                FrameLength::Complete(len) => break len,
                FrameLength::NeedMore(needed) => {
                    if needed + 2 > MAX_FRAME_LEN {
                        return Err(OVER_LIMIT);
                    }
                    self.fill(rx, buf, &mut have, needed).await?;
                }
            }
        };
        let total = frame_len + 2;
        if total > MAX_FRAME_LEN {
            return Err(OVER_LIMIT);
        }
        self.fill(rx, buf, &mut have, total).await?;

        let expected = util::crc16(&buf[..frame_len]);
        let actual = util::read_crc(&buf[..total]);
        if expected != actual {
            return Err(Error::Checksum { expected, actual });
        }

        let message = codec.parse(&buf[..frame_len], direction)?;
        if direction == Direction::Response {
            self.tracker.remove_transaction(&transaction);
        }
        debug!(%transaction, %direction, len = total, "frame received");
        self.dispatcher
            .publish(MessageEvent { message, direction })
            .await;
        Ok(())
    }

    /// Read until `buf[..target]` is filled, bounded by the inter-byte
    /// timeout.
    async fn fill(
        &self,
        rx: &mut ReadHalf<T>,
        buf: &mut [u8; MAX_FRAME_LEN],
        have: &mut usize,
        target: usize,
    ) -> Result<()> {
        while *have < target {
            let read = rx.read(&mut buf[*have..target]);
            let n = tokio::select! {
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                n = tokio::time::timeout(self.shared.timers.read_timeout(), read) => match n {
                    Ok(n) => n?,
                    Err(_) => return Err(Error::Format("silence inside a frame")),
                },
            };
            if n == 0 {
                return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            *have += n;
        }
        Ok(())
    }

    /// Swallow line noise after a framing failure until T3.5 passes with
    /// no byte, so the next read starts on a frame boundary.
    async fn drain_until_silence(
        &self,
        rx: &mut ReadHalf<T>,
        buf: &mut [u8; MAX_FRAME_LEN],
    ) -> Result<()> {
        loop {
            let read = rx.read(&mut buf[..]);
            tokio::select! {
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                n = tokio::time::timeout(self.shared.timers.read_timeout(), read) => match n {
                    Ok(Ok(0)) => return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into())),
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => return Err(err.into()),
                    Err(_) => return Ok(()),
                },
            }
        }
    }

    fn mark_idle(&self) {
        self.shared.touch_idle_from();
        self.shared.state.store(IDLE, Ordering::Release);
    }

    /// Transmit one message, waiting for line silence first.
    ///
    /// Concurrent senders are serialized; each transmission is preceded by
    /// at least T3.5 of silence. Requests are recorded with the tracker so
    /// the matching response frame is classified correctly. Bounded only
    /// by device shutdown; use [`Self::send_with_cancel`] to bound an
    /// individual call.
    pub async fn send(&self, message: &Message) -> Result<()> {
        self.send_with_cancel(message, &CancellationToken::new()).await
    }

    /// Like [`Self::send`], additionally aborting this call alone when
    /// `cancel` fires while queued, waiting for silence or writing. The
    /// device and its other senders are unaffected.
    pub async fn send_with_cancel(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.shared.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        let mut lane = tokio::select! {
            () = either_cancelled(&self.cancel, cancel) => return Err(Error::Cancelled),
            lane = self.tx.lock() => lane,
        };
        let TxLane { writer, frame } = &mut *lane;
        let len = message.encode_into(frame)?;
        let total = len + 2;
        util::write_crc(&mut frame[..total]);

        self.claim_line(cancel).await?;
        let written: Result<()> = tokio::select! {
            () = either_cancelled(&self.cancel, cancel) => Err(Error::Cancelled),
            written = async {
                writer.write_all(&frame[..total]).await?;
                writer.flush().await?;
                Ok(())
            } => written,
        };
        self.shared.touch_idle_from();
        if self
            .shared
            .state
            .compare_exchange(SENDING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("line state changed during transmission, possible collision");
        }
        written?;

        let transaction = Transaction::from(message);
        if message.direction() == Direction::Request {
            self.tracker.add_transaction_with(transaction, message.clone());
        }
        debug!(%transaction, len = total, "frame sent");
        Ok(())
    }

    /// Wait out the silence window, then flip the line from idle to
    /// sending.
    async fn claim_line(&self, cancel: &CancellationToken) -> Result<()> {
        // Sleeping is too coarse below one millisecond.
        const SLEEP_THRESHOLD: Duration = Duration::from_millis(1);
        loop {
            if self.shared.disposed.load(Ordering::Acquire) {
                return Err(Error::Disposed);
            }
            if self.cancel.is_cancelled() || cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let now = self.shared.now_micros();
            let idle_from = self.shared.idle_from_micros.load(Ordering::Acquire);
            if now >= idle_from {
                if self
                    .shared
                    .state
                    .compare_exchange(IDLE, SENDING, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return Ok(());
                }
                // A frame is coming in; re-check once it had a chance to end.
                tokio::select! {
                    () = either_cancelled(&self.cancel, cancel) => return Err(Error::Cancelled),
                    () = tokio::time::sleep(self.shared.timers.t3_5) => {}
                }
                continue;
            }
            let wait = Duration::from_micros(idle_from - now);
            if wait > SLEEP_THRESHOLD {
                tokio::select! {
                    () = either_cancelled(&self.cancel, cancel) => return Err(Error::Cancelled),
                    () = tokio::time::sleep(wait) => {}
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    }
}

/// Resolves when either of the two cancellation signals fires.
async fn either_cancelled(device: &CancellationToken, call: &CancellationToken) {
    tokio::select! {
        () = device.cancelled() => {}
        () = call.cancelled() => {}
    }
}
