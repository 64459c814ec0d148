//! Capture engine
//!
//! Owns a packet source and runs the decode loop on a dedicated thread.
//! Control signals (pause, resume, stop) travel on their own bounded
//! channels, separate from the bounded output channel of decoded frames.
//!
//! ```text
//! Created --start--> Running <--pause/resume--> Paused
//!                       |                          |
//!                       +----------stop------------+--> Stopped
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use super::device::{select_device, InterfaceProbe};
use super::error::CaptureError;
use super::session::{CaptureSession, PacketSource, SessionConfig};
use crate::frame::CapturedFrame;

/// Output queue capacity; a slower consumer eventually stalls the loop
pub const OUTPUT_QUEUE_SIZE: usize = 666;

/// Capacity of each control signal queue
pub const CONTROL_QUEUE_SIZE: usize = 10;

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Created = 0,
    Running = 1,
    Paused = 2,
    Stopped = 3,
}

impl From<u8> for EngineState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug)]
struct SharedState(AtomicU8);

impl SharedState {
    fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(EngineState::Created as u8)))
    }

    fn get(&self) -> EngineState {
        EngineState::from(self.0.load(Ordering::SeqCst))
    }

    fn set(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Capture loop counters (atomic for thread-safe access)
#[derive(Debug, Default)]
pub struct EngineStats {
    pub packets_read: AtomicU64,
    pub frames_emitted: AtomicU64,
    pub read_timeouts: AtomicU64,
}

/// Cloneable pause/resume/stop handle, usable from any thread
#[derive(Debug, Clone)]
pub struct EngineControl {
    pause_tx: Sender<()>,
    resume_tx: Sender<()>,
    stop_tx: Sender<()>,
    /// Pauses queued or in effect that no resume has released yet
    unreleased_pauses: Arc<AtomicUsize>,
    stopping: Arc<AtomicBool>,
    state: Arc<SharedState>,
}

impl EngineControl {
    /// Queue one pause. Blocks if the pause queue is full.
    pub fn pause(&self) -> Result<(), CaptureError> {
        self.ensure_live("pause")?;
        self.unreleased_pauses.fetch_add(1, Ordering::SeqCst);
        self.pause_tx.send(()).map_err(|_| {
            self.unreleased_pauses.fetch_sub(1, Ordering::SeqCst);
            CaptureError::Closed
        })
    }

    /// Queue one resume, releasing one pending pause.
    ///
    /// Without an unreleased pause the call is ignored, so it cannot
    /// cancel a later pause.
    pub fn resume(&self) -> Result<(), CaptureError> {
        self.ensure_live("resume")?;
        let released = self
            .unreleased_pauses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !released {
            debug!("Ignoring resume without a pending pause");
            return Ok(());
        }
        self.resume_tx.send(()).map_err(|_| CaptureError::Closed)
    }

    /// Force a resume so a paused loop can see the stop, then signal stop.
    /// Never blocks. Calls after the first are no-ops.
    pub fn stop(&self) -> Result<(), CaptureError> {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Stopping capture...");
        // A full resume queue already guarantees the loop wakes up
        match self.resume_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => return Err(CaptureError::Closed),
        }
        match self.stop_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Disconnected(())) => Err(CaptureError::Closed),
        }
    }

    fn ensure_live(&self, operation: &'static str) -> Result<(), CaptureError> {
        let state = self.state.get();
        if state == EngineState::Stopped || self.stopping.load(Ordering::SeqCst) {
            return Err(CaptureError::InvalidState { operation, state });
        }
        Ok(())
    }
}

/// Receiving ends of the control queues, cloned into the loop thread
#[derive(Clone)]
struct Signals {
    pause: Receiver<()>,
    resume: Receiver<()>,
    stop: Receiver<()>,
}

/// Capture engine bound to one device
pub struct CaptureEngine<S: PacketSource = CaptureSession> {
    device: String,
    source: Option<S>,
    control: EngineControl,
    signals: Signals,
    output_tx: Option<Sender<CapturedFrame>>,
    output_rx: Receiver<CapturedFrame>,
    state: Arc<SharedState>,
    stats: Arc<EngineStats>,
    worker: Option<JoinHandle<Result<u64, CaptureError>>>,
}

impl CaptureEngine<CaptureSession> {
    /// Select and validate a device, then activate a capture handle on it.
    ///
    /// With `device` unset (or empty) the first wireless device is used.
    pub fn open(
        probe: &impl InterfaceProbe,
        device: Option<&str>,
        config: &SessionConfig,
    ) -> Result<Self, CaptureError> {
        let device = select_device(probe, device)?;
        let session = CaptureSession::activate(&device, config)?;
        Ok(Self::with_source(device, session))
    }
}

impl<S: PacketSource> CaptureEngine<S> {
    /// Wrap an already activated packet source
    pub fn with_source(device: impl Into<String>, source: S) -> Self {
        let (pause_tx, pause_rx) = bounded(CONTROL_QUEUE_SIZE);
        let (resume_tx, resume_rx) = bounded(CONTROL_QUEUE_SIZE);
        let (stop_tx, stop_rx) = bounded(CONTROL_QUEUE_SIZE);
        let (output_tx, output_rx) = bounded(OUTPUT_QUEUE_SIZE);
        let state = SharedState::new();

        Self {
            device: device.into(),
            source: Some(source),
            control: EngineControl {
                pause_tx,
                resume_tx,
                stop_tx,
                unreleased_pauses: Arc::new(AtomicUsize::new(0)),
                stopping: Arc::new(AtomicBool::new(false)),
                state: Arc::clone(&state),
            },
            signals: Signals {
                pause: pause_rx,
                resume: resume_rx,
                stop: stop_rx,
            },
            output_tx: Some(output_tx),
            output_rx,
            state,
            stats: Arc::new(EngineStats::default()),
            worker: None,
        }
    }

    /// Apply `filter` and start the decode loop in the background.
    ///
    /// Filter errors are returned here and leave the engine in `Created`.
    /// Read errors end the loop and are reported by [`wait`](Self::wait).
    pub fn start(&mut self, filter: &str) -> Result<(), CaptureError> {
        let state = self.state.get();
        if state != EngineState::Created || self.control.stopping.load(Ordering::SeqCst) {
            return Err(CaptureError::InvalidState {
                operation: "start",
                state,
            });
        }

        let mut source = self.source.take().ok_or(CaptureError::InvalidState {
            operation: "start",
            state,
        })?;
        if let Err(e) = source.apply_filter(filter) {
            self.source = Some(source);
            return Err(e);
        }
        let output = self.output_tx.take().ok_or(CaptureError::Closed)?;

        let signals = self.signals.clone();
        let shared = Arc::clone(&self.state);
        let stats = Arc::clone(&self.stats);

        info!("Starting capture on {} with filter \"{}\"", self.device, filter);
        shared.set(EngineState::Running);

        let spawned = thread::Builder::new()
            .name("warpath-capture".to_string())
            .spawn(move || {
                let result = run_loop(source, &signals, &output, &stats, &shared);
                shared.set(EngineState::Stopped);
                match &result {
                    Ok(frames) => info!("Capture loop exited after {} frames", frames),
                    Err(e) => error!("Capture loop failed: {}", e),
                }
                result
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.state.set(EngineState::Stopped);
                Err(CaptureError::Spawn(e))
            }
        }
    }

    pub fn pause(&self) -> Result<(), CaptureError> {
        self.control.pause()
    }

    pub fn resume(&self) -> Result<(), CaptureError> {
        self.control.resume()
    }

    pub fn stop(&self) -> Result<(), CaptureError> {
        self.control.stop()
    }

    /// Control handle for other threads (signal handlers, supervisors)
    pub fn controller(&self) -> EngineControl {
        self.control.clone()
    }

    /// Stream of decoded frames, in capture order.
    ///
    /// Disconnects once the loop has exited and the backlog is drained.
    pub fn output(&self) -> Receiver<CapturedFrame> {
        self.output_rx.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    pub fn stats(&self) -> &Arc<EngineStats> {
        &self.stats
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Block until the loop exits, returning the number of frames emitted
    pub fn wait(&mut self) -> Result<u64, CaptureError> {
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| CaptureError::WorkerPanicked)?,
            None => Ok(self.stats.frames_emitted.load(Ordering::Relaxed)),
        }
    }

    /// Release the packet source, control queues and output stream.
    ///
    /// Waits for the loop, so `stop` must have been called first.
    pub fn close(mut self) -> Result<(), CaptureError> {
        let result = self.wait().map(|_| ());
        self.source.take();
        self.output_tx.take();
        debug!("Capture engine on {} closed", self.device);
        result
    }
}

impl<S: PacketSource> Drop for CaptureEngine<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            if let Err(e) = self.control.stop() {
                warn!("Failed to signal capture loop on drop: {}", e);
            }
            let _ = handle.join();
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

/// The decode loop. Suspends on packet reads, while paused, and on a full
/// output queue; stop is observed at each of those points.
fn run_loop<S: PacketSource>(
    mut source: S,
    signals: &Signals,
    output: &Sender<CapturedFrame>,
    stats: &EngineStats,
    state: &SharedState,
) -> Result<u64, CaptureError> {
    let link_type = source.link_type();
    let mut emitted = 0u64;

    loop {
        if signals.stop.try_recv().is_ok() {
            break;
        }

        if signals.pause.try_recv().is_ok() {
            state.set(EngineState::Paused);
            debug!("Capture paused");
            let flow = select! {
                recv(signals.resume) -> _ => Flow::Continue,
                recv(signals.stop) -> _ => Flow::Stop,
            };
            if let Flow::Stop = flow {
                break;
            }
            state.set(EngineState::Running);
            debug!("Capture resumed");
            continue;
        }

        let data = match source.next_packet()? {
            Some(data) => data,
            None => {
                stats.read_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };
        stats.packets_read.fetch_add(1, Ordering::Relaxed);

        let frame = CapturedFrame::decode(&data, link_type);
        let flow = select! {
            send(output, frame) -> sent => match sent {
                Ok(()) => Flow::Continue,
                Err(_) => {
                    warn!("Output channel disconnected");
                    Flow::Stop
                }
            },
            recv(signals.stop) -> _ => Flow::Stop,
        };
        if let Flow::Stop = flow {
            break;
        }

        emitted += 1;
        stats.frames_emitted.fetch_add(1, Ordering::Relaxed);
    }

    Ok(emitted)
}
