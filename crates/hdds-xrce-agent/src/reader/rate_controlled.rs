// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Background delivery loop for one reader.
//!
//! A session pulls samples from a [`SampleSource`] and hands them to a
//! delivery callback until one of its limits is hit:
//! - `max_samples` samples delivered
//! - `max_elapsed_time` expired (one-shot timer thread)
//! - an explicit [`RateControlledReader::stop`]
//!
//! Byte throughput is shaped by a [`TokenBucket`]. The worker never
//! spins: with no data it sleeps until a [`ReaderWaker`] fires, and with
//! too few tokens it sleeps until the bucket has refilled enough.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use super::token_bucket::TokenBucket;
use crate::error::XrceError;
use crate::object::ObjectId;

/// Per-request delivery limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryControl {
    /// Session time budget (zero = unbounded).
    pub max_elapsed_time: Duration,
    /// Byte rate limit (0 = unbounded).
    pub max_bytes_per_second: u32,
    /// Samples to deliver before the session ends.
    pub max_samples: u16,
}

impl Default for DeliveryControl {
    fn default() -> Self {
        Self {
            max_elapsed_time: Duration::ZERO,
            max_bytes_per_second: 0,
            max_samples: 1,
        }
    }
}

/// Pull-side view of a reader's pending samples.
pub trait SampleSource: Send + 'static {
    /// Size of the next pending sample, `None` if the queue is empty.
    fn next_sample_size(&mut self) -> Option<usize>;

    /// Remove and return the next pending sample.
    fn take_sample(&mut self) -> Option<Vec<u8>>;
}

/// Per-sample delivery policy consulted after tokens are granted.
///
/// A denied sample is still taken from the source, but is dropped and does
/// not count towards `max_samples`.
pub trait DeliveryGate: Send + Sync {
    fn allow(&self, reader_id: ObjectId, now: Instant) -> bool;
}

/// Gate that lets every sample through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl DeliveryGate for AllowAll {
    fn allow(&self, _reader_id: ObjectId, _now: Instant) -> bool {
        true
    }
}

impl<F> DeliveryGate for F
where
    F: Fn(ObjectId, Instant) -> bool + Send + Sync,
{
    fn allow(&self, reader_id: ObjectId, now: Instant) -> bool {
        self(reader_id, now)
    }
}

// ---------------------------------------------------------------------------
// Shared session state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SessionState {
    running: bool,
    /// Bumped by every start. A worker only delivers while its session is
    /// the current one.
    generation: u64,
    /// Set by wakers so a notification racing the worker's check is not lost.
    pending_wake: bool,
    /// Worker threads of this reader that have not exited yet.
    workers: Vec<ThreadId>,
}

impl SessionState {
    fn is_active(&self, generation: u64) -> bool {
        self.running && self.generation == generation
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<SessionState>,
    wake: Condvar,
}

impl Shared {
    fn halt(&self) {
        self.state.lock().running = false;
        self.wake.notify_all();
    }

    /// Halt only if `generation` is still the current session.
    fn halt_generation(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.generation == generation {
                state.running = false;
            }
        }
        self.wake.notify_all();
    }

    fn on_worker(&self) -> bool {
        self.state.lock().workers.contains(&thread::current().id())
    }
}

/// Handle used by the middleware listener to signal new data.
#[derive(Clone)]
pub struct ReaderWaker {
    shared: Arc<Shared>,
}

impl ReaderWaker {
    pub fn wake(&self) {
        self.shared.state.lock().pending_wake = true;
        self.shared.wake.notify_all();
    }
}

/// Threads of one running session.
struct Session {
    worker: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
    timer_stop: Option<mpsc::Sender<()>>,
}

// ---------------------------------------------------------------------------
// RateControlledReader
// ---------------------------------------------------------------------------

pub struct RateControlledReader {
    reader_id: ObjectId,
    shared: Arc<Shared>,
    gate: Arc<dyn DeliveryGate>,
    /// Serializes start/stop.
    control: Mutex<Option<Session>>,
}

impl RateControlledReader {
    pub fn new(reader_id: ObjectId) -> Self {
        Self::with_gate(reader_id, Arc::new(AllowAll))
    }

    pub fn with_gate(reader_id: ObjectId, gate: Arc<dyn DeliveryGate>) -> Self {
        Self {
            reader_id,
            shared: Arc::new(Shared::default()),
            gate,
            control: Mutex::new(None),
        }
    }

    pub fn reader_id(&self) -> ObjectId {
        self.reader_id
    }

    pub fn waker(&self) -> ReaderWaker {
        ReaderWaker {
            shared: self.shared.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Start a new session, stopping the current one first.
    ///
    /// The new session delivers nothing before every earlier worker of this
    /// reader has exited. Called from a delivery callback, the calling worker
    /// is halted and the new worker waits for it to return. If another thread
    /// has already halted the session to stop or restart the reader, the call
    /// fails with [`XrceError::SessionBusy`].
    pub fn start<S, F>(
        &self,
        control: DeliveryControl,
        source: S,
        deliver: F,
    ) -> Result<(), XrceError>
    where
        S: SampleSource,
        F: FnMut(Vec<u8>) + Send + 'static,
    {
        let mut guard = if self.shared.on_worker() {
            self.lock_control_on_worker()?
        } else {
            self.control.lock()
        };
        let predecessor = self.halt_session(&mut guard);

        let generation = {
            let mut state = self.shared.state.lock();
            state.generation = state.generation.wrapping_add(1);
            state.running = true;
            state.pending_wake = true;
            state.generation
        };

        let (timer_stop, timer) = if control.max_elapsed_time.is_zero() {
            (None, None)
        } else {
            match self.spawn_timer(control.max_elapsed_time, generation) {
                Ok((tx, handle)) => (Some(tx), Some(handle)),
                Err(e) => {
                    self.shared.halt_generation(generation);
                    return Err(e);
                }
            }
        };

        let worker = Worker {
            reader_id: self.reader_id,
            shared: self.shared.clone(),
            gate: self.gate.clone(),
            control,
            generation,
            predecessor,
            timer_cancel: timer_stop.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("xrce-reader-{}", self.reader_id))
            .spawn(move || worker.run(source, deliver));

        let worker = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.halt_generation(generation);
                if let Some(stop) = timer_stop {
                    let _ = stop.send(());
                }
                if let Some(timer) = timer {
                    let _ = timer.join();
                }
                return Err(XrceError::ThreadSpawn(e.to_string()));
            }
        };

        log::debug!(
            "[XRCE] reader {} session {} started (samples={}, rate={}B/s, elapsed={:?})",
            self.reader_id,
            generation,
            control.max_samples,
            control.max_bytes_per_second,
            control.max_elapsed_time
        );

        *guard = Some(Session {
            worker: Some(worker),
            timer,
            timer_stop,
        });
        Ok(())
    }

    /// Stop the current session and wait for its threads.
    ///
    /// Safe to call multiple times, and from inside the delivery callback
    /// (the worker then only flags itself to exit).
    pub fn stop(&self) {
        if self.shared.on_worker() {
            self.shared.halt();
            return;
        }
        let mut guard = self.control.lock();
        // Off a worker thread every worker gets joined.
        let _ = self.halt_session(&mut guard);
    }

    /// Take the control lock from a delivery callback.
    ///
    /// A holder that halted the session may be joining this very thread, so
    /// waiting on it would never return. A holder that left the session
    /// running is only finishing a start and releases the lock shortly.
    fn lock_control_on_worker(&self) -> Result<MutexGuard<'_, Option<Session>>, XrceError> {
        loop {
            if let Some(guard) = self.control.try_lock_for(Duration::from_millis(1)) {
                return Ok(guard);
            }
            if !self.shared.state.lock().running {
                return Err(XrceError::SessionBusy(self.reader_id));
            }
        }
    }

    /// Halt the current session and reap its threads.
    ///
    /// On a worker thread the session's worker is not joined, since it may be
    /// the caller or be waiting on the caller. Its handle is returned so the
    /// next session can join it instead.
    fn halt_session(&self, session: &mut Option<Session>) -> Option<JoinHandle<()>> {
        self.shared.halt();
        let mut session = session.take()?;

        if let Some(stop) = session.timer_stop.take() {
            let _ = stop.send(());
        }
        if let Some(timer) = session.timer.take() {
            let _ = timer.join();
        }

        let worker = session.worker.take();
        let pending = if self.shared.on_worker() {
            worker
        } else {
            if let Some(worker) = worker {
                let _ = worker.join();
            }
            None
        };
        log::debug!("[XRCE] reader {} session stopped", self.reader_id);
        pending
    }

    fn spawn_timer(
        &self,
        budget: Duration,
        generation: u64,
    ) -> Result<(mpsc::Sender<()>, JoinHandle<()>), XrceError> {
        let (tx, rx) = mpsc::channel::<()>();
        let shared = self.shared.clone();
        let reader_id = self.reader_id;
        let handle = thread::Builder::new()
            .name(format!("xrce-reader-timer-{}", reader_id))
            .spawn(move || {
                if let Err(mpsc::RecvTimeoutError::Timeout) = rx.recv_timeout(budget) {
                    log::debug!("[XRCE] reader {} time budget expired", reader_id);
                    shared.halt_generation(generation);
                }
            })
            .map_err(|e| XrceError::ThreadSpawn(e.to_string()))?;
        Ok((tx, handle))
    }
}

impl Drop for RateControlledReader {
    fn drop(&mut self) {
        let mut taken = self.control.get_mut().take();
        // Dropped from a delivery callback: the worker detaches and exits on its own.
        let _ = self.halt_session(&mut taken);
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker {
    reader_id: ObjectId,
    shared: Arc<Shared>,
    gate: Arc<dyn DeliveryGate>,
    control: DeliveryControl,
    generation: u64,
    /// Worker of the replaced session, still running its last callback.
    predecessor: Option<JoinHandle<()>>,
    timer_cancel: Option<mpsc::Sender<()>>,
}

impl Worker {
    fn run<S, F>(mut self, mut source: S, mut deliver: F)
    where
        S: SampleSource,
        F: FnMut(Vec<u8>),
    {
        let me = thread::current().id();
        self.shared.state.lock().workers.push(me);
        if let Some(previous) = self.predecessor.take() {
            let _ = previous.join();
        }

        let mut bucket = TokenBucket::new(self.control.max_bytes_per_second);
        let mut delivered: u16 = 0;

        loop {
            {
                let mut state = self.shared.state.lock();
                if !state.is_active(self.generation) || delivered >= self.control.max_samples {
                    break;
                }
                state.pending_wake = false;
            }

            match source.next_sample_size() {
                Some(size) => {
                    if bucket.get_tokens(size as u64) {
                        let Some(sample) = source.take_sample() else {
                            continue;
                        };
                        if self.gate.allow(self.reader_id, Instant::now()) {
                            log::trace!(
                                "[XRCE] reader {} delivering {} bytes",
                                self.reader_id,
                                sample.len()
                            );
                            deliver(sample);
                            delivered += 1;
                        } else {
                            log::debug!("[XRCE] reader {} sample denied by gate", self.reader_id);
                        }
                    } else {
                        let wait = bucket
                            .time_until_available(size as u64)
                            .max(Duration::from_millis(1));
                        let mut state = self.shared.state.lock();
                        if state.is_active(self.generation) && !state.pending_wake {
                            self.shared.wake.wait_for(&mut state, wait);
                        }
                    }
                }
                None => {
                    let mut state = self.shared.state.lock();
                    if state.is_active(self.generation) && !state.pending_wake {
                        self.shared.wake.wait(&mut state);
                    }
                }
            }
        }

        {
            let mut state = self.shared.state.lock();
            state.workers.retain(|id| *id != me);
            if state.generation == self.generation {
                state.running = false;
            }
        }
        if let Some(cancel) = &self.timer_cancel {
            let _ = cancel.send(());
        }
        log::debug!(
            "[XRCE] reader {} session {} finished after {} samples",
            self.reader_id,
            self.generation,
            delivered
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct QueueSource(Arc<Mutex<VecDeque<Vec<u8>>>>);

    impl QueueSource {
        fn with_samples(count: usize, size: usize) -> Self {
            let source = Self::default();
            for i in 0..count {
                source.push(vec![i as u8; size]);
            }
            source
        }

        fn push(&self, sample: Vec<u8>) {
            self.0.lock().push_back(sample);
        }

        fn len(&self) -> usize {
            self.0.lock().len()
        }
    }

    impl SampleSource for QueueSource {
        fn next_sample_size(&mut self) -> Option<usize> {
            self.0.lock().front().map(Vec::len)
        }

        fn take_sample(&mut self) -> Option<Vec<u8>> {
            self.0.lock().pop_front()
        }
    }

    fn collector() -> (Arc<Mutex<Vec<Vec<u8>>>>, impl FnMut(Vec<u8>) + Send + 'static) {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = out.clone();
        (out, move |sample| sink.lock().push(sample))
    }

    fn wait_until_stopped(reader: &RateControlledReader, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if !reader.is_running() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        !reader.is_running()
    }

    fn id() -> ObjectId {
        ObjectId::from_raw(0x0016)
    }

    #[test]
    fn test_default_control() {
        let control = DeliveryControl::default();
        assert_eq!(control.max_samples, 1);
        assert_eq!(control.max_bytes_per_second, 0);
        assert!(control.max_elapsed_time.is_zero());
    }

    #[test]
    fn test_stops_after_max_samples() {
        let reader = RateControlledReader::new(id());
        let source = QueueSource::with_samples(10, 8);
        let (out, sink) = collector();
        let control = DeliveryControl {
            max_samples: 3,
            ..DeliveryControl::default()
        };

        reader.start(control, source.clone(), sink).unwrap();
        assert!(wait_until_stopped(&reader, Duration::from_secs(2)));

        // Delivered in pull order
        let out = out.lock();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0][0], 0);
        assert_eq!(out[2][0], 2);
        assert_eq!(source.len(), 7);
    }

    #[test]
    fn test_stops_after_elapsed_time() {
        let reader = RateControlledReader::new(id());
        let (_out, sink) = collector();
        let control = DeliveryControl {
            max_elapsed_time: Duration::from_millis(50),
            max_samples: u16::MAX,
            ..DeliveryControl::default()
        };

        let start = Instant::now();
        reader.start(control, QueueSource::default(), sink).unwrap();
        assert!(reader.is_running());
        assert!(wait_until_stopped(&reader, Duration::from_secs(2)));
        assert!(start.elapsed() >= Duration::from_millis(45));
        reader.stop();
    }

    #[test]
    fn test_rate_limit_shapes_throughput() {
        let reader = RateControlledReader::new(id());
        // 10 x 100B at 500 B/s: one right away, then one every 200ms
        let source = QueueSource::with_samples(10, 100);
        let (out, sink) = collector();
        let control = DeliveryControl {
            max_bytes_per_second: 500,
            max_samples: 10,
            ..DeliveryControl::default()
        };

        reader.start(control, source, sink).unwrap();
        thread::sleep(Duration::from_millis(500));
        let count = out.lock().len();
        assert!((2..=3).contains(&count), "count={}", count);
        reader.stop();
        assert!(!reader.is_running());
    }

    #[test]
    fn test_rate_limit_holds_over_any_second() {
        let reader = RateControlledReader::new(id());
        let rate = 500usize;
        let item = 100usize;
        let source = QueueSource::with_samples(50, item);
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let sink_stamps = stamps.clone();
        let control = DeliveryControl {
            max_bytes_per_second: rate as u32,
            max_samples: u16::MAX,
            ..DeliveryControl::default()
        };

        let start = Instant::now();
        reader
            .start(control, source, move |sample: Vec<u8>| {
                sink_stamps.lock().push((Instant::now(), sample.len()));
            })
            .unwrap();
        thread::sleep(Duration::from_millis(1500));
        reader.stop();

        let stamps = stamps.lock();
        let first_second: usize = stamps
            .iter()
            .filter(|(at, _)| at.duration_since(start) < Duration::from_secs(1))
            .map(|(_, len)| len)
            .sum();
        assert!(first_second <= rate + item, "first second carried {}", first_second);
        assert!(first_second >= item, "first second carried {}", first_second);

        // Every window opening at a delivery stays within the rate plus one item
        for (i, (opened, _)) in stamps.iter().enumerate() {
            let carried: usize = stamps[i..]
                .iter()
                .take_while(|(at, _)| at.duration_since(*opened) < Duration::from_secs(1))
                .map(|(_, len)| len)
                .sum();
            assert!(carried <= rate + item, "window at {} carried {}", i, carried);
        }
    }

    #[test]
    fn test_waker_delivers_new_data() {
        let reader = RateControlledReader::new(id());
        let source = QueueSource::default();
        let (out, sink) = collector();
        let control = DeliveryControl {
            max_samples: 2,
            ..DeliveryControl::default()
        };

        reader.start(control, source.clone(), sink).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(out.lock().is_empty());

        let waker = reader.waker();
        source.push(vec![1, 2, 3]);
        waker.wake();
        source.push(vec![4]);
        waker.wake();

        assert!(wait_until_stopped(&reader, Duration::from_secs(2)));
        assert_eq!(*out.lock(), vec![vec![1u8, 2, 3], vec![4u8]]);
    }

    #[test]
    fn test_denied_samples_are_dropped_uncounted() {
        let allowed = Arc::new(AtomicUsize::new(0));
        let counter = allowed.clone();
        // Allow every other sample
        let gate = move |_id: ObjectId, _now: Instant| {
            counter.fetch_add(1, Ordering::SeqCst) % 2 == 1
        };
        let reader = RateControlledReader::with_gate(id(), Arc::new(gate));
        let source = QueueSource::with_samples(6, 4);
        let (out, sink) = collector();
        let control = DeliveryControl {
            max_samples: 3,
            ..DeliveryControl::default()
        };

        reader.start(control, source.clone(), sink).unwrap();
        assert!(wait_until_stopped(&reader, Duration::from_secs(2)));

        let out = out.lock();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0][0], 1);
        assert_eq!(out[1][0], 3);
        assert_eq!(out[2][0], 5);
        assert_eq!(source.len(), 0);
    }

    #[test]
    fn test_stop_is_idempotent_and_restartable() {
        let reader = RateControlledReader::new(id());
        let (_out, sink) = collector();
        let control = DeliveryControl {
            max_samples: u16::MAX,
            ..DeliveryControl::default()
        };

        reader.stop();
        reader.start(control, QueueSource::default(), sink).unwrap();
        assert!(reader.is_running());
        reader.stop();
        reader.stop();
        assert!(!reader.is_running());

        let (out, sink) = collector();
        reader
            .start(DeliveryControl::default(), QueueSource::with_samples(1, 2), sink)
            .unwrap();
        assert!(wait_until_stopped(&reader, Duration::from_secs(2)));
        assert_eq!(out.lock().len(), 1);
    }

    #[test]
    fn test_stop_from_delivery_callback() {
        let reader = Arc::new(RateControlledReader::new(id()));
        let source = QueueSource::with_samples(5, 1);
        let delivered = Arc::new(AtomicUsize::new(0));

        let r = reader.clone();
        let d = delivered.clone();
        let control = DeliveryControl {
            max_samples: u16::MAX,
            ..DeliveryControl::default()
        };
        reader
            .start(control, source, move |_sample| {
                d.fetch_add(1, Ordering::SeqCst);
                r.stop();
            })
            .unwrap();

        assert!(wait_until_stopped(&reader, Duration::from_secs(2)));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        reader.stop();
    }

    #[test]
    fn test_restart_from_delivery_callback() {
        let reader = Arc::new(RateControlledReader::new(id()));
        let old_source = QueueSource::with_samples(20, 1);
        let new_source = QueueSource::with_samples(5, 1);
        let old_delivered = Arc::new(AtomicUsize::new(0));
        let (new_out, new_sink) = collector();

        let r = reader.clone();
        let d = old_delivered.clone();
        let mut next = Some((new_source.clone(), new_sink));
        let forever = DeliveryControl {
            max_samples: u16::MAX,
            ..DeliveryControl::default()
        };
        reader
            .start(forever, old_source.clone(), move |_sample| {
                d.fetch_add(1, Ordering::SeqCst);
                if let Some((source, sink)) = next.take() {
                    r.start(DeliveryControl::default(), source, sink).unwrap();
                }
            })
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while new_out.lock().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(wait_until_stopped(&reader, Duration::from_secs(2)));
        thread::sleep(Duration::from_millis(20));

        // The replaced session delivered nothing after the restart
        assert_eq!(old_delivered.load(Ordering::SeqCst), 1);
        assert_eq!(old_source.len(), 19);
        assert_eq!(new_out.lock().len(), 1);
        assert_eq!(new_source.len(), 4);
        reader.stop();
    }

    #[test]
    fn test_restart_from_callback_during_external_stop() {
        let reader = Arc::new(RateControlledReader::new(id()));
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (result_tx, result_rx) = mpsc::channel();

        let r = reader.clone();
        let mut once = Some((entered_tx, release_rx, result_tx));
        reader
            .start(
                DeliveryControl::default(),
                QueueSource::with_samples(1, 1),
                move |_sample| {
                    if let Some((entered, release, result)) = once.take() {
                        let _ = entered.send(());
                        let _ = release.recv_timeout(Duration::from_secs(2));
                        let restarted = r.start(
                            DeliveryControl::default(),
                            QueueSource::default(),
                            |_| {},
                        );
                        let _ = result.send(restarted);
                    }
                },
            )
            .unwrap();

        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let stopper = {
            let reader = reader.clone();
            thread::spawn(move || reader.stop())
        };
        // Let the stopper take the control lock before the callback restarts
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        let restarted = result_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(restarted, Err(XrceError::SessionBusy(_))));
        stopper.join().unwrap();
        assert!(!reader.is_running());
    }

    #[test]
    fn test_concurrent_start_stop() {
        let reader = Arc::new(RateControlledReader::new(id()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reader = reader.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        let control = DeliveryControl {
                            max_samples: u16::MAX,
                            max_elapsed_time: Duration::from_millis(5),
                            ..DeliveryControl::default()
                        };
                        reader.start(control, QueueSource::default(), |_| {}).unwrap();
                        reader.stop();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        reader.stop();
        assert!(!reader.is_running());
    }

    #[test]
    fn test_drop_joins_running_session() {
        let source = QueueSource::default();
        {
            let reader = RateControlledReader::new(id());
            let control = DeliveryControl {
                max_samples: u16::MAX,
                max_elapsed_time: Duration::from_secs(60),
                ..DeliveryControl::default()
            };
            reader.start(control, source.clone(), |_| {}).unwrap();
        }
        // Worker and timer are gone: only our handle to the queue is left.
        assert_eq!(Arc::strong_count(&source.0), 1);
    }
}
