//! Phoneme playback worker
//!
//! Phoneme audio takes tens of milliseconds; the emulation thread must never
//! wait for it. Requests go into a bounded queue, a dedicated thread hands
//! them one at a time to the audio collaborator, and finished phonemes come
//! back through a second queue that the emulation thread drains on its own
//! schedule. Both queues and the stop flag sit behind a single mutex.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};

use super::{PhonemeDone, PhonemeOutput};
use crate::config::CardConfig;
use crate::Result;

/// Audio collaborator that renders phonemes
pub trait PhonemePlayer: Send + 'static {
    /// Play `phoneme`, returning once its audio has finished
    fn play(&mut self, phoneme: u8);
}

#[derive(Debug)]
struct QueueState {
    /// Requests not yet handed to the player
    pending: VecDeque<PhonemeDone>,
    /// Phoneme the player is rendering
    active: Option<PhonemeDone>,
    /// Finished phonemes not yet seen by the emulation thread
    completed: VecDeque<PhonemeDone>,
    /// Shutdown requested
    stop: bool,
    /// Maximum pending requests
    capacity: usize,
    /// Bumped by every cancel; completions of older requests are dropped
    generation: u64,
}

impl QueueState {
    fn new(capacity: usize) -> Self {
        QueueState {
            pending: VecDeque::with_capacity(capacity),
            active: None,
            completed: VecDeque::new(),
            stop: false,
            capacity: capacity.max(1),
            generation: 0,
        }
    }

    /// Queue a request; returns the request dropped to make room
    fn push(&mut self, request: PhonemeDone) -> Option<PhonemeDone> {
        let dropped = if self.pending.len() >= self.capacity {
            self.pending.pop_front()
        } else {
            None
        };
        self.pending.push_back(request);
        dropped
    }

    fn busy(&self) -> bool {
        self.active.is_some() || !self.pending.is_empty()
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    wake: Condvar,
}

/// Handle to the playback thread
#[derive(Debug)]
pub struct SpeechWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl SpeechWorker {
    /// Start the playback thread with the queue depth of `config`
    pub fn from_config<P: PhonemePlayer>(player: P, config: &CardConfig) -> Result<Self> {
        config.validate()?;
        Self::spawn(player, config.speech_queue_depth)
    }

    /// Start the playback thread
    pub fn spawn<P: PhonemePlayer>(player: P, capacity: usize) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::new(capacity)),
            wake: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("ssi263-playback".to_string())
            .spawn(move || playback_loop(&thread_shared, player))?;
        debug!("speech: playback thread started");
        Ok(SpeechWorker {
            shared,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it; safe to call more than once
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        {
            let mut state = self.shared.state.lock();
            state.stop = true;
            state.pending.clear();
        }
        self.shared.wake.notify_all();
        if handle.join().is_err() {
            error!("speech: playback thread panicked before shutdown");
        } else {
            debug!("speech: playback thread stopped");
        }
    }

    /// Whether the playback thread is still attached
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Maximum number of queued requests
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().capacity
    }
}

impl PhonemeOutput for SpeechWorker {
    fn play_phoneme(&mut self, device: usize, phoneme: u8) {
        let dropped = self.shared.state.lock().push(PhonemeDone { device, phoneme });
        if let Some(dropped) = dropped {
            warn!(
                "speech: queue full, dropped phoneme {:#04x} from PIA {}",
                dropped.phoneme, dropped.device
            );
        }
        self.shared.wake.notify_one();
    }

    fn phoneme_active(&self) -> bool {
        self.shared.state.lock().busy()
    }

    fn poll_complete(&mut self) -> Option<PhonemeDone> {
        self.shared.state.lock().completed.pop_front()
    }

    fn cancel(&mut self) {
        let mut state = self.shared.state.lock();
        state.pending.clear();
        state.completed.clear();
        state.generation = state.generation.wrapping_add(1);
    }
}

impl Drop for SpeechWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn playback_loop<P: PhonemePlayer>(shared: &Shared, mut player: P) {
    loop {
        let (request, generation) = {
            let mut state = shared.state.lock();
            loop {
                if state.stop {
                    return;
                }
                if let Some(request) = state.pending.pop_front() {
                    state.active = Some(request);
                    break (request, state.generation);
                }
                shared.wake.wait(&mut state);
            }
        };

        player.play(request.phoneme);

        let mut state = shared.state.lock();
        if state.stop {
            return;
        }
        state.active = None;
        if state.generation == generation {
            state.completed.push_back(request);
        } else {
            debug!(
                "speech: dropped completion of cancelled phoneme {:#04x}",
                request.phoneme
            );
        }
    }
}
