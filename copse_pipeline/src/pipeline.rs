// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stage handoff, the waiting list, and the worker loop.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::PipelineError;

type ErasedValue = Box<dyn Any + Send>;
type ErasedTransform = dyn FnMut(ErasedValue) -> ErasedValue + Send;

struct WaitingList {
    queue: Mutex<VecDeque<ErasedValue>>,
    cvar: Condvar,
}

struct StageChannel {
    slot: Mutex<Option<ErasedValue>>,
    cvar: Condvar,
}

impl StageChannel {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            cvar: Condvar::new(),
        }
    }
}

struct InFlight {
    count: Mutex<usize>,
    cvar: Condvar,
}

/// A staged concurrent pipeline.
///
/// Each appended stage gets its own dedicated worker thread and a
/// one-slot inbox; `feed` enqueues onto a shared FIFO that only stage 0
/// reads from. There is no static check that stage `i`'s output type
/// matches stage `i + 1`'s input type — adjacent stages must agree, the
/// same contract an untyped message queue would have, and a mismatch
/// surfaces as a caught panic rather than corrupting the pipeline.
pub struct Pipeline {
    running: Arc<AtomicBool>,
    waiting_list: Arc<WaitingList>,
    channels: Arc<Mutex<Vec<Arc<StageChannel>>>>,
    in_flight: Arc<InFlight>,
    error_slot: Arc<Mutex<Option<PipelineError>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stage_count: AtomicUsize,
}

impl Pipeline {
    /// Create a pipeline with no stages yet. Stages may be appended
    /// before or during feeding.
    #[must_use]
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            waiting_list: Arc::new(WaitingList {
                queue: Mutex::new(VecDeque::new()),
                cvar: Condvar::new(),
            }),
            channels: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(InFlight {
                count: Mutex::new(0),
                cvar: Condvar::new(),
            }),
            error_slot: Arc::new(Mutex::new(None)),
            handles: Mutex::new(Vec::new()),
            stage_count: AtomicUsize::new(0),
        }
    }

    /// Append a stage, spawning its dedicated worker thread immediately.
    ///
    /// `I` is the type this stage consumes and `O` the type it produces;
    /// the previous stage (or `feed`, for stage 0) must supply values of
    /// type `I`, and the next stage (if any) must accept `O`.
    pub fn add_stage<I, O, F>(&self, transform: F)
    where
        F: FnMut(I) -> O + Send + 'static,
        I: Send + 'static,
        O: Send + 'static,
    {
        let index = self.stage_count.fetch_add(1, Ordering::SeqCst);
        let channel = Arc::new(StageChannel::new());
        self.channels.lock().unwrap().push(channel);

        let running = Arc::clone(&self.running);
        let waiting_list = Arc::clone(&self.waiting_list);
        let channels = Arc::clone(&self.channels);
        let in_flight = Arc::clone(&self.in_flight);
        let error_slot = Arc::clone(&self.error_slot);
        let mut erased = erase_transform(transform);

        let handle = thread::spawn(move || {
            log::debug!("pipeline stage {index} worker started");
            loop {
                let Some(input) =
                    take_input(index, &running, &waiting_list, &channels)
                else {
                    log::debug!("pipeline stage {index} worker stopping");
                    return;
                };

                match catch_unwind(AssertUnwindSafe(|| erased(input))) {
                    Ok(output) => forward_output(index, output, &channels, &in_flight, &running),
                    Err(payload) => {
                        let message = panic_message(&payload);
                        log::error!("pipeline stage {index} transform panicked: {message}");
                        *error_slot.lock().unwrap() = Some(PipelineError::StageTransformPanicked {
                            stage: index,
                            message,
                        });
                        complete_one(&in_flight);
                        return;
                    }
                }
            }
        });
        self.handles.lock().unwrap().push(handle);
    }

    /// Enqueue `input` for stage 0. Refused once [`Self::stop`] has run.
    pub fn feed<T>(&self, input: T) -> Result<(), PipelineError>
    where
        T: Send + 'static,
    {
        if !self.running.load(Ordering::SeqCst) {
            return Err(PipelineError::PipelineStopped);
        }
        {
            let mut queue = self.waiting_list.queue.lock().unwrap();
            queue.push_back(Box::new(input));
        }
        {
            let mut count = self.in_flight.count.lock().unwrap();
            *count += 1;
        }
        self.waiting_list.cvar.notify_all();
        Ok(())
    }

    /// Block until the in-flight counter reaches zero (every fed item
    /// has cleared every stage), then stop the pipeline.
    pub fn wait_end(&self) -> Result<(), PipelineError> {
        {
            let mut count = self.in_flight.count.lock().unwrap();
            while *count != 0 {
                count = self.in_flight.cvar.wait(count).unwrap();
            }
        }
        log::debug!("pipeline reached quiescence");
        self.stop();
        match self.error_slot.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Clear the continue flag, wake every worker, and join them all.
    /// In-flight transforms finish their current item before exiting.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);

        // Acquiring and releasing each mutex before notifying closes the
        // race where a worker is about to wait but hasn't yet: once this
        // thread has held the lock after the flag flip, any later lock
        // holder observes `running == false`.
        {
            let _guard = self.waiting_list.queue.lock().unwrap();
        }
        self.waiting_list.cvar.notify_all();

        {
            let channels = self.channels.lock().unwrap();
            for channel in channels.iter() {
                {
                    let _guard = channel.slot.lock().unwrap();
                }
                channel.cvar.notify_all();
            }
        }
        self.in_flight.cvar.notify_all();

        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Number of stages appended so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stage_count.load(Ordering::SeqCst)
    }

    /// Jobs fed but not yet cleared past the final stage.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        *self.in_flight.count.lock().unwrap()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stage_count", &self.stage_count())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

fn erase_transform<I, O, F>(mut transform: F) -> Box<ErasedTransform>
where
    F: FnMut(I) -> O + Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    Box::new(move |input: ErasedValue| {
        let typed = *input
            .downcast::<I>()
            .expect("adjacent pipeline stages must agree on the carried type");
        Box::new(transform(typed)) as ErasedValue
    })
}

/// Block until stage `index`'s input is available, or return `None` once
/// stopped with nothing left for this stage to drain.
fn take_input(
    index: usize,
    running: &AtomicBool,
    waiting_list: &WaitingList,
    channels: &Mutex<Vec<Arc<StageChannel>>>,
) -> Option<ErasedValue> {
    if index == 0 {
        let mut queue = waiting_list.queue.lock().unwrap();
        loop {
            if let Some(item) = queue.pop_front() {
                return Some(item);
            }
            if !running.load(Ordering::SeqCst) {
                return None;
            }
            queue = waiting_list.cvar.wait(queue).unwrap();
        }
    } else {
        let channel = Arc::clone(&channels.lock().unwrap()[index]);
        let mut slot = channel.slot.lock().unwrap();
        loop {
            if let Some(item) = slot.take() {
                // Wake a producer that's waiting on this now-empty slot.
                channel.cvar.notify_all();
                return Some(item);
            }
            if !running.load(Ordering::SeqCst) {
                return None;
            }
            slot = channel.cvar.wait(slot).unwrap();
        }
    }
}

/// Write `output` into stage `index + 1`'s slot, waiting for it to be
/// empty first so a fast upstream stage can't overwrite an item the
/// downstream stage hasn't consumed yet (the one-slot bound per stage).
fn forward_output(
    index: usize,
    output: ErasedValue,
    channels: &Mutex<Vec<Arc<StageChannel>>>,
    in_flight: &InFlight,
    running: &AtomicBool,
) {
    let next = channels.lock().unwrap().get(index + 1).cloned();
    match next {
        Some(channel) => {
            let mut slot = channel.slot.lock().unwrap();
            while slot.is_some() {
                if !running.load(Ordering::SeqCst) {
                    complete_one(in_flight);
                    return;
                }
                slot = channel.cvar.wait(slot).unwrap();
            }
            *slot = Some(output);
            channel.cvar.notify_all();
        }
        None => complete_one(in_flight),
    }
}

fn complete_one(in_flight: &InFlight) {
    let mut count = in_flight.count.lock().unwrap();
    *count -= 1;
    if *count == 0 {
        in_flight.cvar.notify_all();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "stage transform panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as TestCounter;
    use std::time::Duration;

    fn init_test_logging() {
        let _ = env_logger::try_init();
    }

    #[test]
    fn three_stage_pipeline_clears_all_fed_items() {
        init_test_logging();
        let pipeline = Pipeline::new();
        let completed = Arc::new(TestCounter::new(0));

        pipeline.add_stage(move |x: i32| {
            thread::sleep(Duration::from_millis(10));
            x
        });
        pipeline.add_stage(move |x: i32| {
            thread::sleep(Duration::from_millis(20));
            x
        });
        let completed_in_final = Arc::clone(&completed);
        pipeline.add_stage(move |x: i32| {
            thread::sleep(Duration::from_millis(30));
            completed_in_final.fetch_add(1, Ordering::SeqCst);
            x
        });

        for i in 0..4 {
            pipeline.feed(i).unwrap();
        }

        pipeline.wait_end().unwrap();

        assert_eq!(completed.load(Ordering::SeqCst), 4);
        assert_eq!(pipeline.in_flight(), 0);
        assert_eq!(pipeline.stage_count(), 3);
    }

    #[test]
    fn feed_after_stop_is_refused() {
        init_test_logging();
        let pipeline = Pipeline::new();
        pipeline.add_stage(|x: i32| x);
        pipeline.stop();
        assert!(matches!(pipeline.feed(1), Err(PipelineError::PipelineStopped)));
    }

    #[test]
    fn panicking_transform_is_reported_without_hanging() {
        init_test_logging();
        let pipeline = Pipeline::new();
        pipeline.add_stage(|_: i32| -> i32 { panic!("boom") });
        pipeline.feed(1).unwrap();
        let result = pipeline.wait_end();
        assert!(matches!(
            result,
            Err(PipelineError::StageTransformPanicked { stage: 0, .. })
        ));
    }

    #[test]
    fn stages_process_items_in_feed_order() {
        init_test_logging();
        let pipeline = Pipeline::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_stage = Arc::clone(&seen);
        pipeline.add_stage(move |x: i32| {
            seen_in_stage.lock().unwrap().push(x);
            x
        });
        for i in 0..5 {
            pipeline.feed(i).unwrap();
        }
        pipeline.wait_end().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn a_slow_downstream_stage_does_not_lose_items_from_a_fast_upstream_stage() {
        init_test_logging();
        let pipeline = Pipeline::new();
        // Stage 0 produces instantly; stage 1 is slow enough that, without
        // waiting for its slot to empty, stage 0 would overwrite it with a
        // later item before stage 1 ever reads the earlier one.
        pipeline.add_stage(|x: i32| x);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_stage = Arc::clone(&seen);
        pipeline.add_stage(move |x: i32| {
            thread::sleep(Duration::from_millis(15));
            seen_in_stage.lock().unwrap().push(x);
            x
        });

        for i in 0..6 {
            pipeline.feed(i).unwrap();
        }
        pipeline.wait_end().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
    }
}
