//! Redraw engine: lifecycle, periodic tick, forced updates and teardown.
//!
//! All mutable state lives in one [`EngineState`] behind one mutex. The tick
//! loop, bypass writes, forced updates, `start` and `stop` each take it for
//! their critical section; nothing acquires it re-entrantly. The delayed
//! bypass helper waits on the shared condvar, which releases the lock while
//! it blocks.

use std::io::{self, Write};
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{ErrorHandler, LiveConfig, OutputTarget};
use crate::core::output::{OutputGate, TerminalCmd};
use crate::core::terminal::{ConsoleBuffer, TerminalDriver};
use crate::error::{LiveError, Result};
use crate::platform::size::{ResizeWatcher, SizeOracle, SizePolicy, TerminalSize, TtySize};
use crate::render::buffer::RenderBuffers;
use crate::render::eraser::measure;
use crate::runtime::bypass::{Bypass, PendingBypass};
use crate::runtime::content::ContentSource;

const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);
const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Stopped,
    Running,
    /// `stop` was requested; the worker is tearing down.
    Stopping,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Painted,
    /// No content producer is installed.
    NoContent,
    /// The size changed on this tick; a stabilization window was (re)opened.
    ResizeDetected,
    /// Still inside a stabilization window.
    Stabilizing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkOrigin {
    Stdout,
    Stderr,
    Writer,
}

pub(crate) struct Shared {
    state: Mutex<EngineState>,
    pub(crate) wake: Condvar,
    size: AtomicU32,
    on_error: Mutex<Option<ErrorHandler>>,
}

impl Shared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn wait_timeout<'a>(
        &self,
        state: MutexGuard<'a, EngineState>,
        timeout: Duration,
    ) -> MutexGuard<'a, EngineState> {
        match self.wake.wait_timeout(state, timeout) {
            Ok((state, _)) => state,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }

    /// Hand an error nobody is waiting on to the error handler.
    ///
    /// Must be called without the state lock held.
    pub(crate) fn report(&self, err: LiveError) {
        tracing::warn!(error = %err, "background terminal write failed");
        let mut handler = match self.on_error.lock() {
            Ok(handler) => handler,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handler) = handler.as_mut() {
            handler(&err);
        }
    }

    fn publish_size(&self, size: TerminalSize) {
        let packed = (u32::from(size.columns) << 16) | u32::from(size.rows);
        self.size.store(packed, Ordering::SeqCst);
    }

    fn published_size(&self) -> TerminalSize {
        let packed = self.size.load(Ordering::SeqCst);
        TerminalSize::new((packed >> 16) as u16, (packed & 0xffff) as u16)
    }
}

pub(crate) struct EngineState {
    lifecycle: Lifecycle,
    config: LiveConfig,
    content: ContentSource,
    pub(crate) run: Option<RunState>,
    stop_clear: Option<bool>,
}

impl EngineState {
    pub(crate) fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    fn tick(&mut self, now: Instant) -> io::Result<TickOutcome> {
        let EngineState { run, content, .. } = self;
        match run {
            Some(run) => run.tick(content, now),
            None => Ok(TickOutcome::NoContent),
        }
    }

    fn size(&self) -> TerminalSize {
        self.run
            .as_ref()
            .map(|run| run.size)
            .unwrap_or(TerminalSize::UNKNOWN)
    }

    /// Final erase or paint, cursor restore, then release everything `start`
    /// acquired.
    fn finish(&mut self, clear: bool) -> io::Result<()> {
        let EngineState {
            lifecycle,
            config,
            content,
            run,
            stop_clear,
        } = self;

        let result = match run.take() {
            Some(mut run) => {
                let result = if clear {
                    run.erase_only()
                } else {
                    run.final_paint(content)
                };
                let cursor = if run.hide_cursor {
                    run.write_cmd(TerminalCmd::ShowCursor)
                } else {
                    Ok(())
                };
                run.release(config);
                result.and(cursor)
            }
            None => Ok(()),
        };

        *content = ContentSource::None;
        *lifecycle = Lifecycle::Stopped;
        *stop_clear = None;
        result
    }

    /// Release without writing anything (the worker died).
    fn abandon(&mut self) {
        if let Some(run) = self.run.take() {
            run.release(&mut self.config);
        }
        self.content = ContentSource::None;
        self.lifecycle = Lifecycle::Stopped;
        self.stop_clear = None;
    }
}

/// Everything that only exists between `start` and `stop`.
pub(crate) struct RunState {
    sink: Box<dyn Write + Send>,
    sink_origin: SinkOrigin,
    driver: TerminalDriver,
    buffers: RenderBuffers,
    oracle: Option<Arc<dyn SizeOracle>>,
    /// Wrap-aware erase and resize debouncing are only enabled when the size
    /// was known at start.
    track_size: bool,
    size: TerminalSize,
    stabilization_delay: Duration,
    wait_until: Option<Instant>,
    pub(crate) pending: Option<PendingBypass>,
    hide_cursor: bool,
}

/// Next move for the delayed bypass helper.
pub(crate) enum DelayedStep {
    Wait(Duration),
    Done(io::Result<()>),
}

impl RunState {
    fn open(config: &mut LiveConfig) -> Result<Self> {
        let is_terminal = config.output.is_terminal();
        if config.hide_cursor && config.output.is_process_stream() && !is_terminal {
            return Err(LiveError::NotATerminal);
        }

        let (sink, sink_origin): (Box<dyn Write + Send>, SinkOrigin) =
            match mem::take(&mut config.output) {
                OutputTarget::Stdout => (Box::new(io::stdout()), SinkOrigin::Stdout),
                OutputTarget::Stderr => (Box::new(io::stderr()), SinkOrigin::Stderr),
                OutputTarget::Writer(writer) => (writer, SinkOrigin::Writer),
            };

        let base: Option<Arc<dyn SizeOracle>> = match config.size_oracle.clone() {
            Some(oracle) => Some(oracle),
            None => match TtySize::open() {
                Ok(tty) => Some(Arc::new(tty)),
                Err(err) => {
                    tracing::debug!(
                        error = %err,
                        "no controlling terminal, wrap-aware erase disabled"
                    );
                    None
                }
            },
        };
        let oracle = match (base, config.size_policy) {
            (Some(base), SizePolicy::Signal) => match ResizeWatcher::spawn(Arc::clone(&base)) {
                Ok(watcher) => Some(Arc::new(watcher) as Arc<dyn SizeOracle>),
                Err(err) => {
                    tracing::warn!(error = %err, "resize signal unavailable, polling size instead");
                    Some(base)
                }
            },
            (base, _) => base,
        };

        let size = oracle
            .as_ref()
            .map(|oracle| oracle.query())
            .unwrap_or(TerminalSize::UNKNOWN);
        let driver = TerminalDriver::detect(is_terminal, config.console.take());

        tracing::debug!(
            columns = size.columns,
            rows = size.rows,
            driver = driver.name(),
            "terminal opened"
        );

        Ok(Self {
            sink,
            sink_origin,
            driver,
            buffers: RenderBuffers::new(),
            oracle,
            track_size: size.is_known(),
            size,
            stabilization_delay: config.stabilization_delay,
            wait_until: None,
            pending: None,
            hide_cursor: config.hide_cursor,
        })
    }

    /// Give the caller-owned pieces (custom writer, console binding) back to
    /// the configuration and drop the rest.
    fn release(self, config: &mut LiveConfig) {
        let RunState {
            sink,
            sink_origin,
            driver,
            ..
        } = self;
        config.output = match sink_origin {
            SinkOrigin::Stdout => OutputTarget::Stdout,
            SinkOrigin::Stderr => OutputTarget::Stderr,
            SinkOrigin::Writer => OutputTarget::Writer(sink),
        };
        if let TerminalDriver::Console(console) = driver {
            config.console = Some(console);
        }
    }

    fn query_size(&self) -> TerminalSize {
        self.oracle
            .as_ref()
            .map(|oracle| oracle.query())
            .unwrap_or(TerminalSize::UNKNOWN)
    }

    fn wrap_columns(&self) -> u16 {
        if self.track_size {
            self.size.columns
        } else {
            0
        }
    }

    pub(crate) fn in_resize_window(&self, now: Instant) -> bool {
        self.track_size && self.wait_until.is_some_and(|until| now < until)
    }

    pub(crate) fn tick(
        &mut self,
        content: &mut ContentSource,
        now: Instant,
    ) -> io::Result<TickOutcome> {
        if let Some(outcome) = self.observe_size(now) {
            return Ok(outcome);
        }
        self.paint(content)
    }

    fn observe_size(&mut self, now: Instant) -> Option<TickOutcome> {
        if !self.track_size {
            return None;
        }
        let oracle = self.oracle.as_ref()?;

        let size = oracle.query();
        if size != self.size {
            tracing::debug!(
                from_columns = self.size.columns,
                from_rows = self.size.rows,
                columns = size.columns,
                rows = size.rows,
                "terminal resized, waiting for it to settle"
            );
            self.size = size;
            self.wait_until = Some(now + self.stabilization_delay);
            return Some(TickOutcome::ResizeDetected);
        }

        match self.wait_until {
            Some(until) if now < until => Some(TickOutcome::Stabilizing),
            Some(_) => {
                self.wait_until = None;
                None
            }
            None => None,
        }
    }

    fn paint(&mut self, content: &mut ContentSource) -> io::Result<TickOutcome> {
        // Bypass bytes held back by a window that has since closed go out first.
        self.write_through(&[])?;

        if !self.buffers.fill(content) {
            return Ok(TickOutcome::NoContent);
        }

        let footprint = measure(self.buffers.previous(), self.wrap_columns());
        {
            let mut gate = OutputGate::new();
            gate.push(footprint.erase_cmd());
            gate.push(TerminalCmd::bytes(self.buffers.current()));
            gate.flush(&mut *self.sink, &mut self.driver)?;
        }
        self.buffers.swap();

        tracing::trace!(
            erased = footprint.lines(),
            bytes = self.buffers.previous().len(),
            "painted"
        );
        Ok(TickOutcome::Painted)
    }

    /// Erase the dynamic region, write held-back and `extra` permanent bytes,
    /// then repaint the last dynamic content below them.
    ///
    /// On failure the held-back bytes go back in front of the pending queue
    /// and are retried by the next flush; a sink that failed midway may then
    /// show part of them twice.
    pub(crate) fn write_through(&mut self, extra: &[u8]) -> io::Result<()> {
        let held = self
            .pending
            .as_mut()
            .map(|pending| mem::take(&mut pending.bytes))
            .unwrap_or_default();
        if held.is_empty() && extra.is_empty() {
            return Ok(());
        }

        let footprint = measure(self.buffers.previous(), self.wrap_columns());
        let result = {
            let mut gate = OutputGate::new();
            gate.push(footprint.erase_cmd());
            gate.push(TerminalCmd::bytes(&held[..]));
            gate.push(TerminalCmd::bytes(extra));
            gate.push(TerminalCmd::bytes(self.buffers.previous()));
            gate.flush(&mut *self.sink, &mut self.driver)
        };

        if result.is_err() && !held.is_empty() {
            if let Some(pending) = self.pending.as_mut() {
                let queued = mem::replace(&mut pending.bytes, held);
                pending.bytes.extend_from_slice(&queued);
            }
        }
        result
    }

    pub(crate) fn delayed_step(&mut self, now: Instant) -> DelayedStep {
        let Some(pending) = self.pending.as_ref() else {
            return DelayedStep::Done(Ok(()));
        };
        if !pending.cancelled {
            if let Some(until) = self.wait_until {
                if now < until {
                    return DelayedStep::Wait(until - now);
                }
            }
        }

        let result = self.write_through(&[]);
        self.pending = None;
        if self.wait_until.is_some_and(|until| now >= until) {
            self.wait_until = None;
        }
        DelayedStep::Done(result)
    }

    fn erase_only(&mut self) -> io::Result<()> {
        let footprint = measure(self.buffers.previous(), self.wrap_columns());
        self.write_cmd(footprint.erase_cmd())?;
        self.buffers.release();
        Ok(())
    }

    /// Paint once more with the freshest size, ignoring any open window.
    fn final_paint(&mut self, content: &mut ContentSource) -> io::Result<()> {
        if self.track_size {
            if let Some(oracle) = self.oracle.as_ref() {
                self.size = oracle.query();
            }
        }
        self.wait_until = None;
        self.paint(content).map(|_| ())
    }

    fn write_cmd(&mut self, cmd: TerminalCmd<'_>) -> io::Result<()> {
        let mut gate = OutputGate::new();
        gate.push(cmd);
        gate.flush(&mut *self.sink, &mut self.driver)
    }
}

/// Live-updating terminal region.
///
/// Content producers run on the engine's worker thread with the engine lock
/// held: they may call [`LiveTerm::last_known_size`] but must not call any
/// other method of the same engine or write to its [`Bypass`].
pub struct LiveTerm {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Default for LiveTerm {
    fn default() -> Self {
        Self::new(LiveConfig::default())
    }
}

/// Size from the configured oracle, or the controlling terminal.
fn query_configured_size(config: &LiveConfig) -> TerminalSize {
    match config.size_oracle.as_ref() {
        Some(oracle) => oracle.query(),
        None => TtySize::open()
            .map(|tty| tty.query())
            .unwrap_or(TerminalSize::UNKNOWN),
    }
}

impl LiveTerm {
    /// The terminal size is queried once here so callers can lay out content
    /// before `start`.
    pub fn new(mut config: LiveConfig) -> Self {
        let on_error = config.on_error.take();
        let size = query_configured_size(&config);
        let term = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(EngineState {
                    lifecycle: Lifecycle::Stopped,
                    config,
                    content: ContentSource::None,
                    run: None,
                    stop_clear: None,
                }),
                wake: Condvar::new(),
                size: AtomicU32::new(0),
                on_error: Mutex::new(on_error),
            }),
            worker: Mutex::new(None),
        };
        term.shared.publish_size(size);
        term
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lock_state().lifecycle
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock_state().is_running()
    }

    /// Take over the output and start repainting in the background.
    ///
    /// The output must not be written to directly until [`LiveTerm::stop`]
    /// returns; use [`LiveTerm::bypass`] for permanent lines.
    pub fn start(&self) -> Result<()> {
        let mut state = self.shared.lock_state();
        if state.lifecycle != Lifecycle::Stopped {
            return Err(LiveError::AlreadyRunning);
        }

        let interval = state.config.refresh_interval.max(MIN_REFRESH_INTERVAL);
        let mut run = RunState::open(&mut state.config)?;
        if run.hide_cursor {
            if let Err(err) = run.write_cmd(TerminalCmd::HideCursor) {
                run.release(&mut state.config);
                return Err(err.into());
            }
        }
        let size = run.size;

        let shared = Arc::clone(&self.shared);
        let worker = thread::Builder::new()
            .name("liveterm-worker".to_string())
            .spawn(move || run_worker(shared, interval));
        let worker = match worker {
            Ok(worker) => worker,
            Err(err) => {
                run.release(&mut state.config);
                return Err(err.into());
            }
        };

        state.run = Some(run);
        state.lifecycle = Lifecycle::Running;
        state.stop_clear = None;
        self.shared.publish_size(size);
        *self.lock_worker() = Some(worker);

        tracing::debug!(interval_ms = interval.as_millis() as u64, "liveterm started");
        Ok(())
    }

    /// Stop repainting and block until teardown completes.
    ///
    /// With `clear` the dynamic region is erased; otherwise it is painted a
    /// last time and left on screen. Any bypass bytes held back by a resize
    /// are flushed first. Returns [`LiveError::NotStarted`] when the engine
    /// is not running; a call that races another `stop` waits for that
    /// teardown to finish before returning it.
    pub fn stop(&self, clear: bool) -> Result<()> {
        {
            let mut state = self.shared.lock_state();
            while state.lifecycle == Lifecycle::Stopping {
                state = self.shared.wait_timeout(state, STOP_POLL);
            }
            if state.lifecycle != Lifecycle::Running {
                return Err(LiveError::NotStarted);
            }
            state.lifecycle = Lifecycle::Stopping;
            state.stop_clear = Some(clear);
        }
        self.shared.wake.notify_all();

        let Some(worker) = self.lock_worker().take() else {
            return Ok(());
        };
        match worker.join() {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("render worker panicked, releasing terminal");
                cancel_delayed_flush(&self.shared);
                self.shared.lock_state().abandon();
                self.shared.wake.notify_all();
                Err(io::Error::other("render worker panicked").into())
            }
        }
    }

    /// Paint now, outside the tick schedule. Resize debouncing still applies.
    pub fn force_update(&self) -> Result<()> {
        let mut state = self.shared.lock_state();
        if !state.is_running() {
            return Err(LiveError::NotStarted);
        }
        let result = state.tick(Instant::now());
        let size = state.size();
        drop(state);
        self.shared.publish_size(size);
        result.map(|_| ()).map_err(LiveError::from)
    }

    /// Last size observed by the engine: at construction, by the last tick,
    /// or by [`LiveTerm::force_size_update`]. [`TerminalSize::UNKNOWN`] when
    /// not attached to a terminal. Never blocks on the engine lock.
    pub fn last_known_size(&self) -> TerminalSize {
        self.shared.published_size()
    }

    /// Query the size now and publish it.
    ///
    /// Not needed while running, since every tick refreshes the size. When
    /// called while running it does not touch the tick's own comparison, so
    /// a change it reveals still opens a stabilization window.
    pub fn force_size_update(&self) -> TerminalSize {
        let state = self.shared.lock_state();
        let size = match state.run.as_ref() {
            Some(run) => run.query_size(),
            None => query_configured_size(&state.config),
        };
        self.shared.publish_size(size);
        size
    }

    pub fn bypass(&self) -> Bypass {
        Bypass::new(Arc::clone(&self.shared))
    }

    /// Replace the content producer. Allowed at any time; read at tick time.
    pub fn set_content_source(&self, source: ContentSource) {
        let mut state = self.shared.lock_state();
        state.content = source;
    }

    pub fn set_lines_fn<F>(&self, f: F)
    where
        F: FnMut() -> Vec<String> + Send + 'static,
    {
        self.set_content_source(ContentSource::lines(f));
    }

    pub fn set_line_fn<F>(&self, f: F)
    where
        F: FnMut() -> String + Send + 'static,
    {
        self.set_content_source(ContentSource::line(f));
    }

    pub fn set_raw_fn<F>(&self, f: F)
    where
        F: FnMut() -> Vec<u8> + Send + 'static,
    {
        self.set_content_source(ContentSource::raw(f));
    }

    pub fn set_refresh_interval(&self, interval: Duration) -> Result<()> {
        self.configure(|config| config.refresh_interval = interval)
    }

    pub fn set_stabilization_delay(&self, delay: Duration) -> Result<()> {
        self.configure(|config| config.stabilization_delay = delay)
    }

    pub fn set_output(&self, output: OutputTarget) -> Result<()> {
        self.configure(|config| config.output = output)
    }

    pub fn set_hide_cursor(&self, hide: bool) -> Result<()> {
        self.configure(|config| config.hide_cursor = hide)
    }

    pub fn set_size_policy(&self, policy: SizePolicy) -> Result<()> {
        self.configure(|config| config.size_policy = policy)
    }

    pub fn set_size_oracle(&self, oracle: Option<Arc<dyn SizeOracle>>) -> Result<()> {
        self.configure(|config| config.size_oracle = oracle)
    }

    pub fn set_console_buffer(&self, console: Option<Box<dyn ConsoleBuffer>>) -> Result<()> {
        self.configure(|config| config.console = console)
    }

    pub fn set_error_handler(&self, handler: Option<ErrorHandler>) -> Result<()> {
        if self.shared.lock_state().lifecycle != Lifecycle::Stopped {
            return Err(LiveError::AlreadyRunning);
        }
        let mut slot = match self.shared.on_error.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = handler;
        Ok(())
    }

    /// Configuration changes are rejected unless the engine is stopped.
    fn configure<F: FnOnce(&mut LiveConfig)>(&self, f: F) -> Result<()> {
        let mut state = self.shared.lock_state();
        if state.lifecycle != Lifecycle::Stopped {
            return Err(LiveError::AlreadyRunning);
        }
        f(&mut state.config);
        Ok(())
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<Result<()>>>> {
        match self.worker.lock() {
            Ok(worker) => worker,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for LiveTerm {
    fn drop(&mut self) {
        if self.lifecycle() != Lifecycle::Running {
            return;
        }

        // Best-effort cleanup: never panic in Drop (especially during unwind).
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = self.stop(false);
        }));
    }
}

fn run_worker(shared: Arc<Shared>, interval: Duration) -> Result<()> {
    let mut next_tick = Instant::now() + interval;

    let clear = 'ticks: loop {
        let mut state = shared.lock_state();
        let now = loop {
            if let Some(clear) = state.stop_clear {
                break 'ticks clear;
            }
            let now = Instant::now();
            if now >= next_tick {
                break now;
            }
            state = shared.wait_timeout(state, next_tick - now);
        };

        let result = state.tick(now);
        let size = state.size();
        drop(state);

        shared.publish_size(size);
        if let Err(err) = result {
            shared.report(err.into());
        }

        // Ticks missed while busy are dropped, not replayed.
        next_tick += interval;
        if next_tick <= now {
            next_tick = now + interval;
        }
    };

    teardown(&shared, clear)
}

/// Cancel an in-flight delayed bypass flush and wait for it to finish.
///
/// The helper flushes its held-back bytes when cancelled.
fn cancel_delayed_flush(shared: &Shared) {
    let helper = {
        let mut state = shared.lock_state();
        state
            .run
            .as_mut()
            .and_then(|run| run.pending.as_mut())
            .and_then(|pending| {
                pending.cancelled = true;
                pending.helper.take()
            })
    };
    if let Some(helper) = helper {
        shared.wake.notify_all();
        if helper.join().is_err() {
            tracing::warn!("delayed bypass flush panicked");
        }
    }
}

fn teardown(shared: &Shared, clear: bool) -> Result<()> {
    cancel_delayed_flush(shared);

    let mut state = shared.lock_state();
    let size = state.size();
    let result = state.finish(clear);
    drop(state);
    shared.publish_size(size);
    shared.wake.notify_all();

    tracing::debug!(clear, "liveterm stopped");
    result.map_err(LiveError::from)
}

#[cfg(test)]
mod tests {
    use super::{RunState, SinkOrigin, TickOutcome};
    use crate::core::terminal::{TerminalDriver, CLEAR_CURRENT_LINE, CLEAR_PREVIOUS_LINE};
    use crate::platform::size::{ManualSize, SizeOracle, TerminalSize};
    use crate::render::buffer::RenderBuffers;
    use crate::runtime::bypass::PendingBypass;
    use crate::runtime::content::ContentSource;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    #[derive(Clone, Default)]
    struct CaptureSink(Arc<Mutex<Vec<u8>>>);

    impl CaptureSink {
        fn take(&self) -> Vec<u8> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl Write for CaptureSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn erase(lines: usize) -> Vec<u8> {
        let mut out = CLEAR_CURRENT_LINE.to_vec();
        for _ in 0..lines {
            out.extend_from_slice(CLEAR_PREVIOUS_LINE);
        }
        out
    }

    fn concat(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run_state(sink: &CaptureSink, size: &ManualSize, delay: Duration) -> RunState {
        run_state_with(Box::new(sink.clone()), size, delay)
    }

    fn run_state_with(sink: Box<dyn Write + Send>, size: &ManualSize, delay: Duration) -> RunState {
        let initial = size.query();
        RunState {
            sink,
            sink_origin: SinkOrigin::Writer,
            driver: TerminalDriver::Ansi,
            buffers: RenderBuffers::new(),
            oracle: Some(Arc::new(size.clone()) as Arc<dyn SizeOracle>),
            track_size: initial.is_known(),
            size: initial,
            stabilization_delay: delay,
            wait_until: None,
            pending: None,
            hide_cursor: false,
        }
    }

    fn shared_text(text: &'static str) -> (Arc<Mutex<&'static str>>, ContentSource) {
        let value = Arc::new(Mutex::new(text));
        let reader = Arc::clone(&value);
        let source = ContentSource::raw(move || reader.lock().unwrap().as_bytes().to_vec());
        (value, source)
    }

    #[test]
    fn erase_before_paint_matches_previous_footprint() {
        let sink = CaptureSink::default();
        let size = ManualSize::new(TerminalSize::new(80, 24));
        let mut run = run_state(&sink, &size, Duration::from_millis(500));
        let (text, mut content) = shared_text("a\nb\n");
        let now = Instant::now();

        assert_eq!(run.tick(&mut content, now).unwrap(), TickOutcome::Painted);
        assert_eq!(sink.take(), concat(&[&erase(0), b"a\nb\n"]));

        *text.lock().unwrap() = "c\n";
        assert_eq!(run.tick(&mut content, now).unwrap(), TickOutcome::Painted);
        assert_eq!(sink.take(), concat(&[&erase(2), b"c\n"]));

        run.tick(&mut content, now).unwrap();
        assert_eq!(sink.take(), concat(&[&erase(1), b"c\n"]));
    }

    #[test]
    fn soft_wrapped_lines_are_erased() {
        let sink = CaptureSink::default();
        let size = ManualSize::new(TerminalSize::new(5, 24));
        let mut run = run_state(&sink, &size, Duration::from_millis(500));
        let (_text, mut content) = shared_text("abcdefgh\n");
        let now = Instant::now();

        run.tick(&mut content, now).unwrap();
        sink.take();
        run.tick(&mut content, now).unwrap();
        assert_eq!(sink.take(), concat(&[&erase(2), b"abcdefgh\n"]));
    }

    #[test]
    fn raw_content_without_newline_clears_only_current_line() {
        let sink = CaptureSink::default();
        let size = ManualSize::new(TerminalSize::new(80, 24));
        let mut run = run_state(&sink, &size, Duration::from_millis(500));
        let (_text, mut content) = shared_text("42");
        let now = Instant::now();

        run.tick(&mut content, now).unwrap();
        sink.take();
        run.tick(&mut content, now).unwrap();
        assert_eq!(sink.take(), concat(&[&erase(0), b"42"]));
    }

    #[test]
    fn no_content_source_paints_nothing() {
        let sink = CaptureSink::default();
        let size = ManualSize::new(TerminalSize::new(80, 24));
        let mut run = run_state(&sink, &size, Duration::from_millis(500));
        let mut content = ContentSource::None;

        assert_eq!(
            run.tick(&mut content, Instant::now()).unwrap(),
            TickOutcome::NoContent
        );
        assert!(sink.take().is_empty());
    }

    #[test]
    fn resize_opens_window_and_suppresses_paints_until_it_closes() {
        let sink = CaptureSink::default();
        let size = ManualSize::new(TerminalSize::new(80, 24));
        let mut run = run_state(&sink, &size, Duration::from_millis(500));
        let (_text, mut content) = shared_text("A\n");
        let t0 = Instant::now();

        run.tick(&mut content, t0).unwrap();
        sink.take();

        size.set(TerminalSize::new(60, 24));
        assert_eq!(run.tick(&mut content, t0).unwrap(), TickOutcome::ResizeDetected);
        assert_eq!(
            run.tick(&mut content, t0 + Duration::from_millis(499)).unwrap(),
            TickOutcome::Stabilizing
        );
        assert!(sink.take().is_empty());

        assert_eq!(
            run.tick(&mut content, t0 + Duration::from_millis(500)).unwrap(),
            TickOutcome::Painted
        );
        assert_eq!(sink.take(), concat(&[&erase(1), b"A\n"]));
    }

    #[test]
    fn second_resize_restarts_the_window() {
        let sink = CaptureSink::default();
        let size = ManualSize::new(TerminalSize::new(80, 24));
        let mut run = run_state(&sink, &size, Duration::from_millis(500));
        let (_text, mut content) = shared_text("A\n");
        let t0 = Instant::now();
        let at = |ms: u64| t0 + Duration::from_millis(ms);

        run.tick(&mut content, t0).unwrap();
        size.set(TerminalSize::new(70, 24));
        assert_eq!(run.tick(&mut content, at(0)).unwrap(), TickOutcome::ResizeDetected);
        size.set(TerminalSize::new(60, 24));
        assert_eq!(run.tick(&mut content, at(480)).unwrap(), TickOutcome::ResizeDetected);
        sink.take();

        assert_eq!(run.tick(&mut content, at(500)).unwrap(), TickOutcome::Stabilizing);
        assert_eq!(run.tick(&mut content, at(979)).unwrap(), TickOutcome::Stabilizing);
        assert!(sink.take().is_empty());
        assert_eq!(run.tick(&mut content, at(980)).unwrap(), TickOutcome::Painted);
    }

    #[test]
    fn unknown_size_never_debounces() {
        let sink = CaptureSink::default();
        let size = ManualSize::new(TerminalSize::UNKNOWN);
        let mut run = run_state(&sink, &size, Duration::from_millis(500));
        let (_text, mut content) = shared_text("A\n");
        let now = Instant::now();

        run.tick(&mut content, now).unwrap();
        size.set(TerminalSize::new(80, 24));
        assert_eq!(run.tick(&mut content, now).unwrap(), TickOutcome::Painted);
        assert!(!run.in_resize_window(now));
    }

    #[test]
    fn write_through_puts_permanent_bytes_above_dynamic_region() {
        let sink = CaptureSink::default();
        let size = ManualSize::new(TerminalSize::new(80, 24));
        let mut run = run_state(&sink, &size, Duration::from_millis(500));
        let (_text, mut content) = shared_text("A\n");

        run.tick(&mut content, Instant::now()).unwrap();
        sink.take();
        run.write_through(b"B\n").unwrap();
        assert_eq!(sink.take(), concat(&[&erase(1), b"B\n", b"A\n"]));
    }

    #[test]
    fn held_back_bytes_go_out_before_the_next_paint() {
        let sink = CaptureSink::default();
        let size = ManualSize::new(TerminalSize::new(80, 24));
        let mut run = run_state(&sink, &size, Duration::from_millis(500));
        let (_text, mut content) = shared_text("A\n");
        let t0 = Instant::now();

        run.tick(&mut content, t0).unwrap();
        size.set(TerminalSize::new(60, 24));
        run.tick(&mut content, t0).unwrap();
        run.pending = Some(PendingBypass::detached(b"B\n".to_vec()));
        sink.take();

        run.tick(&mut content, t0 + Duration::from_millis(500)).unwrap();
        assert_eq!(
            sink.take(),
            concat(&[&erase(1), b"B\n", b"A\n", &erase(1), b"A\n"])
        );
        assert!(run.pending.as_ref().unwrap().bytes.is_empty());
    }

    #[test]
    fn held_back_bytes_survive_a_failed_flush() {
        let size = ManualSize::new(TerminalSize::new(80, 24));
        let mut run = run_state_with(Box::new(ClosedSink), &size, Duration::from_millis(500));
        run.pending = Some(PendingBypass::detached(b"B\n".to_vec()));

        assert!(run.write_through(&[]).is_err());
        assert_eq!(run.pending.as_ref().unwrap().bytes, b"B\n");

        run.pending.as_mut().unwrap().bytes.extend_from_slice(b"C\n");
        assert!(run.write_through(b"D\n").is_err());
        assert_eq!(run.pending.as_ref().unwrap().bytes, b"B\nC\n");
    }
}
