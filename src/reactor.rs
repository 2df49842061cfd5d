/*!
 * Readiness Reactor
 *
 * A thin wrapper over the poller that adds the engine's periodic clock.
 * One iteration is a single wait (its timeout clamped so the next tick is
 * never overslept) followed by the caller draining ready events and asking
 * whether the tick interval has elapsed. A signal interrupting the wait is
 * reported as zero ready events, not an error.
 */

use std::io;
use std::time::{Duration, Instant};

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};

/// Readiness snapshot for one token, decoupled from the poller's own event
/// storage so the caller can mutate the reactor while walking the batch.
#[derive(Clone, Copy)]
pub struct Ready {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
}

pub struct Reactor {
    poll: Poll,
    events: Events,
    tick_interval: Duration,
    last_tick: Instant,
}

impl Reactor {
    pub fn new(tick_interval: Duration, max_events: usize) -> io::Result<Self> {
        Ok(Reactor {
            poll: Poll::new()?,
            events: Events::with_capacity(max_events),
            tick_interval,
            last_tick: Instant::now(),
        })
    }

    pub fn register(&self, source: &mut impl Source, token: Token, interest: Interest) -> io::Result<()> {
        self.poll.registry().register(source, token, interest)
    }

    pub fn reregister(&self, source: &mut impl Source, token: Token, interest: Interest) -> io::Result<()> {
        self.poll.registry().reregister(source, token, interest)
    }

    pub fn deregister(&self, source: &mut impl Source) -> io::Result<()> {
        self.poll.registry().deregister(source)
    }

    /// Wait for readiness, filling `ready` with this iteration's batch.
    ///
    /// The wait never sleeps past the next tick deadline. EINTR leaves
    /// `ready` empty and returns Ok; the caller just loops around (and the
    /// shutdown flag the signal set gets its look).
    pub fn wait(&mut self, ready: &mut Vec<Ready>) -> io::Result<()> {
        ready.clear();

        let timeout = self.tick_interval.saturating_sub(self.last_tick.elapsed());
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        for ev in self.events.iter() {
            ready.push(Ready {
                token: ev.token(),
                // A hung-up peer may still have data queued; treat HUP as
                // readable and let the read driver find the EOF.
                readable: ev.is_readable() || ev.is_read_closed(),
                writable: ev.is_writable(),
                error: ev.is_error(),
            });
        }
        Ok(())
    }

    /// True at most once per interval: reports whether the periodic work
    /// is due and, if so, restarts the clock.
    pub fn tick_due(&mut self) -> bool {
        if self.last_tick.elapsed() >= self.tick_interval {
            self.last_tick = Instant::now();
            true
        } else {
            false
        }
    }
}
