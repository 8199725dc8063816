//! The non-blocking `poll(2)` loop that drives everything else (spec §4.I,
//! §5): stdin is parsed into JSON lines and handed to the reconciler,
//! Wayland events are dispatched, and a state report is flushed to stdout
//! whenever the tree is dirty or a pointer event forces one.
//!
//! Three fds are polled every iteration: stdin (always `POLLIN`), stdout
//! (`POLLOUT` only while the outgoing buffer is non-empty — back-pressure),
//! and the Wayland connection's fd (`POLLIN` always, `POLLOUT` too when the
//! last flush reported `WouldBlock`). Everything between two `poll` wakes
//! runs to completion before the next one, so no handler ever observes a
//! half-mutated tree (spec §5).

use std::io::{Read, Write};
use std::os::fd::{AsRawFd, RawFd};

use serde_json::Value;
use wayland_client::{Connection, EventQueue};

use crate::renderer::Renderer;

/// Flipped by the signal handlers installed in `main`; polled once per
/// iteration rather than acted on asynchronously (spec §4.I, §5
/// "Cancellation").
static SHUTDOWN: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(std::sync::atomic::Ordering::Relaxed)
}

extern "C" fn request_shutdown(_sig: libc::c_int) {
    SHUTDOWN.store(true, std::sync::atomic::Ordering::Relaxed);
}

/// Installs handlers for `SIGINT`/`SIGTERM`/`SIGPIPE` (spec §4.I). `SIGPIPE`
/// is caught rather than left at its default (process-killing) disposition
/// since a dead controller showing up as a stdout write error is handled
/// by the ordinary stdout-HUP exit path instead.
pub fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, request_shutdown as libc::sighandler_t);
        libc::signal(libc::SIGTERM, request_shutdown as libc::sighandler_t);
        libc::signal(libc::SIGPIPE, request_shutdown as libc::sighandler_t);
    }
}

fn set_nonblocking(fd: RawFd) {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
    }
}

/// Growable byte buffer that a reader drains lines out of as they arrive,
/// keeping any trailing partial line for the next read (spec §4.I "drain
/// stdin into a grow-as-needed buffer, split on `\n`").
#[derive(Default)]
struct LineReader {
    buf: Vec<u8>,
}

impl LineReader {
    fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pops and returns every complete (newline-terminated) line currently
    /// buffered, in arrival order, leaving a trailing partial line (if any)
    /// for the next `feed`.
    fn take_lines(&mut self) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else { break };
            let rest = self.buf.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buf, rest);
            line.pop(); // drop the '\n'
            lines.push(line);
        }
        lines
    }
}

/// Owns the stdin/stdout framing state across iterations: the
/// not-yet-complete input line and the not-yet-flushed output bytes.
struct Io {
    stdin: std::io::Stdin,
    stdout: std::io::Stdout,
    input: LineReader,
    outbuf: Vec<u8>,
}

impl Io {
    fn new() -> Self {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        set_nonblocking(stdin.as_raw_fd());
        set_nonblocking(stdout.as_raw_fd());
        Self { stdin, stdout, input: LineReader::default(), outbuf: Vec::new() }
    }

    /// Drains whatever is currently available on stdin. Returns `false` on
    /// EOF (clean shutdown per spec §4.I), `true` otherwise (including the
    /// ordinary "nothing to read right now" case).
    fn drain_stdin(&mut self, renderer: &mut Renderer) -> bool {
        let mut chunk = [0u8; 8192];
        loop {
            match self.stdin.read(&mut chunk) {
                Ok(0) => return false,
                Ok(n) => self.input.feed(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => return false,
            }
        }
        for line in self.input.take_lines() {
            apply_line(renderer, &line);
        }
        true
    }

    fn queue_report(&mut self, value: &Value) {
        if let Ok(mut line) = serde_json::to_vec(value) {
            line.push(b'\n');
            self.outbuf.extend_from_slice(&line);
        }
    }

    /// Best-effort flush; whatever doesn't fit stays queued for the next
    /// `POLLOUT` (spec §4.I back-pressure). Returns `false` on a stdout
    /// HUP/broken-pipe, signalling clean shutdown.
    fn flush_stdout(&mut self) -> bool {
        while !self.outbuf.is_empty() {
            match self.stdout.write(&self.outbuf) {
                Ok(0) => return false,
                Ok(n) => {
                    self.outbuf.drain(..n);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return false,
                Err(_) => return false,
            }
        }
        let _ = self.stdout.flush();
        true
    }
}

fn apply_line(renderer: &mut Renderer, line: &[u8]) {
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return;
    }
    match serde_json::from_slice::<Value>(line) {
        Ok(value) => renderer.reconcile(&value),
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed controller JSON line");
        }
    }
}

/// Runs until stdin EOF, stdout HUP, or a caught signal (spec §4.I, §5).
pub fn run(mut renderer: Renderer, mut queue: EventQueue<Renderer>, conn: Connection) {
    let mut io = Io::new();
    let wl_fd = conn.backend().poll_fd().as_raw_fd();

    // Flush the initial roundtrip's state (and anything queued while
    // binding globals) before the first poll.
    maybe_report(&mut renderer, &mut io);
    if !io.flush_stdout() {
        return;
    }

    loop {
        if shutdown_requested() {
            break;
        }

        // Wayland events already sitting in the queue must be drained
        // before (and instead of) a blocking read on the fd, or `poll`
        // will never see them arrive.
        if queue.dispatch_pending(&mut renderer).is_err() {
            break;
        }
        maybe_report(&mut renderer, &mut io);
        if !io.flush_stdout() {
            break;
        }

        let wants_wl_write = match conn.flush() {
            Ok(()) => false,
            Err(wayland_client::backend::WaylandError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => true,
            Err(_) => break,
        };

        let mut fds = [
            libc::pollfd { fd: io.stdin.as_raw_fd(), events: libc::POLLIN, revents: 0 },
            libc::pollfd {
                fd: io.stdout.as_raw_fd(),
                events: if io.outbuf.is_empty() { 0 } else { libc::POLLOUT },
                revents: 0,
            },
            libc::pollfd {
                fd: wl_fd,
                events: libc::POLLIN | if wants_wl_write { libc::POLLOUT } else { 0 },
                revents: 0,
            },
        ];

        let n = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue; // a caught signal interrupted poll; loop re-checks SHUTDOWN.
            }
            break;
        }

        if fds[0].revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
            if !io.drain_stdin(&mut renderer) {
                break;
            }
        }
        if fds[1].revents & (libc::POLLERR | libc::POLLHUP) != 0 {
            break;
        }
        if fds[2].revents & libc::POLLIN != 0 {
            match queue.prepare_read() {
                Some(guard) => match guard.read() {
                    Ok(_) | Err(wayland_client::backend::WaylandError::Io(_)) => {}
                    Err(_) => break,
                },
                None => {}
            }
            if queue.dispatch_pending(&mut renderer).is_err() {
                break;
            }
        }
        if fds[2].revents & (libc::POLLHUP | libc::POLLERR) != 0 {
            break;
        }

        maybe_report(&mut renderer, &mut io);
        if !io.flush_stdout() {
            break;
        }
    }

    // Spec §5: pending state is flushed once on exit, best-effort.
    let _ = io.flush_stdout();
}

/// Emits (queues) a state report if the tree is dirty or a pointer event
/// forced one, then clears the flags that triggered it (spec §4.J, §5
/// "every pointer event produces exactly one report"). Loops so that N
/// button/scroll events coalesced into one Wayland dispatch still produce N
/// separate reports (spec §8 invariant 6) instead of only the first.
fn maybe_report(renderer: &mut Renderer, io: &mut Io) {
    if !renderer.state_events || !(renderer.state_dirty || renderer.force_report) {
        return;
    }
    loop {
        let report = renderer.build_state_report();
        io.queue_report(&report);
        renderer.state_dirty = false;
        renderer.force_report = false;
        if !renderer.has_pending_pointer_events() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_reader_splits_complete_lines_and_keeps_partial_tail() {
        let mut r = LineReader::default();
        r.feed(b"{\"a\":1}\n{\"b\":2}\n{\"c\"");
        let lines = r.take_lines();
        assert_eq!(lines, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
        r.feed(b":3}\n");
        let lines = r.take_lines();
        assert_eq!(lines, vec![b"{\"c\":3}".to_vec()]);
    }

    #[test]
    fn line_reader_yields_nothing_for_buffer_with_no_newline() {
        let mut r = LineReader::default();
        r.feed(b"no newline yet");
        assert!(r.take_lines().is_empty());
    }
}
