//! Bridges the keyboard interrupt handler ([`crate::interrupts`]) to an
//! async [`Stream`] of scancodes the shell's input loop can poll.

use conquer_once::spin::OnceCell;
use core::pin::Pin;
use core::task::{Context, Poll};
use crossbeam_queue::ArrayQueue;
use futures_util::Stream;
use futures_util::task::AtomicWaker;

static SCANCODE_QUEUE: OnceCell<ArrayQueue<u8>> = OnceCell::uninit();
static WAKER: AtomicWaker = AtomicWaker::new();

/// Called from the keyboard interrupt handler. Never allocates or blocks:
/// if the queue is full the scancode is dropped rather than risking
/// unbounded work inside an interrupt context.
pub(crate) fn add_scancode(scancode: u8) {
    if let Ok(queue) = SCANCODE_QUEUE.try_get() {
        if queue.push(scancode).is_err() {
            crate::vga::with_color(crate::vga::Color::LightRed, || {
                crate::vga::println!("WARNING: scancode queue full; dropping keystroke")
            });
        } else {
            WAKER.wake();
        }
    } else {
        crate::vga::with_color(crate::vga::Color::LightRed, || {
            crate::vga::println!("WARNING: scancode queue uninitialized")
        });
    }
}

pub struct ScancodeStream {
    _private: (),
}

impl ScancodeStream {
    /// Must only be constructed once; panics on a second call, the same
    /// discipline the controller's node cache relies on for its own
    /// boot-once invariants.
    pub fn new() -> Self {
        SCANCODE_QUEUE
            .try_init_once(|| ArrayQueue::new(100))
            .expect("ScancodeStream::new should only be called once");
        Self { _private: () }
    }
}

impl Default for ScancodeStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for ScancodeStream {
    type Item = u8;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<u8>> {
        let queue = SCANCODE_QUEUE.try_get().expect("scancode queue not initialized");

        if let Some(scancode) = queue.pop() {
            return Poll::Ready(Some(scancode));
        }

        WAKER.register(cx.waker());
        match queue.pop() {
            Some(scancode) => {
                WAKER.take();
                Poll::Ready(Some(scancode))
            }
            None => Poll::Pending,
        }
    }
}
