//! Frame and pass state machine.
//!
//! ```text
//!            begin_pass / commit            begin_pass
//!   Idle ─────────────────────────► Recording ──────────► InPass { valid }
//!    ▲     (waits for a frame slot)     ▲  │                    │
//!    │                                  │  └──── end_pass ◄─────┘
//!    └────────────── commit ────────────┘
//! ```
//!
//! A pass is *invalid* when no render target or encoder could be obtained for
//! it. Binding, uniform and draw calls inside an invalid pass are ignored, so
//! callers keep a single code path for frames where the window is minimized.

use crate::resources::{BufferId, PipelineId};

/// Externally visible phase of the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramePhase {
    /// No frame is being recorded.
    Idle,
    /// A command buffer is open, no pass is.
    Recording,
    /// A pass is open.
    InPass { valid: bool },
}

/// Bindings recorded by the last draw state of the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Bindings {
    pub pipeline: Option<PipelineId>,
    pub index_buffer: Option<BufferId>,
    pub vertex_buffer_count: usize,
}

/// State of the frame being recorded.
///
/// `C` is the driver's command buffer and `E` its pass encoder.
#[derive(Debug)]
pub(crate) struct FrameState<C, E> {
    frame_index: u64,
    rotate_index: usize,
    frames_in_flight: usize,
    command_buffer: Option<C>,
    encoder: Option<E>,
    in_pass: bool,
    width: u32,
    height: u32,
    pub bindings: Bindings,
}

impl<C, E> FrameState<C, E> {
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");
        Self {
            frame_index: 1,
            rotate_index: 0,
            frames_in_flight,
            command_buffer: None,
            encoder: None,
            in_pass: false,
            width: 0,
            height: 0,
            bindings: Bindings::default(),
        }
    }

    pub fn phase(&self) -> FramePhase {
        if self.in_pass {
            FramePhase::InPass {
                valid: self.encoder.is_some(),
            }
        } else if self.command_buffer.is_some() {
            FramePhase::Recording
        } else {
            FramePhase::Idle
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn rotate_index(&self) -> usize {
        self.rotate_index
    }

    pub fn is_recording(&self) -> bool {
        self.command_buffer.is_some()
    }

    pub fn in_pass(&self) -> bool {
        self.in_pass
    }

    /// Framebuffer size of the current pass.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Start recording with a fresh command buffer.
    pub fn open(&mut self, command_buffer: C) {
        assert!(self.command_buffer.is_none(), "frame is already recording");
        self.command_buffer = Some(command_buffer);
    }

    pub fn command_buffer_mut(&mut self) -> &mut C {
        match self.command_buffer.as_mut() {
            Some(command_buffer) => command_buffer,
            None => panic!("no frame is recording"),
        }
    }

    /// Enter a pass. A missing encoder makes the pass invalid.
    pub fn begin_pass(&mut self, encoder: Option<E>, width: u32, height: u32) {
        assert!(!self.in_pass, "begin_pass called while a pass is open");
        assert!(self.command_buffer.is_some(), "begin_pass called outside a frame");
        self.in_pass = true;
        self.encoder = encoder;
        self.width = width;
        self.height = height;
        self.bindings = Bindings::default();
    }

    /// Encoder of the current pass, `None` if the pass is invalid.
    ///
    /// # Panics
    ///
    /// Panics if no pass is open.
    pub fn encoder_mut(&mut self, operation: &str) -> Option<&mut E> {
        assert!(self.in_pass, "{operation} called outside a pass");
        self.encoder.as_mut()
    }

    /// Leave the current pass, returning its encoder if it had one.
    pub fn end_pass(&mut self) -> Option<E> {
        assert!(self.in_pass, "end_pass called without an open pass");
        self.in_pass = false;
        self.bindings = Bindings::default();
        self.encoder.take()
    }

    /// Take the command buffer for submission.
    pub fn finish(&mut self) -> C {
        assert!(!self.in_pass, "commit called while a pass is open");
        match self.command_buffer.take() {
            Some(command_buffer) => command_buffer,
            None => panic!("commit called outside a frame"),
        }
    }

    /// Drop an unsubmitted frame. Returns `true` if one was recording.
    pub fn abandon(&mut self) -> bool {
        self.in_pass = false;
        self.encoder = None;
        self.bindings = Bindings::default();
        self.command_buffer.take().is_some()
    }

    /// Move to the next frame and rotation slot.
    pub fn advance(&mut self) {
        debug_assert!(self.command_buffer.is_none());
        self.rotate_index = (self.rotate_index + 1) % self.frames_in_flight;
        self.frame_index += 1;
    }
}
