//! Loops, layers and the event machinery of the strata looper.
//!
//! # Primary API
//!
//! - [`Track`]: a set of loops sharing streams, a layer pool and an event queue
//! - [`Action`] / [`Function`]: what a performer invokes
//! - [`Loop`]: one loop's cursors, layer chain and mode machine
//! - [`TrackMonitor`]: lock-free state published once per interrupt
//! - [`SyncListener`]: timing notifications for an external synchronizer
//!
//! ```ignore
//! use strata_core::{EngineConfig, Preset};
//! use strata_loop::{Action, Function, Track};
//!
//! let mut track = Track::new(0, &EngineConfig::default(), Preset::default());
//! track.invoke(&Action::new(Function::Record));
//! track.process(&input, &mut output);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod event;
pub use event::{Event, EventId, EventManager, EventType, JumpInfo, JumpTarget};

mod function;
pub use function::{Action, Function};

pub mod layer;
pub use layer::{Layer, LayerId, LayerPool};

mod loops;
pub use loops::{track_copy_frame, Loop, LoopContext, ProjectLayer, SwitchOrigin, AUTO_FEEDBACK_LEVEL};

mod mode;
pub use mode::LoopMode;

mod state;
pub use state::{LoopState, LoopSummary, TrackMonitor};

pub mod stream;
pub use stream::{InputStream, OutputStream, PitchShifter, Rates, StreamState};

mod sync;
pub use sync::{NullSync, SyncListener};

mod track;
pub use track::{Track, TrackCopy};
