pub mod clock;
pub mod filesystem;
pub mod pane;
pub mod transcript;

pub use clock::{Clock, SystemClock};
pub use filesystem::{Filesystem, FsError};
pub use pane::{Keys, NamedKey, PaneController, PaneError, WindowInfo};
pub use transcript::{NullTranscriptReader, TranscriptError, TranscriptReader, TranscriptStats};
