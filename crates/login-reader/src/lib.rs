#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`LoginReaderError`)
//! - [`config`]: Reader configuration (`ReaderConfig`, builder)
//! - [`record`]: Fixed-width record codec (`UtmpEntry`, `decode_record`, `LoginEvent`)
//! - [`locator`]: Glob discovery and inode identity (`find_files`, `TrackedFile`)
//! - [`state`]: Persisted table codec (`PersistedState`, `file_records`, `login_sessions`)
//! - [`store`]: `StateStore` implementations (`FileStateStore`, `MemoryStateStore`)
//! - [`correlator`]: Per-terminal session state machine (`SessionCorrelator`)
//! - [`users`]: Username to uid lookup (`UserLookup`, `PasswdLookup`)
//! - [`reader`]: Incremental reader (`LoginReader`, `RecordSink`, `CycleOutput`, `ReadCycle`)
//! - [`pipeline`]: Polling driver (`LoginPipeline`, `LoginPipelineBuilder`, `Pipeline` impl)

pub mod config;
pub mod correlator;
pub mod error;
pub mod locator;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod state;
pub mod store;
pub mod users;

// --- Public API Re-exports ---

// Reader (main orchestrator)
pub use reader::{ChannelSink, CycleOutput, CycleSummary, LoginReader, ReadCycle, RecordSink};

// Pipeline
pub use pipeline::{LoginPipeline, LoginPipelineBuilder};

// Configuration
pub use config::{ReaderConfig, ReaderConfigBuilder};

// Error
pub use error::LoginReaderError;

// Codec
pub use record::{
    CodecError, DecodedRecord, LoginEvent, LoginEventKind, UTMP_RECORD_SIZE, UtmpEntry, UtmpKind,
    decode_record,
};

// Discovery and state
pub use correlator::SessionCorrelator;
pub use locator::{Discovery, TrackedFile, find_files};
pub use state::{FILE_RECORDS_KEY, LOGIN_SESSIONS_KEY, PersistedState};
pub use store::{FileStateStore, MemoryStateStore};
pub use users::{PasswdLookup, UserLookup};
