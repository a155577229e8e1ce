pub mod config;
pub mod device;
pub mod error;
pub mod manifest;
pub mod recorder;
pub mod sequence;
pub mod state;
pub mod stimulus;

pub use config::{MainTrialConfig, OutputConfig, SalientSlot, SessionConfig, StimulusConfig};
pub use device::{ScanCommand, ScanDevice, SerialScanner, SerialSettings, SimulatedScanner};
pub use error::{ExperimentError, Result};
pub use manifest::SessionManifest;
pub use recorder::{ResponseRecorder, SaveOutcome, SavePaths, SessionId};
pub use sequence::{SequencerEvent, TrialSequencer, TrialSet, generate_main_trials};
pub use state::{ActiveTrial, Session, SessionEvent, TrialImages};
pub use stimulus::StimulusGenerator;
