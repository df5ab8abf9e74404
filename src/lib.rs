// Shared run-controller logic for the CLI and the GUI
pub mod args;
pub mod assembler;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod frames;
pub mod launcher;
pub mod poller;
pub mod settings;
pub mod state;

pub use args::{build_args, BuiltArgs, ValidationWarning};
pub use assembler::{assemble_animation, AssemblyReport};
pub use config::{GeneratorPaths, InputEnablement, ModelId, RunConfig, RunFlag};
pub use controller::{RunController, RunUpdate, StartOutcome};
pub use error::PanelError;
pub use settings::Settings;
pub use state::{RunPhase, RunSnapshot};
