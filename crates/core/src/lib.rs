pub mod config;
pub mod error;
pub mod event_bus;
pub mod types;
pub mod wizard;

pub use config::{AppConfig, CreativeConfig, GenerationServiceConfig, RegenerationPolicy};
pub use error::{CampaignError, CampaignResult};
pub use event_bus::EventSink;
pub use wizard::{CampaignGoal, WizardStep};
