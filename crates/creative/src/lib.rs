//! Creative asset generation: product-image intake, goal-driven generation
//! requests, a sequenced job orchestrator, and the result gallery.

pub mod client;
pub mod error;
pub mod gallery;
pub mod intake;
pub mod orchestrator;
pub mod registry;
pub mod request_builder;
pub mod session;
pub mod types;

pub use client::{DryRunClient, HttpGenerationClient, ImageGenerationClient};
pub use error::{ClientError, CreativeError, CreativeResult};
pub use gallery::ResultGallery;
pub use orchestrator::GenerationOrchestrator;
pub use registry::SessionRegistry;
pub use request_builder::build_request;
pub use session::{CreativeSession, SessionSettings};
pub use types::{
    GeneratedVariant, GenerationParams, GenerationRequest, ImageSource, Intake, IntakeOrigin,
    JobSnapshot, JobStatus, SubmitOutcome, VariantId,
};
