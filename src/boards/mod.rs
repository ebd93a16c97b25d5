//! Board definitions: descriptors, the plugin contract and the registry

pub mod builtin;
pub mod descriptor;
pub mod plugin;
pub mod registry;
pub mod strategy;

pub use descriptor::{BoardDescriptor, BoardSummary, DeployMethod};
pub use plugin::{BoardPlugin, DeployOutcome, DescriptorBoard, FirmwareArtifact};
pub use registry::BoardRegistry;
pub use strategy::DeployStrategy;
