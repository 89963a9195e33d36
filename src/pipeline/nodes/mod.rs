//! Built-in node implementations.
//!
//! Each node pairs a serde config (the `config` object of its graph entry)
//! with a struct implementing [`NodePlugin`](crate::pipeline::node::NodePlugin).

pub mod application;
pub mod broadband_source;
pub mod disk_writer;
pub mod optical_stimulation;
pub mod spectral_filter;
pub mod spike_binner;
pub mod spike_detector;
pub mod spike_source;
pub mod stream_in;
pub mod stream_out;

pub use application::{ApplicationConfig, ApplicationNode};
pub use broadband_source::{BroadbandSourceConfig, BroadbandSourceNode};
pub use disk_writer::{DiskWriterConfig, DiskWriterNode};
pub use optical_stimulation::{OpticalStimulationConfig, OpticalStimulationNode};
pub use spectral_filter::{FilterMethod, SpectralFilterConfig, SpectralFilterNode};
pub use spike_binner::{SpikeBinnerConfig, SpikeBinnerNode};
pub use spike_detector::{DetectorMode, SpikeDetectorConfig, SpikeDetectorNode};
pub use spike_source::{SpikePattern, SpikeSourceConfig, SpikeSourceNode};
pub use stream_in::{StreamInConfig, StreamInNode};
pub use stream_out::{StreamOutConfig, StreamOutNode};
