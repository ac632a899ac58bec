//! # Output Sinks
//!
//! [`AudioSink`](bridge_traits::AudioSink) implementations shipped with the
//! engine. Hosts with their own audio stack implement the trait directly.

#[cfg(feature = "desktop-output")]
mod desktop;

#[cfg(feature = "desktop-output")]
pub use desktop::CpalSink;
