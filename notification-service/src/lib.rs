//! Delivery of matched posts to the channels named in the configuration.

pub mod channels;
pub mod descriptor;
pub mod hub;

pub use channels::NotificationChannel;
pub use descriptor::ChannelDescriptor;
pub use hub::{DeliveryReport, NotificationHub};
