/*
[INPUT]:  WebSocket configuration and subscription descriptors
[OUTPUT]: Locally synchronized topic data (order books, orders, positions, trades)
[POS]:    WebSocket layer - real-time data streams
[UPDATE]: When adding new topic families or changing connection logic
*/

pub mod client;
pub mod message;
pub mod store;
pub mod topic;

pub use client::{BybitWebSocket, ConnectionState, ErrorCallback, StreamConfig, backoff_duration};
pub use message::{Action, Frame, StreamEvent, StreamProtocol};
pub use store::{DEFAULT_MAX_DATA_LENGTH, StoreSettings, TopicStore};
pub use topic::{PositionKeying, Subscription};
