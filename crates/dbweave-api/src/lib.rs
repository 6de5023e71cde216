// dbweave-api: async client for the dbweave server (GraphQL over HTTP + event socket)

pub mod error;
pub mod events;
pub mod graphql;
pub mod latch;
pub mod transport;

pub use error::Error;
pub use events::{
    ClientMessage, EventSocket, EventSocketConfig, ServerEvent, ServerEventId, ServerEventTopic,
    SocketGates, SocketState,
};
pub use graphql::GraphQlClient;
pub use latch::SessionExpiredLatch;
pub use transport::{TlsMode, TransportConfig};
