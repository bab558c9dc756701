//! Brokerage quote-gateway provider.

pub mod fetcher;
#[cfg(feature = "broker")]
pub mod gateway;
pub mod provider;
pub mod session;

pub use fetcher::BrokerFetcher;
#[cfg(feature = "broker")]
pub use gateway::HttpGatewayConnector;
pub use provider::BrokerDataProvider;
pub use session::{KlinePage, KlineRequest, KlineRow, KlineType, QuoteConnector, QuoteSession, SessionGuard};
