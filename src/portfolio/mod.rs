pub mod aggregator;
pub mod client;
pub mod throttle;

pub use aggregator::{run_pnl_scheduler, AggregatorConfig, PnlAggregator};
pub use client::{PortfolioService, TrackerPnlClient, WalletPnlFetch};
pub use throttle::Throttle;
