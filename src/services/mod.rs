pub mod fx;
pub mod ledger;
pub mod scheduler;
pub mod simulator;
pub mod sqlite_store;

pub use fx::FxRates;
pub use ledger::{LedgerError, LedgerService};
pub use scheduler::MarketScheduler;
pub use simulator::MarketSimulator;
pub use sqlite_store::SqliteStore;
