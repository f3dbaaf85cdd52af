pub mod budget;
pub mod ingestion;
pub mod stream;
pub mod loader;

pub use budget::{BudgetConfig, WeightRule};
pub use ingestion::{AnomalyConfig, HealthConfig, IngestionConfig, ProviderConfig, ProviderKind, RetryConfig};
pub use loader::{AppConfig, LoggingConfig};
pub use stream::StreamConfig;
