pub mod token_bucket;
pub mod budget;

pub use budget::{BudgetStats, ConsumptionKind, ConsumptionRecord, EndpointWeights, RequestBudget};
pub use token_bucket::TokenBucket;
