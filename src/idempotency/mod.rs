pub mod canonical;
pub mod gate;
pub mod middleware;
pub mod response;
pub mod storage;

pub use canonical::{canonicalize_body, request_hash};
pub use gate::{
    IdempotencyConfig, IdempotencyGate, IdempotencyMetrics, IdempotencySweepJob, MetricsSnapshot,
    IDEMPOTENCY_KEY_HEADER,
};
pub use middleware::{idempotent_create, IdempotentCreate};
pub use response::{CreatedAt, CreatedBody, CreatedResource, IdempotencyConflict, CONFLICT_MESSAGE};
pub use storage::{
    IdempotencyRecord, IdempotencyStore, MemoryIdempotencyStore, RedisIdempotencyStore,
};
