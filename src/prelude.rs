pub use crate::builder::CacheDictionaryBuilder;
pub use crate::clock::{Clock, Lifetime, ManualClock, SystemClock};
pub use crate::dict::CacheDictionary;
pub use crate::error::CacheError;
pub use crate::source::{Block, ColumnData, DictionarySource, MemorySource, RecordStream};
pub use crate::store::{AttributeDescriptor, AttributeKind, StringColumn, Value};

#[cfg(feature = "metrics")]
pub use crate::metrics::MetricsSnapshot;
