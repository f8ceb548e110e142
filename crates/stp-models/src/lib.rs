pub mod bundle;
pub mod config;
pub mod message;
pub mod schema;
pub mod system_link;
pub mod trade;
pub mod workflow;

pub use bundle::{ParseResult, TradeBundle};
pub use config::{ParsersConfig, PipelineConfig, StoreConfig, StpConfig, TicketParserConfig};
pub use message::{InboundMessage, MessageId};
pub use system_link::{LinkId, LinkStatus, LinkTransitionError, SystemLinkDraft, TradeSystemLink};
pub use trade::{ProductType, Side, Trade, TradeId};
pub use workflow::{EventId, TradeWorkflowEvent, WorkflowEventDraft};
