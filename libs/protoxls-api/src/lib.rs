pub mod error;
pub mod format;
pub mod schema;
pub mod store;
pub mod util;
pub mod value;

pub use error::{RenderError, StoreError};
pub use format::{LeafShape, OutputFormat, RenderOptions, Renderer};
pub use schema::{EnumMember, EnumSchema, FieldKind, FieldSchema, MessageSchema, TableSchema};
pub use store::{Store, StoreKey};
pub use value::{EnumValue, MessageBuilder, MessageValue, Record, Value};
