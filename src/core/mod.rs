pub mod codec;
pub mod error;
pub mod path;
pub mod reserved;
pub mod value;

pub use codec::{CodecRegistry, FieldMapCodec, ObjectCodec};
pub use error::{OdmError, Result};
pub use path::{ContainerKind, Path, PathStep, Segment};
pub use reserved::{META_ID_FIELD, RESERVED_FIELD_NAMES, is_reserved};
pub use value::{Object, Value};
