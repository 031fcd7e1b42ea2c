//! GPU resource wrappers.
//!
//! Resources own their backend handle: dropping the last reference destroys
//! the underlying GPU object. This replaces manual reference counting with
//! explicit, single ownership.

mod buffer;
mod stream_buffer;
mod texture;

pub use buffer::Buffer;
pub use stream_buffer::StreamBuffer;
pub use texture::Texture;
