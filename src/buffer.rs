/// A set of reusable buffers for PostgreSQL protocol communication
///
/// `Conn` uses a single `BufferSet` for all its operations.
#[derive(Debug, Default)]
pub struct BufferSet {
    /// Type byte of the message currently held in `read_buffer`
    pub type_byte: u8,

    /// Payload of the last backend message, without type byte and length.
    /// Bytes are valid until the next message is read.
    pub read_buffer: Vec<u8>,

    /// Outgoing frontend messages, complete with type byte and length.
    /// Bytes are valid during an operation.
    pub write_buffer: Vec<u8>,
}

impl BufferSet {
    /// Create a new empty buffer set
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the write buffer and return mutable access.
    #[inline]
    pub fn new_write_buffer(&mut self) -> &mut Vec<u8> {
        self.write_buffer.clear();
        &mut self.write_buffer
    }
}
