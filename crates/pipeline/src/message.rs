//! Relayed message type

use bytes::Bytes;

/// One line read from a client connection, delimiter removed
///
/// Moves by value from the line reader through the relay queue to a
/// producer worker. The connection id is carried for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    connection_id: u64,
    payload: Bytes,
}

impl Message {
    #[inline]
    pub fn new(connection_id: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            connection_id,
            payload: payload.into(),
        }
    }

    /// Id of the connection this line arrived on
    #[inline]
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    #[inline]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
