//! Defines the messages exchanged between cache peers.
//!
//! A peer lookup is logically a pair of messages: a [FetchRequest] naming the group and the key
//! to resolve, answered by a [FetchResponse] carrying the raw value bytes. On the wire the
//! request is bound to the path of an HTTP GET (`/{group}/{key}`, both segments percent
//! escaped), the response travels as a small binary frame in the body: a four byte big endian
//! length followed by exactly that many value bytes.
//!
//! The frame exists so that a truncated or otherwise mangled response can be told apart from a
//! legitimately short value - a mismatch between the announced and the actual length is
//! reported as a decode error.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters which have to be escaped within a path segment.
///
/// Next to controls and characters which are invalid in URLs anyway, this most notably
/// contains '/' so that a key containing a slash cannot break out of its path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'%')
    .add(b'/')
    .add(b'\\');

/// Asks a peer to resolve the given key within the given group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    /// Contains the name of the cache group to consult.
    pub group: String,

    /// Contains the key to resolve.
    pub key: String,
}

impl FetchRequest {
    /// Creates a request for the given group and key.
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        FetchRequest {
            group: group.into(),
            key: key.into(),
        }
    }

    /// Renders the request as an URI path with properly escaped segments.
    ///
    /// # Examples
    /// ```
    /// # use peercache::protocol::FetchRequest;
    /// let request = FetchRequest::new("thumbnails", "images/42 large");
    /// assert_eq!(request.uri_path(), "/thumbnails/images%2F42%20large");
    /// ```
    pub fn uri_path(&self) -> String {
        format!(
            "/{}/{}",
            utf8_percent_encode(&self.group, PATH_SEGMENT),
            utf8_percent_encode(&self.key, PATH_SEGMENT)
        )
    }
}

/// Carries the value bytes a peer resolved for a [FetchRequest].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    /// Contains the raw bytes of the resolved value.
    pub value: Vec<u8>,
}

impl FetchResponse {
    /// Encodes the response into its wire representation.
    ///
    /// # Errors
    /// Fails if the value does not fit the four byte length prefix (i.e. it exceeds
    /// `u32::MAX` bytes). Truncating the length silently would yield a frame the receiver
    /// rejects as mismatched.
    pub fn encode(&self) -> anyhow::Result<Bytes> {
        let length = u32::try_from(self.value.len()).map_err(|_| {
            anyhow::anyhow!(
                "The value is too large for a peer response frame: {} bytes were given, \
                 at most {} are supported.",
                self.value.len(),
                u32::MAX
            )
        })?;

        let mut buffer = BytesMut::with_capacity(4 + self.value.len());
        buffer.put_u32(length);
        buffer.put_slice(&self.value);
        Ok(buffer.freeze())
    }

    /// Decodes a response from its wire representation.
    ///
    /// # Errors
    /// Fails if the frame is too short to carry a length prefix or if the announced length
    /// does not match the number of bytes actually present.
    pub fn decode(mut data: &[u8]) -> anyhow::Result<Self> {
        if data.remaining() < 4 {
            return Err(anyhow::anyhow!(
                "Malformed peer response: received {} byte(s), which is too short for a frame header.",
                data.remaining()
            ));
        }

        let announced_length = data.get_u32() as usize;
        if data.remaining() != announced_length {
            return Err(anyhow::anyhow!(
                "Malformed peer response: the header announced {} byte(s) but {} were present.",
                announced_length,
                data.remaining()
            ));
        }

        Ok(FetchResponse {
            value: data.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchRequest, FetchResponse};

    #[test]
    fn requests_render_escaped_paths() {
        let request = FetchRequest::new("my cache", "a/b#c");
        assert_eq!(request.uri_path(), "/my%20cache/a%2Fb%23c");

        // Harmless segments pass through unchanged...
        let request = FetchRequest::new("thumbnails", "image-42");
        assert_eq!(request.uri_path(), "/thumbnails/image-42");
    }

    #[test]
    fn responses_survive_a_wire_roundtrip() {
        let response = FetchResponse {
            value: b"Hello World".to_vec(),
        };

        let encoded = response.encode().unwrap();
        assert_eq!(encoded.len(), 4 + 11);

        let decoded = FetchResponse::decode(&encoded).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn empty_values_are_legal() {
        let response = FetchResponse { value: Vec::new() };

        let encoded = response.encode().unwrap();
        assert_eq!(encoded.len(), 4);
        assert_eq!(FetchResponse::decode(&encoded).unwrap(), response);
    }

    #[test]
    fn truncated_frames_are_rejected() {
        // Too short for a header...
        assert_eq!(FetchResponse::decode(&[0, 0]).is_err(), true);

        // A header announcing more bytes than present...
        let mut encoded = FetchResponse {
            value: b"Hello".to_vec(),
        }
        .encode()
        .unwrap()
        .to_vec();
        let _ = encoded.pop();
        assert_eq!(FetchResponse::decode(&encoded).is_err(), true);
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let mut encoded = FetchResponse {
            value: b"Hello".to_vec(),
        }
        .encode()
        .unwrap()
        .to_vec();
        encoded.push(42);
        assert_eq!(FetchResponse::decode(&encoded).is_err(), true);
    }
}
