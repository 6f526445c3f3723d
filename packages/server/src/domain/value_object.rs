//! Value objects.
//!
//! Every identifier and piece of user input crossing into the core is wrapped
//! here once, on ingress, so the rest of the crate never re-validates.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValueObjectError;

const USER_ID_MAX_LEN: usize = 128;
const MESSAGE_BODY_MAX_LEN: usize = 4000;
const CLIENT_MESSAGE_ID_MAX_LEN: usize = 64;

/// Separator between the two participant ids inside a [`RoomKey`].
///
/// Occurrences inside an id are percent-escaped, so distinct pairs never
/// share a key.
pub const ROOM_KEY_SEPARATOR: char = ':';

/// Opaque participant identifier, shared with the external patient/doctor store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.is_empty() {
            return Err(ValueObjectError::UserIdEmpty);
        }
        let len = value.chars().count();
        if len > USER_ID_MAX_LEN {
            return Err(ValueObjectError::UserIdTooLong {
                max: USER_ID_MAX_LEN,
                actual: len,
            });
        }
        if value.chars().any(char::is_whitespace) {
            return Err(ValueObjectError::UserIdInvalidCharacter);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of a conversation a connected user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = ValueObjectError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            other => Err(ValueObjectError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical conversation identifier derived from the two participant ids.
///
/// The ids are sorted before joining, so both participants resolve to the
/// same key regardless of who initiates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomKey(String);

impl RoomKey {
    pub fn for_pair(a: &UserId, b: &UserId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!(
            "{}{}{}",
            escape_key_part(first.as_str()),
            ROOM_KEY_SEPARATOR,
            escape_key_part(second.as_str())
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape_key_part(id: &str) -> std::borrow::Cow<'_, str> {
    if !id.contains(['%', ROOM_KEY_SEPARATOR]) {
        return std::borrow::Cow::Borrowed(id);
    }
    let mut escaped = String::with_capacity(id.len() + 4);
    for c in id.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ROOM_KEY_SEPARATOR => escaped.push_str("%3A"),
            c => escaped.push(c),
        }
    }
    std::borrow::Cow::Owned(escaped)
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Handle for one open socket. A user may hold several at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Client-generated idempotency token for `send`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientMessageId(String);

impl ClientMessageId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let len = value.chars().count();
        if len == 0 || len > CLIENT_MESSAGE_ID_MAX_LEN {
            return Err(ValueObjectError::InvalidClientMessageId {
                max: CLIENT_MESSAGE_ID_MAX_LEN,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientMessageId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClientMessageId> for String {
    fn from(value: ClientMessageId) -> Self {
        value.0
    }
}

/// Trimmed, non-empty message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageBody(String);

impl MessageBody {
    /// Returns `Ok(None)` for blank input: a body is optional when an
    /// attachment is present.
    pub fn parse(raw: &str) -> Result<Option<Self>, ValueObjectError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let len = trimmed.chars().count();
        if len > MESSAGE_BODY_MAX_LEN {
            return Err(ValueObjectError::MessageBodyTooLong {
                max: MESSAGE_BODY_MAX_LEN,
                actual: len,
            });
        }
        Ok(Some(Self(trimmed.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reference to a file uploaded through the object-storage signed-URL flow.
///
/// The core never stores file bytes, only the key and its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    storage_key: String,
    mime_type: String,
}

impl AttachmentRef {
    pub fn new(storage_key: String, mime_type: String) -> Result<Self, ValueObjectError> {
        if storage_key.is_empty()
            || storage_key.starts_with('/')
            || storage_key.split('/').any(|segment| segment == "..")
        {
            return Err(ValueObjectError::InvalidStorageKey(storage_key));
        }
        let mime_type = mime_type.trim().to_ascii_lowercase();
        match mime_type.split_once('/') {
            Some((kind, subtype))
                if !kind.is_empty() && !subtype.is_empty() && !subtype.contains('/') => {}
            _ => return Err(ValueObjectError::InvalidMimeType(mime_type)),
        }
        Ok(Self {
            storage_key,
            mime_type,
        })
    }

    /// Accept either a bare storage key or a full URL under `base_url`.
    pub fn from_client(
        key_or_url: &str,
        mime_type: String,
        base_url: &str,
    ) -> Result<Self, ValueObjectError> {
        let prefix = format!("{}/", base_url.trim_end_matches('/'));
        let key = key_or_url.strip_prefix(&prefix).unwrap_or(key_or_url);
        Self::new(key.to_string(), mime_type)
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Last path segment of the storage key.
    pub fn file_name(&self) -> &str {
        self.storage_key
            .rsplit('/')
            .next()
            .unwrap_or(self.storage_key.as_str())
    }

    /// Fetchable URL: the configured base followed by the key.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.storage_key)
    }
}

/// Unix timestamp in milliseconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Store-assigned insertion sequence; breaks ties between equal timestamps
/// and doubles as the pagination cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence(u64);

impl Sequence {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}
