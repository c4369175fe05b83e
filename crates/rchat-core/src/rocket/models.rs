//! Data models for the Rocket.Chat REST API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CoreError;

/// Format a timestamp the way the server expects it in query strings.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde helpers for server timestamps.
///
/// The REST API emits ISO 8601 strings, but a few endpoints still return
/// epoch milliseconds or the EJSON `{"$date": millis}` wrapper.
pub(crate) mod timestamp {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(i64),
        Wrapped {
            #[serde(rename = "$date")]
            date: i64,
        },
    }

    fn convert<E: serde::de::Error>(raw: Raw) -> Result<DateTime<Utc>, E> {
        match raw {
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| E::custom(format!("invalid timestamp '{text}': {e}"))),
            Raw::Millis(ms) | Raw::Wrapped { date: ms } => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| E::custom(format!("timestamp out of range: {ms}"))),
        }
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        convert(Raw::deserialize(d)?)
    }

    pub mod option {
        use super::{DateTime, Deserialize, Deserializer, Raw, Serializer, Utc, convert};

        #[expect(clippy::ref_option, reason = "signature required by serde(with)")]
        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => super::serialize(dt, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<Raw>::deserialize(d)?.map(convert).transpose()
        }
    }
}

/// Authentication token returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Value for the `X-Auth-Token` header.
    #[serde(rename = "authToken")]
    pub auth_token: String,
    /// Value for the `X-User-Id` header.
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl Token {
    /// Create a token from its two header values.
    #[must_use]
    pub fn new(auth_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            user_id: user_id.into(),
        }
    }
}

/// Kind of room, as it appears in the URL of the room endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    /// Public channel.
    Channels,
    /// Private group.
    Groups,
    /// Direct message room.
    Im,
}

impl ChannelType {
    /// All room kinds.
    pub const ALL: [Self; 3] = [Self::Channels, Self::Groups, Self::Im];

    /// URL segment (`channels`, `groups`, `im`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::Groups => "groups",
            Self::Im => "im",
        }
    }

    /// Response key holding a single room of this kind.
    #[must_use]
    pub const fn entity_key(self) -> &'static str {
        match self {
            Self::Channels => "channel",
            Self::Groups => "group",
            Self::Im => "room",
        }
    }

    /// Response key holding a list of rooms of this kind.
    #[must_use]
    pub const fn list_key(self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::Groups => "groups",
            Self::Im => "ims",
        }
    }

    /// One-letter room flag (`c`, `p`, `d`).
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::Channels => "c",
            Self::Groups => "p",
            Self::Im => "d",
        }
    }

    /// Map the one-letter room flag (`t`) used inside room objects.
    #[must_use]
    pub fn from_room_flag(flag: &str) -> Option<Self> {
        match flag {
            "c" => Some(Self::Channels),
            "p" => Some(Self::Groups),
            "d" => Some(Self::Im),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channels" | "channel" | "c" => Ok(Self::Channels),
            "groups" | "group" | "p" => Ok(Self::Groups),
            "im" | "direct" | "d" => Ok(Self::Im),
            other => Err(CoreError::InvalidArgument(format!(
                "unknown channel type '{other}' (expected channels, groups or im)"
            ))),
        }
    }
}

/// Short user reference embedded in messages and rooms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUser {
    /// User ID.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Email address entry of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEmail {
    /// The address.
    pub address: String,
    /// Whether the address was verified.
    #[serde(default)]
    pub verified: bool,
}

/// A server user.
///
/// Two users are equal when their IDs are equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Presence status (online, away, busy, offline).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Connection-level status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_connection: Option<String>,
    /// Account type (`user`, `bot`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Whether the account is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// UTC offset in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<f64>,
    /// Email addresses (admin-visible).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<UserEmail>,
    /// Roles (admin-visible).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    /// Account creation time.
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last login time.
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    /// Preferred language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Fields not modelled above (services, settings, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// A user known only by username.
    #[must_use]
    pub fn with_username(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// A user known only by ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Whether this user wrote the given message.
    #[must_use]
    pub fn wrote(&self, message: &Message) -> bool {
        message.u.as_ref().is_some_and(|u| u.id == self.id)
    }

    /// Whether the given message mentions this user.
    #[must_use]
    pub fn is_mentioned_in(&self, message: &Message) -> bool {
        message
            .mentions
            .iter()
            .any(|m| (!m.id.is_empty() && m.id == self.id) || m.username == self.username)
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl From<&MessageUser> for User {
    fn from(u: &MessageUser) -> Self {
        Self {
            id: u.id.clone(),
            username: u.username.clone(),
            name: u.name.clone(),
            ..Self::default()
        }
    }
}

/// A channel, private group, or direct message room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Room ID.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Room name (absent for direct messages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// One-letter room flag: `c` channel, `p` group, `d` direct.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    /// Usernames of the members, when the server includes them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usernames: Vec<String>,
    /// Message count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msgs: Option<u64>,
    /// Creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u: Option<MessageUser>,
    /// Creation time.
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub ts: Option<DateTime<Utc>>,
    /// Read-only flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ro: Option<bool>,
    /// Last update time.
    #[serde(
        rename = "_updatedAt",
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    /// Time of the last message.
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub lm: Option<DateTime<Utc>>,
    /// Topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether new users join this room automatically.
    #[serde(default)]
    pub default: bool,
    /// Archived flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    /// Room kind known from the endpoint the room was fetched from.
    #[serde(skip)]
    pub kind: Option<ChannelType>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Room {
    /// A room known only by ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, kind: ChannelType) -> Self {
        Self {
            id: id.into(),
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Room kind, from the fetching endpoint or the `t` flag. Defaults to channels.
    #[must_use]
    pub fn channel_type(&self) -> ChannelType {
        self.kind
            .or_else(|| self.flag.as_deref().and_then(ChannelType::from_room_flag))
            .unwrap_or(ChannelType::Channels)
    }

    /// Name to show to people; direct rooms fall back to their members.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ if !self.usernames.is_empty() => self.usernames.join(", "),
            _ => self.id.clone(),
        }
    }

    /// Key of this room in the channel cache.
    #[must_use]
    pub fn cache_key(&self) -> String {
        crate::ChannelCache::key(&self.id, self.name.as_deref())
    }

    /// Start a message query on this room.
    #[must_use]
    pub fn messages(&self) -> super::MessageQuery {
        super::MessageQuery::new(self)
    }

    /// Request payload identifying this room, merged with `extra` fields.
    #[must_use]
    pub fn payload(&self, extra: Value) -> Value {
        let mut body = Map::new();
        body.insert("roomId".to_string(), Value::String(self.id.clone()));
        if let Value::Object(fields) = extra {
            body.extend(fields);
        }
        Value::Object(body)
    }
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Room ID.
    #[serde(default)]
    pub rid: String,
    /// Text.
    #[serde(default)]
    pub msg: String,
    /// Send time.
    #[serde(with = "timestamp")]
    pub ts: DateTime<Utc>,
    /// Author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u: Option<MessageUser>,
    /// Last update time.
    #[serde(
        rename = "_updatedAt",
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    /// Attachments, kept as raw JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    /// Mentioned users.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<MessageUser>,
    /// Mentioned channels, kept as raw JSON.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<Value>,
    /// Alias the message was posted under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Emoji avatar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// System message type (`uj`, `message_pinned`, ...). Absent for user text.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Whether the message was posted by a bot integration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<Value>,
    /// Pinned flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
    /// Edit time.
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    /// Unread messages the server did not include in this page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_not_loaded: Option<u64>,
    /// Kind of room the message was fetched from.
    #[serde(skip)]
    pub channel_type: Option<ChannelType>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Update time, falling back to the send time.
    #[must_use]
    pub fn updated_or_sent(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.ts)
    }

    /// Author's username, or an empty string.
    #[must_use]
    pub fn author(&self) -> &str {
        self.u.as_ref().map_or("", |u| u.username.as_str())
    }

    /// The room the message belongs to.
    #[must_use]
    pub fn room(&self) -> Room {
        Room::with_id(
            self.rid.clone(),
            self.channel_type.unwrap_or(ChannelType::Channels),
        )
    }
}

/// One page of room history.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// Messages in server order (newest first).
    pub messages: Vec<Message>,
    /// Unread messages not included in `messages`.
    pub unread_not_loaded: u64,
}

impl History {
    /// Parse a history response body.
    ///
    /// `unreadNotLoaded` is read from the top level, falling back to the
    /// first message.
    ///
    /// # Errors
    ///
    /// Returns an error if `messages` is missing or malformed.
    pub fn from_value(body: Value, channel_type: ChannelType) -> Result<Self, CoreError> {
        let top_level = body.get("unreadNotLoaded").and_then(Value::as_u64);
        let raw = body
            .get("messages")
            .cloned()
            .ok_or_else(|| CoreError::Serialization("history response has no messages".to_string()))?;
        let mut messages: Vec<Message> = serde_json::from_value(raw)
            .map_err(|e| CoreError::Serialization(format!("parsing messages: {e}")))?;
        for message in &mut messages {
            message.channel_type = Some(channel_type);
        }
        let unread_not_loaded = top_level
            .or_else(|| messages.first().and_then(|m| m.unread_not_loaded))
            .unwrap_or(0);
        Ok(Self {
            messages,
            unread_not_loaded,
        })
    }
}

/// Server build information from `/api/v1/info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Remaining fields (build, commit, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Presence of a user from `users.getPresence`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    /// Presence (online, away, busy, offline).
    #[serde(default)]
    pub presence: String,
    /// Connection status, only reported for the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_status: Option<String>,
}

/// A message to post with `chat.postMessage`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Target room ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Target channel (`#name`) or user (`@name`), used when `room_id` is unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Text.
    pub text: String,
    /// Alias to post under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Emoji avatar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    /// Avatar URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Attachments.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
}

impl OutgoingMessage {
    /// A plain text message to a room.
    #[must_use]
    pub fn to_room(room_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            room_id: Some(room_id.into()),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Post under an alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Use an emoji as avatar.
    #[must_use]
    pub fn emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    /// Use an avatar URL.
    #[must_use]
    pub fn avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Add an attachment.
    #[must_use]
    pub fn attachment(mut self, attachment: Value) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn token_uses_wire_names() {
        let token: Token = serde_json::from_value(json!({"authToken": "t", "userId": "u"})).unwrap();
        assert_eq!(token, Token::new("t", "u"));
        assert_eq!(
            serde_json::to_value(&token).unwrap(),
            json!({"authToken": "t", "userId": "u"})
        );
    }

    #[test]
    fn message_accepts_all_timestamp_shapes() {
        let iso: Message = serde_json::from_value(json!({
            "_id": "a", "rid": "GENERAL", "msg": "hi", "ts": "2016-12-14T20:56:05.117Z",
            "u": {"_id": "y65", "username": "graywolf336"}
        }))
        .unwrap();
        assert_eq!(iso.ts, Utc.timestamp_millis_opt(1_481_748_965_117).unwrap());
        assert_eq!(iso.author(), "graywolf336");

        let millis: Message = serde_json::from_value(json!({"_id": "b", "ts": 1_481_741_940_895_i64})).unwrap();
        let wrapped: Message =
            serde_json::from_value(json!({"_id": "c", "ts": {"$date": 1_481_741_940_895_i64}})).unwrap();
        assert_eq!(millis.ts, wrapped.ts);
    }

    #[test]
    fn message_keeps_unknown_fields() {
        let message: Message = serde_json::from_value(json!({
            "_id": "a", "ts": "2023-01-05T00:00:00Z", "reactions": {":+1:": {"usernames": ["bob"]}}
        }))
        .unwrap();
        assert!(message.extra.contains_key("reactions"));
        assert!(message.updated_at.is_none());
        assert_eq!(message.updated_or_sent(), message.ts);
    }

    #[test]
    fn channel_type_tables() {
        assert_eq!(ChannelType::Channels.entity_key(), "channel");
        assert_eq!(ChannelType::Groups.entity_key(), "group");
        assert_eq!(ChannelType::Im.list_key(), "ims");
        assert_eq!("groups".parse::<ChannelType>().unwrap(), ChannelType::Groups);
        assert!("rooms".parse::<ChannelType>().is_err());
        assert_eq!(ChannelType::from_room_flag("d"), Some(ChannelType::Im));
    }

    #[test]
    fn room_type_falls_back_to_flag() {
        let room: Room = serde_json::from_value(json!({"_id": "r", "t": "p", "name": "ops"})).unwrap();
        assert_eq!(room.channel_type(), ChannelType::Groups);
        assert_eq!(room.cache_key(), "r:ops");

        let dm: Room = serde_json::from_value(json!({"_id": "d1", "t": "d", "usernames": ["a", "b"]})).unwrap();
        assert_eq!(dm.display_name(), "a, b");
    }

    #[test]
    fn room_payload_merges_fields() {
        let room = Room::with_id("r1", ChannelType::Channels);
        assert_eq!(
            room.payload(json!({"userId": "u1"})),
            json!({"roomId": "r1", "userId": "u1"})
        );
        assert_eq!(room.payload(Value::Null), json!({"roomId": "r1"}));
    }

    #[test]
    fn history_reads_unread_count_from_either_place() {
        let top = History::from_value(
            json!({"messages": [{"_id": "a", "ts": "2023-01-05T00:00:00Z"}], "unreadNotLoaded": 3, "success": true}),
            ChannelType::Groups,
        )
        .unwrap();
        assert_eq!(top.unread_not_loaded, 3);
        assert_eq!(top.messages[0].channel_type, Some(ChannelType::Groups));

        let nested = History::from_value(
            json!({"messages": [{"_id": "a", "ts": "2023-01-05T00:00:00Z", "unreadNotLoaded": 2}]}),
            ChannelType::Channels,
        )
        .unwrap();
        assert_eq!(nested.unread_not_loaded, 2);

        assert!(History::from_value(json!({"success": true}), ChannelType::Im).is_err());
    }

    #[test]
    fn users_compare_by_id_and_mentions() {
        let me = User {
            id: "u1".to_string(),
            username: "eliza".to_string(),
            ..User::default()
        };
        let same = User::with_id("u1");
        assert_eq!(me, same);

        let message: Message = serde_json::from_value(json!({
            "_id": "m", "ts": "2023-01-05T00:00:00Z",
            "u": {"_id": "u2", "username": "bob"},
            "mentions": [{"_id": "u1", "username": "eliza"}]
        }))
        .unwrap();
        assert!(!me.wrote(&message));
        assert!(me.is_mentioned_in(&message));
    }

    #[test]
    fn outgoing_message_skips_unset_fields() {
        let body = serde_json::to_value(OutgoingMessage::to_room("r1", "hello").emoji(":smile:")).unwrap();
        assert_eq!(body, json!({"roomId": "r1", "text": "hello", "emoji": ":smile:"}));
    }
}
