//! Room history queries and unread resolution.
//!
//! A [`MessageQuery`] is an immutable builder over `{channel_type}.history`.
//! Each combinator returns a new query, so one base query can be narrowed
//! several ways.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::rocket::client::Session;
use crate::rocket::models::{ChannelType, History, Message, Room, format_timestamp};
use crate::rocket::routes;
use crate::{ChannelCache, CoreError};

/// Order of returned messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    Asc,
    /// Newest first.
    Desc,
}

/// History query on one room.
#[derive(Debug, Clone)]
pub struct MessageQuery {
    room_id: String,
    room_name: Option<String>,
    channel_type: ChannelType,
    params: BTreeMap<&'static str, String>,
    order: SortOrder,
}

impl MessageQuery {
    /// Query the history of `room`.
    #[must_use]
    pub fn new(room: &Room) -> Self {
        Self::for_room(&room.id, room.name.as_deref(), room.channel_type())
    }

    /// Query the history of a room known by ID.
    #[must_use]
    pub fn for_room(room_id: &str, room_name: Option<&str>, channel_type: ChannelType) -> Self {
        Self {
            room_id: room_id.to_string(),
            room_name: room_name.map(str::to_string),
            channel_type,
            params: BTreeMap::new(),
            order: SortOrder::default(),
        }
    }

    /// Limit the number of messages.
    #[must_use]
    pub fn count(mut self, count: u64) -> Self {
        self.params.insert("count", count.to_string());
        self
    }

    /// Restrict to `[oldest, latest)`. `None` removes a bound.
    #[must_use]
    pub fn between(mut self, oldest: Option<DateTime<Utc>>, latest: Option<DateTime<Utc>>) -> Self {
        for (name, bound) in [("oldest", oldest), ("latest", latest)] {
            match bound {
                Some(dt) => {
                    self.params.insert(name, format_timestamp(&dt));
                }
                None => {
                    self.params.remove(name);
                }
            }
        }
        self
    }

    /// Ask the server to report `unreadNotLoaded`.
    #[must_use]
    pub fn include_unread_count(mut self) -> Self {
        self.params.insert("unreads", "true".to_string());
        self
    }

    /// Include messages exactly on the bounds.
    #[must_use]
    pub fn inclusive(mut self) -> Self {
        self.params.insert("inclusive", "true".to_string());
        self
    }

    /// Return messages oldest first.
    #[must_use]
    pub const fn asc(mut self) -> Self {
        self.order = SortOrder::Asc;
        self
    }

    /// Return messages newest first.
    #[must_use]
    pub const fn desc(mut self) -> Self {
        self.order = SortOrder::Desc;
        self
    }

    /// Query parameters that will be sent, besides `roomId`.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<&'static str, String> {
        &self.params
    }

    /// Kind of room being queried.
    #[must_use]
    pub const fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    /// Channel cache key of the queried room.
    #[must_use]
    pub fn cache_key(&self) -> String {
        ChannelCache::key(&self.room_id, self.room_name.as_deref())
    }

    /// Sort `messages` in this query's order.
    pub fn sort(&self, messages: &mut [Message]) {
        messages.sort_by_key(|m| m.ts);
        if self.order == SortOrder::Desc {
            messages.reverse();
        }
    }

    /// Fetch one page of history as the server returns it.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors or a malformed history body.
    pub async fn fetch_history(&self, session: &Session) -> Result<History, CoreError> {
        let request = routes::ROOMS_HISTORY
            .request()
            .channel_type(self.channel_type)
            .param("roomId", self.room_id.as_str())
            .params(self.params.iter().map(|(k, v)| (*k, v.as_str())));
        let body = session.dispatch(request).await?;
        History::from_value(body, self.channel_type)
    }

    /// Fetch messages in server order (newest first).
    ///
    /// # Errors
    ///
    /// Same as [`MessageQuery::fetch_history`].
    pub async fn fetch(&self, session: &Session) -> Result<Vec<Message>, CoreError> {
        Ok(self.fetch_history(session).await?.messages)
    }

    /// Fetch messages sorted in this query's order.
    ///
    /// # Errors
    ///
    /// Same as [`MessageQuery::fetch_history`].
    pub async fn recent(&self, session: &Session) -> Result<Vec<Message>, CoreError> {
        let mut messages = self.fetch(session).await?;
        self.sort(&mut messages);
        Ok(messages)
    }

    /// The newest message within this query's bounds.
    ///
    /// # Errors
    ///
    /// Same as [`MessageQuery::fetch_history`].
    pub async fn last(&self, session: &Session) -> Result<Option<Message>, CoreError> {
        let messages = self.clone().count(1).fetch(session).await?;
        Ok(messages.into_iter().max_by_key(|m| m.ts))
    }

    /// Messages that arrived since the room was last checked.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors or a channel cache write error.
    pub async fn unread(
        &self,
        session: &Session,
        cache: &ChannelCache,
        default_watermark: DateTime<Utc>,
    ) -> Result<Vec<Message>, CoreError> {
        self.unread_at(session, cache, default_watermark, Utc::now())
            .await
    }

    /// [`MessageQuery::unread`] with an explicit clock.
    ///
    /// Probes for one message since the watermark with the unread count
    /// requested. When the server reports more unread messages than it
    /// returned, fetches exactly that many older ones, bounded above by
    /// the probe message. The watermark moves to the newest message's
    /// update time; an empty probe leaves it untouched.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors or a channel cache write error.
    pub async fn unread_at(
        &self,
        session: &Session,
        cache: &ChannelCache,
        default_watermark: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Message>, CoreError> {
        let key = self.cache_key();
        let mut state = cache.load(&key);
        let watermark = state.last_message_dt.unwrap_or(default_watermark);

        let probe = self
            .clone()
            .count(1)
            .between(Some(watermark), Some(now))
            .include_unread_count()
            .fetch_history(session)
            .await?;

        let Some(probe_ts) = probe.messages.iter().map(|m| m.ts).max() else {
            log::debug!("{key}: nothing new since {}", format_timestamp(&watermark));
            return Ok(Vec::new());
        };

        let mut messages = probe.messages;
        if probe.unread_not_loaded > 0 {
            log::debug!("{key}: fetching {} more unread", probe.unread_not_loaded);
            let rest = self
                .clone()
                .count(probe.unread_not_loaded)
                .between(Some(watermark), Some(probe_ts))
                .fetch(session)
                .await?;
            let mut seen: HashSet<String> = messages.iter().map(|m| m.id.clone()).collect();
            messages.extend(rest.into_iter().filter(|m| seen.insert(m.id.clone())));
        }

        if let Some(newest) = messages.iter().max_by_key(|m| m.ts) {
            state.last_message_dt = Some(newest.updated_or_sent());
            cache.store(&key, &state)?;
        }

        self.sort(&mut messages);
        Ok(messages)
    }

    /// Delete the messages within this query's bounds (channels only).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] when the room is not a public
    /// channel or either bound is unset, and dispatch errors.
    pub async fn clean_history(&self, session: &Session) -> Result<Value, CoreError> {
        if self.channel_type != ChannelType::Channels {
            return Err(CoreError::InvalidArgument(format!(
                "history can only be cleaned in channels, not {}",
                self.channel_type
            )));
        }
        let (Some(oldest), Some(latest)) = (self.params.get("oldest"), self.params.get("latest"))
        else {
            return Err(CoreError::InvalidArgument(
                "cleaning history needs both an oldest and a latest bound".to_string(),
            ));
        };
        let body = json!({
            "roomId": self.room_id,
            "oldest": oldest,
            "latest": latest,
            "inclusive": self.params.get("inclusive").is_some_and(|v| v == "true"),
        });
        session
            .dispatch(routes::CHANNELS_CLEAN_HISTORY.request().body(body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelState;
    use crate::rocket::testing::{MockTransport, ok, session_with, with_login};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn msg(id: &str, at: &str) -> Value {
        json!({"_id": id, "rid": "GENERAL", "msg": id, "ts": at, "_updatedAt": at, "u": {"_id": "u2", "username": "bob"}})
    }

    fn general() -> Room {
        serde_json::from_value(json!({"_id": "GENERAL", "name": "general", "t": "c"})).unwrap()
    }

    fn history_mock() -> Arc<MockTransport> {
        with_login(|req| {
            if req.query_value("unreads") == Some("true") {
                ok(json!({
                    "messages": [msg("m4", "2023-01-05T00:00:00.000Z")],
                    "unreadNotLoaded": 3,
                    "success": true
                }))
            } else {
                ok(json!({
                    "messages": [
                        msg("m3", "2023-01-04T00:00:00.000Z"),
                        msg("m1", "2023-01-02T00:00:00.000Z"),
                        msg("m2", "2023-01-03T00:00:00.000Z")
                    ],
                    "success": true
                }))
            }
        })
    }

    #[test]
    fn combinators_do_not_mutate_the_base() {
        let base = general().messages();
        let narrowed = base.clone().count(5).between(Some(ts(2023, 1, 1)), None).inclusive();
        assert!(base.params().is_empty());
        assert_eq!(narrowed.params().get("count").map(String::as_str), Some("5"));
        assert_eq!(
            narrowed.params().get("oldest").map(String::as_str),
            Some("2023-01-01T00:00:00.000Z")
        );
        assert!(narrowed.params().get("latest").is_none());
        let cleared = narrowed.between(None, None);
        assert!(cleared.params().get("oldest").is_none());
    }

    #[tokio::test]
    async fn unread_probes_then_fetches_the_rest() {
        let mock = history_mock();
        let session = session_with(&mock);
        let dir = tempfile::tempdir().unwrap();
        let cache = ChannelCache::new(dir.path());
        let query = general().messages();
        cache
            .store(
                &query.cache_key(),
                &ChannelState {
                    last_message_dt: Some(ts(2023, 1, 1)),
                    ..ChannelState::default()
                },
            )
            .unwrap();

        let unread = query
            .unread_at(&session, &cache, ts(2017, 1, 1), ts(2023, 1, 6))
            .await
            .unwrap();

        let ids: Vec<_> = unread.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "m3", "m4"]);

        let history = mock.matching("/api/v1/channels.history");
        assert_eq!(history.len(), 2);
        let probe = &history[0];
        assert_eq!(probe.query_value("count"), Some("1"));
        assert_eq!(probe.query_value("roomId"), Some("GENERAL"));
        assert_eq!(probe.query_value("oldest"), Some("2023-01-01T00:00:00.000Z"));
        assert_eq!(probe.query_value("latest"), Some("2023-01-06T00:00:00.000Z"));
        let bulk = &history[1];
        assert_eq!(bulk.query_value("count"), Some("3"));
        assert_eq!(bulk.query_value("oldest"), Some("2023-01-01T00:00:00.000Z"));
        assert_eq!(bulk.query_value("latest"), Some("2023-01-05T00:00:00.000Z"));
        assert_eq!(bulk.query_value("unreads"), None);

        assert_eq!(
            cache.load(&query.cache_key()).last_message_dt,
            Some(ts(2023, 1, 5))
        );
    }

    #[tokio::test]
    async fn empty_probe_leaves_watermark() {
        let mock = with_login(|_| ok(json!({"messages": [], "unreadNotLoaded": 0, "success": true})));
        let session = session_with(&mock);
        let dir = tempfile::tempdir().unwrap();
        let cache = ChannelCache::new(dir.path());
        let query = general().messages();

        let unread = query
            .unread_at(&session, &cache, ts(2017, 1, 1), ts(2023, 1, 6))
            .await
            .unwrap();
        assert!(unread.is_empty());
        assert_eq!(cache.load(&query.cache_key()), ChannelState::default());
        let probe = &mock.matching("/api/v1/channels.history")[0];
        assert_eq!(probe.query_value("oldest"), Some("2017-01-01T00:00:00.000Z"));
    }

    #[tokio::test]
    async fn zero_unread_not_loaded_returns_only_the_probe() {
        let mock = with_login(|_| {
            let mut edited = msg("m9", "2023-02-01T00:00:00.000Z");
            edited["_updatedAt"] = json!("2023-02-02T10:00:00.000Z");
            ok(json!({"messages": [edited], "unreadNotLoaded": 0, "success": true}))
        });
        let session = session_with(&mock);
        let dir = tempfile::tempdir().unwrap();
        let cache = ChannelCache::new(dir.path());
        let query = general().messages();

        let unread = query
            .unread_at(&session, &cache, ts(2017, 1, 1), ts(2023, 3, 1))
            .await
            .unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(mock.count("/api/v1/channels.history"), 1);
        assert_eq!(
            cache.load(&query.cache_key()).last_message_dt,
            Some(Utc.with_ymd_and_hms(2023, 2, 2, 10, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn recent_respects_order_and_room_type() {
        let mock = history_mock();
        let session = session_with(&mock);
        let room = Room::with_id("G1", ChannelType::Groups);

        let desc = room.messages().desc().recent(&session).await.unwrap();
        let ids: Vec<_> = desc.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m3", "m2", "m1"]);
        assert!(desc.iter().all(|m| m.channel_type == Some(ChannelType::Groups)));
        assert_eq!(mock.count("/api/v1/groups.history"), 1);

        let last = room.messages().last(&session).await.unwrap().unwrap();
        assert_eq!(last.id, "m3");
        let requests = mock.matching("/api/v1/groups.history");
        assert_eq!(requests[1].query_value("count"), Some("1"));
    }

    #[tokio::test]
    async fn clean_history_needs_bounds_and_a_channel() {
        let mock = with_login(|_| ok(json!({"success": true})));
        let session = session_with(&mock);

        let err = general().messages().clean_history(&session).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        let err = Room::with_id("D1", ChannelType::Im)
            .messages()
            .between(Some(ts(2023, 1, 1)), Some(ts(2023, 1, 2)))
            .clean_history(&session)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert!(mock.requests().is_empty());

        general()
            .messages()
            .between(Some(ts(2023, 1, 1)), Some(ts(2023, 1, 2)))
            .inclusive()
            .clean_history(&session)
            .await
            .unwrap();
        let sent = &mock.matching("/api/v1/channels.cleanHistory")[0];
        assert_eq!(
            sent.body,
            Some(json!({
                "roomId": "GENERAL",
                "oldest": "2023-01-01T00:00:00.000Z",
                "latest": "2023-01-02T00:00:00.000Z",
                "inclusive": true
            }))
        );
    }
}
