//! Room directory and room operations.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::CoreError;
use crate::rocket::client::Session;
use crate::rocket::models::{ChannelType, Message, Room, User};
use crate::rocket::routes::{self, RouteRequest};

/// Add or remove a room role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAction {
    /// Grant the role.
    Add,
    /// Revoke the role.
    Remove,
}

impl RoleAction {
    /// URL form (`add`, `remove`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

fn tagged(mut room: Room, kind: ChannelType) -> Room {
    room.kind = Some(kind);
    room
}

fn find_direct<'a>(rooms: &'a [Room], username: &str) -> Option<&'a Room> {
    rooms
        .iter()
        .find(|room| room.usernames.iter().any(|u| u == username))
}

impl Session {
    /// Rooms of one kind the caller belongs to, cached after the first call.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn rooms(&self, kind: ChannelType) -> Result<Arc<Vec<Room>>, CoreError> {
        let cached = self.rooms.lock().await.get(&kind).cloned();
        match cached {
            Some(rooms) => Ok(rooms),
            None => self.refresh_rooms(kind).await,
        }
    }

    /// Refetch and recache the rooms of one kind.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn refresh_rooms(&self, kind: ChannelType) -> Result<Arc<Vec<Room>>, CoreError> {
        let rooms: Vec<Room> = self
            .call(routes::ROOMS_LIST.request().channel_type(kind))
            .await?;
        let rooms = Arc::new(
            rooms
                .into_iter()
                .map(|room| tagged(room, kind))
                .collect::<Vec<_>>(),
        );
        log::debug!("cached {} {kind}", rooms.len());
        self.rooms.lock().await.insert(kind, Arc::clone(&rooms));
        Ok(rooms)
    }

    /// Public channels the caller has joined.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn joined_channels(&self) -> Result<Vec<Room>, CoreError> {
        let rooms: Vec<Room> = self.call(routes::CHANNELS_LIST_JOINED.request()).await?;
        Ok(rooms
            .into_iter()
            .map(|room| tagged(room, ChannelType::Channels))
            .collect())
    }

    /// Every direct room on the server (admin only).
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn all_direct_rooms(&self) -> Result<Vec<Room>, CoreError> {
        let rooms: Vec<Room> = self.call(routes::IM_LIST_EVERYONE.request()).await?;
        Ok(rooms
            .into_iter()
            .map(|room| tagged(room, ChannelType::Im))
            .collect())
    }

    /// Room details by ID.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors. Direct rooms have no info route.
    pub async fn room_info(&self, kind: ChannelType, room_id: &str) -> Result<Room, CoreError> {
        let request = routes::ROOMS_INFO
            .request()
            .channel_type(kind)
            .param("roomId", room_id);
        Ok(tagged(self.call(request).await?, kind))
    }

    /// Room details by name.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors. Direct rooms have no info route.
    pub async fn room_info_by_name(&self, kind: ChannelType, name: &str) -> Result<Room, CoreError> {
        let request = routes::ROOMS_INFO
            .request()
            .channel_type(kind)
            .param("roomName", name);
        Ok(tagged(self.call(request).await?, kind))
    }

    /// Find a channel or group by name. A leading `#` is ignored.
    ///
    /// Searches the cached channel then group lists, then asks the server.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when no room has that name.
    pub async fn find_room(&self, name: &str) -> Result<Room, CoreError> {
        let name = name.trim_start_matches('#');
        let named = [ChannelType::Channels, ChannelType::Groups];
        for kind in named {
            let rooms = self.rooms(kind).await?;
            if let Some(room) = rooms.iter().find(|r| r.name.as_deref() == Some(name)) {
                return Ok(room.clone());
            }
        }
        for kind in named {
            match self.room_info_by_name(kind, name).await {
                Ok(room) => return Ok(room),
                Err(CoreError::Server { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::NotFound(format!("room '{name}'")))
    }

    /// The direct room shared with `user`, created if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when the room still does not exist
    /// after asking the server to create it.
    pub async fn direct_room(&self, user: &User) -> Result<Room, CoreError> {
        let username = if user.username.is_empty() {
            self.user_info(user).await?.username
        } else {
            user.username.clone()
        };

        if let Some(room) = find_direct(&self.refresh_rooms(ChannelType::Im).await?, &username) {
            return Ok(room.clone());
        }

        if let Err(e) = self.create_direct_room(&username).await {
            log::debug!("creating direct room with {username}: {e}");
        }
        let rooms = self.refresh_rooms(ChannelType::Im).await?;
        find_direct(&rooms, &username)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("direct room with {username}")))
    }

    /// Create (or reopen) the direct room with `username`.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn create_direct_room(&self, username: &str) -> Result<Room, CoreError> {
        let request = routes::IM_CREATE
            .request()
            .body(json!({ "username": username }));
        Ok(tagged(self.call(request).await?, ChannelType::Im))
    }

    /// Messages in a direct room not written by the caller.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn direct_messages_from_others(&self, room_id: &str) -> Result<Vec<Message>, CoreError> {
        let request = routes::IM_MESSAGES_OTHERS.request().param("roomId", room_id);
        let mut messages: Vec<Message> = self.call(request).await?;
        for message in &mut messages {
            message.channel_type = Some(ChannelType::Im);
        }
        Ok(messages)
    }

    /// Create a channel or group.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors. Direct rooms are created with
    /// [`Session::create_direct_room`].
    pub async fn create_room(
        &self,
        kind: ChannelType,
        name: &str,
        members: &[String],
        read_only: bool,
    ) -> Result<Room, CoreError> {
        let request = routes::ROOMS_CREATE
            .request()
            .channel_type(kind)
            .body(json!({ "name": name, "members": members, "readOnly": read_only }));
        let room = tagged(self.call(request).await?, kind);
        self.rooms.lock().await.remove(&kind);
        Ok(room)
    }

    /// Members of a room.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn room_members(&self, room: &Room) -> Result<Vec<User>, CoreError> {
        let request = routes::ROOMS_MEMBERS
            .request()
            .channel_type(room.channel_type())
            .param("roomId", room.id.as_str());
        self.call(request).await
    }

    /// Show a room in the caller's room list.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn open_room(&self, room: &Room) -> Result<Value, CoreError> {
        self.room_action(room, &routes::ROOMS_OPEN, Value::Null).await
    }

    /// Hide a room from the caller's room list.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn close_room(&self, room: &Room) -> Result<Value, CoreError> {
        self.room_action(room, &routes::ROOMS_CLOSE, Value::Null).await
    }

    /// Leave a room.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn leave_room(&self, room: &Room) -> Result<Room, CoreError> {
        let room = self.room_update(room, &routes::ROOMS_LEAVE, Value::Null).await?;
        self.rooms.lock().await.remove(&room.channel_type());
        Ok(room)
    }

    /// Add every user on the server to a room.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn add_all(&self, room: &Room, active_users_only: bool) -> Result<Room, CoreError> {
        self.room_update(
            room,
            &routes::ROOMS_ADD_ALL,
            json!({ "activeUsersOnly": active_users_only }),
        )
        .await
    }

    /// Add a user to a room.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn invite(&self, room: &Room, user_id: &str) -> Result<Room, CoreError> {
        self.room_update(room, &routes::ROOMS_INVITE, json!({ "userId": user_id }))
            .await
    }

    /// Remove a user from a room.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn kick(&self, room: &Room, user_id: &str) -> Result<Room, CoreError> {
        self.room_update(room, &routes::ROOMS_KICK, json!({ "userId": user_id }))
            .await
    }

    /// Archive a room.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn archive(&self, room: &Room) -> Result<Value, CoreError> {
        self.room_action(room, &routes::ROOMS_ARCHIVE, Value::Null).await
    }

    /// Unarchive a room.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn unarchive(&self, room: &Room) -> Result<Value, CoreError> {
        self.room_action(room, &routes::ROOMS_UNARCHIVE, Value::Null).await
    }

    /// Rename a room.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn rename_room(&self, room: &Room, name: &str) -> Result<Room, CoreError> {
        self.room_update(room, &routes::ROOMS_RENAME, json!({ "name": name }))
            .await
    }

    /// Set a room's topic and return it.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn set_topic(&self, room: &Room, topic: &str) -> Result<String, CoreError> {
        self.room_text(room, &routes::ROOMS_SET_TOPIC, json!({ "topic": topic }))
            .await
    }

    /// Set a room's description and return it.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn set_description(&self, room: &Room, description: &str) -> Result<String, CoreError> {
        self.room_text(
            room,
            &routes::ROOMS_SET_DESCRIPTION,
            json!({ "description": description }),
        )
        .await
    }

    /// Set a room's purpose and return it.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn set_purpose(&self, room: &Room, purpose: &str) -> Result<String, CoreError> {
        self.room_text(room, &routes::ROOMS_SET_PURPOSE, json!({ "purpose": purpose }))
            .await
    }

    /// Toggle read-only mode.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn set_read_only(&self, room: &Room, read_only: bool) -> Result<Room, CoreError> {
        self.room_update(room, &routes::ROOMS_SET_READ_ONLY, json!({ "readOnly": read_only }))
            .await
    }

    /// Turn a channel into a group or back.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for [`ChannelType::Im`], and
    /// dispatch errors.
    pub async fn set_room_type(&self, room: &Room, kind: ChannelType) -> Result<Room, CoreError> {
        if kind == ChannelType::Im {
            return Err(CoreError::InvalidArgument(
                "a room cannot be turned into a direct room".to_string(),
            ));
        }
        let updated = self
            .room_update(room, &routes::ROOMS_SET_TYPE, json!({ "type": kind.flag() }))
            .await?;
        {
            let mut cache = self.rooms.lock().await;
            cache.remove(&ChannelType::Channels);
            cache.remove(&ChannelType::Groups);
        }
        Ok(tagged(updated, kind))
    }

    /// Grant or revoke moderator rights.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn set_moderator(
        &self,
        room: &Room,
        user_id: &str,
        action: RoleAction,
    ) -> Result<Value, CoreError> {
        let request = routes::ROOMS_MODERATOR
            .request()
            .url_arg("action", action.as_str());
        self.room_request(room, request, json!({ "userId": user_id }))
            .await
    }

    /// Grant or revoke ownership.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn set_owner(
        &self,
        room: &Room,
        user_id: &str,
        action: RoleAction,
    ) -> Result<Value, CoreError> {
        let request = routes::ROOMS_OWNER.request().url_arg("action", action.as_str());
        self.room_request(room, request, json!({ "userId": user_id }))
            .await
    }

    /// Integrations attached to a room.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn room_integrations(&self, room: &Room) -> Result<Value, CoreError> {
        let request = routes::ROOMS_GET_INTEGRATIONS
            .request()
            .channel_type(room.channel_type())
            .param("roomId", room.id.as_str());
        self.dispatch(request).await
    }

    /// Set the code needed to join a channel.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for groups and direct rooms,
    /// and dispatch errors.
    pub async fn set_join_code(&self, room: &Room, join_code: &str) -> Result<Room, CoreError> {
        if room.channel_type() != ChannelType::Channels {
            return Err(CoreError::InvalidArgument(format!(
                "join codes only apply to channels, not {}",
                room.channel_type()
            )));
        }
        let request = routes::CHANNELS_SET_JOIN_CODE
            .request()
            .body(room.payload(json!({ "joinCode": join_code })));
        Ok(tagged(self.call(request).await?, ChannelType::Channels))
    }

    async fn room_request(
        &self,
        room: &Room,
        request: RouteRequest,
        extra: Value,
    ) -> Result<Value, CoreError> {
        let request = request
            .channel_type(room.channel_type())
            .body(room.payload(extra));
        self.dispatch(request).await
    }

    async fn room_action(
        &self,
        room: &Room,
        route: &'static routes::Route,
        extra: Value,
    ) -> Result<Value, CoreError> {
        self.room_request(room, route.request(), extra).await
    }

    async fn room_update(
        &self,
        room: &Room,
        route: &'static routes::Route,
        extra: Value,
    ) -> Result<Room, CoreError> {
        let value = self.room_action(room, route, extra).await?;
        let updated: Room = serde_json::from_value(value)
            .map_err(|e| CoreError::Serialization(format!("parsing {} response: {e}", route.name)))?;
        Ok(tagged(updated, room.channel_type()))
    }

    async fn room_text(
        &self,
        room: &Room,
        route: &'static routes::Route,
        extra: Value,
    ) -> Result<String, CoreError> {
        let value = self.room_action(room, route, extra).await?;
        Ok(value.as_str().map_or_else(|| value.to_string(), str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rocket::testing::{ok, session_with, status, with_login};

    fn channel_list() -> Value {
        json!({
            "channels": [
                {"_id": "GENERAL", "name": "general", "t": "c"},
                {"_id": "C2", "name": "random", "t": "c"}
            ],
            "success": true
        })
    }

    #[tokio::test]
    async fn room_lists_are_cached_per_type() {
        let mock = with_login(|req| {
            if req.url.ends_with("/api/v1/channels.list") {
                ok(channel_list())
            } else {
                ok(json!({"groups": [{"_id": "G1", "name": "ops", "t": "p"}], "success": true}))
            }
        });
        let session = session_with(&mock);

        let channels = session.rooms(ChannelType::Channels).await.unwrap();
        assert_eq!(channels.len(), 2);
        assert!(channels.iter().all(|r| r.kind == Some(ChannelType::Channels)));
        session.rooms(ChannelType::Channels).await.unwrap();
        assert_eq!(mock.count("/api/v1/channels.list"), 1);

        let groups = session.rooms(ChannelType::Groups).await.unwrap();
        assert_eq!(groups[0].channel_type(), ChannelType::Groups);

        session.refresh_rooms(ChannelType::Channels).await.unwrap();
        assert_eq!(mock.count("/api/v1/channels.list"), 2);
    }

    #[tokio::test]
    async fn find_room_falls_back_to_info() {
        let mock = with_login(|req| {
            if req.url.ends_with("/api/v1/channels.list") {
                ok(channel_list())
            } else if req.url.ends_with("/api/v1/groups.list") {
                ok(json!({"groups": [], "success": true}))
            } else if req.url.ends_with("/api/v1/channels.info") {
                status(400, json!({"success": false, "error": "error-room-not-found"}))
            } else {
                ok(json!({"group": {"_id": "G9", "name": "secret", "t": "p"}, "success": true}))
            }
        });
        let session = session_with(&mock);

        let room = session.find_room("#random").await.unwrap();
        assert_eq!(room.id, "C2");

        let room = session.find_room("secret").await.unwrap();
        assert_eq!(room.id, "G9");
        assert_eq!(room.channel_type(), ChannelType::Groups);
        let info = &mock.matching("/api/v1/groups.info")[0];
        assert_eq!(info.query_value("roomName"), Some("secret"));
    }

    #[tokio::test]
    async fn direct_room_creates_then_rescans() {
        let created = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = created.clone();
        let mock = with_login(move |req| {
            if req.url.ends_with("/api/v1/im.create") {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                return ok(json!({"room": {"_id": "D1", "t": "d", "usernames": ["eliza", "bob"]}, "success": true}));
            }
            if flag.load(std::sync::atomic::Ordering::SeqCst) {
                ok(json!({"ims": [{"_id": "D1", "t": "d", "usernames": ["eliza", "bob"]}], "success": true}))
            } else {
                ok(json!({"ims": [{"_id": "D0", "t": "d", "usernames": ["eliza", "carol"]}], "success": true}))
            }
        });
        let session = session_with(&mock);

        let room = session.direct_room(&User::with_username("bob")).await.unwrap();
        assert_eq!(room.id, "D1");
        assert_eq!(room.channel_type(), ChannelType::Im);
        assert!(created.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(mock.count("/api/v1/im.list"), 2);
        let create = &mock.matching("/api/v1/im.create")[0];
        assert_eq!(create.body, Some(json!({"username": "bob"})));
    }

    #[tokio::test]
    async fn direct_room_missing_after_create_is_not_found() {
        let mock = with_login(|req| {
            if req.url.ends_with("/api/v1/im.create") {
                status(400, json!({"success": false, "error": "error-not-allowed"}))
            } else {
                ok(json!({"ims": [], "success": true}))
            }
        });
        let session = session_with(&mock);
        let err = session.direct_room(&User::with_username("bob")).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn room_operations_send_room_payloads() {
        let mock = with_login(|req| {
            if req.url.ends_with(".setTopic") {
                ok(json!({"topic": "deploys", "success": true}))
            } else if req.url.ends_with(".addModerator") {
                ok(json!({"success": true}))
            } else {
                ok(json!({"group": {"_id": "G1", "name": "ops", "t": "p"}, "success": true}))
            }
        });
        let session = session_with(&mock);
        let room = Room::with_id("G1", ChannelType::Groups);

        let invited = session.invite(&room, "u7").await.unwrap();
        assert_eq!(invited.name.as_deref(), Some("ops"));
        let sent = &mock.matching("/api/v1/groups.invite")[0];
        assert_eq!(sent.body, Some(json!({"roomId": "G1", "userId": "u7"})));

        assert_eq!(session.set_topic(&room, "deploys").await.unwrap(), "deploys");

        session.set_moderator(&room, "u7", RoleAction::Add).await.unwrap();
        assert_eq!(mock.count("/api/v1/groups.addModerator"), 1);
    }

    #[tokio::test]
    async fn direct_rooms_reject_named_room_routes() {
        let mock = with_login(|_| ok(json!({"success": true})));
        let session = session_with(&mock);
        let dm = Room::with_id("D1", ChannelType::Im);
        assert!(matches!(
            session.leave_room(&dm).await.unwrap_err(),
            CoreError::InvalidArgument(_)
        ));
        assert!(matches!(
            session.set_join_code(&dm, "1234").await.unwrap_err(),
            CoreError::InvalidArgument(_)
        ));
        assert!(mock.requests().is_empty());
    }
}
