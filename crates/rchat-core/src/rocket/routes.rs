//! Declarative table of REST routes.
//!
//! Every endpoint the binding calls is described by one [`Route`] static:
//! path template, accepted methods, URL argument constraints, query
//! parameter declarations and the response key to extract. The session's
//! dispatcher interprets these descriptions. Adding an endpoint means adding
//! a static and listing it in [`ROUTES`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::CoreError;
use crate::rocket::models::ChannelType;

/// HTTP method of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(CoreError::InvalidArgument(format!(
                "unsupported HTTP method '{other}'"
            ))),
        }
    }
}

/// Declaration of a URL argument or query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    /// Name as it appears in the path template or query string.
    pub name: &'static str,
    /// Whether the caller must supply it (after defaults are applied).
    pub required: bool,
    /// Value used when the caller supplies none.
    pub default: Option<&'static str>,
    /// Allowed values. Empty means any value.
    pub options: &'static [&'static str],
}

impl ParamSpec {
    /// A required parameter accepting any value.
    #[must_use]
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
            options: &[],
        }
    }

    /// An optional parameter accepting any value.
    #[must_use]
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            default: None,
            options: &[],
        }
    }

    /// A required parameter restricted to `options`.
    #[must_use]
    pub const fn one_of(name: &'static str, options: &'static [&'static str]) -> Self {
        Self {
            name,
            required: true,
            default: None,
            options,
        }
    }

    /// Set the default value.
    #[must_use]
    pub const fn with_default(self, default: &'static str) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    fn check(&self, route: &str, value: &str) -> Result<(), CoreError> {
        if self.options.is_empty() || self.options.contains(&value) {
            Ok(())
        } else {
            Err(CoreError::InvalidArgument(format!(
                "{route}: {} must be one of {}, got '{value}'",
                self.name,
                self.options.join(", ")
            )))
        }
    }
}

/// Which part of a successful response body the dispatcher returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extract {
    /// The whole body.
    Whole,
    /// The value under a fixed key.
    Key(&'static str),
    /// The value under `data` (login, logout).
    Data,
    /// The single-entity key of the bound channel type (`channel`, `group`, `room`).
    Entity,
    /// The list key of the bound channel type (`channels`, `groups`, `ims`).
    List,
}

/// Description of one REST endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Stable identifier, used by `rchat call` and in log lines.
    pub name: &'static str,
    /// Accepted methods. The first is the default.
    pub methods: &'static [HttpMethod],
    /// Path template with `{placeholder}` segments.
    pub path: &'static str,
    /// Constraints for the placeholders in `path`.
    pub url_args: &'static [ParamSpec],
    /// Declared query parameters. Undeclared ones are passed through.
    pub params: &'static [ParamSpec],
    /// Part of the response to return.
    pub extract: Extract,
    /// Whether the auth headers are required.
    pub authenticated: bool,
}

const GET: &[HttpMethod] = &[HttpMethod::Get];
const POST: &[HttpMethod] = &[HttpMethod::Post];

const ROOM_TYPES: &[&str] = &["channels", "groups", "im"];
const NAMED_ROOM_TYPES: &[&str] = &["channels", "groups"];
const ROLE_ACTIONS: &[&str] = &["add", "remove"];

const ANY_ROOM: &[ParamSpec] = &[ParamSpec::one_of("channel_type", ROOM_TYPES)];
const NAMED_ROOM: &[ParamSpec] = &[ParamSpec::one_of("channel_type", NAMED_ROOM_TYPES)];
const PAGINATION: &[ParamSpec] = &[
    ParamSpec::optional("count"),
    ParamSpec::optional("offset"),
    ParamSpec::optional("sort"),
    ParamSpec::optional("query"),
];
const BY_ID_OR_NAME: &[ParamSpec] = &[ParamSpec::optional("roomId"), ParamSpec::optional("roomName")];
const BY_USER: &[ParamSpec] = &[ParamSpec::optional("userId"), ParamSpec::optional("username")];
const ID_ARG: &[ParamSpec] = &[ParamSpec::required("_id")];
const ROOM_ID: &[ParamSpec] = &[ParamSpec::required("roomId")];
const MSG_ID: &[ParamSpec] = &[ParamSpec::required("msgId")];
const NAMED_ROOM_ACTION: &[ParamSpec] = &[
    ParamSpec::one_of("channel_type", NAMED_ROOM_TYPES),
    ParamSpec::one_of("action", ROLE_ACTIONS),
];
const HISTORY_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("roomId"),
    ParamSpec::optional("latest"),
    ParamSpec::optional("oldest"),
    ParamSpec::optional("inclusive"),
    ParamSpec::optional("count"),
    ParamSpec::optional("unreads"),
];
const MEMBERS_PARAMS: &[ParamSpec] = &[
    ParamSpec::optional("roomId"),
    ParamSpec::optional("roomName"),
    ParamSpec::optional("count"),
    ParamSpec::optional("offset"),
];

impl Route {
    const fn new(name: &'static str, methods: &'static [HttpMethod], path: &'static str) -> Self {
        Self {
            name,
            methods,
            path,
            url_args: &[],
            params: &[],
            extract: Extract::Whole,
            authenticated: true,
        }
    }

    const fn url_args(self, url_args: &'static [ParamSpec]) -> Self {
        Self { url_args, ..self }
    }

    const fn params(self, params: &'static [ParamSpec]) -> Self {
        Self { params, ..self }
    }

    const fn extract(self, extract: Extract) -> Self {
        Self { extract, ..self }
    }

    const fn public(self) -> Self {
        Self {
            authenticated: false,
            ..self
        }
    }

    /// Default method.
    #[must_use]
    pub fn default_method(&self) -> HttpMethod {
        self.methods.first().copied().unwrap_or(HttpMethod::Get)
    }

    /// Start a request on this route.
    #[must_use]
    pub fn request(&'static self) -> RouteRequest {
        RouteRequest::new(self)
    }

    /// Placeholder names in the path template, in order.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        let mut rest = self.path;
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else { break };
            names.push(&after[..end]);
            rest = &after[end + 1..];
        }
        names
    }
}

// -- Server and session --

/// `GET /api/v1/info`
pub static INFO: Route = Route::new("info", GET, "/api/v1/info").public();
/// `POST /api/v1/login`
pub static LOGIN: Route = Route::new("login", POST, "/api/v1/login")
    .public()
    .extract(Extract::Data);
/// `GET|POST /api/v1/logout`
pub static LOGOUT: Route = Route::new("logout", &[HttpMethod::Get, HttpMethod::Post], "/api/v1/logout")
    .extract(Extract::Data);
/// `GET /api/v1/me`
pub static ME: Route = Route::new("me", GET, "/api/v1/me");
/// `GET|POST /api/v1/settings/{_id}`
pub static SETTINGS: Route = Route::new(
    "settings",
    &[HttpMethod::Get, HttpMethod::Post],
    "/api/v1/settings/{_id}",
)
.url_args(ID_ARG);

// -- Users --

/// `POST /api/v1/users.create`
pub static USERS_CREATE: Route =
    Route::new("users.create", POST, "/api/v1/users.create").extract(Extract::Key("user"));
/// `POST /api/v1/users.createToken`
pub static USERS_CREATE_TOKEN: Route =
    Route::new("users.createToken", POST, "/api/v1/users.createToken").extract(Extract::Data);
/// `POST /api/v1/users.delete`
pub static USERS_DELETE: Route = Route::new("users.delete", POST, "/api/v1/users.delete");
/// `GET /api/v1/users.getAvatar`
pub static USERS_GET_AVATAR: Route =
    Route::new("users.getAvatar", GET, "/api/v1/users.getAvatar").params(BY_USER);
/// `GET /api/v1/users.getPresence`
pub static USERS_GET_PRESENCE: Route =
    Route::new("users.getPresence", GET, "/api/v1/users.getPresence").params(BY_USER);
/// `GET /api/v1/users.info`
pub static USERS_INFO: Route = Route::new("users.info", GET, "/api/v1/users.info")
    .params(BY_USER)
    .extract(Extract::Key("user"));
/// `GET /api/v1/users.list`
pub static USERS_LIST: Route = Route::new("users.list", GET, "/api/v1/users.list")
    .params(PAGINATION)
    .extract(Extract::Key("users"));
/// `POST /api/v1/users.register`
pub static USERS_REGISTER: Route = Route::new("users.register", POST, "/api/v1/users.register")
    .extract(Extract::Key("user"));
/// `POST /api/v1/users.resetAvatar`
pub static USERS_RESET_AVATAR: Route =
    Route::new("users.resetAvatar", POST, "/api/v1/users.resetAvatar");
/// `POST /api/v1/users.setAvatar`
pub static USERS_SET_AVATAR: Route = Route::new("users.setAvatar", POST, "/api/v1/users.setAvatar");
/// `POST /api/v1/users.update`
pub static USERS_UPDATE: Route =
    Route::new("users.update", POST, "/api/v1/users.update").extract(Extract::Key("user"));

// -- Direct messages --

/// `GET /api/v1/im.messages.others`
pub static IM_MESSAGES_OTHERS: Route =
    Route::new("im.messages.others", GET, "/api/v1/im.messages.others")
        .params(ROOM_ID)
        .extract(Extract::Key("messages"));
/// `GET /api/v1/im.list.everyone`
pub static IM_LIST_EVERYONE: Route = Route::new("im.list.everyone", GET, "/api/v1/im.list.everyone")
    .params(PAGINATION)
    .extract(Extract::Key("ims"));
/// `POST /api/v1/im.create`
pub static IM_CREATE: Route =
    Route::new("im.create", POST, "/api/v1/im.create").extract(Extract::Key("room"));

// -- Livechat --

const LIVECHAT_USER_TYPES: &[&str] = &["agent", "manager"];
const LIVECHAT_TYPE: &[ParamSpec] = &[ParamSpec::one_of("type", LIVECHAT_USER_TYPES)];
const LIVECHAT_TYPE_AND_ID: &[ParamSpec] = &[
    ParamSpec::one_of("type", LIVECHAT_USER_TYPES),
    ParamSpec::required("_id"),
];
const SMS_SERVICES: &[&str] = &["twilio"];
const SMS_SERVICE: &[ParamSpec] = &[ParamSpec::one_of("service", SMS_SERVICES).with_default("twilio")];

/// `GET|POST /api/v1/livechat/users/{type}`
pub static LIVECHAT_USERS: Route = Route::new(
    "livechat.users",
    &[HttpMethod::Get, HttpMethod::Post],
    "/api/v1/livechat/users/{type}",
)
.url_args(LIVECHAT_TYPE)
.extract(Extract::Key("users"));
/// `GET|DELETE /api/v1/livechat/users/{type}/{_id}`
pub static LIVECHAT_USER: Route = Route::new(
    "livechat.user",
    &[HttpMethod::Get, HttpMethod::Delete],
    "/api/v1/livechat/users/{type}/{_id}",
)
.url_args(LIVECHAT_TYPE_AND_ID);
/// `GET|POST /api/v1/livechat/department`
pub static LIVECHAT_DEPARTMENTS: Route = Route::new(
    "livechat.departments",
    &[HttpMethod::Get, HttpMethod::Post],
    "/api/v1/livechat/department",
);
/// `GET|PUT|DELETE /api/v1/livechat/department/{_id}`
pub static LIVECHAT_DEPARTMENT: Route = Route::new(
    "livechat.department",
    &[HttpMethod::Get, HttpMethod::Put, HttpMethod::Delete],
    "/api/v1/livechat/department/{_id}",
)
.url_args(ID_ARG);
/// `POST /api/v1/livechat/sms-incoming/{service}`
pub static LIVECHAT_SMS_INCOMING: Route = Route::new(
    "livechat.smsIncoming",
    POST,
    "/api/v1/livechat/sms-incoming/{service}",
)
.url_args(SMS_SERVICE);

// -- Integrations --

/// `POST /api/v1/integrations.create`
pub static INTEGRATIONS_CREATE: Route =
    Route::new("integrations.create", POST, "/api/v1/integrations.create")
        .extract(Extract::Key("integration"));
/// `GET /api/v1/integrations.list`
pub static INTEGRATIONS_LIST: Route = Route::new("integrations.list", GET, "/api/v1/integrations.list")
    .params(PAGINATION)
    .extract(Extract::Key("integrations"));
/// `POST /api/v1/integrations.remove`
pub static INTEGRATIONS_REMOVE: Route =
    Route::new("integrations.remove", POST, "/api/v1/integrations.remove");

// -- Chat --

/// `GET /api/v1/chat.getMessage`
pub static CHAT_GET_MESSAGE: Route = Route::new("chat.getMessage", GET, "/api/v1/chat.getMessage")
    .params(MSG_ID)
    .extract(Extract::Key("message"));
/// `POST /api/v1/chat.postMessage`
pub static CHAT_POST_MESSAGE: Route =
    Route::new("chat.postMessage", POST, "/api/v1/chat.postMessage").extract(Extract::Key("message"));
/// `POST /api/v1/chat.update`
pub static CHAT_UPDATE: Route =
    Route::new("chat.update", POST, "/api/v1/chat.update").extract(Extract::Key("message"));
/// `POST /api/v1/chat.delete`
pub static CHAT_DELETE: Route = Route::new("chat.delete", POST, "/api/v1/chat.delete");
/// `POST /api/v1/chat.pinMessage`
pub static CHAT_PIN_MESSAGE: Route =
    Route::new("chat.pinMessage", POST, "/api/v1/chat.pinMessage").extract(Extract::Key("message"));
/// `POST /api/v1/chat.unPinMessage`
pub static CHAT_UNPIN_MESSAGE: Route = Route::new("chat.unPinMessage", POST, "/api/v1/chat.unPinMessage");
/// `POST /api/v1/chat.starMessage`
pub static CHAT_STAR_MESSAGE: Route = Route::new("chat.starMessage", POST, "/api/v1/chat.starMessage");
/// `POST /api/v1/chat.unStarMessage`
pub static CHAT_UNSTAR_MESSAGE: Route =
    Route::new("chat.unStarMessage", POST, "/api/v1/chat.unStarMessage");
/// `POST /api/v1/chat.react`
pub static CHAT_REACT: Route = Route::new("chat.react", POST, "/api/v1/chat.react");

// -- Channels only --

/// `POST /api/v1/channels.cleanHistory`
pub static CHANNELS_CLEAN_HISTORY: Route =
    Route::new("channels.cleanHistory", POST, "/api/v1/channels.cleanHistory");
/// `GET /api/v1/channels.list.joined`
pub static CHANNELS_LIST_JOINED: Route =
    Route::new("channels.list.joined", GET, "/api/v1/channels.list.joined")
        .params(PAGINATION)
        .extract(Extract::Key("channels"));
/// `POST /api/v1/channels.setJoinCode`
pub static CHANNELS_SET_JOIN_CODE: Route =
    Route::new("channels.setJoinCode", POST, "/api/v1/channels.setJoinCode")
        .extract(Extract::Key("channel"));

// -- Rooms by type --

/// `GET /api/v1/{channel_type}.info`
pub static ROOMS_INFO: Route = Route::new("rooms.info", GET, "/api/v1/{channel_type}.info")
    .url_args(NAMED_ROOM)
    .params(BY_ID_OR_NAME)
    .extract(Extract::Entity);
/// `GET /api/v1/{channel_type}.history`
pub static ROOMS_HISTORY: Route = Route::new("rooms.history", GET, "/api/v1/{channel_type}.history")
    .url_args(ANY_ROOM)
    .params(HISTORY_PARAMS);
/// `GET /api/v1/{channel_type}.list`
pub static ROOMS_LIST: Route = Route::new("rooms.list", GET, "/api/v1/{channel_type}.list")
    .url_args(ANY_ROOM)
    .params(PAGINATION)
    .extract(Extract::List);
/// `GET /api/v1/{channel_type}.members`
pub static ROOMS_MEMBERS: Route = Route::new("rooms.members", GET, "/api/v1/{channel_type}.members")
    .url_args(ANY_ROOM)
    .params(MEMBERS_PARAMS)
    .extract(Extract::Key("members"));
/// `POST /api/v1/{channel_type}.open`
pub static ROOMS_OPEN: Route =
    Route::new("rooms.open", POST, "/api/v1/{channel_type}.open").url_args(ANY_ROOM);
/// `POST /api/v1/{channel_type}.close`
pub static ROOMS_CLOSE: Route =
    Route::new("rooms.close", POST, "/api/v1/{channel_type}.close").url_args(ANY_ROOM);
/// `POST /api/v1/{channel_type}.addAll`
pub static ROOMS_ADD_ALL: Route = Route::new("rooms.addAll", POST, "/api/v1/{channel_type}.addAll")
    .url_args(NAMED_ROOM)
    .extract(Extract::Entity);
/// `POST /api/v1/{channel_type}.{action}Moderator`
pub static ROOMS_MODERATOR: Route = Route::new(
    "rooms.moderator",
    POST,
    "/api/v1/{channel_type}.{action}Moderator",
)
.url_args(NAMED_ROOM_ACTION);
/// `POST /api/v1/{channel_type}.{action}Owner`
pub static ROOMS_OWNER: Route = Route::new("rooms.owner", POST, "/api/v1/{channel_type}.{action}Owner")
    .url_args(NAMED_ROOM_ACTION);
/// `POST /api/v1/{channel_type}.create`
pub static ROOMS_CREATE: Route = Route::new("rooms.create", POST, "/api/v1/{channel_type}.create")
    .url_args(NAMED_ROOM)
    .extract(Extract::Entity);
/// `POST /api/v1/{channel_type}.archive`
pub static ROOMS_ARCHIVE: Route =
    Route::new("rooms.archive", POST, "/api/v1/{channel_type}.archive").url_args(NAMED_ROOM);
/// `POST /api/v1/{channel_type}.unarchive`
pub static ROOMS_UNARCHIVE: Route =
    Route::new("rooms.unarchive", POST, "/api/v1/{channel_type}.unarchive").url_args(NAMED_ROOM);
/// `GET /api/v1/{channel_type}.getIntegrations`
pub static ROOMS_GET_INTEGRATIONS: Route = Route::new(
    "rooms.getIntegrations",
    GET,
    "/api/v1/{channel_type}.getIntegrations",
)
.url_args(NAMED_ROOM)
.params(ROOM_ID)
.extract(Extract::Key("integrations"));
/// `POST /api/v1/{channel_type}.invite`
pub static ROOMS_INVITE: Route = Route::new("rooms.invite", POST, "/api/v1/{channel_type}.invite")
    .url_args(NAMED_ROOM)
    .extract(Extract::Entity);
/// `POST /api/v1/{channel_type}.kick`
pub static ROOMS_KICK: Route = Route::new("rooms.kick", POST, "/api/v1/{channel_type}.kick")
    .url_args(NAMED_ROOM)
    .extract(Extract::Entity);
/// `POST /api/v1/{channel_type}.leave`
pub static ROOMS_LEAVE: Route = Route::new("rooms.leave", POST, "/api/v1/{channel_type}.leave")
    .url_args(NAMED_ROOM)
    .extract(Extract::Entity);
/// `POST /api/v1/{channel_type}.rename`
pub static ROOMS_RENAME: Route = Route::new("rooms.rename", POST, "/api/v1/{channel_type}.rename")
    .url_args(NAMED_ROOM)
    .extract(Extract::Entity);
/// `POST /api/v1/{channel_type}.setDescription`
pub static ROOMS_SET_DESCRIPTION: Route = Route::new(
    "rooms.setDescription",
    POST,
    "/api/v1/{channel_type}.setDescription",
)
.url_args(NAMED_ROOM)
.extract(Extract::Key("description"));
/// `POST /api/v1/{channel_type}.setPurpose`
pub static ROOMS_SET_PURPOSE: Route =
    Route::new("rooms.setPurpose", POST, "/api/v1/{channel_type}.setPurpose")
        .url_args(NAMED_ROOM)
        .extract(Extract::Key("purpose"));
/// `POST /api/v1/{channel_type}.setReadOnly`
pub static ROOMS_SET_READ_ONLY: Route =
    Route::new("rooms.setReadOnly", POST, "/api/v1/{channel_type}.setReadOnly")
        .url_args(NAMED_ROOM)
        .extract(Extract::Entity);
/// `POST /api/v1/{channel_type}.setTopic`
pub static ROOMS_SET_TOPIC: Route = Route::new("rooms.setTopic", POST, "/api/v1/{channel_type}.setTopic")
    .url_args(ANY_ROOM)
    .extract(Extract::Key("topic"));
/// `POST /api/v1/{channel_type}.setType`
pub static ROOMS_SET_TYPE: Route = Route::new("rooms.setType", POST, "/api/v1/{channel_type}.setType")
    .url_args(NAMED_ROOM)
    .extract(Extract::Entity);

/// Every route the binding knows, in documentation order.
pub static ROUTES: &[&Route] = &[
    &INFO,
    &LOGIN,
    &LOGOUT,
    &ME,
    &SETTINGS,
    &USERS_CREATE,
    &USERS_CREATE_TOKEN,
    &USERS_DELETE,
    &USERS_GET_AVATAR,
    &USERS_GET_PRESENCE,
    &USERS_INFO,
    &USERS_LIST,
    &USERS_REGISTER,
    &USERS_RESET_AVATAR,
    &USERS_SET_AVATAR,
    &USERS_UPDATE,
    &IM_MESSAGES_OTHERS,
    &IM_LIST_EVERYONE,
    &IM_CREATE,
    &LIVECHAT_USERS,
    &LIVECHAT_USER,
    &LIVECHAT_DEPARTMENTS,
    &LIVECHAT_DEPARTMENT,
    &LIVECHAT_SMS_INCOMING,
    &INTEGRATIONS_CREATE,
    &INTEGRATIONS_LIST,
    &INTEGRATIONS_REMOVE,
    &CHAT_GET_MESSAGE,
    &CHAT_POST_MESSAGE,
    &CHAT_UPDATE,
    &CHAT_DELETE,
    &CHAT_PIN_MESSAGE,
    &CHAT_UNPIN_MESSAGE,
    &CHAT_STAR_MESSAGE,
    &CHAT_UNSTAR_MESSAGE,
    &CHAT_REACT,
    &CHANNELS_CLEAN_HISTORY,
    &CHANNELS_LIST_JOINED,
    &CHANNELS_SET_JOIN_CODE,
    &ROOMS_INFO,
    &ROOMS_HISTORY,
    &ROOMS_LIST,
    &ROOMS_MEMBERS,
    &ROOMS_OPEN,
    &ROOMS_CLOSE,
    &ROOMS_ADD_ALL,
    &ROOMS_MODERATOR,
    &ROOMS_OWNER,
    &ROOMS_CREATE,
    &ROOMS_ARCHIVE,
    &ROOMS_UNARCHIVE,
    &ROOMS_GET_INTEGRATIONS,
    &ROOMS_INVITE,
    &ROOMS_KICK,
    &ROOMS_LEAVE,
    &ROOMS_RENAME,
    &ROOMS_SET_DESCRIPTION,
    &ROOMS_SET_PURPOSE,
    &ROOMS_SET_READ_ONLY,
    &ROOMS_SET_TOPIC,
    &ROOMS_SET_TYPE,
];

/// Look up a route by its name.
#[must_use]
pub fn find_route(name: &str) -> Option<&'static Route> {
    ROUTES.iter().copied().find(|route| route.name == name)
}

/// A call on a route, built up before dispatch.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    route: &'static Route,
    method: Option<HttpMethod>,
    url_args: BTreeMap<String, String>,
    params: BTreeMap<String, String>,
    body: Option<Value>,
}

impl RouteRequest {
    /// Start a request on `route`.
    #[must_use]
    pub fn new(route: &'static Route) -> Self {
        Self {
            route,
            method: None,
            url_args: BTreeMap::new(),
            params: BTreeMap::new(),
            body: None,
        }
    }

    /// The route being called.
    #[must_use]
    pub const fn route(&self) -> &'static Route {
        self.route
    }

    /// Override the default method.
    #[must_use]
    pub const fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Bind a path placeholder.
    #[must_use]
    pub fn url_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_args.insert(name.into(), value.into());
        self
    }

    /// Bind the `{channel_type}` placeholder.
    #[must_use]
    pub fn channel_type(self, channel_type: ChannelType) -> Self {
        self.url_arg("channel_type", channel_type.as_str())
    }

    /// Add a query parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Add several query parameters.
    #[must_use]
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the JSON body.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Validate the request against its route and resolve the final path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] when the method is not
    /// accepted, a URL argument is unknown, missing or outside its options,
    /// or a required query parameter is missing.
    pub fn prepare(self) -> Result<PreparedRequest, CoreError> {
        let route = self.route;
        let method = self.method.unwrap_or_else(|| route.default_method());
        if !route.methods.contains(&method) {
            return Err(CoreError::InvalidArgument(format!(
                "{} does not accept {method}",
                route.name
            )));
        }

        let mut url_args = self.url_args;
        for name in url_args.keys() {
            if !route.url_args.iter().any(|spec| spec.name == name) {
                return Err(CoreError::InvalidArgument(format!(
                    "{} has no URL argument '{name}'",
                    route.name
                )));
            }
        }
        for spec in route.url_args {
            if let Some(value) = url_args.get(spec.name) {
                spec.check(route.name, value)?;
            } else if let Some(default) = spec.default {
                url_args.insert(spec.name.to_string(), default.to_string());
            } else {
                return Err(CoreError::InvalidArgument(format!(
                    "{} requires URL argument '{}'",
                    route.name, spec.name
                )));
            }
        }

        let mut path = route.path.to_string();
        for name in route.placeholders() {
            let value = url_args.get(name).ok_or_else(|| {
                CoreError::InvalidArgument(format!("{} requires URL argument '{name}'", route.name))
            })?;
            path = path.replace(&format!("{{{name}}}"), &urlencoding::encode(value));
        }

        let mut params = self.params;
        for spec in route.params {
            if let Some(value) = params.get(spec.name) {
                spec.check(route.name, value)?;
            } else if let Some(default) = spec.default {
                params.insert(spec.name.to_string(), default.to_string());
            } else if spec.required {
                return Err(CoreError::InvalidArgument(format!(
                    "{} requires parameter '{}'",
                    route.name, spec.name
                )));
            }
        }

        let channel_type = url_args
            .get("channel_type")
            .map(|value| value.parse::<ChannelType>())
            .transpose()?;

        Ok(PreparedRequest {
            route,
            method,
            path,
            query: params.into_iter().collect(),
            body: self.body,
            channel_type,
        })
    }
}

/// A validated request with its path resolved.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// The route being called.
    pub route: &'static Route,
    /// Method to use.
    pub method: HttpMethod,
    /// Resolved path, starting with `/api/v1/`.
    pub path: String,
    /// Query parameters in name order.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<Value>,
    /// Channel type bound to `{channel_type}`, if the route has one.
    pub channel_type: Option<ChannelType>,
}

impl PreparedRequest {
    /// Pick the part of a successful response body the route declares.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] when the declared key is absent.
    pub fn extract(&self, mut body: Value) -> Result<Value, CoreError> {
        let key = match self.route.extract {
            Extract::Whole => return Ok(body),
            Extract::Key(key) => key,
            Extract::Data => "data",
            Extract::Entity | Extract::List => {
                let channel_type = self.channel_type.ok_or_else(|| {
                    CoreError::Other(format!("{} extracts by channel type but has none", self.route.name))
                })?;
                if self.route.extract == Extract::Entity {
                    channel_type.entity_key()
                } else {
                    channel_type.list_key()
                }
            }
        };
        body.get_mut(key).map(Value::take).ok_or_else(|| {
            CoreError::Serialization(format!("{} response has no '{key}' field", self.route.name))
        })
    }
}
