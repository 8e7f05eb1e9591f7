//! Replies returned to Slack for a slash command.
//!
//! A reply is either plain text or text followed by attachments. Attachments
//! are assembled from [`Component`]s whose fields are merged, in order, into a
//! single flat JSON object.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Who gets to see the reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Only the user who issued the command.
    #[default]
    Ephemeral,
    /// Everyone in the channel.
    InChannel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackResponse {
    pub text: String,
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl SlackResponse {
    /// A text-only reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            response_type: ResponseType::default(),
            attachments: None,
        }
    }

    /// A reply carrying attachments. The `attachments` array is always emitted,
    /// even when empty.
    pub fn rich(text: impl Into<String>, attachments: impl IntoIterator<Item = Attachment>) -> Self {
        Self {
            text: text.into(),
            response_type: ResponseType::default(),
            attachments: Some(attachments.into_iter().collect()),
        }
    }

    pub fn in_channel(mut self) -> Self {
        self.response_type = ResponseType::InChannel;
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Appends an attachment, turning a text reply into a rich one.
    pub fn add(&mut self, attachment: Attachment) -> &mut Self {
        self.attachments.get_or_insert_with(Vec::new).push(attachment);
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl IntoResponse for SlackResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// A single attachment: a required plain-text fallback and ordered components.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub fallback: String,
    pub components: Vec<Component>,
}

impl Attachment {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            components: Vec::new(),
        }
    }

    pub fn with(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn add(&mut self, component: Component) -> &mut Self {
        self.components.push(component);
        self
    }

    /// The flat wire representation. Later components overwrite fields set by
    /// earlier ones.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("fallback".into(), Value::String(self.fallback.clone()));
        for component in &self.components {
            for (field, value) in component.fields() {
                map.insert(field.into(), value);
            }
        }
        map
    }
}

impl Serialize for Attachment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl Field {
    fn to_value(&self) -> Value {
        json!({ "title": self.title, "value": self.value, "short": self.short })
    }
}

/// One building block of an attachment.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Text { text: String, pretext: String },
    Author { name: String, link: String, icon: String },
    Title { title: String, link: String },
    Image { image: String, thumb: String },
    Color(String),
    Fields(Vec<Field>),
}

impl Component {
    pub fn text(text: impl Into<String>, pretext: Option<&str>) -> Self {
        Self::Text {
            text: text.into(),
            pretext: pretext.unwrap_or_default().to_string(),
        }
    }

    pub fn author(name: impl Into<String>, link: impl Into<String>, icon: impl Into<String>) -> Self {
        Self::Author {
            name: name.into(),
            link: link.into(),
            icon: icon.into(),
        }
    }

    pub fn title(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self::Title {
            title: title.into(),
            link: link.into(),
        }
    }

    pub fn image(image: impl Into<String>, thumb: impl Into<String>) -> Self {
        Self::Image {
            image: image.into(),
            thumb: thumb.into(),
        }
    }

    pub fn fields(&self) -> Vec<(&'static str, Value)> {
        match self {
            Self::Text { text, pretext } => vec![
                ("text", Value::from(text.as_str())),
                ("pretext", Value::from(pretext.as_str())),
            ],
            Self::Author { name, link, icon } => vec![
                ("author_name", Value::from(name.as_str())),
                ("author_link", Value::from(link.as_str())),
                ("author_icon", Value::from(icon.as_str())),
            ],
            Self::Title { title, link } => vec![
                ("title", Value::from(title.as_str())),
                ("title_link", Value::from(link.as_str())),
            ],
            Self::Image { image, thumb } => vec![
                ("image_url", Value::from(image.as_str())),
                ("thumb_url", Value::from(thumb.as_str())),
            ],
            Self::Color(color) => vec![("color", Value::from(color.as_str()))],
            Self::Fields(fields) => vec![(
                "fields",
                fields.iter().map(Field::to_value).collect(),
            )],
        }
    }
}

/// Formats a link in Slack markup: `<url>` or `<url|label>`.
pub fn link(url: &str, label: Option<&str>) -> String {
    match label {
        Some(label) if !label.is_empty() => format!("<{}|{}>", url, label),
        _ => format!("<{}>", url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_response_defaults_to_ephemeral() {
        let value = serde_json::to_value(SlackResponse::text("the response")).unwrap();
        assert_eq!(value, json!({ "text": "the response", "response_type": "ephemeral" }));
    }

    #[test]
    fn in_channel_response_type() {
        let value = serde_json::to_value(SlackResponse::text("the response").in_channel()).unwrap();
        assert_eq!(value["response_type"], "in_channel");
    }

    #[test]
    fn to_json_matches_serialized_value() {
        let response = SlackResponse::text("hi");
        let parsed: Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(parsed, serde_json::to_value(&response).unwrap());
    }

    #[test]
    fn component_fields() {
        let text = Attachment::new("f").with(Component::text("mytext", Some("pretext")));
        assert_eq!(
            Value::Object(text.to_map()),
            json!({ "fallback": "f", "text": "mytext", "pretext": "pretext" })
        );

        let author = Attachment::new("f").with(Component::author("name", "link", "icon"));
        assert_eq!(
            Value::Object(author.to_map()),
            json!({ "fallback": "f", "author_name": "name", "author_link": "link", "author_icon": "icon" })
        );

        let title = Attachment::new("f").with(Component::title("title", "link"));
        assert_eq!(
            Value::Object(title.to_map()),
            json!({ "fallback": "f", "title": "title", "title_link": "link" })
        );

        let image = Attachment::new("f").with(Component::image("image", "thumb"));
        assert_eq!(
            Value::Object(image.to_map()),
            json!({ "fallback": "f", "image_url": "image", "thumb_url": "thumb" })
        );
    }

    #[test]
    fn text_without_pretext_uses_empty_string() {
        let attachment = Attachment::new("f").with(Component::text("body", None));
        assert_eq!(attachment.to_map()["pretext"], "");
    }

    #[test]
    fn attachment_merges_all_components() {
        let attachment = Attachment::new("fallback")
            .with(Component::text("mytext", Some("pretext")))
            .with(Component::author("name", "link", "icon"))
            .with(Component::title("title", "link"))
            .with(Component::image("image", "thumb"));

        let map = attachment.to_map();
        assert_eq!(map["fallback"], "fallback");
        assert_eq!(map["text"], "mytext");
        assert_eq!(map["author_link"], "link");
        assert_eq!(map["title"], "title");
        assert_eq!(map["image_url"], "image");
        assert_eq!(map.len(), 10);
    }

    #[test]
    fn later_components_override_earlier_fields() {
        let attachment = Attachment::new("fallback")
            .with(Component::text("first", Some("above")))
            .with(Component::text("second", None));

        let map = attachment.to_map();
        assert_eq!(map["text"], "second");
        assert_eq!(map["pretext"], "");
    }

    #[test]
    fn color_and_fields_components() {
        let attachment = Attachment::new("f")
            .with(Component::Color("#36a64f".into()))
            .with(Component::Fields(vec![Field {
                title: "Priority".into(),
                value: "High".into(),
                short: false,
            }]));

        assert_eq!(
            Value::Object(attachment.to_map()),
            json!({
                "fallback": "f",
                "color": "#36a64f",
                "fields": [{ "title": "Priority", "value": "High", "short": false }]
            })
        );
    }

    #[test]
    fn rich_response_always_has_attachments() {
        let value = serde_json::to_value(SlackResponse::rich("text", [])).unwrap();
        assert_eq!(
            value,
            json!({ "text": "text", "response_type": "ephemeral", "attachments": [] })
        );
    }

    #[test]
    fn rich_response_keeps_attachment_order() {
        let mut response = SlackResponse::rich("text", [Attachment::new("Attachment 1")]);
        response.add(Attachment::new("Attachment 2"));

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["attachments"][0], json!({ "fallback": "Attachment 1" }));
        assert_eq!(value["attachments"][1], json!({ "fallback": "Attachment 2" }));
    }

    #[test]
    fn adding_attachment_to_text_response() {
        let mut response = SlackResponse::text("text");
        response.add(Attachment::new("only"));
        assert_eq!(response.attachments.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn link_formats() {
        assert_eq!(
            link("https://my.server.com", Some("myserver")),
            "<https://my.server.com|myserver>"
        );
        assert_eq!(link("https://my.server.com", None), "<https://my.server.com>");
        assert_eq!(link("https://my.server.com", Some("")), "<https://my.server.com>");
    }
}
