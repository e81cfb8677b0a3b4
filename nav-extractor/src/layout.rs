//! Notification layout extraction.
//!
//! A captured notification is a flat list of labelled fields. The navigation
//! app fills different fields depending on the layout variant (expanded,
//! collapsed, lockscreen), often with overlapping content. Fields are
//! dispatched through `FIELD_PRIORITY` so that the winner for each piece of
//! state does not depend on capture order across roles.

use crate::codec::image::Image;
use crate::model::{NavigationData, NavigationIcon, Timestamp};
use crate::parser::{Directions, NavigationTextParser};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// One notification as captured from the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNotification {
    pub fields: Vec<NotificationField>,
    pub post_time: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationField {
    /// Resource entry name of the view, when it has one
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(flatten)]
    pub content: FieldContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldContent {
    Text {
        text: String,
        #[serde(default, rename = "richText")]
        rich_text: Option<String>,
    },
    Image {
        image: Image,
    },
    Button,
}

impl NotificationField {
    pub fn text(entry: &str, text: &str) -> Self {
        Self {
            entry: Some(entry.to_string()),
            content: FieldContent::Text {
                text: text.to_string(),
                rich_text: None,
            },
        }
    }

    pub fn image(entry: &str, image: Image) -> Self {
        Self {
            entry: Some(entry.to_string()),
            content: FieldContent::Image { image },
        }
    }

    pub fn button(entry: &str) -> Self {
        Self {
            entry: Some(entry.to_string()),
            content: FieldContent::Button,
        }
    }

    fn entry_in(&self, names: &[&str]) -> bool {
        self.entry
            .as_deref()
            .is_some_and(|entry| names.contains(&entry))
    }
}

/// What a text field contributes to the navigation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Distance to the next maneuver
    Title,
    /// Maneuver text
    Description,
    /// `duration - distance - eta`
    TimeLine,
    /// `distance - maneuver`, used only when no maneuver text is known
    Directions,
    /// Maneuver text, used only when no maneuver text is known
    Oneliner,
    /// `destination - eta`; the ETA is used only when none is known
    LockscreenEta,
}

/// Text roles in the order they are applied, with the entry names feeding each
pub const FIELD_PRIORITY: &[(FieldRole, &[&str])] = &[
    (FieldRole::Title, &["nav_title"]),
    (FieldRole::Description, &["nav_description"]),
    (FieldRole::TimeLine, &["nav_time", "header_text"]),
    (FieldRole::Directions, &["lockscreen_directions", "title"]),
    (FieldRole::Oneliner, &["lockscreen_oneliner"]),
    (FieldRole::LockscreenEta, &["lockscreen_eta", "text"]),
];

const PRIMARY_ICONS: &[&str] = &["nav_notification_icon", "right_icon"];
const FALLBACK_ICONS: &[&str] = &["lockscreen_notification_icon"];
const STOP_BUTTONS: &[&str] = &["dismiss_nav", "action0"];

/// Builds `NavigationData` from raw notification fields
#[derive(Debug, Clone, Default)]
pub struct NotificationLayout {
    parser: NavigationTextParser,
}

impl NotificationLayout {
    pub fn new(parser: NavigationTextParser) -> Self {
        Self { parser }
    }

    pub fn parser(&self) -> &NavigationTextParser {
        &self.parser
    }

    /// Extract navigation state. The result may be invalid; check `is_valid`.
    pub fn extract(&self, raw: &RawNotification) -> NavigationData {
        let mut data = NavigationData {
            post_time: raw.post_time,
            ..Default::default()
        };

        for (role, names) in FIELD_PRIORITY {
            let first = raw.fields.iter().find_map(|field| match &field.content {
                FieldContent::Text { text, rich_text } if field.entry_in(names) => {
                    Some((text.as_str(), rich_text.as_deref()))
                }
                _ => None,
            });

            if let Some((text, rich_text)) = first {
                trace!("Entry for {:?} is {}", role, text);
                self.apply_text(&mut data, *role, text, rich_text);
            }
        }

        data.icon = NavigationIcon {
            image: find_image(raw, PRIMARY_ICONS).or_else(|| find_image(raw, FALLBACK_ICONS)),
        };

        data.can_stop = raw
            .fields
            .iter()
            .any(|field| matches!(field.content, FieldContent::Button) && field.entry_in(STOP_BUTTONS));

        if data.is_valid() {
            debug!("Parsing completed: {:?}", data);
        } else {
            warn!("Invalid navigation data: {:?}", data);
        }
        data
    }

    fn apply_text(&self, data: &mut NavigationData, role: FieldRole, text: &str, rich_text: Option<&str>) {
        match role {
            FieldRole::Title => {
                data.next_direction.distance = self.parser.parse_title(text).distance;
            }
            FieldRole::Description => self.apply_description(data, text, rich_text),
            FieldRole::TimeLine => match self.parser.parse_time_line(text) {
                Ok((remaining, eta)) => {
                    data.remaining_distance = remaining;
                    data.eta = eta;
                }
                Err(e) => {
                    warn!("Keeping raw navigation time: {}", e);
                    data.eta.display_text = Some(text.to_string());
                }
            },
            FieldRole::Directions => {
                if data.next_direction.display_text.is_none() {
                    match self.parser.parse_directions_line(text, rich_text) {
                        Directions::Maneuver(direction) => data.next_direction = direction,
                        Directions::Rerouting(line) => {
                            data.is_rerouting = true;
                            data.next_direction.display_text = Some(line);
                        }
                    }
                }
            }
            FieldRole::Oneliner => {
                if data.next_direction.display_text.is_none() {
                    self.apply_description(data, text, rich_text);
                }
            }
            FieldRole::LockscreenEta => {
                if let Some((destination, eta)) = self.parser.parse_lockscreen_eta(text) {
                    data.final_destination_text = Some(destination);
                    if data.eta.display_text.is_none() {
                        data.eta = eta;
                    }
                }
            }
        }
    }

    fn apply_description(&self, data: &mut NavigationData, text: &str, rich_text: Option<&str>) {
        match self.parser.parse_description(text, rich_text) {
            (Some(display_text), rich_text) => {
                data.next_direction.display_text = Some(display_text);
                data.next_direction.rich_text = rich_text;
            }
            (None, _) => data.is_rerouting = true,
        }
    }
}

fn find_image(raw: &RawNotification, names: &[&str]) -> Option<Image> {
    raw.fields.iter().find_map(|field| match &field.content {
        FieldContent::Image { image } if field.entry_in(names) => Some(image.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::Locale;
    use crate::model::DistanceUnit;
    use chrono::NaiveTime;
    use image::{Rgba, RgbaImage};

    fn layout() -> NotificationLayout {
        NotificationLayout::new(NavigationTextParser::new(Locale::english()))
    }

    fn solid(color: [u8; 4]) -> Image {
        Image::new(RgbaImage::from_pixel(2, 2, Rgba(color)))
    }

    fn expanded() -> RawNotification {
        RawNotification {
            fields: vec![
                NotificationField::text("nav_title", "300 m"),
                NotificationField::text("nav_description", "Turn left onto Main St"),
                NotificationField::text("nav_time", "5 min - 2.3 km - 14:32"),
                NotificationField::button("dismiss_nav"),
            ],
            post_time: Timestamp(42),
        }
    }

    #[test]
    fn test_expanded_layout() {
        let data = layout().extract(&expanded());

        assert!(data.is_valid());
        assert!(data.can_stop);
        assert!(!data.is_rerouting);
        assert_eq!(data.post_time, Timestamp(42));
        assert_eq!(
            data.next_direction.display_text.as_deref(),
            Some("Turn left onto Main St")
        );
        assert_eq!(data.next_direction.distance.unwrap().unit, DistanceUnit::M);
        assert_eq!(data.remaining_distance.magnitude, 2.3);
        assert_eq!(data.eta.time_of_day, NaiveTime::from_hms_opt(14, 32, 0));
        assert_eq!(data.eta.duration.unwrap().seconds(), 300);
    }

    #[test]
    fn test_description_beats_directions_regardless_of_order() {
        let mut raw = expanded();
        raw.fields.insert(
            0,
            NotificationField::text("lockscreen_directions", "1 km - Keep right"),
        );

        let data = layout().extract(&raw);
        assert_eq!(
            data.next_direction.display_text.as_deref(),
            Some("Turn left onto Main St")
        );
    }

    #[test]
    fn test_lockscreen_layout() {
        let raw = RawNotification {
            fields: vec![
                NotificationField::text("lockscreen_directions", "300 m - Turn right"),
                NotificationField::text("lockscreen_eta", "Home - 18:05 ETA"),
                NotificationField::text("header_text", "12 min - 4 km - 18:05"),
            ],
            post_time: Timestamp(1),
        };

        let data = layout().extract(&raw);
        assert!(data.is_valid());
        assert_eq!(data.final_destination_text.as_deref(), Some("Home"));
        assert_eq!(data.eta.display_text.as_deref(), Some("18:05"));
        assert_eq!(data.eta.duration.unwrap().seconds(), 720);
        assert_eq!(data.next_direction.display_text.as_deref(), Some("Turn right"));
    }

    #[test]
    fn test_rerouting_directions() {
        let raw = RawNotification {
            fields: vec![NotificationField::text("title", "Rerouting...")],
            post_time: Timestamp(1),
        };

        let data = layout().extract(&raw);
        assert!(data.is_rerouting);
        assert!(data.is_valid());
        assert_eq!(data.next_direction.display_text.as_deref(), Some("Rerouting..."));
    }

    #[test]
    fn test_first_field_wins_within_role() {
        let raw = RawNotification {
            fields: vec![
                NotificationField::text("nav_time", "5 min - 2.3 km - 14:32"),
                NotificationField::text("header_text", "9 min - 7 km - 15:00"),
            ],
            post_time: Timestamp(1),
        };

        let data = layout().extract(&raw);
        assert_eq!(data.remaining_distance.magnitude, 2.3);
    }

    #[test]
    fn test_bad_time_line_keeps_raw_text() {
        let raw = RawNotification {
            fields: vec![NotificationField::text("nav_time", "Arriving soon")],
            post_time: Timestamp(1),
        };

        let data = layout().extract(&raw);
        assert_eq!(data.eta.display_text.as_deref(), Some("Arriving soon"));
        assert!(!data.is_valid());
    }

    #[test]
    fn test_icon_precedence() {
        let red = solid([255, 0, 0, 255]);
        let blue = solid([0, 0, 255, 255]);
        let raw = RawNotification {
            fields: vec![
                NotificationField::image("lockscreen_notification_icon", red.clone()),
                NotificationField::image("right_icon", blue.clone()),
            ],
            post_time: Timestamp(1),
        };
        assert_eq!(layout().extract(&raw).icon.image, Some(blue));

        let raw = RawNotification {
            fields: vec![NotificationField::image("lockscreen_notification_icon", red.clone())],
            post_time: Timestamp(1),
        };
        assert_eq!(layout().extract(&raw).icon.image, Some(red));
    }

    #[test]
    fn test_unrelated_button_does_not_enable_stop() {
        let raw = RawNotification {
            fields: vec![NotificationField::button("open_app")],
            post_time: Timestamp(1),
        };
        assert!(!layout().extract(&raw).can_stop);
    }

    #[test]
    fn test_raw_notification_json() {
        let json = r#"{
            "postTime": 1700000000000,
            "fields": [
                {"entry": "nav_title", "kind": "text", "text": "300 m"},
                {"entry": "dismiss_nav", "kind": "button"}
            ]
        }"#;
        let raw: RawNotification = serde_json::from_str(json).unwrap();
        assert_eq!(raw.fields.len(), 2);
        assert_eq!(raw.fields[1], NotificationField::button("dismiss_nav"));
    }
}
