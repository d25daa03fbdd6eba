// Icon identifiers a widget or field may carry
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of icons the renderer knows how to draw.
///
/// Identifiers the renderer does not recognise decode to [`Icon::Generic`]
/// instead of failing the whole widget definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Icon {
    Person,
    Car,
    Truck,
    Bus,
    Bicycle,
    Motorcycle,
    Animal,
    Bag,
    Face,
    Counter,
    #[default]
    #[serde(other)]
    Generic,
}

impl Icon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Icon::Person => "person",
            Icon::Car => "car",
            Icon::Truck => "truck",
            Icon::Bus => "bus",
            Icon::Bicycle => "bicycle",
            Icon::Motorcycle => "motorcycle",
            Icon::Animal => "animal",
            Icon::Bag => "bag",
            Icon::Face => "face",
            Icon::Counter => "counter",
            Icon::Generic => "generic",
        }
    }

    /// Best guess for a counting rule, e.g. "person_in" -> Person.
    pub fn for_rule(rule: &str) -> Self {
        let rule = rule.to_ascii_lowercase();
        [
            ("person", Icon::Person),
            ("people", Icon::Person),
            ("car", Icon::Car),
            ("truck", Icon::Truck),
            ("bus", Icon::Bus),
            ("bicycle", Icon::Bicycle),
            ("bike", Icon::Bicycle),
            ("motorcycle", Icon::Motorcycle),
            ("animal", Icon::Animal),
            ("bag", Icon::Bag),
            ("face", Icon::Face),
        ]
        .into_iter()
        .find(|(needle, _)| rule.contains(needle))
        .map(|(_, icon)| icon)
        .unwrap_or_default()
    }
}

impl fmt::Display for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
