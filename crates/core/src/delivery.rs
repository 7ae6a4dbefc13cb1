use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The fixed delivery-method set. Each method carries an ordered schema of
/// `label: value` fields the buyer must supply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Shuttle,
    EuroPost,
    BelPost,
    Pickup,
}

pub const ALL_METHODS: [DeliveryMethod; 4] = [
    DeliveryMethod::Shuttle,
    DeliveryMethod::EuroPost,
    DeliveryMethod::BelPost,
    DeliveryMethod::Pickup,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub label: &'static str,
    pub required: bool,
}

const fn required(label: &'static str) -> FieldSpec {
    FieldSpec { label, required: true }
}

const fn optional(label: &'static str) -> FieldSpec {
    FieldSpec { label, required: false }
}

const POSTAL_FIELDS: [FieldSpec; 5] = [
    required("Full name"),
    required("Phone"),
    required("Address"),
    required("Postal index"),
    required("Branch"),
];

const SHUTTLE_FIELDS: [FieldSpec; 4] =
    [required("Name"), required("Phone"), optional("City"), required("Preferred time")];

const PICKUP_FIELDS: [FieldSpec; 3] =
    [required("Name"), required("Phone"), required("Preferred time")];

impl DeliveryMethod {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Shuttle => "🚐 Shuttle",
            Self::EuroPost => "📮 EuroPost",
            Self::BelPost => "📫 BelPost",
            Self::Pickup => "🏃 Pickup",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Self::Shuttle => "Dispatched on the day of order",
            Self::EuroPost => "Delivery in 1-3 days",
            Self::BelPost => "Delivery in 2-5 days",
            Self::Pickup => "Free, in town",
        }
    }

    pub fn details(&self) -> &'static str {
        match self {
            Self::Shuttle => {
                "• Dispatched on the day of order\n• Fast delivery\n• Pick a convenient time\n• Payment on receipt\n• Inspect the goods on the spot"
            }
            Self::EuroPost => {
                "• Nationwide delivery\n• Payment on receipt\n• Delivery in 1-3 days\n• Required details:\n  - Recipient full name\n  - Phone number\n  - Full address with postal index\n  - EuroPost branch number"
            }
            Self::BelPost => {
                "• Nationwide delivery\n• Payment on receipt\n• Delivery in 2-5 days\n• Required details:\n  - Recipient full name\n  - Phone number\n  - Full address with postal index\n  - BelPost branch number"
            }
            Self::Pickup => {
                "• No extra charge\n• Any convenient time\n• Inspect the goods on the spot\n• Phone number and preferred time required"
            }
        }
    }

    pub fn from_label(text: &str) -> Option<Self> {
        ALL_METHODS.into_iter().find(|method| method.label() == text)
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::EuroPost | Self::BelPost => &POSTAL_FIELDS,
            Self::Shuttle => &SHUTTLE_FIELDS,
            Self::Pickup => &PICKUP_FIELDS,
        }
    }

    pub fn example(&self) -> &'static str {
        match self {
            Self::EuroPost => {
                "Full name: Ivan Ivanov\nPhone: +375291234567\nAddress: 5 Pushkin St, apt 10, Minsk\nPostal index: 220000\nBranch: EuroPost #15 (23 Lenin St)"
            }
            Self::BelPost => {
                "Full name: Ivan Ivanov\nPhone: +375291234567\nAddress: 5 Pushkin St, apt 10, Minsk\nPostal index: 220000\nBranch: BelPost #12 (15 Sovetskaya St)"
            }
            Self::Shuttle => {
                "Name: Ivan\nPhone: +375291234567\nCity: Minsk\nPreferred time: 14:00"
            }
            Self::Pickup => "Name: Ivan\nPhone: +375291234567\nPreferred time: 16:30",
        }
    }
}

/// Parses newline-delimited `label: value` pairs into a map. Lines without a
/// colon are ignored; labels and values are trimmed.
pub fn parse_details(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in text.lines() {
        if let Some((label, value)) = line.split_once(':') {
            fields.insert(label.trim().to_string(), value.trim().to_string());
        }
    }
    fields
}

/// Diffs the supplied details against the method's schema and returns the
/// required labels that are missing or empty, in schema order.
pub fn missing_fields(method: DeliveryMethod, text: &str) -> Vec<&'static str> {
    let supplied = parse_details(text);
    method
        .fields()
        .iter()
        .filter(|spec| {
            spec.required && supplied.get(spec.label).map_or(true, |value| value.is_empty())
        })
        .map(|spec| spec.label)
        .collect()
}

/// Blank `label:` lines the buyer copies and fills in.
pub fn entry_template(method: DeliveryMethod) -> String {
    method
        .fields()
        .iter()
        .map(|spec| format!("{}: ", spec.label))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{entry_template, missing_fields, parse_details, DeliveryMethod, ALL_METHODS};

    #[test]
    fn labels_round_trip_through_lookup() {
        for method in ALL_METHODS {
            assert_eq!(DeliveryMethod::from_label(method.label()), Some(method));
        }
        assert_eq!(DeliveryMethod::from_label("carrier pigeon"), None);
    }

    #[test]
    fn parse_splits_on_the_first_colon_only() {
        let fields = parse_details("Phone: +375:29:1234567\nnot a field line");

        assert_eq!(fields.get("Phone").map(String::as_str), Some("+375:29:1234567"));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn complete_postal_details_pass_validation() {
        let text = DeliveryMethod::EuroPost.example();
        assert!(missing_fields(DeliveryMethod::EuroPost, text).is_empty());
    }

    #[test]
    fn empty_phone_is_reported_as_missing() {
        let text = "Full name: Ivan Ivanov\nPhone:\nAddress: 5 Pushkin St\nPostal index: 220000\nBranch: #15";

        assert_eq!(missing_fields(DeliveryMethod::BelPost, text), vec!["Phone"]);
    }

    #[test]
    fn absent_fields_are_reported_in_schema_order() {
        let missing = missing_fields(DeliveryMethod::EuroPost, "Full name: Ivan Ivanov");

        assert_eq!(missing, vec!["Phone", "Address", "Postal index", "Branch"]);
    }

    #[test]
    fn optional_shuttle_city_does_not_fail_validation() {
        let text = "Name: Ivan\nPhone: +375291234567\nPreferred time: 14:00";

        assert!(missing_fields(DeliveryMethod::Shuttle, text).is_empty());
    }

    #[test]
    fn entry_template_lists_all_schema_labels() {
        let template = entry_template(DeliveryMethod::Shuttle);

        assert_eq!(template, "Name: \nPhone: \nCity: \nPreferred time: ");
    }
}
