//! Weather icons keyed by condition text.

/// Checked in order; the first condition substring found wins.
const ICONS: [(&str, &str); 6] = [
    ("Sunny", "☀️"),
    ("Cloudy", "☁️"),
    ("Rainy", "🌧️"),
    ("Stormy", "⛈️"),
    ("Snowy", "❄️"),
    ("Windy", "💨"),
];

pub const UNKNOWN_ICON: &str = "❓";

/// Icon for a condition. Matching is case-sensitive.
pub fn condition_icon(condition: &str) -> &'static str {
    ICONS
        .iter()
        .find(|(name, _)| condition.contains(name))
        .map(|(_, icon)| *icon)
        .unwrap_or(UNKNOWN_ICON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_condition() {
        assert_eq!(condition_icon("Sunny"), "☀️");
        assert_eq!(condition_icon("Cloudy"), "☁️");
        assert_eq!(condition_icon("Rainy"), "🌧️");
        assert_eq!(condition_icon("Stormy"), "⛈️");
        assert_eq!(condition_icon("Snowy"), "❄️");
        assert_eq!(condition_icon("Windy"), "💨");
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(condition_icon("Rainy then Sunny"), "☀️");
        assert_eq!(condition_icon("Windy, Snowy later"), "❄️");
        assert_eq!(condition_icon("Mostly Cloudy"), "☁️");
    }

    #[test]
    fn test_unknown_and_case_sensitive() {
        assert_eq!(condition_icon("Foggy"), UNKNOWN_ICON);
        assert_eq!(condition_icon("sunny"), UNKNOWN_ICON);
        assert_eq!(condition_icon(""), UNKNOWN_ICON);
    }
}
