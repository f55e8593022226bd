use std::collections::HashSet;

/// Trims and collapses internal whitespace.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "  barbell   back squat" -> "Barbell Back Squat"
pub fn normalize_exercise_name(name: &str) -> String {
    collapse_whitespace(name)
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Lowercased, whitespace-collapsed, blank-free and deduplicated in first-seen order.
pub fn normalize_muscle_groups(groups: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    groups
        .iter()
        .map(|group| collapse_whitespace(group).to_lowercase())
        .filter(|group| !group.is_empty())
        .filter(|group| seen.insert(group.clone()))
        .collect()
}

pub fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exercise_name_normalization() {
        assert_eq!(normalize_exercise_name("  barbell   back SQUAT "), "Barbell Back Squat");
        assert_eq!(normalize_exercise_name("push-up"), "Push-up");
        assert_eq!(normalize_exercise_name(""), "");
    }

    #[test]
    fn test_muscle_group_normalization() {
        let groups = vec![
            "Quads".to_string(),
            " glutes ".to_string(),
            "QUADS".to_string(),
            "  ".to_string(),
            "lower   back".to_string(),
        ];
        assert_eq!(
            normalize_muscle_groups(&groups),
            vec!["quads".to_string(), "glutes".to_string(), "lower back".to_string()]
        );
    }

    #[test]
    fn test_notes_normalization() {
        assert_eq!(normalize_notes(Some("  slow eccentric ")), Some("slow eccentric".to_string()));
        assert_eq!(normalize_notes(Some("   ")), None);
        assert_eq!(normalize_notes(None), None);
    }
}
