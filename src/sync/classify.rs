/// Category tags attached to ingested entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Relief,
    Absent,
    Event,
    VenueChange,
    DutyRoster,
    General,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Relief => "RELIEF",
            Tag::Absent => "ABSENT",
            Tag::Event => "EVENT",
            Tag::VenueChange => "VENUE_CHANGE",
            Tag::DutyRoster => "DUTY_ROSTER",
            Tag::General => "GENERAL",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assigns a category to a file based on where it lives and what it is called.
pub trait Classify: Send + Sync {
    fn classify(&self, folder_name: &str, file_name: &str) -> Tag;
}

/// Keyword matcher. The folder name is authoritative; the file name only
/// decides when the folder name matches nothing.
#[derive(Debug, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    fn match_keywords(name: &str) -> Option<Tag> {
        let lower = name.to_lowercase();
        if lower.contains("relief") {
            Some(Tag::Relief)
        } else if lower.contains("absent") {
            Some(Tag::Absent)
        } else if lower.contains("event") || lower.contains("bulletin") {
            Some(Tag::Event)
        } else if lower.contains("venue") || lower.contains("room") {
            Some(Tag::VenueChange)
        } else if lower.contains("duty") || lower.contains("roster") {
            Some(Tag::DutyRoster)
        } else if lower.contains("student") || lower.contains("movement") {
            Some(Tag::General)
        } else {
            None
        }
    }
}

impl Classify for HeuristicClassifier {
    fn classify(&self, folder_name: &str, file_name: &str) -> Tag {
        Self::match_keywords(folder_name)
            .or_else(|| Self::match_keywords(file_name))
            .unwrap_or(Tag::General)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_name_wins_over_file_name() {
        let c = HeuristicClassifier;
        assert_eq!(c.classify("Relief Teachers", "event_list.pdf"), Tag::Relief);
        assert_eq!(c.classify("Absent Staff", "anything.xlsx"), Tag::Absent);
    }

    #[test]
    fn file_name_used_when_folder_is_neutral() {
        let c = HeuristicClassifier;
        assert_eq!(c.classify("Uploads", "duty_roster_monday.pdf"), Tag::DutyRoster);
        assert_eq!(c.classify("Uploads", "venue swap.docx"), Tag::VenueChange);
        assert_eq!(c.classify("Uploads", "daily bulletin.pdf"), Tag::Event);
    }

    #[test]
    fn unmatched_defaults_to_general() {
        let c = HeuristicClassifier;
        assert_eq!(c.classify("Misc", "notes.txt"), Tag::General);
    }

    #[test]
    fn matching_ignores_case() {
        let c = HeuristicClassifier;
        assert_eq!(c.classify("RELIEF", "x"), Tag::Relief);
        assert_eq!(c.classify("x", "Student Movement.pdf"), Tag::General);
    }
}
