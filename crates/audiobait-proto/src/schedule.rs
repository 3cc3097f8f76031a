//! In-memory schedule model: combos, day-cycle parameters, JSON
//! (de)serialisation matching the server's lowerCamel wire shape, and
//! referenced-id extraction for the downloader.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::time_of_day::TimeOfDay;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combo {
    pub from: TimeOfDay,
    pub until: TimeOfDay,
    pub every: i64,
    pub waits: Vec<i64>,
    pub volumes: Vec<i32>,
    pub sounds: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl Combo {
    /// Returns the numeric file ids this combo can ever reference, ignoring
    /// `"random"`/`"same"`/unparsable tokens.
    fn numeric_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.sounds.iter().filter_map(|s| s.parse::<i64>().ok())
    }

    fn mentions_random(&self) -> bool {
        self.sounds.iter().any(|s| s == "random")
    }

    pub fn every_seconds(&self) -> i64 {
        self.every.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub description: String,
    #[serde(rename = "controlNights", default)]
    pub control_nights: i64,
    #[serde(rename = "playNights", default)]
    pub play_nights: i64,
    #[serde(rename = "startDay", default)]
    pub start_day: i64,
    #[serde(default)]
    pub combos: Vec<Combo>,
    #[serde(rename = "allsounds", default)]
    pub all_sounds: Vec<i64>,
}

/// The server wraps a schedule under a `"schedule"` key; accept both that
/// shape and a bare `Schedule` document.
#[derive(Deserialize)]
struct Wrapped {
    schedule: Schedule,
}

impl Schedule {
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if let Ok(wrapped) = serde_json::from_slice::<Wrapped>(bytes) {
            return Ok(wrapped.schedule);
        }
        serde_json::from_slice::<Schedule>(bytes)
    }

    /// Canonical JSON bytes, used both for the on-disk representation and
    /// for schedule equality.
    pub fn canonical_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Schedule always serialises")
    }

    /// Unique ids referenced by any combo; if any combo mentions `"random"`
    /// the full `all_sounds` list is returned verbatim (server order kept).
    pub fn referenced_sounds(&self) -> Vec<i64> {
        if self.combos.iter().any(Combo::mentions_random) {
            return self.all_sounds.clone();
        }
        let set: BTreeSet<i64> = self.combos.iter().flat_map(Combo::numeric_ids).collect();
        set.into_iter().collect()
    }

    pub fn cycle_length(&self) -> i64 {
        (self.play_nights + self.control_nights).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_combo(sounds: Vec<&str>) -> Combo {
        Combo {
            from: TimeOfDay::new(12, 0).unwrap(),
            until: TimeOfDay::new(13, 0).unwrap(),
            every: 1800,
            waits: vec![0; sounds.len()],
            volumes: vec![10; sounds.len()],
            sounds: sounds.into_iter().map(str::to_string).collect(),
            trigger: None,
        }
    }

    #[test]
    fn parses_wrapped_payload() {
        let json = br#"{"schedule":{"description":"d","controlNights":1,"playNights":2,"startDay":3,"combos":[],"allsounds":[1,2]}}"#;
        let s = Schedule::parse(json).unwrap();
        assert_eq!(s.control_nights, 1);
        assert_eq!(s.play_nights, 2);
        assert_eq!(s.start_day, 3);
    }

    #[test]
    fn parses_bare_payload() {
        let json = br#"{"description":"d","controlNights":0,"playNights":0,"startDay":0,"combos":[],"allsounds":[]}"#;
        let s = Schedule::parse(json).unwrap();
        assert_eq!(s.control_nights, 0);
    }

    #[test]
    fn referenced_sounds_uses_all_sounds_when_random_present() {
        let s = Schedule {
            description: String::new(),
            control_nights: 0,
            play_nights: 0,
            start_day: 0,
            combos: vec![sample_combo(vec!["random", "5"])],
            all_sounds: vec![9, 3, 3, 1],
        };
        assert_eq!(s.referenced_sounds(), vec![9, 3, 3, 1]);
    }

    #[test]
    fn referenced_sounds_collects_numeric_ids_without_random() {
        let s = Schedule {
            description: String::new(),
            control_nights: 0,
            play_nights: 0,
            start_day: 0,
            combos: vec![sample_combo(vec!["same", "7", "3", "7"])],
            all_sounds: vec![],
        };
        assert_eq!(s.referenced_sounds(), vec![3, 7]);
    }

    #[test]
    fn cycle_length_is_at_least_one() {
        let s = Schedule {
            description: String::new(),
            control_nights: 0,
            play_nights: 0,
            start_day: 0,
            combos: vec![],
            all_sounds: vec![],
        };
        assert_eq!(s.cycle_length(), 1);
    }

    #[test]
    fn round_trip_through_canonical_json() {
        let s = Schedule {
            description: "d".into(),
            control_nights: 5,
            play_nights: 2,
            start_day: 3,
            combos: vec![sample_combo(vec!["1", "random"])],
            all_sounds: vec![1, 2, 3],
        };
        let bytes = s.canonical_json();
        let parsed = Schedule::parse(&bytes).unwrap();
        assert_eq!(parsed, s);
    }

    #[test]
    fn equality_is_by_canonical_json() {
        let a = Schedule {
            description: "d".into(),
            control_nights: 0,
            play_nights: 0,
            start_day: 0,
            combos: vec![],
            all_sounds: vec![],
        };
        let b = a.clone();
        assert_eq!(a.canonical_json(), b.canonical_json());
    }
}
