//! Observable mixer state.

use std::collections::BTreeSet;

use serde::Serialize;

/// Why a track failed to become active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Network or storage error while fetching the file.
    DownloadFailed,
    /// The decoder rejected the cached file.
    PlaybackOpenFailed,
    /// Download plus open did not finish within the load timeout.
    TimedOut,
}

/// A failed activation, carried on the snapshot published for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackFailure {
    pub id: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Point-in-time view of the mixer delivered to observers.
///
/// `playing` and `loading` are sorted and disjoint. `last_error` is only set on
/// the snapshot published by the transition that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixerSnapshot {
    pub is_active: bool,
    pub is_paused: bool,
    pub playing: Vec<String>,
    pub loading: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<TrackFailure>,
}

impl MixerSnapshot {
    /// Union of loading and playing ids.
    pub fn active_ids(&self) -> BTreeSet<String> {
        self.playing
            .iter()
            .chain(self.loading.iter())
            .cloned()
            .collect()
    }

    /// Returns true if `id` is loading or playing.
    pub fn contains(&self, id: &str) -> bool {
        self.playing.iter().any(|p| p == id) || self.loading.iter().any(|l| l == id)
    }

    /// Same snapshot without the transient error.
    pub fn without_error(&self) -> Self {
        Self {
            last_error: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case_and_omits_missing_error() {
        let snapshot = MixerSnapshot {
            is_active: true,
            is_paused: false,
            playing: vec!["rain".into()],
            loading: vec!["wind".into()],
            last_error: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "isActive": true,
                "isPaused": false,
                "playing": ["rain"],
                "loading": ["wind"],
            })
        );
    }

    #[test]
    fn serializes_failure_kind() {
        let snapshot = MixerSnapshot {
            last_error: Some(TrackFailure {
                id: "rain".into(),
                kind: FailureKind::PlaybackOpenFailed,
                message: "bad file".into(),
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["lastError"]["kind"], "playbackOpenFailed");
        assert!(snapshot.without_error().last_error.is_none());
    }

    #[test]
    fn active_ids_is_union() {
        let snapshot = MixerSnapshot {
            is_active: true,
            playing: vec!["rain".into()],
            loading: vec!["wind".into()],
            ..Default::default()
        };
        let ids: Vec<_> = snapshot.active_ids().into_iter().collect();
        assert_eq!(ids, vec!["rain", "wind"]);
        assert!(snapshot.contains("wind"));
        assert!(!snapshot.contains("fire"));
    }
}
