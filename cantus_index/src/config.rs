// Analysis configuration loaded from JSON.
//
// Groups the typed settings of every indexer plus the execution mode, so a
// whole pipeline run can be described in one file:
//
//   {
//     "execution": { "mode": "parallel", "workers": 4 },
//     "horizontal": { "horiz_attach_later": true },
//     "dissonance": { "special_P4": true, "special_d5": false },
//     "ngram": { "n": 3 },
//     "measures": true
//   }
//
// Every section and every key is optional; missing ones take the documented
// defaults and unknown keys are ignored. A value of the wrong type is a
// `Config` error. The vertical interval settings default to the form the
// dissonance indexers need (simple, with quality, directed), not to the
// general-purpose interval defaults.
//
// The dissonance chain always runs. `active_voices` and `ngram` add their
// stage when the section is present (`{}` takes that stage's defaults), and
// `durations` and `measures` switch on the per-event rhythm tables. N-grams
// read intervals rendered with `ngram_intervals`, which defaults to the
// general-purpose form (compound, no quality, directed).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::active_voices::ActiveVoicesSettings;
use crate::dissonance::DissonanceSettings;
use crate::error::IndexResult;
use crate::exec::Execution;
use crate::interval::{HorizontalSettings, IntervalSettings};
use crate::ngram::NGramSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub execution: Execution,
    pub vertical: IntervalSettings,
    pub horizontal: HorizontalSettings,
    pub dissonance: DissonanceSettings,
    pub active_voices: Option<ActiveVoicesSettings>,
    pub ngram: Option<NGramSettings>,
    pub ngram_intervals: IntervalSettings,
    pub durations: bool,
    pub measures: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            execution: Execution::Serial,
            vertical: IntervalSettings::for_dissonance(),
            horizontal: HorizontalSettings::default(),
            dissonance: DissonanceSettings::default(),
            active_voices: None,
            ngram: None,
            ngram_intervals: IntervalSettings::default(),
            durations: false,
            measures: false,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> IndexResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let json = std::fs::read_to_string(path)?;
        AnalysisConfig::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use crate::interval::IntervalSpan;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = AnalysisConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.vertical.span, IntervalSpan::Simple);
        assert!(config.vertical.quality);
        assert!(config.horizontal.attach_later);
        assert_eq!(config.active_voices, None);
        assert_eq!(config.ngram, None);
        assert!(!config.ngram_intervals.quality);
        assert!(!config.durations && !config.measures);
    }

    #[test]
    fn test_empty_section_enables_stage_with_defaults() {
        let config = AnalysisConfig::from_json_str(
            r#"{ "active_voices": {}, "ngram": null, "durations": true }"#,
        )
        .unwrap();
        assert_eq!(config.active_voices, Some(ActiveVoicesSettings::default()));
        assert_eq!(config.ngram, None);
        assert!(config.durations);
    }

    #[test]
    fn test_documented_keys() {
        let config = AnalysisConfig::from_json_str(
            r#"{
                "execution": { "mode": "parallel", "workers": 4 },
                "vertical": { "simple or compound": "compound", "quality": true },
                "horizontal": { "horiz_attach_later": false, "directed": false },
                "dissonance": { "special_d5": false },
                "active_voices": { "attacked": true },
                "ngram": { "n": 3, "continuer": "P1", "mark_singles": true },
                "ngram_intervals": { "simple or compound": "simple" },
                "measures": true,
                "plotting": "ignored"
            }"#,
        )
        .unwrap();
        assert_eq!(config.execution, Execution::parallel(4));
        assert_eq!(config.vertical.span, IntervalSpan::Compound);
        assert!(config.vertical.directed);
        assert!(!config.horizontal.attach_later);
        assert!(!config.horizontal.interval.directed);
        assert!(config.dissonance.special_fourths);
        assert!(!config.dissonance.special_fifths);
        let active_voices = config.active_voices.unwrap();
        assert!(active_voices.attacked);
        assert!(!active_voices.show_all);
        let ngram = config.ngram.clone().unwrap();
        assert_eq!(ngram.n, 3);
        assert_eq!(ngram.continuer, "P1");
        assert!(ngram.mark_singles);
        assert_eq!(config.ngram_intervals.span, IntervalSpan::Simple);
        assert!(config.measures);
        assert!(!config.durations);
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let err = AnalysisConfig::from_json_str(r#"{ "ngram": { "n": "three" } }"#).unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = AnalysisConfig {
            execution: Execution::parallel(2),
            ngram: Some(NGramSettings::default()),
            measures: true,
            ..AnalysisConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(AnalysisConfig::from_json_str(&json).unwrap(), config);
    }
}
