//! End-of-session analytics.
//!
//! The builder accumulates repetition events during the session and turns them,
//! together with the patient's subjective feedback, into a [`SessionSummary`].
//! Building never mutates the builder, so a summary can be rebuilt after a
//! failed hand-off and comes out identical.

use rehab_core::{Error, Result, SessionId, Timestamp};
use rehab_motion::RepEvent;
use serde::{Deserialize, Serialize};

pub const RECOMMEND_REDUCE_INTENSITY: &str =
    "Consider reducing intensity or taking more rest between sessions";
pub const RECOMMEND_PRACTICE_FORM: &str = "Practice basic form before increasing reps";
pub const RECOMMEND_FULL_RANGE: &str = "Focus on completing full range of motion for each rep";
pub const RECOMMEND_MAINTAIN: &str = "Excellent session! Continue with current routine";

const SCALE_MIN: u8 = 1;
const SCALE_MAX: u8 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Pain above this level recommends reducing intensity
    pub pain_threshold: u8,
    /// Quality below this score recommends reducing intensity
    pub quality_threshold: u8,
    /// Difficulty above this level recommends practising form
    pub difficulty_threshold: u8,
    /// Completed/target ratio below which full range of motion is recommended
    pub completion_ratio: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            pain_threshold: 6,
            quality_threshold: 70,
            difficulty_threshold: 7,
            completion_ratio: 0.8,
        }
    }
}

impl SummaryConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.completion_ratio) {
            return Err(Error::Config(format!(
                "summary.completion_ratio must be within [0, 1], got {}",
                self.completion_ratio
            )));
        }
        Ok(())
    }
}

/// Patient-reported feedback collected after the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectiveFeedback {
    /// 1 (none) to 10 (severe)
    pub pain_level: u8,
    /// 1 (easy) to 10 (very hard)
    pub difficulty: u8,
    #[serde(default)]
    pub notes: String,
}

impl SubjectiveFeedback {
    pub fn new(pain_level: u8, difficulty: u8, notes: &str) -> Self {
        Self {
            pain_level,
            difficulty,
            notes: notes.to_string(),
        }
    }

    /// Copy with both scales clamped into 1..=10
    pub fn clamped(&self) -> Self {
        Self {
            pain_level: clamp_scale("pain_level", self.pain_level),
            difficulty: clamp_scale("difficulty", self.difficulty),
            notes: self.notes.clone(),
        }
    }
}

fn clamp_scale(field: &str, value: u8) -> u8 {
    let clamped = value.clamp(SCALE_MIN, SCALE_MAX);
    if clamped != value {
        tracing::warn!(field, value, clamped, "Subjective feedback out of range, clamped");
    }
    clamped
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub exercise: String,
    pub total_reps: u32,
    pub target_reps: u32,
    pub completion_percentage: f64,
    pub average_pain_level: f64,
    pub average_difficulty: f64,
    pub notes: String,
    pub form_improvements: Vec<String>,
    /// Percentage of repetitions counted with good form
    pub average_form_score: f64,
    pub session_quality: u8,
    pub recommendations: Vec<String>,
    pub session_duration_ms: i64,
}

/// Accumulates repetition events for one session
#[derive(Debug, Clone)]
pub struct SessionSummaryBuilder {
    session_id: SessionId,
    exercise: String,
    target_reps: u32,
    config: SummaryConfig,
    reps: Vec<RepEvent>,
    first_frame: Option<Timestamp>,
    last_frame: Option<Timestamp>,
}

impl SessionSummaryBuilder {
    pub fn new(session_id: SessionId, exercise: &str, target_reps: u32, config: SummaryConfig) -> Self {
        Self {
            session_id,
            exercise: exercise.to_string(),
            target_reps,
            config,
            reps: Vec::new(),
            first_frame: None,
            last_frame: None,
        }
    }

    /// Extend the session time span to include a processed frame
    pub fn observe_frame(&mut self, timestamp: Timestamp) {
        self.first_frame.get_or_insert(timestamp);
        self.last_frame = Some(timestamp);
    }

    pub fn record(&mut self, rep: RepEvent) {
        self.reps.push(rep);
    }

    pub fn reps(&self) -> &[RepEvent] {
        &self.reps
    }

    pub fn build(&self, feedback: &SubjectiveFeedback) -> SessionSummary {
        let feedback = feedback.clamped();
        let total_reps = self.reps.len() as u32;
        let completion_percentage = completion_percentage(total_reps, self.target_reps);
        let session_quality =
            session_quality(feedback.pain_level, feedback.difficulty, completion_percentage);

        SessionSummary {
            session_id: self.session_id,
            exercise: self.exercise.clone(),
            total_reps,
            target_reps: self.target_reps,
            completion_percentage,
            average_pain_level: f64::from(feedback.pain_level),
            average_difficulty: f64::from(feedback.difficulty),
            notes: feedback.notes.clone(),
            form_improvements: self.form_improvements(),
            average_form_score: self.average_form_score(),
            session_quality,
            recommendations: self.recommendations(&feedback, session_quality, total_reps),
            session_duration_ms: match (self.first_frame, self.last_frame) {
                (Some(first), Some(last)) => last.millis_since(first),
                _ => 0,
            },
        }
    }

    fn average_form_score(&self) -> f64 {
        if self.reps.is_empty() {
            return 0.0;
        }
        let good = self.reps.iter().filter(|rep| rep.form.is_good_form).count();
        good as f64 / self.reps.len() as f64 * 100.0
    }

    fn form_improvements(&self) -> Vec<String> {
        let total = self.reps.len();
        if total == 0 {
            return Vec::new();
        }

        let tally = |check: fn(&RepEvent) -> bool| self.reps.iter().filter(|rep| check(*rep)).count();
        let notes: Vec<String> = [
            ("Knee alignment", tally(|rep| rep.form.flags.misaligned)),
            ("Trunk lean", tally(|rep| rep.form.flags.trunk_lean)),
            ("Shallow depth", tally(|rep| rep.form.flags.shallow_depth)),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(issue, count)| format!("{issue} flagged on {count} of {total} reps"))
        .collect();

        if notes.is_empty() {
            vec!["Consistent form across all reps".to_string()]
        } else {
            notes
        }
    }

    fn recommendations(&self, feedback: &SubjectiveFeedback, quality: u8, total_reps: u32) -> Vec<String> {
        let config = &self.config;
        let mut out = Vec::new();

        if feedback.pain_level > config.pain_threshold || quality < config.quality_threshold {
            out.push(RECOMMEND_REDUCE_INTENSITY);
        }
        if feedback.difficulty > config.difficulty_threshold {
            out.push(RECOMMEND_PRACTICE_FORM);
        }
        if f64::from(total_reps) < config.completion_ratio * f64::from(self.target_reps) {
            out.push(RECOMMEND_FULL_RANGE);
        }
        if out.is_empty() {
            out.push(RECOMMEND_MAINTAIN);
        }

        out.into_iter().map(str::to_string).collect()
    }
}

/// completed / target as a percentage in [0, 100]
pub fn completion_percentage(completed: u32, target: u32) -> f64 {
    if target == 0 {
        return 100.0;
    }
    (f64::from(completed) / f64::from(target) * 100.0).clamp(0.0, 100.0)
}

/// Blend of pain, difficulty and completion on a 0-100 scale
pub fn session_quality(pain_level: u8, difficulty: u8, completion_percentage: f64) -> u8 {
    let pain_score = 100.0 - f64::from(pain_level) * 5.0;
    let difficulty_score = (10.0 - f64::from(difficulty)) * 5.0;
    let raw = (pain_score + difficulty_score + completion_percentage) / 3.0;
    raw.round().clamp(0.0, 100.0) as u8
}
