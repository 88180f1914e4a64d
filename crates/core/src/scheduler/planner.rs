//! Builds the plan for the next session from the asset pool.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use uuid::Uuid;

use super::config::SchedulerConfig;
use super::types::SessionError;
use crate::media::{MediaAsset, MediaPool};
use crate::plan::SessionPlan;

/// Maximum title length accepted by the platform.
const MAX_TITLE_CHARS: usize = 100;

/// Mood category inferred from a track name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Relax,
    Instrumental,
    Ambient,
    Jazz,
    Classical,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Relax,
        Category::Instrumental,
        Category::Ambient,
        Category::Jazz,
        Category::Classical,
    ];

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Category::Relax => &["relax", "calm", "peaceful"],
            Category::Instrumental => &["instrumental", "piano", "guitar"],
            Category::Ambient => &["ambient", "atmospheric", "space"],
            Category::Jazz => &["jazz", "smooth", "blues"],
            Category::Classical => &["classical", "orchestra", "symphony"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Relax => "Relax",
            Category::Instrumental => "Instrumental",
            Category::Ambient => "Ambient",
            Category::Jazz => "Jazz",
            Category::Classical => "Classical",
        }
    }
}

const ACTIVITIES: &[(&str, &str)] = &[
    ("Relaxing", "😌"),
    ("Studying", "📚"),
    ("Working", "💻"),
    ("Meditating", "🧘"),
    ("Sleeping", "🌙"),
    ("Focusing", "🎯"),
    ("Reading", "📖"),
    ("Creating", "🎨"),
    ("Coding", "💻"),
];

const BENEFITS: &[&str] = &[
    "Better Concentration",
    "Less Stress",
    "More Productivity",
    "Deep Relaxation",
    "Restful Sleep",
    "Creative Flow",
    "A Calm Atmosphere",
    "Balanced Emotions",
];

/// Picks the category whose keywords appear most often in `name`.
///
/// Ties go to the earlier category; a name matching nothing gets a random one.
pub fn categorize<R: Rng + ?Sized>(name: &str, rng: &mut R) -> Category {
    let lowered = name.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut best: Option<(Category, usize)> = None;
    for category in Category::ALL {
        let hits = words
            .iter()
            .filter(|w| category.keywords().contains(w))
            .count();
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((category, hits));
        }
    }

    match best {
        Some((category, _)) => category,
        None => *Category::ALL.choose(rng).unwrap_or(&Category::Relax),
    }
}

/// Generates a broadcast title around the first track of the session.
pub fn generate_title<R: Rng + ?Sized>(track: &str, category: Category, rng: &mut R) -> String {
    let (activity, emoji) = *ACTIVITIES.choose(rng).unwrap_or(&("Relaxing", "😌"));
    let benefit = *BENEFITS.choose(rng).unwrap_or(&"Deep Relaxation");
    let label = category.label();

    let title = match rng.gen_range(0..4) {
        0 => format!("{label} Music • {track} | Perfect for {activity} {emoji} | {benefit}"),
        1 => format!("{track} • {label} for {activity} {emoji} | {benefit}"),
        2 => format!("{benefit} • {track} | {label} Music {emoji}"),
        _ => format!("Unwind with {track} • {label} for {activity} {emoji} | {benefit}"),
    };

    truncate_chars(&title, MAX_TITLE_CHARS)
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].trim_end().to_string(),
        None => s.to_string(),
    }
}

/// Shuffles `tracks` and repeats them until the queue holds `len` entries.
pub fn build_audio_queue<R: Rng + ?Sized>(
    tracks: &[MediaAsset],
    len: usize,
    rng: &mut R,
) -> Vec<MediaAsset> {
    if tracks.is_empty() {
        return Vec::new();
    }

    let mut shuffled = tracks.to_vec();
    shuffled.shuffle(rng);

    shuffled.iter().cycle().take(len.max(1)).cloned().collect()
}

/// Turns an asset pool into a [`SessionPlan`].
#[derive(Debug, Clone)]
pub struct SessionPlanner {
    config: SchedulerConfig,
    scheduled_start_delay: Duration,
}

impl SessionPlanner {
    pub fn new(config: SchedulerConfig, scheduled_start_delay: Duration) -> Self {
        Self {
            config,
            scheduled_start_delay,
        }
    }

    /// Selects the visual uniformly at random and builds the audio queue.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        pool: &MediaPool,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<SessionPlan, SessionError> {
        if !pool.is_usable() {
            return Err(SessionError::EmptyPool);
        }

        let visual = pool
            .visuals
            .choose(rng)
            .cloned()
            .ok_or(SessionError::EmptyPool)?;
        let audio_queue = build_audio_queue(&pool.audio, self.config.queue_length(), rng);
        let first = audio_queue.first().ok_or(SessionError::EmptyPool)?;

        let category = categorize(&first.display_name, rng);
        let title = generate_title(&first.display_name, category, rng);

        let delay = chrono::Duration::from_std(self.scheduled_start_delay)
            .unwrap_or_else(|_| chrono::Duration::zero());

        Ok(SessionPlan {
            id: Uuid::new_v4(),
            visual,
            audio_queue,
            title,
            description: self.config.description.clone(),
            planned_start: now + delay,
            duration_bound: self.config.session_duration(),
        })
    }
}
