//! Static exercise catalog and reminder selection.

use crate::i18n;
use posture_ipc::{Exercise, Language, Settings};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BUILTIN_EN: &str = include_str!("../data/exercises.en.json");
const BUILTIN_KO: &str = include_str!("../data/exercises.ko.json");

/// Exercises for one language, reloaded when the language changes.
pub struct Catalog {
    dir: Option<PathBuf>,
    loaded: Option<(Language, Vec<Exercise>)>,
}

impl Catalog {
    /// `dir` may hold `exercises.<lang>.json` files that replace the
    /// built-in lists.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir, loaded: None }
    }

    pub fn exercises(&mut self, language: Language) -> &[Exercise] {
        let stale = !matches!(&self.loaded, Some((lang, _)) if *lang == language);
        if stale {
            let list = load(self.dir.as_deref(), language);
            info!(language = %language, count = list.len(), "exercise catalog loaded");
            self.loaded = Some((language, list));
        }
        self.loaded
            .as_ref()
            .map(|(_, list)| list.as_slice())
            .unwrap_or_default()
    }

    pub fn pick<R: Rng + ?Sized>(&mut self, settings: &Settings, rng: &mut R) -> Exercise {
        let language = settings.language;
        select_exercise(self.exercises(language), settings, rng)
    }
}

fn load(dir: Option<&Path>, language: Language) -> Vec<Exercise> {
    let parsed = match dir.map(|d| d.join(format!("exercises.{}.json", language.code()))) {
        Some(path) if path.exists() => fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|json| serde_json::from_str::<Vec<Exercise>>(&json).map_err(|e| e.to_string())),
        _ => serde_json::from_str::<Vec<Exercise>>(builtin(language)).map_err(|e| e.to_string()),
    };
    match parsed {
        Ok(list) if !list.is_empty() => list,
        Ok(_) => vec![break_time(language)],
        Err(e) => {
            warn!(language = %language, error = %e, "could not load exercises, using break time");
            vec![break_time(language)]
        }
    }
}

fn builtin(language: Language) -> &'static str {
    match language {
        Language::En => BUILTIN_EN,
        Language::Ko => BUILTIN_KO,
    }
}

/// Synthetic exercise used whenever nothing in the catalog qualifies.
pub fn break_time(language: Language) -> Exercise {
    let msg = i18n::messages(language);
    Exercise::new(msg.break_time, msg.break_time_desc, "general")
}

/// Uniform pick among exercises whose category is enabled.
pub fn select_exercise<R: Rng + ?Sized>(
    exercises: &[Exercise],
    settings: &Settings,
    rng: &mut R,
) -> Exercise {
    if !settings.exercises_enabled {
        return break_time(settings.language);
    }
    let available: Vec<&Exercise> = exercises
        .iter()
        .filter(|ex| settings.category_enabled(&ex.category))
        .collect();
    match available.choose(rng) {
        Some(ex) => {
            debug!(title = %ex.title, category = %ex.category, "exercise selected");
            (*ex).clone()
        }
        None => {
            debug!("no exercise in enabled categories, using break time");
            break_time(settings.language)
        }
    }
}
