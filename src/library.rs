//! Built-in kick library.
//!
//! Fifteen procedurally generated kicks, grouped by mood, each with the
//! descriptive characteristics an analyzer can match against. The catalog
//! is static; storage of user samples lives outside this crate.

use serde::Serialize;

use crate::error::KickError;
use crate::synth::KickPreset;

/// Perceptual description of a library kick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Characteristics {
    pub brightness: u8,
    pub warmth: u8,
    pub punch: u8,
    pub decay: u8,
    /// Dominant frequency in Hz.
    pub frequency_center: u32,
    pub tonal_character: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub duration_ms: u32,
    pub tags: &'static [&'static str],
    pub characteristics: Characteristics,
    pub preset: KickPreset,
}

macro_rules! entry {
    (
        $id:literal, $name:literal, $ms:literal, [$($tag:literal),*],
        ($b:literal, $w:literal, $p:literal, $d:literal, $fc:literal, $tc:literal),
        ($pitch:literal, $decay:literal, $punch:literal, $tone:literal, $dist:literal)
    ) => {
        LibraryEntry {
            id: $id,
            name: $name,
            duration_ms: $ms,
            tags: &[$($tag),*],
            characteristics: Characteristics {
                brightness: $b,
                warmth: $w,
                punch: $p,
                decay: $d,
                frequency_center: $fc,
                tonal_character: $tc,
            },
            preset: KickPreset {
                pitch: $pitch,
                decay: $decay,
                punch: $punch,
                tone: $tone,
                distortion: $dist,
            },
        }
    };
}

pub static LIBRARY: [LibraryEntry; 15] = [
    // Cold / icy
    entry!("ice-crystal", "Ice Crystal", 250, ["cold", "sharp", "metallic", "bright", "crisp"],
        (90, 10, 85, 20, 150, "metallic"), (150.0, 0.25, 0.85, 0.1, 0.2)),
    entry!("frozen-lake", "Frozen Lake", 200, ["cold", "deep", "minimal", "clean"],
        (75, 15, 70, 25, 120, "crystalline"), (120.0, 0.2, 0.7, 0.15, 0.1)),
    entry!("arctic-wind", "Arctic Wind", 180, ["cold", "airy", "light", "ethereal"],
        (85, 5, 60, 30, 180, "airy"), (180.0, 0.18, 0.6, 0.05, 0.05)),
    // Warm / cozy
    entry!("fireplace", "Fireplace", 400, ["warm", "cozy", "round", "full"],
        (30, 90, 65, 70, 80, "warm"), (80.0, 0.4, 0.65, 0.7, 0.3)),
    entry!("wool-blanket", "Wool Blanket", 350, ["warm", "soft", "muffled", "comfortable"],
        (25, 85, 50, 65, 70, "soft"), (70.0, 0.35, 0.5, 0.6, 0.2)),
    entry!("sunset-glow", "Sunset Glow", 380, ["warm", "golden", "smooth", "nostalgic"],
        (45, 80, 60, 60, 90, "golden"), (90.0, 0.38, 0.6, 0.5, 0.25)),
    // Dark / moody
    entry!("midnight", "Midnight", 500, ["dark", "deep", "heavy", "mysterious"],
        (10, 40, 80, 85, 50, "dark"), (50.0, 0.5, 0.8, 0.3, 0.4)),
    entry!("shadow-walker", "Shadow Walker", 450, ["dark", "brooding", "atmospheric", "cinematic"],
        (15, 35, 75, 80, 55, "brooding"), (55.0, 0.45, 0.75, 0.35, 0.35)),
    entry!("deep-cave", "Deep Cave", 600, ["dark", "cavernous", "resonant", "vast"],
        (5, 30, 70, 95, 40, "cavernous"), (40.0, 0.6, 0.7, 0.25, 0.5)),
    // Bright / energetic
    entry!("solar-flare", "Solar Flare", 220, ["bright", "energetic", "explosive", "powerful"],
        (95, 60, 95, 35, 200, "explosive"), (200.0, 0.22, 0.95, 0.4, 0.6)),
    entry!("neon-lights", "Neon Lights", 200, ["bright", "electric", "vibrant", "modern"],
        (88, 45, 85, 30, 180, "electric"), (180.0, 0.2, 0.85, 0.5, 0.4)),
    entry!("laser-beam", "Laser Beam", 150, ["bright", "sharp", "precise", "futuristic"],
        (92, 20, 90, 15, 220, "laser"), (220.0, 0.15, 0.9, 0.2, 0.3)),
    // Soft / ambient
    entry!("cloud-nine", "Cloud Nine", 600, ["soft", "ambient", "dreamy", "floating"],
        (40, 65, 30, 90, 60, "dreamy"), (60.0, 0.6, 0.3, 0.8, 0.1)),
    entry!("silk-touch", "Silk Touch", 500, ["soft", "smooth", "delicate", "gentle"],
        (35, 70, 25, 85, 65, "silky"), (65.0, 0.5, 0.25, 0.7, 0.05)),
    entry!("morning-mist", "Morning Mist", 550, ["soft", "ethereal", "atmospheric", "calm"],
        (45, 60, 35, 88, 70, "misty"), (70.0, 0.55, 0.35, 0.75, 0.08)),
];

pub fn find(id: &str) -> Option<&'static LibraryEntry> {
    LIBRARY.iter().find(|e| e.id == id)
}

pub fn preset_for(id: &str) -> Result<KickPreset, KickError> {
    find(id)
        .map(|e| e.preset)
        .ok_or_else(|| KickError::UnknownPreset(id.to_string()))
}

/// What an analyzer wants; unset fields do not count toward the score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetCharacteristics {
    pub brightness: Option<u8>,
    pub warmth: Option<u8>,
    pub punch: Option<u8>,
    pub decay: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub entry: &'static LibraryEntry,
    /// 0–100.
    pub confidence: u8,
}

const KEYWORD_BONUS: f64 = 0.1;

/// Score every entry against `target` and `keywords`; return the best.
///
/// Each provided characteristic contributes `1 - |Δ| / 100`, averaged.
/// Every tag that contains a keyword (or is contained by one,
/// case-insensitively) adds a flat bonus. The score is capped at 1.0 and
/// the first entry wins ties.
pub fn best_match(target: &TargetCharacteristics, keywords: &[&str]) -> Match {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut best = &LIBRARY[0];
    let mut best_score = 0.0;

    for entry in LIBRARY.iter() {
        let c = &entry.characteristics;
        let pairs = [
            (target.brightness, c.brightness),
            (target.warmth, c.warmth),
            (target.punch, c.punch),
            (target.decay, c.decay),
        ];

        let mut score = 0.0;
        let mut factors = 0;
        for (want, have) in pairs {
            if let Some(want) = want {
                score += 1.0 - (f64::from(want) - f64::from(have)).abs() / 100.0;
                factors += 1;
            }
        }
        if factors > 0 {
            score /= f64::from(factors);
        }

        let hits = entry
            .tags
            .iter()
            .filter(|tag| {
                keywords
                    .iter()
                    .any(|k| tag.contains(k.as_str()) || k.contains(*tag))
            })
            .count();
        score += hits as f64 * KEYWORD_BONUS;
        score = score.min(1.0);

        if score > best_score {
            best_score = score;
            best = entry;
        }
    }

    Match {
        entry: best,
        confidence: (best_score * 100.0).round() as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::synthesize;

    #[test]
    fn ids_are_unique() {
        for (i, a) in LIBRARY.iter().enumerate() {
            for b in &LIBRARY[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn durations_match_preset_decay() {
        for e in LIBRARY.iter() {
            let ms = (e.preset.decay * 1000.0).round() as u32;
            assert_eq!(ms, e.duration_ms, "{}", e.id);
            assert_eq!(synthesize(&e.preset, 44100).len(), e.preset.length(44100));
        }
    }

    #[test]
    fn lookup_by_id() {
        let p = preset_for("deep-cave").unwrap();
        assert_eq!(p.pitch, 40.0);
        assert!(matches!(preset_for("nope"), Err(KickError::UnknownPreset(id)) if id == "nope"));
    }

    #[test]
    fn exact_characteristics_pick_that_entry() {
        let m = best_match(
            &TargetCharacteristics {
                brightness: Some(30),
                warmth: Some(90),
                punch: Some(65),
                decay: Some(70),
            },
            &[],
        );
        assert_eq!(m.entry.id, "fireplace");
        assert_eq!(m.confidence, 100);
    }

    #[test]
    fn keywords_break_characteristic_ties() {
        let m = best_match(&TargetCharacteristics::default(), &["Dark", "vast"]);
        assert_eq!(m.entry.id, "deep-cave");
        assert_eq!(m.confidence, 20);
    }

    #[test]
    fn nothing_to_match_keeps_first_entry() {
        let m = best_match(&TargetCharacteristics::default(), &[]);
        assert_eq!(m.entry.id, "ice-crystal");
        assert_eq!(m.confidence, 0);
    }

    #[test]
    fn score_is_capped() {
        let m = best_match(
            &TargetCharacteristics {
                brightness: Some(90),
                warmth: Some(10),
                punch: Some(85),
                decay: Some(20),
            },
            &["cold", "sharp", "metallic"],
        );
        assert_eq!(m.entry.id, "ice-crystal");
        assert_eq!(m.confidence, 100);
    }
}
