use serde_json::Value;

const ROLE_PREAMBLE: &str = "You are a master cinematographer and photographic director. \
Execute the cinematography recipe below exactly; it is the single source of truth for \
subject, wardrobe, environment and light.";

const FRAMING_DIRECTIVE: &str = "COMPOSITION DIRECTIVE:\n\
- Wide shot.\n\
- The subject occupies 60-70% of the frame height.\n\
- Leave clear headroom above the head and visible floor below the feet.\n\
- Never crop the subject at the frame edges.";

const POSE_CORRECTION_DIRECTIVE: &str = "POSE CORRECTION:\n\
The recipe asks for a leaning pose inside an empty studio with nothing to lean on. \
Replace it with a natural, self-supporting standing pose. Preserve the styling details: \
Hands tucked in pockets, Slightly tilted head, stoic gaze.";

const CLOSING_DIRECTIVES: &str = "Lighting equipment must never appear in the frame: \
render every source only as its light effect on the subject and the set.\n\
Atmosphere: polished, high-end editorial photography.";

/// Ordered, literal substring replacements applied to the lighting fields.
/// Later entries see the result of earlier ones.
const EQUIPMENT_REPLACEMENTS: [(&str, &str); 4] = [
    ("softbox", "diffused volumetric light source"),
    ("bounce board", "indirect fill reflection"),
    ("light stand", "invisible point source"),
    ("setup", "lighting physics"),
];

const LIGHTING_FIELDS: [&str; 4] = ["key_light", "fill_light", "back_light", "setup"];

const SUPPORT_KEYWORDS: [&str; 7] = [
    "chair", "car", "table", "wall", "prop", "object", "block",
];

const LOCATION_POINTER: &str =
    "/cinematography_recipe/phase_1_subject_retention/environment_override/location";
const POSE_POINTER: &str =
    "/cinematography_recipe/phase_1_subject_retention/four_by_four_analysis/pose";
const LIGHTING_POINTER: &str = "/cinematography_recipe/phase_4_lighting_physics";
const DIRECTOR_NOTES_POINTER: &str =
    "/cinematography_recipe/phase_4_lighting_physics/director_notes";

/// Outcome of the parse step: either a structured recipe or an instruction
/// to pass the raw input through untouched.
#[derive(Debug)]
pub enum RecipeInput {
    Structured(Value),
    Raw,
}

pub fn parse_recipe(raw: &str) -> RecipeInput {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => RecipeInput::Structured(value),
        Err(_) => RecipeInput::Raw,
    }
}

fn string_at<'a>(doc: &'a Value, pointer: &str) -> &'a str {
    doc.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

fn pose_text(doc: &Value) -> String {
    doc.pointer(POSE_POINTER)
        .and_then(Value::as_array)
        .map(|phrases| {
            phrases
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn sanitize_field(value: &str) -> String {
    let mut sanitized = value.to_lowercase();
    for (needle, replacement) in EQUIPMENT_REPLACEMENTS {
        sanitized = sanitized.replace(needle, replacement);
    }
    sanitized
}

fn sanitize_equipment(doc: &mut Value) {
    let Some(lighting) = doc
        .pointer_mut(LIGHTING_POINTER)
        .and_then(Value::as_object_mut)
    else {
        return;
    };

    for field in LIGHTING_FIELDS {
        if let Some(Value::String(text)) = lighting.get_mut(field) {
            *text = sanitize_field(text);
        }
    }
}

/// A leaning pose in an empty studio is physically incoherent unless the
/// director's notes mention something to lean on.
fn needs_pose_correction(doc: &Value) -> bool {
    let location = string_at(doc, LOCATION_POINTER).to_lowercase();
    if !location.contains("studio") {
        return false;
    }

    if !pose_text(doc).to_lowercase().contains("leaning") {
        return false;
    }

    let notes = string_at(doc, DIRECTOR_NOTES_POINTER).to_lowercase();
    !SUPPORT_KEYWORDS
        .iter()
        .any(|keyword| notes.contains(keyword))
}

/// Rewrites a raw recipe into the final render instruction. Malformed input
/// is returned unchanged; the pipeline is never blocked on a bad recipe.
// TODO: the preserved styling details in the pose correction are a fixed
// list rather than phrases extracted from four_by_four_analysis.pose;
// deriving them from the recipe needs a product decision first.
pub fn rewrite_prompt(raw: &str) -> String {
    let mut doc = match parse_recipe(raw) {
        RecipeInput::Structured(doc) => doc,
        RecipeInput::Raw => return raw.to_string(),
    };

    let correct_pose = needs_pose_correction(&doc);
    sanitize_equipment(&mut doc);

    let recipe_json =
        serde_json::to_string_pretty(&doc).unwrap_or_else(|_| raw.to_string());

    let mut instruction = String::new();
    instruction.push_str(ROLE_PREAMBLE);
    instruction.push_str("\n\nRECIPE:\n");
    instruction.push_str(&recipe_json);
    instruction.push_str("\n\n");
    instruction.push_str(FRAMING_DIRECTIVE);
    if correct_pose {
        instruction.push_str("\n\n");
        instruction.push_str(POSE_CORRECTION_DIRECTIVE);
    }
    instruction.push_str("\n\n");
    instruction.push_str(CLOSING_DIRECTIVES);
    instruction
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recipe_with_lighting(key_light: &str) -> String {
        json!({
            "cinematography_recipe": {
                "phase_4_lighting_physics": {
                    "key_light": key_light,
                    "fill_light": "Bounce board camera left",
                    "setup": "Classic three-point setup"
                }
            }
        })
        .to_string()
    }

    #[test]
    fn returns_malformed_input_unchanged() {
        let raw = "not json at all {{{";
        assert_eq!(rewrite_prompt(raw), raw);
    }

    #[test]
    fn renames_equipment_in_lighting_fields() {
        let output = rewrite_prompt(&recipe_with_lighting("Large Softbox on a light stand"));
        assert!(output.contains("diffused volumetric light source"));
        assert!(output.contains("invisible point source"));
        assert!(output.contains("indirect fill reflection"));
        assert!(!output.to_lowercase().contains("softbox"));
        assert!(!output.to_lowercase().contains("bounce board"));
    }

    #[test]
    fn renames_setup_to_lighting_physics() {
        let output = rewrite_prompt(&recipe_with_lighting("key"));
        assert!(output.contains("classic three-point lighting physics"));
    }

    #[test]
    fn leaves_unrecognized_fields_untouched() {
        let raw = json!({
            "cinematography_recipe": {
                "phase_4_lighting_physics": {
                    "director_notes": "Softbox stays warm"
                }
            }
        })
        .to_string();
        let output = rewrite_prompt(&raw);
        assert!(output.contains("Softbox stays warm"));
    }

    #[test]
    fn framing_directive_is_always_present() {
        for raw in ["{}", &recipe_with_lighting("key")] {
            let output = rewrite_prompt(raw);
            assert!(output.contains("60-70% of the frame height"));
            assert!(output.contains("Wide shot."));
        }
    }

    fn studio_leaning_recipe(director_notes: &str) -> String {
        json!({
            "cinematography_recipe": {
                "phase_1_subject_retention": {
                    "environment_override": { "location": "Studio, empty" },
                    "four_by_four_analysis": {
                        "pose": ["Leaning against something", "hands in pockets"]
                    }
                },
                "phase_4_lighting_physics": {
                    "director_notes": director_notes
                }
            }
        })
        .to_string()
    }

    #[test]
    fn corrects_leaning_pose_in_empty_studio() {
        let output = rewrite_prompt(&studio_leaning_recipe("keep it moody"));
        assert!(output.contains("POSE CORRECTION:"));
        assert!(output.contains("Hands tucked in pockets"));
        assert!(output.contains("stoic gaze"));
    }

    #[test]
    fn support_keyword_in_notes_suppresses_pose_correction() {
        let output = rewrite_prompt(&studio_leaning_recipe("subject leans on a chair"));
        assert!(!output.contains("POSE CORRECTION:"));
    }

    #[test]
    fn pose_correction_needs_a_studio_location() {
        let raw = json!({
            "cinematography_recipe": {
                "phase_1_subject_retention": {
                    "environment_override": { "location": "Rooftop at dusk" },
                    "four_by_four_analysis": { "pose": ["leaning on the railing"] }
                }
            }
        })
        .to_string();
        assert!(!rewrite_prompt(&raw).contains("POSE CORRECTION:"));
    }

    #[test]
    fn pose_correction_needs_a_leaning_pose() {
        let raw = json!({
            "cinematography_recipe": {
                "phase_1_subject_retention": {
                    "environment_override": { "location": "studio" },
                    "four_by_four_analysis": { "pose": ["standing tall"] }
                }
            }
        })
        .to_string();
        assert!(!rewrite_prompt(&raw).contains("POSE CORRECTION:"));
    }

    #[test]
    fn missing_fields_read_as_empty() {
        let output = rewrite_prompt("{\"unrelated\": true}");
        assert!(output.contains("\"unrelated\": true"));
        assert!(output.contains("editorial photography"));
        assert!(!output.contains("POSE CORRECTION:"));
    }

    #[test]
    fn closing_directives_follow_the_recipe_block() {
        let output = rewrite_prompt("{}");
        let recipe_at = output.find("RECIPE:").unwrap();
        let closing_at = output.find("Lighting equipment must never appear").unwrap();
        assert!(recipe_at < closing_at);
    }
}
