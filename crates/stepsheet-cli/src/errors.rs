//! Better error messages with actionable suggestions.

use std::path::Path;
use stepsheet::Registry;

/// Build an error message for a step type the registry does not know.
pub fn unknown_step_error(step_type: &str, registry: &Registry) -> String {
    let mut msg = format!("Unknown step type '{}'", step_type);

    if let Some(suggestion) = find_similar_step(step_type, registry) {
        msg.push_str(&format!(". Did you mean '{}'?", suggestion));
        return msg;
    }

    msg.push_str(".\n\nAvailable steps: ");
    msg.push_str(&registry.step_types().collect::<Vec<_>>().join(", "));
    msg
}

/// Build an error message for a data file that does not exist.
pub fn file_not_found_error(path: &str) -> String {
    let mut msg = format!("Failed to read '{}': file not found", path);
    if let Some(suggestions) = find_similar_files(path) {
        if !suggestions.is_empty() {
            msg.push_str(&format!(".\n\nDid you mean: {}?", suggestions.join(", ")));
        }
    }
    msg
}

/// Find the registered step type closest to `input` (for typo suggestions).
fn find_similar_step<'a>(input: &str, registry: &'a Registry) -> Option<&'a str> {
    let input = input.to_lowercase();
    registry
        .step_types()
        .map(|step_type| (levenshtein(&input, step_type), step_type))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, step_type)| step_type)
}

/// Simple Levenshtein distance for short strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Find similar files in the same directory (for "did you mean" suggestions).
fn find_similar_files(path: &str) -> Option<Vec<String>> {
    let path = Path::new(path);
    let filename = path.file_name()?.to_str()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let entries = std::fs::read_dir(parent).ok()?;
    let mut suggestions = Vec::new();

    for entry in entries.flatten() {
        if let Some(name) = entry.file_name().to_str() {
            if levenshtein(filename, name) <= 2 && name != filename {
                suggestions.push(name.to_string());
            }
        }
    }

    suggestions.sort();
    suggestions.truncate(3);
    Some(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("add_column", "add_column"), 0);
        assert_eq!(levenshtein("add_colum", "add_column"), 1);
        assert_eq!(levenshtein("abc", "xyz"), 3);
    }

    #[cfg(feature = "columns")]
    #[test]
    fn test_unknown_step_suggestion() {
        let registry = stepsheet_steps::default_registry().unwrap();
        let msg = unknown_step_error("rename_colum", &registry);
        assert!(msg.contains("Did you mean 'rename_column'?"), "{msg}");

        let msg = unknown_step_error("pivot", &registry);
        assert!(msg.contains("Available steps:"), "{msg}");
    }

    #[test]
    fn test_similar_files() {
        let dir = std::env::temp_dir().join("stepsheet_cli_errors");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("sales.csv"), "a\n1\n").unwrap();

        let missing = dir.join("sale.csv");
        let msg = file_not_found_error(missing.to_str().unwrap());
        assert!(msg.contains("Did you mean: sales.csv?"), "{msg}");
    }
}
