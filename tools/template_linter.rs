/// Template Linter: checks story templates for placeholders the personalizer
/// will not substitute.
///
/// Usage: template_linter <path> [--strict]
///
/// `<path>` is a template file or a directory searched recursively. Text
/// files (`.txt`, `.md`) hold one template body each; `.json` files hold an
/// array of template documents with a `rawContent` field.
use std::path::Path;
use std::process;

use serde_json::Value;
use story_personalizer::core::substitution::{scan_placeholders, Token};

/// One template body to lint, labelled for the report.
struct Source {
    label: String,
    text: String,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: template_linter <path> [--strict]");
        println!("  --strict  treat warnings as errors");
        process::exit(0);
    }

    let root = Path::new(&args[1]);
    let strict = args[2..].iter().any(|a| a == "--strict");

    let mut sources = Vec::new();
    if root.is_file() {
        load_file(root, &mut sources);
    } else if root.is_dir() {
        load_recursive(root, &mut sources);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", root.display());
        process::exit(1);
    }

    println!("Loaded {} templates", sources.len());

    let (errors, warnings) = lint_templates(&sources);

    println!("\n=== Template Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() && (!strict || warnings.is_empty()) {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load_recursive(dir: &Path, sources: &mut Vec<Source>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        let mut paths: Vec<_> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();
        for path in paths {
            if path.is_dir() {
                load_recursive(&path, sources);
            } else {
                load_file(&path, sources);
            }
        }
    }
}

fn load_file(path: &Path, sources: &mut Vec<Source>) {
    let extension = path.extension().and_then(|s| s.to_str());
    if !matches!(extension, Some("txt" | "md" | "json")) {
        return;
    }

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("  ERROR reading {}: {}", path.display(), e);
            return;
        }
    };

    if extension != Some("json") {
        println!("  Loaded: {}", path.display());
        sources.push(Source {
            label: path.display().to_string(),
            text,
        });
        return;
    }

    match serde_json::from_str::<Vec<Value>>(&text) {
        Ok(documents) => {
            println!("  Loaded: {} ({} templates)", path.display(), documents.len());
            for (index, document) in documents.iter().enumerate() {
                let label = match document.get("id").and_then(Value::as_str) {
                    Some(id) => format!("{}#{}", path.display(), id),
                    None => format!("{}[{}]", path.display(), index),
                };
                match document.get("rawContent").and_then(Value::as_str) {
                    Some(raw) => sources.push(Source {
                        label,
                        text: raw.to_string(),
                    }),
                    None => eprintln!("  ERROR {}: missing rawContent", label),
                }
            }
        }
        Err(e) => eprintln!("  ERROR parsing {}: {}", path.display(), e),
    }
}

fn lint_templates(sources: &[Source]) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for source in sources {
        let placeholders = scan_placeholders(&source.text);

        if placeholders.is_empty() {
            warnings.push(format!("Template '{}' has no placeholders", source.label));
        }

        for placeholder in &placeholders {
            if placeholder.token.is_some() {
                continue;
            }
            let line = line_of(&source.text, placeholder.offset);
            let upper = placeholder.name.to_ascii_uppercase();

            if let Some(token) = Token::from_name(&upper) {
                // A lowercase tag is left in the story verbatim.
                warnings.push(format!(
                    "Template '{}' line {}: '[{}]' will not be substituted, did you mean '{}'?",
                    source.label,
                    line,
                    placeholder.name,
                    token.tag()
                ));
            } else if placeholder.name == upper {
                errors.push(format!(
                    "Template '{}' line {}: unknown placeholder '[{}]'",
                    source.label, line, placeholder.name
                ));
            }
        }

        if !placeholders
            .iter()
            .any(|p| p.token == Some(Token::ChildName))
            && !placeholders.is_empty()
        {
            warnings.push(format!(
                "Template '{}' never uses {}",
                source.label,
                Token::ChildName.tag()
            ));
        }
    }

    (errors, warnings)
}

fn line_of(text: &str, offset: usize) -> usize {
    1 + text.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count()
}
