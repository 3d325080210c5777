use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use super::sheet::CellValue;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    TemplateMissing(PathBuf),

    #[error("document write failed: {0}")]
    Io(#[from] io::Error),
}

/// Replace `{{name}}` placeholders in a template with extracted values.
///
/// Formatting rules: numbers render with two decimals, booleans lowercase,
/// empty cells as empty strings. A placeholder with no matching field is
/// left in place and logged, so a half-filled document is visibly
/// half-filled rather than silently truncated.
pub fn render(template: &str, data: &BTreeMap<String, CellValue>) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match data.get(name) {
                    Some(value) => output.push_str(&format_value(value)),
                    None => {
                        warn!(placeholder = name, "no value for template placeholder");
                        output.push_str(&rest[start..start + 2 + end + 2]);
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated marker: emit the remainder verbatim.
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

fn format_value(value: &CellValue) -> String {
    match value {
        CellValue::Number(number) => format!("{number:.2}"),
        CellValue::Bool(flag) => flag.to_string(),
        CellValue::Text(text) => text.clone(),
        CellValue::Empty => String::new(),
    }
}

/// Render the template file and write the finished document.
pub fn generate_document(
    template_path: &Path,
    output_path: &Path,
    data: &BTreeMap<String, CellValue>,
) -> Result<(), TemplateError> {
    let template = fs::read_to_string(template_path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            TemplateError::TemplateMissing(template_path.to_path_buf())
        } else {
            TemplateError::Io(err)
        }
    })?;

    let document = render(&template, data);

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, document)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> BTreeMap<String, CellValue> {
        BTreeMap::from([
            ("client".to_string(), CellValue::Text("Acme".into())),
            ("price".to_string(), CellValue::Number(1250.5)),
            ("express".to_string(), CellValue::Bool(true)),
            ("note".to_string(), CellValue::Empty),
        ])
    }

    #[test]
    fn fills_placeholders_with_formatting_rules() {
        let rendered = render(
            "Proposal for {{client}}: total {{price}} (express: {{express}}){{note}}",
            &data(),
        );
        assert_eq!(rendered, "Proposal for Acme: total 1250.50 (express: true)");
    }

    #[test]
    fn whole_numbers_still_get_two_decimals() {
        let data = BTreeMap::from([("n".to_string(), CellValue::Number(7.0))]);
        assert_eq!(render("{{n}}", &data), "7.00");
    }

    #[test]
    fn unknown_placeholders_are_left_intact() {
        let rendered = render("Hello {{nobody}}!", &data());
        assert_eq!(rendered, "Hello {{nobody}}!");
    }

    #[test]
    fn placeholder_names_may_be_padded() {
        let rendered = render("{{ client }}", &data());
        assert_eq!(rendered, "Acme");
    }

    #[test]
    fn unterminated_marker_is_emitted_verbatim() {
        let rendered = render("price: {{price", &data());
        assert_eq!(rendered, "price: {{price");
    }

    #[test]
    fn generates_document_from_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("template.md");
        let output_path = dir.path().join("out").join("proposal.md");
        fs::write(&template_path, "# Offer for {{client}}\nTotal: {{price}}\n").unwrap();

        generate_document(&template_path, &output_path, &data()).unwrap();

        let written = fs::read_to_string(&output_path).unwrap();
        assert_eq!(written, "# Offer for Acme\nTotal: 1250.50\n");
    }

    #[test]
    fn missing_template_is_a_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_document(
            &dir.path().join("nope.md"),
            &dir.path().join("out.md"),
            &data(),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::TemplateMissing(_)));
    }
}
